//! Per-track playback session

use sonata_core::{AudioFormat, AudioSource, EntryId};
use std::fmt;

/// The loaded source: the coordinator's id plus the handle the engine owns
pub struct SourceRef {
    pub entry: EntryId,
    pub source: Box<dyn AudioSource>,
}

impl SourceRef {
    pub fn new(entry: impl Into<EntryId>, source: impl AudioSource + 'static) -> Self {
        Self {
            entry: entry.into(),
            source: Box::new(source),
        }
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRef")
            .field("entry", &self.entry)
            .field("open", &self.source.is_open())
            .finish_non_exhaustive()
    }
}

/// State of one playback attempt
///
/// Replaced wholesale by `play`. `token` identifies the live attempt: it is
/// renewed by every `play`, `seek` and hibernation wake, and async callbacks
/// carrying any other token are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub token: u64,
    pub format: AudioFormat,
    pub total_frames: u64,
    /// Track time (s) of the first frame of the last scheduled buffer
    pub buffer_start_time: f64,
    /// Track time (s), authoritative whenever the render clock is not
    pub saved_position: f64,
    pub is_seeking: bool,
    pub is_hibernating: bool,
    /// `did_start_playing` already sent for this track
    pub start_notified: bool,
}

impl PlaybackSession {
    pub fn new(token: u64, format: AudioFormat, total_frames: u64) -> Self {
        Self {
            token,
            format,
            total_frames,
            buffer_start_time: 0.0,
            saved_position: 0.0,
            is_seeking: false,
            is_hibernating: false,
            start_notified: false,
        }
    }

    /// Track length in seconds
    pub fn duration(&self) -> f64 {
        self.format.seconds(self.total_frames)
    }

    /// Clamp into `[0, duration]`
    pub fn clamp_position(&self, seconds: f64) -> f64 {
        if !seconds.is_finite() {
            return 0.0;
        }
        seconds.clamp(0.0, self.duration())
    }
}
