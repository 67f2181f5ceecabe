//! Core types for the playback engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Playback state of the engine
///
/// `Running` is internal: the output is started but the player node has not
/// begun rendering. Listeners never observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing has been loaded yet
    #[default]
    Ready,

    /// Opening a source and reading its first buffer
    Bufferring,

    /// Rendering audio
    Playing,

    /// Track loaded, render halted
    Paused,

    /// No track loaded
    Stopped,

    /// Output started, player node not rendering yet
    Running,

    /// A backend failure halted playback
    Error,

    /// Engine released; terminal
    Disposed,
}

impl PlaybackState {
    /// All states, in declaration order
    pub const ALL: [Self; 8] = [
        Self::Ready,
        Self::Bufferring,
        Self::Playing,
        Self::Paused,
        Self::Stopped,
        Self::Running,
        Self::Error,
        Self::Disposed,
    ];

    /// Whether this state is hidden from listeners
    pub fn is_internal(self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Whether a track is loaded in this state
    pub fn has_track(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Why a track stopped playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Reached the end of the stream
    Eof,

    /// Stopped or replaced by the caller
    UserAction,

    /// Halted by a backend failure
    Error,

    /// Engine was disposed with a track loaded
    Disposed,

    /// No track has stopped yet
    #[default]
    None,
}

/// Opaque identifier of a playable entry, chosen by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag fields read from a source (title, artist, ...)
pub type MetadataFields = BTreeMap<String, String>;

/// PCM format of a source or of the render graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Frames per second
    pub sample_rate: u32,

    /// Interleaved channels per frame
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Both fields are non-zero
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }

    /// Duration of `frames` frames in seconds
    pub fn seconds(&self, frames: u64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / f64::from(self.sample_rate)
    }

    /// Frame index at `seconds` (floored, never negative)
    pub fn frame_at(&self, seconds: f64) -> u64 {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        (seconds * f64::from(self.sample_rate)).floor() as u64
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz / {} ch", self.sample_rate, self.channels)
    }
}

/// Interleaved `f32` PCM frames
///
/// Samples are stored frame-major: `[c0, c1, .., c0, c1, ..]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PcmBuffer {
    samples: Vec<f32>,
    channels: u16,
}

impl PcmBuffer {
    /// Zeroed buffer holding `frames` frames
    pub fn new(channels: u16, frames: usize) -> Self {
        Self {
            samples: vec![0.0; frames * usize::from(channels)],
            channels,
        }
    }

    /// Wrap existing interleaved samples; a trailing partial frame is dropped
    pub fn from_interleaved(channels: u16, mut samples: Vec<f32>) -> Self {
        let ch = usize::from(channels.max(1));
        samples.truncate(samples.len() - samples.len() % ch);
        Self { samples, channels }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Samples of frame `index`
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let ch = usize::from(self.channels);
        self.samples.get(index * ch..(index + 1) * ch)
    }

    /// Keep only the first `frames` frames
    pub fn truncate_frames(&mut self, frames: usize) {
        self.samples.truncate(frames * usize::from(self.channels));
    }
}
