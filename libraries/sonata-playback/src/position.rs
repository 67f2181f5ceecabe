//! Playback position
//!
//! While playing, the position is derived from the player's render clock:
//! the track time of the scheduled buffer's first frame plus the frames
//! rendered since. Whenever the clock is unavailable (paused, hibernating,
//! stopped) the session's saved position is authoritative.

use crate::engine::StateMachine;
use sonata_core::{AudioFormat, PlaybackState};

/// Track time for `sample_time` frames rendered past `buffer_start`,
/// clamped to the track
pub(crate) fn absolute_time(
    buffer_start: f64,
    sample_time: u64,
    format: AudioFormat,
    duration: f64,
) -> f64 {
    (buffer_start + format.seconds(sample_time)).clamp(0.0, duration)
}

impl StateMachine {
    /// Current position in seconds; 0 with nothing loaded
    ///
    /// Refreshes the saved position from the render clock when playing.
    pub(crate) fn progress(&mut self) -> f64 {
        let live = self.state == PlaybackState::Playing && self.graph.is_running();
        let sample_time = if live { self.graph.sample_time() } else { None };

        let Some(session) = self.session.as_mut() else {
            return 0.0;
        };
        if let Some(sample_time) = sample_time {
            session.saved_position = absolute_time(
                session.buffer_start_time,
                sample_time,
                session.format,
                session.duration(),
            );
        }
        session.saved_position
    }

    pub(crate) fn duration(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.duration())
    }
}
