//! Buffer scheduling
//!
//! The whole remainder of the track, from the requested frame, is read into
//! one buffer and handed to the player node. The player fires the buffer's
//! completion once its last frame has been rendered; the completion only
//! posts a signal, and the control thread decides whether it still counts.

use crate::engine::{ControlMessage, EngineSignal, StateMachine};
use crossbeam_channel::Sender;
use sonata_audio::CompletionCallback;
use sonata_core::{PcmBuffer, PlaybackError, Result};
use tracing::{debug, trace};

/// Completion of one scheduled buffer, bound to the session token that
/// scheduled it
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    token: u64,
    control: Sender<ControlMessage>,
}

impl CompletionHandle {
    pub(crate) fn new(token: u64, control: Sender<ControlMessage>) -> Self {
        Self { token, control }
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Report the buffer as fully rendered
    ///
    /// Safe to call from any thread, any number of times: a completion whose
    /// token is no longer live is ignored.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fire(&self) {
        self.post();
    }

    fn post(&self) {
        trace!(token = self.token, "Buffer completion fired");
        let _ = self.control.send(ControlMessage::Signal(EngineSignal::BufferCompleted {
            token: self.token,
        }));
    }

    pub(crate) fn into_callback(self) -> CompletionCallback {
        Box::new(move || self.post())
    }
}

impl StateMachine {
    pub(crate) fn completion(&self, token: u64) -> CompletionHandle {
        CompletionHandle::new(token, self.control.clone())
    }

    /// Read from `frame` to the end of the track
    ///
    /// `Ok(None)` when `frame` is at or past the end.
    pub(crate) fn read_remaining(&mut self, frame: u64) -> Result<Option<PcmBuffer>> {
        let (Some(source), Some(session)) = (self.source.as_mut(), self.session.as_ref()) else {
            return Err(PlaybackError::InvalidState("no source loaded".to_string()));
        };
        let frame_count = session.total_frames.saturating_sub(frame);
        if frame_count == 0 {
            return Ok(None);
        }

        let frames = usize::try_from(frame_count).map_err(|_| {
            PlaybackError::engine(format!("{frame_count} frames do not fit in memory"))
        })?;
        let mut buffer = PcmBuffer::new(session.format.channels, frames);
        let read = source
            .source
            .read(frame, &mut buffer)
            .map_err(PlaybackError::engine)?;
        if read == 0 {
            return Err(PlaybackError::engine(format!(
                "{} returned no frames at {frame}",
                source.entry
            )));
        }
        buffer.truncate_frames(read);
        Ok(Some(buffer))
    }

    /// Schedule the rest of the track from `frame` under the live token
    pub(crate) fn schedule_from(&mut self, frame: u64) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(PlaybackError::InvalidState("no session".to_string()));
        };
        session.buffer_start_time = session.format.seconds(frame);
        let token = session.token;

        let Some(buffer) = self.read_remaining(frame)? else {
            debug!(frame, "Nothing left to schedule");
            return Ok(());
        };
        debug!(frame, frames = buffer.frames(), token, "Scheduling buffer");
        let completion = self.completion(token);
        self.graph.schedule(buffer, completion.into_callback())
    }
}
