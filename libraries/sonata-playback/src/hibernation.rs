//! Hibernation
//!
//! A track left paused for `hibernation_delay` gives up its resources: the
//! source handle is closed and the output is disconnected. The source
//! reference and the session stay, so `resume` can reopen, renegotiate and
//! continue from the saved position.

use crate::engine::{EngineSignal, StateMachine};
use sonata_core::{PlaybackError, PlaybackState, Result};
use tracing::{debug, info};

impl StateMachine {
    pub(crate) fn arm_hibernation(&mut self) {
        let delay = self.config.hibernation_delay();
        let timer = self.arm_timer(delay, |timer| EngineSignal::HibernationDue { timer });
        debug!(timer = timer.id, ?delay, "Hibernation armed");
        self.hibernation = Some(timer);
    }

    pub(crate) fn cancel_hibernation(&mut self) {
        if let Some(timer) = self.hibernation.take() {
            timer.cancel();
        }
    }

    pub(crate) fn on_hibernation_due(&mut self, timer: u64) {
        if self.hibernation.as_ref().map(|t| t.id) != Some(timer) {
            debug!(timer, "Ignoring stale hibernation timer");
            return;
        }
        self.hibernation = None;
        if self.state == PlaybackState::Paused && !self.is_hibernating() {
            self.enter_hibernation();
        }
    }

    fn enter_hibernation(&mut self) {
        let position = self.progress();
        if let Some(session) = self.session.as_mut() {
            session.saved_position = position;
            session.is_hibernating = true;
        }
        self.graph.release();
        if let Some(source) = self.source.as_mut() {
            source.source.close();
        }
        info!(position, "Hibernating: source closed, output released");
    }

    /// Reopen the source and rebuild the graph, then play from the saved
    /// position
    pub(crate) fn wake(&mut self) -> Result<()> {
        let Some(expected) = self.session.clone() else {
            return Err(PlaybackError::InvalidState("no session to wake".to_string()));
        };
        let Some(source) = self.source.as_mut() else {
            return Err(PlaybackError::InvalidState("no source to wake".to_string()));
        };

        source.source.open()?;
        let format = source.source.format();
        let total_frames = source.source.total_frames();
        if format != expected.format || total_frames != expected.total_frames {
            return Err(PlaybackError::invalid_format(format!(
                "{} changed while hibernating: {format} with {total_frames} frames, expected {} with {}",
                source.entry, expected.format, expected.total_frames
            )));
        }

        self.graph.negotiate(format)?;
        let token = self.next_token();
        let position = expected.saved_position;
        if let Some(session) = self.session.as_mut() {
            session.token = token;
            session.is_hibernating = false;
        }
        info!(position, token, "Waking from hibernation");

        let frame = format.frame_at(position).min(total_frames);
        self.schedule_from(frame)?;
        self.start_rendering()
    }
}
