//! Completion watchdog
//!
//! Buffer completions can be lost (device reset, dropped callback). While
//! playing, the watchdog polls the player; a player that has gone idle on
//! the live session is treated as end of stream. Both paths go through the
//! same token check, so a track finishes once.

use crate::engine::{EngineSignal, StateMachine};
use sonata_core::PlaybackState;
use tracing::{debug, warn};

impl StateMachine {
    pub(crate) fn arm_watchdog(&mut self) {
        let interval = self.config.watchdog_interval();
        let timer = self.arm_timer(interval, |timer| EngineSignal::WatchdogPoll { timer });
        self.watchdog = Some(timer);
    }

    pub(crate) fn cancel_watchdog(&mut self) {
        if let Some(timer) = self.watchdog.take() {
            timer.cancel();
        }
    }

    pub(crate) fn on_watchdog_poll(&mut self, timer: u64) {
        if self.watchdog.as_ref().map(|t| t.id) != Some(timer) {
            debug!(timer, "Ignoring stale watchdog poll");
            return;
        }
        self.watchdog = None;
        if self.state != PlaybackState::Playing {
            return;
        }

        let token = self.session.as_ref().map(|s| s.token);
        match token {
            Some(token) if !self.graph.player_is_playing() && self.can_finish(token) => {
                warn!(token, "Player went idle without a completion; finishing track");
                self.finish_eof();
            }
            _ => self.arm_watchdog(),
        }
    }
}
