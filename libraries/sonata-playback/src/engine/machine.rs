//! Playback state machine
//!
//! Runs only on the control thread. Transitions:
//!
//! ```text
//! ready/stopped/error --play--> bufferring --> playing | paused
//! playing --pause--> paused --resume--> playing
//! playing/paused --stop--> stopped
//! playing --end of stream--> stopped
//! any --failure--> error
//! any --dispose--> disposed
//! ```

use super::{ControlMessage, EngineSignal, EngineView, Snapshot};
use crate::config::EngineConfig;
use crate::listener::PlaybackListener;
#[cfg(any(test, feature = "test-utils"))]
use crate::scheduler::CompletionHandle;
use crate::session::{PlaybackSession, SourceRef};
use crate::timers::{TimerHandle, TimerScheduler};
use crossbeam_channel::Sender;
use sonata_audio::{
    EqualizerConfig, EqualizerPreset, EqualizerSetting, ErrorSink, OutputDevice, RenderGraph,
};
use sonata_core::{EntryId, PcmBuffer, PlaybackError, PlaybackState, Result, StopReason};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A timer armed by the machine; the id tells live firings from stale ones
pub(crate) struct ArmedTimer {
    pub(crate) id: u64,
    handle: TimerHandle,
}

impl ArmedTimer {
    pub(crate) fn cancel(self) {
        self.handle.cancel();
    }
}

/// A track that was active when its session ended
struct FinishedTrack {
    entry: EntryId,
    progress: f64,
    duration: f64,
}

pub(crate) struct StateMachine {
    pub(crate) config: EngineConfig,
    pub(crate) state: PlaybackState,
    /// Last state listeners were told about
    published: PlaybackState,
    pub(crate) source: Option<SourceRef>,
    pub(crate) session: Option<PlaybackSession>,
    pub(crate) graph: RenderGraph,
    timers: Arc<dyn TimerScheduler>,
    listener: Option<Weak<dyn PlaybackListener>>,
    pub(crate) control: Sender<ControlMessage>,
    snapshot: Arc<Snapshot>,
    next_token: u64,
    next_timer: u64,
    pub(crate) hibernation: Option<ArmedTimer>,
    pub(crate) watchdog: Option<ArmedTimer>,
    last_stop_reason: StopReason,
}

impl StateMachine {
    pub(crate) fn new(
        config: EngineConfig,
        output: Box<dyn OutputDevice>,
        timers: Arc<dyn TimerScheduler>,
        control: Sender<ControlMessage>,
        snapshot: Arc<Snapshot>,
    ) -> Self {
        let errors_tx = control.clone();
        let errors: ErrorSink = Arc::new(move |message: String| {
            let _ = errors_tx.send(ControlMessage::Signal(EngineSignal::RenderFailed(message)));
        });

        let mut graph = RenderGraph::new(output, errors, config.widener);
        graph.set_volume(config.volume);
        graph.set_stereo_widening(config.stereo_widening);
        if let Some(preset) = EqualizerPreset::by_name(&config.equalizer_preset) {
            graph.apply_equalizer(&EqualizerConfig::from_preset(preset));
        }

        let mut machine = Self {
            config,
            state: PlaybackState::Ready,
            published: PlaybackState::Ready,
            source: None,
            session: None,
            graph,
            timers,
            listener: None,
            control,
            snapshot,
            next_token: 0,
            next_timer: 0,
            hibernation: None,
            watchdog: None,
            last_stop_reason: StopReason::None,
        };
        machine.publish_snapshot();
        machine
    }

    // ===== State & Notifications =====

    /// Move to `new`; listeners hear about published changes only
    pub(crate) fn set_state(&mut self, new: PlaybackState) {
        if self.state == new {
            return;
        }
        let previous = self.state;
        self.state = new;
        debug!(?previous, ?new, "State transition");

        if new.is_internal() || new == self.published {
            return;
        }
        let published_previous = self.published;
        self.published = new;
        self.notify(|l| l.state_changed(new, published_previous));
    }

    /// Deliver to the listener, after publishing what it may query
    pub(crate) fn notify(&mut self, deliver: impl FnOnce(&dyn PlaybackListener)) {
        self.publish_snapshot();
        if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
            deliver(listener.as_ref());
        }
    }

    pub(crate) fn set_listener(&mut self, listener: Weak<dyn PlaybackListener>) {
        self.listener = Some(listener);
    }

    pub(crate) fn publish_snapshot(&mut self) {
        let progress = self.progress();
        let state = if self.state.is_internal() {
            self.published
        } else {
            self.state
        };
        self.snapshot.store(EngineView {
            state,
            hibernating: self.is_hibernating(),
            progress,
            duration: self.duration(),
            has_source: self.has_source(),
            source_open: self.is_source_open(),
            entry: self.current_entry(),
            last_stop_reason: self.last_stop_reason,
            session: self.session.clone(),
            volume: self.volume(),
            stereo_widening: self.is_stereo_widening_enabled(),
            equalizer: self.equalizer(),
            reconnect_count: self.graph_reconnect_count(),
        });
    }

    pub(crate) fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Arm a one-shot timer that posts `signal(id)` to the control thread
    pub(crate) fn arm_timer(
        &mut self,
        delay: Duration,
        signal: impl FnOnce(u64) -> EngineSignal,
    ) -> ArmedTimer {
        self.next_timer += 1;
        let id = self.next_timer;
        let signal = signal(id);
        let control = self.control.clone();
        let handle = self.timers.schedule(
            delay,
            Box::new(move || {
                let _ = control.send(ControlMessage::Signal(signal));
            }),
        );
        ArmedTimer { id, handle }
    }

    pub(crate) fn cancel_timers(&mut self) {
        self.cancel_hibernation();
        self.cancel_watchdog();
    }

    pub(crate) fn handle_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::BufferCompleted { token } => self.on_buffer_completed(token),
            EngineSignal::HibernationDue { timer } => self.on_hibernation_due(timer),
            EngineSignal::WatchdogPoll { timer } => self.on_watchdog_poll(timer),
            EngineSignal::RenderFailed(message) => self.on_render_failed(message),
        }
    }

    // ===== Control Operations =====

    /// Load `source` and start at `position` seconds
    pub(crate) fn play(&mut self, source: SourceRef, position: f64, start_paused: bool) {
        if self.state.is_terminal() {
            debug!(entry = %source.entry, "Ignoring play on disposed engine");
            return;
        }
        if self.state.has_track() {
            self.end_session(StopReason::UserAction);
        }

        info!(entry = %source.entry, position, start_paused, "Loading source");
        self.set_state(PlaybackState::Bufferring);
        if let Err(err) = self.load(source, position, start_paused) {
            self.fail(err);
        }
    }

    fn load(&mut self, mut source: SourceRef, position: f64, start_paused: bool) -> Result<()> {
        source.source.open()?;
        let format = source.source.format();
        let total_frames = source.source.total_frames();
        let entry = source.entry.clone();
        let metadata = source.source.metadata();
        // Installed before validation so a failure closes it
        self.source = Some(source);

        if !format.is_valid() {
            return Err(PlaybackError::invalid_format(format!(
                "{entry} reports {format}"
            )));
        }
        if total_frames == 0 {
            return Err(PlaybackError::invalid_format(format!("{entry} has no frames")));
        }
        if !metadata.is_empty() {
            self.notify(|l| l.did_read_metadata(&entry, &metadata));
        }

        // Graph must match the source before anything is scheduled
        self.graph.negotiate(format)?;

        let token = self.next_token();
        let mut session = PlaybackSession::new(token, format, total_frames);
        let start = session.clamp_position(position);
        let frame = format.frame_at(start).min(total_frames);
        session.saved_position = start;
        session.buffer_start_time = format.seconds(frame);
        self.session = Some(session);

        self.schedule_from(frame)?;
        self.notify(|l| l.did_finish_buffering(&entry));

        if start_paused {
            self.set_state(PlaybackState::Paused);
            self.arm_hibernation();
            return Ok(());
        }
        self.start_rendering()
    }

    /// Start the output, then the player; publishes `Playing`
    pub(crate) fn start_rendering(&mut self) -> Result<()> {
        self.graph.start()?;
        self.set_state(PlaybackState::Running);
        self.graph.play();
        self.set_state(PlaybackState::Playing);
        self.notify_started();
        self.arm_watchdog();
        Ok(())
    }

    fn notify_started(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.start_notified {
            return;
        }
        session.start_notified = true;
        if let Some(entry) = self.current_entry() {
            self.notify(|l| l.did_start_playing(&entry));
        }
    }

    pub(crate) fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            debug!(state = ?self.state, "Ignoring pause");
            return;
        }
        let position = self.progress();
        if let Some(session) = self.session.as_mut() {
            session.saved_position = position;
        }
        self.graph.pause();
        self.cancel_watchdog();
        self.set_state(PlaybackState::Paused);
        self.arm_hibernation();
        debug!(position, "Paused");
    }

    pub(crate) fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            debug!(state = ?self.state, "Ignoring resume");
            return;
        }
        self.cancel_hibernation();

        let result = if self.is_hibernating() {
            self.wake()
        } else {
            self.start_rendering()
        };
        if let Err(err) = result {
            self.fail(err);
        }
    }

    pub(crate) fn stop(&mut self) {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => {
                self.end_session(StopReason::UserAction);
            }
            PlaybackState::Error => self.set_state(PlaybackState::Stopped),
            _ => debug!(state = ?self.state, "Ignoring stop"),
        }
    }

    /// Jump to `seconds`; the old buffer is replaced only once the new one
    /// has been read
    pub(crate) fn seek(&mut self, seconds: f64) -> bool {
        if !self.state.has_track() {
            debug!(state = ?self.state, "Ignoring seek");
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !seconds.is_finite() || seconds < 0.0 || seconds > session.duration() {
            debug!(seconds, duration = session.duration(), "Rejecting seek target");
            return false;
        }
        if session.is_hibernating {
            // Picked up by the wake path
            session.saved_position = seconds;
            return true;
        }

        let format = session.format;
        let frame = format.frame_at(seconds).min(session.total_frames);
        session.is_seeking = true;

        let buffer = match self.read_remaining(frame) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(error = %err, seconds, "Seek read failed; playback unchanged");
                if let Some(session) = self.session.as_mut() {
                    session.is_seeking = false;
                }
                self.notify(|l| l.unexpected_error(&PlaybackError::Seek));
                return false;
            }
        };

        let was_playing = self.state == PlaybackState::Playing;
        self.cancel_watchdog();
        self.graph.stop();

        let token = self.next_token();
        if let Some(session) = self.session.as_mut() {
            session.token = token;
            session.buffer_start_time = format.seconds(frame);
            session.saved_position = seconds;
        }

        let result = self.reschedule(buffer, token, was_playing);
        if let Some(session) = self.session.as_mut() {
            session.is_seeking = false;
        }
        match result {
            Ok(()) => {
                debug!(seconds, frame, token, "Seek complete");
                true
            }
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    fn reschedule(&mut self, buffer: Option<PcmBuffer>, token: u64, restart: bool) -> Result<()> {
        if let Some(buffer) = buffer {
            let completion = self.completion(token);
            self.graph.schedule(buffer, completion.into_callback())?;
        }
        if restart {
            self.graph.start()?;
            self.graph.play();
            self.arm_watchdog();
        }
        Ok(())
    }

    pub(crate) fn dispose(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let finished = self.teardown();
        self.graph.release();
        self.set_state(PlaybackState::Disposed);
        self.report_finish(finished, StopReason::Disposed);
        info!("Playback engine disposed");
    }

    // ===== Session Teardown =====

    /// Release the session and source; returns the track if one was active
    fn teardown(&mut self) -> Option<FinishedTrack> {
        self.cancel_timers();
        let progress = self.progress();
        self.graph.stop();

        let source = self.source.take();
        let session = self.session.take();
        match (source, session) {
            (Some(mut source), Some(session)) => {
                source.source.close();
                Some(FinishedTrack {
                    entry: source.entry,
                    progress,
                    duration: session.duration(),
                })
            }
            (Some(mut source), None) => {
                source.source.close();
                None
            }
            _ => None,
        }
    }

    fn report_finish(&mut self, finished: Option<FinishedTrack>, reason: StopReason) {
        let Some(track) = finished else {
            return;
        };
        self.last_stop_reason = reason;
        info!(
            entry = %track.entry,
            ?reason,
            progress = track.progress,
            duration = track.duration,
            "Finished playing"
        );
        self.notify(|l| {
            l.did_finish_playing(&track.entry, reason, track.progress, track.duration);
        });
    }

    fn end_session(&mut self, reason: StopReason) {
        let finished = self.teardown();
        self.set_state(PlaybackState::Stopped);
        self.report_finish(finished, reason);
    }

    /// Shared end-of-stream path for buffer completion and the watchdog
    pub(crate) fn finish_eof(&mut self) {
        let finished = self.teardown().map(|track| FinishedTrack {
            progress: track.duration,
            ..track
        });
        self.set_state(PlaybackState::Stopped);
        self.report_finish(finished, StopReason::Eof);
    }

    /// Finish handling is allowed only for the live, settled, playing session
    pub(crate) fn can_finish(&self, token: u64) -> bool {
        self.state == PlaybackState::Playing
            && self
                .session
                .as_ref()
                .is_some_and(|s| !s.is_seeking && s.token == token)
    }

    fn on_buffer_completed(&mut self, token: u64) {
        if !self.can_finish(token) {
            debug!(token, state = ?self.state, "Ignoring stale buffer completion");
            return;
        }
        debug!(token, "Buffer completed");
        self.finish_eof();
    }

    /// Backend failure: halt, report, and surface the error
    pub(crate) fn fail(&mut self, err: PlaybackError) {
        error!(error = %err, state = ?self.state, "Playback engine failure");
        let finished = self.teardown();
        self.set_state(PlaybackState::Error);
        self.notify(|l| l.unexpected_error(&err));
        self.report_finish(finished, StopReason::Error);
    }

    fn on_render_failed(&mut self, message: String) {
        match self.state {
            PlaybackState::Playing
            | PlaybackState::Paused
            | PlaybackState::Running
            | PlaybackState::Bufferring => self.fail(PlaybackError::engine(message)),
            state => warn!(?state, %message, "Output error with no active track"),
        }
    }

    // ===== Effects =====

    pub(crate) fn set_volume(&mut self, volume: f32) {
        if self.state.is_terminal() {
            return;
        }
        self.graph.set_volume(volume);
    }

    pub(crate) fn set_stereo_widening(&mut self, enabled: bool) {
        if self.state.is_terminal() {
            return;
        }
        self.graph.set_stereo_widening(enabled);
    }

    pub(crate) fn apply_equalizer(&mut self, setting: &EqualizerSetting) {
        if self.state.is_terminal() {
            return;
        }
        match setting.resolve() {
            Some(config) => self.graph.apply_equalizer(&config),
            None => warn!(?setting, "Unknown equalizer preset; keeping current bands"),
        }
    }

    // ===== Queries =====

    pub(crate) fn state(&self) -> PlaybackState {
        self.state
    }

    pub(crate) fn is_hibernating(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_hibernating)
    }

    pub(crate) fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub(crate) fn is_source_open(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.source.is_open())
    }

    pub(crate) fn current_entry(&self) -> Option<EntryId> {
        self.source.as_ref().map(|s| s.entry.clone())
    }

    pub(crate) fn last_stop_reason(&self) -> StopReason {
        self.last_stop_reason
    }

    pub(crate) fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub(crate) fn volume(&self) -> f32 {
        self.graph.volume()
    }

    pub(crate) fn is_stereo_widening_enabled(&self) -> bool {
        self.graph.is_stereo_widening_enabled()
    }

    pub(crate) fn equalizer(&self) -> EqualizerConfig {
        self.graph.equalizer()
    }

    pub(crate) fn graph_reconnect_count(&self) -> u64 {
        self.graph.reconnect_count()
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn current_completion(&self) -> Option<CompletionHandle> {
        if !self.state.has_track() {
            return None;
        }
        self.session.as_ref().map(|s| self.completion(s.token))
    }
}
