//! Playback engine handle
//!
//! The state machine lives on a dedicated control thread. Every control call,
//! buffer completion, timer and device error reaches it as a message on one
//! queue, so state is only ever mutated from that thread and listeners see a
//! single ordered stream of notifications.

mod machine;

pub(crate) use machine::StateMachine;

use crate::config::EngineConfig;
use crate::listener::PlaybackListener;
#[cfg(any(test, feature = "test-utils"))]
use crate::scheduler::CompletionHandle;
use crate::session::{PlaybackSession, SourceRef};
use crate::timers::{TimerScheduler, TokioTimers};
use crossbeam_channel::{bounded, unbounded, Sender};
use sonata_audio::{EqualizerConfig, EqualizerSetting, OutputDevice};
use sonata_core::{EntryId, PlaybackError, PlaybackState, Result, StopReason};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::debug;

/// Work queued for the control thread
pub(crate) enum ControlMessage {
    Invoke(Box<dyn FnOnce(&mut StateMachine) + Send>),
    Signal(EngineSignal),
    Shutdown,
}

/// Asynchronous events from the render thread, timers and the device
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineSignal {
    BufferCompleted { token: u64 },
    HibernationDue { timer: u64 },
    WatchdogPoll { timer: u64 },
    RenderFailed(String),
}

/// Everything the engine reports, as of the last notification or handled
/// message
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct EngineView {
    pub(crate) state: PlaybackState,
    pub(crate) hibernating: bool,
    pub(crate) progress: f64,
    pub(crate) duration: f64,
    pub(crate) has_source: bool,
    pub(crate) source_open: bool,
    pub(crate) entry: Option<EntryId>,
    pub(crate) last_stop_reason: StopReason,
    pub(crate) session: Option<PlaybackSession>,
    pub(crate) volume: f32,
    pub(crate) stereo_widening: bool,
    pub(crate) equalizer: EqualizerConfig,
    pub(crate) reconnect_count: u64,
}

/// Last published view, readable without a round trip
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    view: Mutex<EngineView>,
}

impl Snapshot {
    fn lock(&self) -> MutexGuard<'_, EngineView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn store(&self, view: EngineView) {
        *self.lock() = view;
    }

    fn read<R>(&self, read: impl FnOnce(&EngineView) -> R) -> R {
        read(&self.lock())
    }
}

/// Audio playback engine
///
/// Control calls block until the control thread has applied them, so the
/// state a caller observes afterwards is settled. Calls made from inside a
/// listener callback are queued behind the current operation instead, and
/// queries made there answer from the last published snapshot.
///
/// # Example
///
/// ```rust,no_run
/// use sonata_playback::{EngineConfig, PlaybackEngine, SourceRef};
/// use sonata_audio::FileSource;
/// # fn output() -> Box<dyn sonata_audio::OutputDevice> { unimplemented!() }
///
/// let engine = PlaybackEngine::new(EngineConfig::default(), output())?;
/// engine.play(SourceRef::new("track-1", FileSource::new("/music/song.flac")), false);
/// engine.seek(90.0);
/// engine.pause();
/// # Ok::<(), sonata_core::PlaybackError>(())
/// ```
pub struct PlaybackEngine {
    control: Sender<ControlMessage>,
    snapshot: Arc<Snapshot>,
    control_thread: Option<JoinHandle<()>>,
    control_thread_id: ThreadId,
}

impl PlaybackEngine {
    /// Engine with wall-clock timers
    pub fn new(config: EngineConfig, output: Box<dyn OutputDevice>) -> Result<Self> {
        let timers = TokioTimers::new()?;
        Self::with_timers(config, output, Arc::new(timers))
    }

    /// Engine with a caller-provided timer source
    pub fn with_timers(
        config: EngineConfig,
        output: Box<dyn OutputDevice>,
        timers: Arc<dyn TimerScheduler>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::engine)?;

        let (control, inbox) = unbounded();
        let snapshot = Arc::new(Snapshot::default());
        let machine = StateMachine::new(
            config,
            output,
            timers,
            control.clone(),
            Arc::clone(&snapshot),
        );

        let thread = thread::Builder::new()
            .name("sonata-control".to_string())
            .spawn(move || {
                let mut machine = machine;
                debug!("Control thread started");
                while let Ok(message) = inbox.recv() {
                    match message {
                        ControlMessage::Invoke(op) => op(&mut machine),
                        ControlMessage::Signal(signal) => machine.handle_signal(signal),
                        ControlMessage::Shutdown => {
                            machine.dispose();
                            break;
                        }
                    }
                    machine.publish_snapshot();
                }
                debug!("Control thread exiting");
            })?;

        Ok(Self {
            control,
            snapshot,
            control_thread_id: thread.thread().id(),
            control_thread: Some(thread),
        })
    }

    fn on_control_thread(&self) -> bool {
        thread::current().id() == self.control_thread_id
    }

    /// Run `op` on the control thread and wait for its result
    ///
    /// From the control thread itself the call is queued and `None` returned.
    fn call<R, F>(&self, op: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut StateMachine) -> R + Send + 'static,
    {
        if self.on_control_thread() {
            let _ = self.control.send(ControlMessage::Invoke(Box::new(move |machine| {
                op(machine);
            })));
            return None;
        }

        let (reply, response) = bounded(1);
        self.control
            .send(ControlMessage::Invoke(Box::new(move |machine| {
                let _ = reply.send(op(machine));
            })))
            .ok()?;
        response.recv().ok()
    }

    /// Like `call`, answering from the snapshot when no round trip is
    /// possible
    fn query<R, F>(&self, op: F, fallback: impl FnOnce(&EngineView) -> R) -> R
    where
        R: Send + 'static,
        F: FnOnce(&mut StateMachine) -> R + Send + 'static,
    {
        if self.on_control_thread() {
            return self.snapshot.read(fallback);
        }
        self.call(op).unwrap_or_else(|| self.snapshot.read(fallback))
    }

    // ===== Listener =====

    /// Replace the listener; held weakly
    pub fn set_listener(&self, listener: Weak<dyn PlaybackListener>) {
        self.call(move |machine| machine.set_listener(listener));
    }

    // ===== Control =====

    /// Load `source` and start from the beginning
    ///
    /// A track already playing or paused is stopped first
    /// (`StopReason::UserAction`). With `start_paused` the engine settles in
    /// `Paused` without starting the output.
    pub fn play(&self, source: SourceRef, start_paused: bool) {
        self.call(move |machine| machine.play(source, 0.0, start_paused));
    }

    /// Load `source` and start at `position` seconds (clamped to the track)
    pub fn restore(&self, source: SourceRef, position: f64, start_paused: bool) {
        self.call(move |machine| machine.play(source, position, start_paused));
    }

    pub fn pause(&self) {
        self.call(StateMachine::pause);
    }

    pub fn resume(&self) {
        self.call(StateMachine::resume);
    }

    pub fn stop(&self) {
        self.call(StateMachine::stop);
    }

    /// Move to `seconds`; `false` if rejected or the new position could not
    /// be read
    pub fn seek(&self, seconds: f64) -> bool {
        self.call(move |machine| machine.seek(seconds)).unwrap_or(false)
    }

    /// Output volume, linear 0.0 - 1.0
    pub fn set_volume(&self, volume: f32) {
        self.call(move |machine| machine.set_volume(volume));
    }

    pub fn set_stereo_widening(&self, enabled: bool) {
        self.call(move |machine| machine.set_stereo_widening(enabled));
    }

    /// Apply a preset by name, or 10 raw gains in dB
    pub fn apply_equalizer(&self, setting: impl Into<EqualizerSetting>) {
        let setting = setting.into();
        self.call(move |machine| machine.apply_equalizer(&setting));
    }

    /// Release everything; the engine ignores all later control calls
    pub fn dispose(&self) {
        self.call(StateMachine::dispose);
    }

    // ===== Queries =====

    pub fn state(&self) -> PlaybackState {
        self.query(|machine| machine.state(), |view| view.state)
    }

    /// Current track time in seconds
    pub fn progress(&self) -> f64 {
        self.query(StateMachine::progress, |view| view.progress)
    }

    /// Track length in seconds, 0 with nothing loaded
    pub fn duration(&self) -> f64 {
        self.query(|machine| machine.duration(), |view| view.duration)
    }

    pub fn is_hibernating(&self) -> bool {
        self.query(|machine| machine.is_hibernating(), |view| view.hibernating)
    }

    pub fn has_source(&self) -> bool {
        self.query(|machine| machine.has_source(), |view| view.has_source)
    }

    /// Whether the loaded source currently holds its handle open
    pub fn is_source_open(&self) -> bool {
        self.query(|machine| machine.is_source_open(), |view| view.source_open)
    }

    pub fn current_entry(&self) -> Option<EntryId> {
        self.query(|machine| machine.current_entry(), |view| view.entry.clone())
    }

    pub fn last_stop_reason(&self) -> StopReason {
        self.query(
            |machine| machine.last_stop_reason(),
            |view| view.last_stop_reason,
        )
    }

    /// Copy of the live session
    pub fn session(&self) -> Option<PlaybackSession> {
        self.query(
            |machine| machine.session().cloned(),
            |view| view.session.clone(),
        )
    }

    pub fn volume(&self) -> f32 {
        self.query(|machine| machine.volume(), |view| view.volume)
    }

    pub fn is_stereo_widening_enabled(&self) -> bool {
        self.query(
            |machine| machine.is_stereo_widening_enabled(),
            |view| view.stereo_widening,
        )
    }

    pub fn equalizer(&self) -> EqualizerConfig {
        self.query(|machine| machine.equalizer(), |view| view.equalizer)
    }

    /// How many times the render graph has been (re)connected
    pub fn graph_reconnect_count(&self) -> u64 {
        self.query(
            |machine| machine.graph_reconnect_count(),
            |view| view.reconnect_count,
        )
    }

    /// Completion handle of the buffer currently scheduled
    ///
    /// Firing it reports that buffer as finished, exactly as the render thread
    /// does. Once the session moves on (stop, seek, new track) the handle is
    /// stale and firing it has no effect. `None` from a listener callback.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn current_completion(&self) -> Option<CompletionHandle> {
        self.call(|machine| machine.current_completion()).flatten()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let _ = self.control.send(ControlMessage::Shutdown);
        if self.on_control_thread() {
            // Dropped from a listener callback; the thread exits on its own
            return;
        }
        if let Some(thread) = self.control_thread.take() {
            let _ = thread.join();
        }
    }
}
