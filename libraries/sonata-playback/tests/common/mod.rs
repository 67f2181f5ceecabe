//! Shared test harness: an engine on a virtual render clock and virtual timers
//!
//! Every control call and query is a round trip to the control thread, so any
//! query issued after `output.advance` or `timers.advance` observes the
//! signals those produced.

#![allow(dead_code)]

use sonata_audio::ManualOutput;
use sonata_playback::{
    AudioFormat, AudioSource, EngineConfig, EntryId, ErrorKind, ManualTimers, MemorySource,
    MetadataFields, PcmBuffer, PlaybackEngine, PlaybackError, PlaybackListener, PlaybackState,
    SourceRef, StopReason,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 8000;

/// Close enough for positions derived from whole frames at 8 kHz
pub const EPSILON: f64 = 1e-3;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("sonata_playback=debug,sonata_audio=debug")
            .try_init();
    });
}

// ===== Sources =====

pub fn mono() -> AudioFormat {
    AudioFormat::new(SAMPLE_RATE, 1)
}

/// A quiet 440 Hz tone, `seconds` long
pub fn tone(seconds: f64) -> MemorySource {
    let frames = mono().frame_at(seconds) as usize;
    let samples = (0..frames)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            (t * 440.0 * std::f32::consts::TAU).sin() * 0.25
        })
        .collect();
    MemorySource::new(mono(), samples)
}

pub fn track(id: &str, seconds: f64) -> SourceRef {
    SourceRef::new(id, tone(seconds))
}

/// Switches to flip a [`FlakySource`] into failure modes after it is handed
/// to the engine
#[derive(Clone, Default)]
pub struct Faults {
    pub fail_open: Arc<AtomicBool>,
    pub fail_read: Arc<AtomicBool>,
    pub change_format: Arc<AtomicBool>,
}

impl Faults {
    pub fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn fail_read(&self) {
        self.fail_read.store(true, Ordering::SeqCst);
    }

    pub fn change_format(&self) {
        self.change_format.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_open.store(false, Ordering::SeqCst);
        self.fail_read.store(false, Ordering::SeqCst);
        self.change_format.store(false, Ordering::SeqCst);
    }
}

/// A tone whose file can vanish, stop decoding or change format
pub struct FlakySource {
    inner: MemorySource,
    faults: Faults,
}

impl FlakySource {
    pub fn new(seconds: f64) -> (Self, Faults) {
        let faults = Faults::default();
        let source = Self {
            inner: tone(seconds),
            faults: faults.clone(),
        };
        (source, faults)
    }
}

impl AudioSource for FlakySource {
    fn open(&mut self) -> sonata_playback::Result<()> {
        if self.faults.fail_open.load(Ordering::SeqCst) {
            return Err(PlaybackError::FileNotFound("flaky.wav".to_string()));
        }
        self.inner.open()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn format(&self) -> AudioFormat {
        if self.faults.change_format.load(Ordering::SeqCst) {
            return AudioFormat::new(44_100, 2);
        }
        self.inner.format()
    }

    fn total_frames(&self) -> u64 {
        self.inner.total_frames()
    }

    fn read(
        &mut self,
        frame_offset: u64,
        buffer: &mut PcmBuffer,
    ) -> sonata_playback::Result<usize> {
        if self.faults.fail_read.load(Ordering::SeqCst) {
            return Err(PlaybackError::engine("injected read failure"));
        }
        self.inner.read(frame_offset, buffer)
    }
}

pub fn flaky(id: &str, seconds: f64) -> (SourceRef, Faults) {
    let (source, faults) = FlakySource::new(seconds);
    (SourceRef::new(id, source), faults)
}

// ===== Listener =====

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started(EntryId),
    StateChanged {
        new: PlaybackState,
        previous: PlaybackState,
    },
    Finished {
        entry: EntryId,
        reason: StopReason,
        progress: f64,
        duration: f64,
    },
    Error(ErrorKind),
    Buffered(EntryId),
    Metadata(EntryId, MetadataFields),
}

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn states(&self) -> Vec<(PlaybackState, PlaybackState)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::StateChanged { new, previous } => Some((new, previous)),
                _ => None,
            })
            .collect()
    }

    pub fn finishes(&self) -> Vec<(EntryId, StopReason, f64, f64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Finished {
                    entry,
                    reason,
                    progress,
                    duration,
                } => Some((entry, reason, progress, duration)),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn started(&self) -> Vec<EntryId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }
}

impl PlaybackListener for RecordingListener {
    fn did_start_playing(&self, entry: &EntryId) {
        self.push(Event::Started(entry.clone()));
    }

    fn state_changed(&self, new: PlaybackState, previous: PlaybackState) {
        self.push(Event::StateChanged { new, previous });
    }

    fn did_finish_playing(
        &self,
        entry: &EntryId,
        reason: StopReason,
        progress: f64,
        duration: f64,
    ) {
        self.push(Event::Finished {
            entry: entry.clone(),
            reason,
            progress,
            duration,
        });
    }

    fn unexpected_error(&self, error: &PlaybackError) {
        self.push(Event::Error(error.kind()));
    }

    fn did_finish_buffering(&self, entry: &EntryId) {
        self.push(Event::Buffered(entry.clone()));
    }

    fn did_read_metadata(&self, entry: &EntryId, fields: &MetadataFields) {
        self.push(Event::Metadata(entry.clone(), fields.clone()));
    }
}

// ===== Harness =====

pub struct Harness {
    pub engine: PlaybackEngine,
    pub output: ManualOutput,
    pub timers: ManualTimers,
    pub listener: Arc<RecordingListener>,
    pub config: EngineConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_output(ManualOutput::new())
    }

    pub fn with_output(output: ManualOutput) -> Self {
        Self::build(EngineConfig::default(), output)
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::build(config, ManualOutput::new())
    }

    fn build(config: EngineConfig, output: ManualOutput) -> Self {
        init_tracing();
        let timers = ManualTimers::new();
        let engine = PlaybackEngine::with_timers(
            config.clone(),
            Box::new(output.clone()),
            Arc::new(timers.clone()),
        )
        .expect("engine starts");

        let listener = Arc::new(RecordingListener::default());
        let as_dyn: Arc<dyn PlaybackListener> = listener.clone();
        engine.set_listener(Arc::downgrade(&as_dyn));

        Self {
            engine,
            output,
            timers,
            listener,
            config,
        }
    }

    /// Let `seconds` of audio render, then wait for the engine to catch up
    pub fn render(&self, seconds: f64) {
        self.output.advance(seconds);
        self.engine.state();
    }

    /// Move virtual timer time forward, then wait for the engine
    pub fn wait(&self, by: Duration) {
        self.timers.advance(by);
        self.engine.state();
    }

    pub fn hibernation_delay(&self) -> Duration {
        self.config.hibernation_delay()
    }

    pub fn watchdog_interval(&self) -> Duration {
        self.config.watchdog_interval()
    }

    /// Pass the hibernation threshold with a second to spare
    pub fn wait_for_hibernation(&self) {
        self.wait(self.hibernation_delay() + Duration::from_secs(1));
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= EPSILON,
        "expected {expected}, got {actual}"
    );
}
