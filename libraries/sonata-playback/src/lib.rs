//! Sonata playback engine
//!
//! Plays one audio source at a time through a render graph
//! (player → stereo widener → equalizer → mixer → output device) and reports
//! lifecycle events to a [`PlaybackListener`].
//!
//! - **Sessions**: every `play` starts a fresh [`PlaybackSession`]; seek and
//!   hibernation wake renew its token, and stale completions are ignored
//! - **Position**: derived from the render clock while playing
//! - **Hibernation**: a long pause releases the source and output device
//! - **End of stream**: buffer completion, backed by a polling watchdog
//!
//! All state lives on one control thread (see [`PlaybackEngine`]).
//!
//! ```rust,no_run
//! use sonata_playback::{EngineConfig, PlaybackEngine, SourceRef, FileSource};
//! # fn output() -> Box<dyn sonata_playback::OutputDevice> { unimplemented!() }
//!
//! let config = EngineConfig::default();
//! let engine = PlaybackEngine::new(config, output())?;
//! engine.play(SourceRef::new("intro", FileSource::new("intro.flac")), false);
//! # Ok::<(), sonata_playback::PlaybackError>(())
//! ```

mod config;
mod engine;
mod hibernation;
mod listener;
mod position;
mod scheduler;
mod session;
mod timers;
mod watchdog;

pub use config::{ConfigError, EngineConfig};
pub use engine::PlaybackEngine;
pub use listener::PlaybackListener;
#[cfg(any(test, feature = "test-utils"))]
pub use scheduler::CompletionHandle;
pub use session::{PlaybackSession, SourceRef};
pub use timers::{ManualTimers, TimerHandle, TimerScheduler, TimerTask, TokioTimers};

pub use sonata_audio::{
    EqualizerConfig, EqualizerPreset, EqualizerSetting, FileSource, MemorySource, OutputDevice,
    WidenerSettings,
};
pub use sonata_core::{
    AudioFormat, AudioSource, EntryId, ErrorKind, MetadataFields, PcmBuffer, PlaybackError,
    PlaybackState, Result, StopReason,
};
