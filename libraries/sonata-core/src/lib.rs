//! Sonata Core - shared playback vocabulary
//!
//! Types used by both the render plane (`sonata-audio`) and the control
//! plane (`sonata-playback`):
//! - [`PlaybackState`] and [`StopReason`]
//! - [`AudioFormat`] and interleaved [`PcmBuffer`]s
//! - The [`AudioSource`] abstraction the engine consumes
//! - The [`PlaybackError`] taxonomy

pub mod error;
pub mod source;
pub mod types;

pub use error::{ErrorKind, PlaybackError, Result};
pub use source::AudioSource;
pub use types::{AudioFormat, EntryId, MetadataFields, PcmBuffer, PlaybackState, StopReason};
