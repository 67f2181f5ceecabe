//! Audio source abstraction consumed by the engine
//!
//! Decoding lives outside the engine. A source only has to open, report its
//! format and length, and read frames at an arbitrary offset.

use crate::error::Result;
use crate::types::{AudioFormat, MetadataFields, PcmBuffer};

/// Openable, frame-addressable audio source
///
/// The engine owns its source exclusively. It may close and re-open the same
/// source (hibernation), so `open` must be callable again after `close`.
pub trait AudioSource: Send {
    /// Acquire the underlying handle
    ///
    /// # Errors
    /// * `FileNotFound` - the backing file is gone
    /// * `InvalidFormat` - the data cannot be decoded
    fn open(&mut self) -> Result<()>;

    /// Release the underlying handle; a no-op when already closed
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Native format; meaningful once opened
    fn format(&self) -> AudioFormat;

    /// Total length in frames; meaningful once opened
    fn total_frames(&self) -> u64;

    /// Read frames starting at `frame_offset` into `buffer`
    ///
    /// Fills at most `buffer.frames()` frames and returns how many were
    /// written (less only at the end of the stream).
    fn read(&mut self, frame_offset: u64, buffer: &mut PcmBuffer) -> Result<usize>;

    /// Tag fields, if the source has any
    fn metadata(&self) -> MetadataFields {
        MetadataFields::new()
    }
}
