//! Playback notifications
//!
//! All callbacks arrive on the engine's control thread, in the order the
//! engine produced them.

use sonata_core::{EntryId, MetadataFields, PlaybackError, PlaybackState, StopReason};

/// Receiver of engine lifecycle notifications
///
/// The engine holds listeners weakly and never keeps one alive. The first four
/// methods are required; the rest default to no-ops.
pub trait PlaybackListener: Send + Sync {
    /// Rendering began for `entry` (once per track, on first start)
    fn did_start_playing(&self, entry: &EntryId);

    /// Published state changed; never called with `new == previous`
    fn state_changed(&self, new: PlaybackState, previous: PlaybackState);

    /// The track stopped; `progress` and `duration` are in seconds
    fn did_finish_playing(&self, entry: &EntryId, reason: StopReason, progress: f64, duration: f64);

    fn unexpected_error(&self, error: &PlaybackError);

    /// The first buffer of `entry` has been read and scheduled
    fn did_finish_buffering(&self, _entry: &EntryId) {}

    /// The opened source carried tags
    fn did_read_metadata(&self, _entry: &EntryId, _fields: &MetadataFields) {}

    /// Queued entries were abandoned without being played
    fn did_cancel(&self, _entries: &[EntryId]) {}
}
