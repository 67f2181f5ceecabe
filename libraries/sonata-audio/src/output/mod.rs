//! Output devices
//!
//! A device pulls rendered frames from a [`Renderer`] on its own clock. The
//! render graph connects it once per negotiated format.

#[cfg(feature = "desktop")]
mod cpal_output;
#[cfg(any(test, feature = "test-utils"))]
mod manual;

#[cfg(feature = "desktop")]
pub use cpal_output::CpalOutput;
#[cfg(any(test, feature = "test-utils"))]
pub use manual::ManualOutput;

use crate::graph::Renderer;
use sonata_core::{AudioFormat, Result};
use std::sync::Arc;

/// Receives asynchronous device failures (stream errors, lost devices)
pub type ErrorSink = Arc<dyn Fn(String) + Send + Sync>;

/// Hardware (or virtual) audio output
pub trait OutputDevice: Send {
    /// Attach the renderer for `format`
    ///
    /// Returns the format the device will actually run at. The channel count
    /// may differ (the mixer maps channels); a different sample rate is
    /// rejected by the graph.
    fn connect(&mut self, format: AudioFormat, renderer: Renderer, errors: ErrorSink)
        -> Result<AudioFormat>;

    /// Detach the renderer; a no-op when not connected
    fn disconnect(&mut self);

    /// Begin pulling frames
    fn start(&mut self) -> Result<()>;

    /// Stop pulling frames; a no-op when not running
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Device name, for logs
    fn name(&self) -> &str;
}
