//! Sonata Audio - render plane
//!
//! Everything that touches samples:
//! - [`presets`]: the named 10-band equalizer preset table
//! - [`effects`]: stereo widener and 10-band graphic EQ nodes
//! - [`graph`]: the fixed render chain and its control-side [`RenderGraph`]
//! - [`output`]: output devices (`cpal` behind the `desktop` feature)
//! - [`source`]: [`FileSource`] (symphonia) and [`MemorySource`]
//!
//! # Render order
//!
//! ```text
//! player -> stereo widener -> 10-band EQ -> mixer -> output device
//! ```
//!
//! The graph is negotiated against each source's format before any buffer is
//! scheduled; a format change disconnects and reconnects everything downstream
//! of the player.

pub mod effects;
pub mod graph;
pub mod output;
pub mod presets;
pub mod source;

pub use graph::{CompletionCallback, RenderGraph, Renderer};
pub use output::{ErrorSink, OutputDevice};
pub use effects::WidenerSettings;
pub use presets::{EqBand, EqualizerConfig, EqualizerPreset, EqualizerSetting};
pub use source::{FileSource, MemorySource};

#[cfg(feature = "desktop")]
pub use output::CpalOutput;

#[cfg(any(test, feature = "test-utils"))]
pub use output::ManualOutput;
