//! DSP nodes of the render chain
//!
//! Both nodes process interleaved `f32` in place at the negotiated format.

mod effect;
pub mod graphic_eq;
pub mod widener;

pub use effect::AudioEffect;
pub use graphic_eq::GraphicEq;
pub use widener::{StereoWidener, WidenerSettings};
