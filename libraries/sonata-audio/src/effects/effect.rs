use sonata_core::AudioFormat;

/// Audio effect node
///
/// # Real-Time Constraints
/// `process` runs on the render thread: no allocation, no blocking, no
/// logging. Allocation belongs in `configure`, which the graph calls from the
/// control side whenever the format is (re)negotiated.
pub trait AudioEffect: Send {
    /// Size internal state for `format`; clears any previous state
    fn configure(&mut self, format: AudioFormat);

    /// Process interleaved samples in place
    fn process(&mut self, buffer: &mut [f32]);

    /// Clear filter/delay memory (seek, stop)
    fn reset(&mut self);

    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Node name, for logs
    fn name(&self) -> &str;
}
