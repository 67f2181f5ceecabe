//! Render graph
//!
//! The render side is a [`RenderChain`] behind a mutex, shared with the
//! output device through a [`Renderer`] handle. The control side is the
//! [`RenderGraph`], which owns the output device and is the only thing that
//! reconfigures the chain.

mod mixer;
mod player;

pub use player::CompletionCallback;

use crate::effects::{AudioEffect, GraphicEq, StereoWidener, WidenerSettings};
use crate::output::{ErrorSink, OutputDevice};
use crate::presets::EqualizerConfig;
use mixer::Mixer;
use player::PlayerNode;
use sonata_core::{AudioFormat, PcmBuffer, PlaybackError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Fixed node chain: player -> widener -> EQ -> mixer
pub struct RenderChain {
    player: PlayerNode,
    widener: StereoWidener,
    equalizer: GraphicEq,
    mixer: Mixer,
    format: Option<AudioFormat>,
    scratch: Vec<f32>,
}

impl RenderChain {
    fn new(widener: WidenerSettings) -> Self {
        Self {
            player: PlayerNode::default(),
            widener: StereoWidener::new(widener),
            equalizer: GraphicEq::new(),
            mixer: Mixer::default(),
            format: None,
            scratch: Vec::new(),
        }
    }

    /// Rebuild every node downstream of the player for `format`
    fn reconfigure(&mut self, format: AudioFormat) {
        self.player.stop();
        self.widener.configure(format);
        self.equalizer.configure(format);
        for effect in self.effects() {
            debug!(
                effect = effect.name(),
                enabled = effect.is_enabled(),
                %format,
                "Effect configured"
            );
        }
        // One second of headroom keeps the render path allocation-free
        self.scratch = vec![0.0; format.sample_rate as usize * usize::from(format.channels)];
        self.format = Some(format);
    }

    /// Effect nodes in signal order
    fn effects(&self) -> [&dyn AudioEffect; 2] {
        [&self.widener, &self.equalizer]
    }

    fn disconnect(&mut self) {
        self.player.stop();
        self.format = None;
    }

    fn render(&mut self, out: &mut [f32], out_channels: usize) -> Option<CompletionCallback> {
        let Some(format) = self.format else {
            out.fill(0.0);
            return None;
        };
        if out_channels == 0 {
            return None;
        }

        let in_channels = usize::from(format.channels);
        let needed = out.len() / out_channels * in_channels;
        if self.scratch.len() < needed {
            self.scratch.resize(needed, 0.0);
        }
        let scratch = &mut self.scratch[..needed];

        let completion = self.player.render(scratch, in_channels);
        let effects: [&mut dyn AudioEffect; 2] = [&mut self.widener, &mut self.equalizer];
        for effect in effects {
            if effect.is_enabled() {
                effect.process(scratch);
            }
        }
        self.mixer.mix(scratch, in_channels, out, out_channels);

        completion
    }
}

/// Render-thread handle onto the chain
#[derive(Clone)]
pub struct Renderer {
    chain: Arc<Mutex<RenderChain>>,
}

impl Renderer {
    fn new(chain: RenderChain) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RenderChain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fill `out`, interleaved with `out_channels` channels
    ///
    /// Called by output devices from their render thread. A finished buffer's
    /// completion runs after the chain lock is released.
    pub fn render(&self, out: &mut [f32], out_channels: u16) {
        let completion = self.lock().render(out, usize::from(out_channels));
        if let Some(completion) = completion {
            completion();
        }
    }
}

/// Control-side view of the render graph
///
/// Owns the output device. Format negotiation must happen before any buffer
/// is scheduled; scheduling against a stale format is refused.
pub struct RenderGraph {
    renderer: Renderer,
    output: Box<dyn OutputDevice>,
    errors: ErrorSink,
    format: Option<AudioFormat>,
    device_format: Option<AudioFormat>,
    reconnects: u64,
}

impl RenderGraph {
    pub fn new(output: Box<dyn OutputDevice>, errors: ErrorSink, widener: WidenerSettings) -> Self {
        Self {
            renderer: Renderer::new(RenderChain::new(widener)),
            output,
            errors,
            format: None,
            device_format: None,
            reconnects: 0,
        }
    }

    fn chain(&self) -> MutexGuard<'_, RenderChain> {
        self.renderer.lock()
    }

    /// Processing format of the connected graph
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Format the output device actually runs at
    pub fn device_format(&self) -> Option<AudioFormat> {
        self.device_format
    }

    /// How many times the graph has been (re)connected
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects
    }

    /// Make the graph match `format`
    ///
    /// Returns `Ok(false)` when already connected at `format`. Otherwise
    /// every node downstream of the player is rebuilt and the output is
    /// reconnected, and `Ok(true)` is returned.
    pub fn negotiate(&mut self, format: AudioFormat) -> Result<bool> {
        if !format.is_valid() {
            return Err(PlaybackError::invalid_format(format!("unusable format {format}")));
        }
        if self.format == Some(format) && self.device_format.is_some() {
            return Ok(false);
        }

        if let Some(previous) = self.format {
            debug!(%previous, next = %format, "Format changed, reconnecting render graph");
        }
        self.disconnect();

        self.chain().reconfigure(format);

        let device = self
            .output
            .connect(format, self.renderer.clone(), Arc::clone(&self.errors))?;
        if device.sample_rate != format.sample_rate || device.channels == 0 {
            self.output.disconnect();
            self.chain().disconnect();
            return Err(PlaybackError::node(format!(
                "{} cannot render {format} (device runs at {device})",
                self.output.name()
            )));
        }

        self.format = Some(format);
        self.device_format = Some(device);
        self.reconnects += 1;
        info!(%format, %device, output = self.output.name(), "Render graph connected");
        Ok(true)
    }

    /// Hand a buffer to the player node
    pub fn schedule(&mut self, buffer: PcmBuffer, completion: CompletionCallback) -> Result<()> {
        let Some(format) = self.format else {
            return Err(PlaybackError::node("render graph is not connected"));
        };
        if buffer.channels() != format.channels {
            return Err(PlaybackError::node(format!(
                "buffer has {} channels, graph is negotiated for {format}",
                buffer.channels()
            )));
        }
        self.chain().player.schedule(buffer, completion);
        Ok(())
    }

    /// Start the output device
    pub fn start(&mut self) -> Result<()> {
        if self.device_format.is_none() {
            return Err(PlaybackError::node("cannot start a disconnected render graph"));
        }
        self.output.start()
    }

    /// Start the player node; rendering begins on the next device callback
    pub fn play(&mut self) {
        self.chain().player.play();
    }

    /// Halt the player (clock held) and the device
    pub fn pause(&mut self) {
        self.chain().player.pause();
        self.output.stop();
    }

    /// Halt and clear the player (clock reset, pending completion dropped)
    /// and stop the device
    pub fn stop(&mut self) {
        {
            let mut chain = self.chain();
            chain.player.stop();
            chain.widener.reset();
            chain.equalizer.reset();
        }
        self.output.stop();
    }

    /// Stop and disconnect the output; the next `negotiate` reconnects
    pub fn release(&mut self) {
        self.stop();
        self.disconnect();
    }

    fn disconnect(&mut self) {
        if self.device_format.take().is_some() {
            self.output.stop();
            self.output.disconnect();
        }
        self.chain().disconnect();
        self.format = None;
    }

    pub fn is_running(&self) -> bool {
        self.device_format.is_some() && self.output.is_running()
    }

    /// Player started and still holding unrendered frames
    pub fn player_is_playing(&self) -> bool {
        self.chain().player.is_playing()
    }

    /// Render clock in frames, while the player is started
    pub fn sample_time(&self) -> Option<u64> {
        self.chain().player.sample_time()
    }

    pub fn volume(&self) -> f32 {
        self.chain().mixer.volume()
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            warn!(volume, "Ignoring non-finite volume");
            return;
        }
        self.chain().mixer.set_volume(volume);
    }

    pub fn is_stereo_widening_enabled(&self) -> bool {
        self.chain().widener.is_enabled()
    }

    pub fn set_stereo_widening(&mut self, enabled: bool) {
        self.chain().widener.set_enabled(enabled);
    }

    pub fn equalizer(&self) -> EqualizerConfig {
        *self.chain().equalizer.config()
    }

    pub fn apply_equalizer(&mut self, config: &EqualizerConfig) {
        self.chain().equalizer.apply(config);
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        self.release();
    }
}
