//! Deterministic output driven by the caller
//!
//! Nothing renders on its own: tests pull frames with [`ManualOutput::render`]
//! or [`ManualOutput::advance`], which makes the render clock virtual.

use super::{ErrorSink, OutputDevice};
use crate::graph::Renderer;
use sonata_core::{AudioFormat, PlaybackError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Frames pulled per render call in [`ManualOutput::advance`]
const BLOCK_FRAMES: usize = 512;

#[derive(Default)]
struct ManualState {
    renderer: Option<Renderer>,
    errors: Option<ErrorSink>,
    format: Option<AudioFormat>,
    running: bool,
    fixed_channels: Option<u16>,
    fixed_sample_rate: Option<u32>,
    failing_connects: u32,
    connects: u64,
}

/// Caller-clocked output device; clones share one device
#[derive(Clone, Default)]
pub struct ManualOutput {
    inner: Arc<Mutex<ManualState>>,
}

impl ManualOutput {
    /// Device that accepts any format as requested
    pub fn new() -> Self {
        Self::default()
    }

    /// Device with a fixed channel count
    pub fn with_channels(channels: u16) -> Self {
        let output = Self::new();
        output.state().fixed_channels = Some(channels);
        output
    }

    /// Device locked to one sample rate
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        let output = Self::new();
        output.state().fixed_sample_rate = Some(sample_rate);
        output
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` connects fail
    pub fn fail_next_connects(&self, count: u32) {
        self.state().failing_connects = count;
    }

    pub fn connect_count(&self) -> u64 {
        self.state().connects
    }

    pub fn is_connected(&self) -> bool {
        self.state().renderer.is_some()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.state().format
    }

    pub fn running(&self) -> bool {
        self.state().running
    }

    /// Pull `frames` frames; silence (and no clock advance) unless running
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let (renderer, channels) = {
            let state = self.state();
            let channels = state.format.map_or(1, |f| f.channels);
            match (&state.renderer, state.running) {
                (Some(renderer), true) => (Some(renderer.clone()), channels),
                _ => (None, channels),
            }
        };

        let mut out = vec![0.0; frames * usize::from(channels)];
        if let Some(renderer) = renderer {
            renderer.render(&mut out, channels);
        }
        out
    }

    /// Let `seconds` of device time pass; returns frames rendered
    pub fn advance(&self, seconds: f64) -> usize {
        let Some(format) = self.format() else {
            return 0;
        };
        if !self.running() {
            return 0;
        }

        let total = (seconds * f64::from(format.sample_rate)).round() as usize;
        let mut done = 0;
        while done < total {
            let block = BLOCK_FRAMES.min(total - done);
            self.render(block);
            done += block;
        }
        done
    }

    /// Report an asynchronous device failure, as a real backend would
    pub fn raise_error(&self, message: &str) {
        let errors = self.state().errors.clone();
        if let Some(errors) = errors {
            errors(message.to_string());
        }
    }
}

impl OutputDevice for ManualOutput {
    fn connect(
        &mut self,
        format: AudioFormat,
        renderer: Renderer,
        errors: ErrorSink,
    ) -> Result<AudioFormat> {
        let mut state = self.state();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(PlaybackError::node("manual output refused to connect"));
        }

        let device = AudioFormat::new(
            state.fixed_sample_rate.unwrap_or(format.sample_rate),
            state.fixed_channels.unwrap_or(format.channels),
        );
        state.renderer = Some(renderer);
        state.errors = Some(errors);
        state.format = Some(device);
        state.running = false;
        state.connects += 1;
        Ok(device)
    }

    fn disconnect(&mut self) {
        let mut state = self.state();
        state.renderer = None;
        state.errors = None;
        state.format = None;
        state.running = false;
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.renderer.is_none() {
            return Err(PlaybackError::node("manual output is not connected"));
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.state().running = false;
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    fn name(&self) -> &str {
        "manual"
    }
}
