//! Stereo widener
//!
//! Short cross-fed delay with a low-passed wet path: each side receives a
//! delayed, darkened copy of the opposite side. Only the first two channels
//! take part; mono passes through untouched.

use super::effect::AudioEffect;
use serde::{Deserialize, Serialize};
use sonata_core::AudioFormat;
use std::f32::consts::PI;

/// Widener parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidenerSettings {
    /// Delay of the wet path (ms)
    pub delay_ms: f32,

    /// Wet share of the output (0.0 - 1.0)
    pub wet_mix: f32,

    /// Cutoff of the wet-path low-pass (Hz)
    pub lowpass_hz: f32,
}

impl Default for WidenerSettings {
    fn default() -> Self {
        Self {
            delay_ms: 12.0,
            wet_mix: 0.2,
            lowpass_hz: 15000.0,
        }
    }
}

/// Ring buffer delay for one channel
#[derive(Debug, Clone, Default)]
struct DelayLine {
    buffer: Vec<f32>,
    pos: usize,
}

impl DelayLine {
    fn with_len(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            pos: 0,
        }
    }

    /// Push `input`, return the sample written `len` samples ago
    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.buffer[self.pos] = input;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// Stereo widening node; bypassed by default
pub struct StereoWidener {
    settings: WidenerSettings,
    enabled: bool,
    channels: usize,
    delays: [DelayLine; 2],
    lowpass_state: [f32; 2],
    lowpass_coeff: f32,
}

impl StereoWidener {
    pub fn new(settings: WidenerSettings) -> Self {
        Self {
            settings: Self::sanitize(settings),
            enabled: false,
            channels: 0,
            delays: Default::default(),
            lowpass_state: [0.0; 2],
            lowpass_coeff: 1.0,
        }
    }

    pub fn settings(&self) -> WidenerSettings {
        self.settings
    }

    fn sanitize(settings: WidenerSettings) -> WidenerSettings {
        WidenerSettings {
            delay_ms: settings.delay_ms.clamp(0.1, 100.0),
            wet_mix: settings.wet_mix.clamp(0.0, 1.0),
            lowpass_hz: settings.lowpass_hz.max(20.0),
        }
    }
}

impl Default for StereoWidener {
    fn default() -> Self {
        Self::new(WidenerSettings::default())
    }
}

impl AudioEffect for StereoWidener {
    fn configure(&mut self, format: AudioFormat) {
        self.channels = usize::from(format.channels);
        let sr = format.sample_rate as f32;

        let delay_samples = (self.settings.delay_ms * sr / 1000.0).round() as usize;
        self.delays = [
            DelayLine::with_len(delay_samples),
            DelayLine::with_len(delay_samples),
        ];

        // One-pole low-pass; cutoff kept below Nyquist
        let cutoff = self.settings.lowpass_hz.min(sr * 0.45);
        self.lowpass_coeff = if sr > 0.0 {
            1.0 - (-2.0 * PI * cutoff / sr).exp()
        } else {
            1.0
        };
        self.lowpass_state = [0.0; 2];
    }

    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled || self.channels < 2 {
            return;
        }

        let wet = self.settings.wet_mix;
        let dry = 1.0 - wet;
        let coeff = self.lowpass_coeff;

        for frame in buffer.chunks_exact_mut(self.channels) {
            let (left, right) = (frame[0], frame[1]);

            let delayed_l = self.delays[0].tick(left);
            let delayed_r = self.delays[1].tick(right);

            // Wet path crosses sides
            self.lowpass_state[0] += coeff * (delayed_r - self.lowpass_state[0]);
            self.lowpass_state[1] += coeff * (delayed_l - self.lowpass_state[1]);

            frame[0] = dry * left + wet * self.lowpass_state[0];
            frame[1] = dry * right + wet * self.lowpass_state[1];
        }
    }

    fn reset(&mut self) {
        for delay in &mut self.delays {
            delay.clear();
        }
        self.lowpass_state = [0.0; 2];
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.reset();
        }
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Stereo Widener"
    }
}
