//! 10-band graphic equalizer
//!
//! One peaking biquad per band of [`EQ_FREQUENCIES`], bandwidth fixed at one
//! octave. The node is always in the chain; a flat configuration passes the
//! signal through unchanged.

use super::effect::AudioEffect;
use crate::presets::{EqualizerConfig, EQ_BANDWIDTH_OCTAVES, EQ_FREQUENCIES};
use sonata_core::AudioFormat;
use std::f32::consts::PI;

/// Q of a peaking filter spanning `octaves`
fn q_for_bandwidth(octaves: f32) -> f32 {
    let n = 2.0_f32.powf(octaves);
    n.sqrt() / (n - 1.0)
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

/// Peaking biquad with per-channel state
#[derive(Debug, Clone)]
struct BiquadBand {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    state: Vec<ChannelState>,

    frequency: f32,
    gain_db: f32,
    q: f32,
}

impl BiquadBand {
    fn new(frequency: f32, q: f32) -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            state: Vec::new(),
            frequency,
            gain_db: 0.0,
            q,
        }
    }

    fn is_bypassed(&self) -> bool {
        self.gain_db.abs() < 0.01
    }

    fn update_coefficients(&mut self, sample_rate: f32) {
        if sample_rate < 1.0 || self.is_bypassed() {
            self.b0 = 1.0;
            self.b1 = 0.0;
            self.b2 = 0.0;
            self.a1 = 0.0;
            self.a2 = 0.0;
            return;
        }

        let a = 10.0_f32.powf(self.gain_db / 40.0);
        // Keep the 16 kHz band stable at low sample rates
        let freq = self.frequency.min(sample_rate * 0.45);
        let omega = 2.0 * PI * freq / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * self.q);

        let a0 = 1.0 + alpha / a;
        self.b0 = (1.0 + alpha * a) / a0;
        self.b1 = (-2.0 * cos_omega) / a0;
        self.b2 = (1.0 - alpha * a) / a0;
        self.a1 = (-2.0 * cos_omega) / a0;
        self.a2 = (1.0 - alpha / a) / a0;
    }

    #[inline]
    fn process(&mut self, channel: usize, input: f32) -> f32 {
        let Some(s) = self.state.get_mut(channel) else {
            return input;
        };

        let mut out = self.b0 * input + self.b1 * s.x1 + self.b2 * s.x2 - self.a1 * s.y1
            - self.a2 * s.y2;

        // Flush denormals
        if out.abs() < 1e-15 {
            out = 0.0;
        }

        s.x2 = s.x1;
        s.x1 = input;
        s.y2 = s.y1;
        s.y1 = out;
        out
    }

    fn reset(&mut self) {
        self.state.fill(ChannelState::default());
    }
}

/// 10-band graphic EQ node
pub struct GraphicEq {
    bands: Vec<BiquadBand>,
    config: EqualizerConfig,
    channels: usize,
    sample_rate: u32,
    enabled: bool,
    needs_update: bool,
}

impl GraphicEq {
    pub fn new() -> Self {
        let q = q_for_bandwidth(EQ_BANDWIDTH_OCTAVES);
        Self {
            bands: EQ_FREQUENCIES
                .iter()
                .map(|&freq| BiquadBand::new(freq, q))
                .collect(),
            config: EqualizerConfig::flat(),
            channels: 0,
            sample_rate: 44100,
            enabled: true,
            needs_update: true,
        }
    }

    /// Replace all band gains; filter memory is cleared to avoid clicks
    pub fn apply(&mut self, config: &EqualizerConfig) {
        for (band, eq_band) in self.bands.iter_mut().zip(config.bands()) {
            band.gain_db = eq_band.gain_db;
            band.reset();
        }
        self.config = *config;
        self.needs_update = true;
    }

    pub fn config(&self) -> &EqualizerConfig {
        &self.config
    }

    pub fn band_gain(&self, index: usize) -> Option<f32> {
        self.bands.get(index).map(|b| b.gain_db)
    }

    fn update_coefficients(&mut self) {
        if self.needs_update {
            let sr = self.sample_rate as f32;
            for band in &mut self.bands {
                band.update_coefficients(sr);
            }
            self.needs_update = false;
        }
    }
}

impl Default for GraphicEq {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for GraphicEq {
    fn configure(&mut self, format: AudioFormat) {
        self.channels = usize::from(format.channels);
        self.sample_rate = format.sample_rate;
        for band in &mut self.bands {
            band.state = vec![ChannelState::default(); self.channels];
        }
        self.needs_update = true;
        self.update_coefficients();
    }

    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled || self.channels == 0 {
            return;
        }
        self.update_coefficients();

        let active: usize = self.bands.iter().filter(|b| !b.is_bypassed()).count();
        if active == 0 {
            return;
        }

        for frame in buffer.chunks_exact_mut(self.channels) {
            for (channel, sample) in frame.iter_mut().enumerate() {
                let mut value = *sample;
                for band in self.bands.iter_mut().filter(|b| !b.is_bypassed()) {
                    value = band.process(channel, value);
                }
                *sample = value;
            }
        }
    }

    fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "10-Band Graphic EQ"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::EqualizerPreset;

    fn sine(freq: f32, sample_rate: u32, channels: usize, frames: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let v = (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.25;
            out.extend(std::iter::repeat(v).take(channels));
        }
        out
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_octave_q() {
        assert!((q_for_bandwidth(1.0) - std::f32::consts::SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn test_flat_passes_signal_unchanged() {
        let mut eq = GraphicEq::new();
        eq.configure(AudioFormat::new(44100, 2));

        let mut buffer = sine(440.0, 44100, 2, 512);
        let original = buffer.clone();
        eq.process(&mut buffer);

        assert_eq!(buffer, original);
    }

    #[test]
    fn test_boost_raises_band_level() {
        let mut eq = GraphicEq::new();
        eq.configure(AudioFormat::new(48000, 1));
        let mut gains = [0.0; 10];
        gains[5] = 12.0;
        eq.apply(&EqualizerConfig::from_gains(gains));

        let mut buffer = sine(1000.0, 48000, 1, 48000);
        let before = rms(&buffer[24000..]);
        eq.process(&mut buffer);
        let after = rms(&buffer[24000..]);

        // +12 dB is a factor of ~3.98 at the band centre
        assert!(after / before > 3.5, "ratio was {}", after / before);
    }

    #[test]
    fn test_channels_are_filtered_independently() {
        let mut eq = GraphicEq::new();
        eq.configure(AudioFormat::new(44100, 2));
        eq.apply(&EqualizerConfig::from_preset(
            EqualizerPreset::by_name("Bass Booster").unwrap(),
        ));

        // Signal only on the left channel
        let mut buffer: Vec<f32> = sine(64.0, 44100, 1, 2048)
            .into_iter()
            .flat_map(|s| [s, 0.0])
            .collect();
        eq.process(&mut buffer);

        assert!(buffer.iter().skip(1).step_by(2).all(|s| *s == 0.0));
        assert!(buffer.iter().step_by(2).any(|s| s.abs() > 0.0));
    }

    #[test]
    fn test_stable_at_low_sample_rate() {
        let mut eq = GraphicEq::new();
        eq.configure(AudioFormat::new(8000, 1));
        eq.apply(&EqualizerConfig::from_gains([12.0; 10]));

        let mut buffer = sine(3000.0, 8000, 1, 8000);
        eq.process(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_apply_records_config() {
        let mut eq = GraphicEq::new();
        let config = EqualizerConfig::from_preset(EqualizerPreset::by_name("Rock").unwrap());
        eq.apply(&config);
        assert_eq!(eq.config(), &config);
        assert_eq!(eq.band_gain(0), Some(5.0));
        assert_eq!(eq.band_gain(10), None);
    }
}
