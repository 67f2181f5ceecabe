/// Output mixer: volume and channel mapping onto the device layout
///
/// Mapping rules, processing channels `n` onto device channels `m`:
/// mono feeds every output, `m == 1` takes the average of all inputs,
/// otherwise the first `min(n, m)` channels are copied and the rest are
/// silent.
#[derive(Debug, Clone)]
pub(crate) struct Mixer {
    volume: f32,
}

impl Default for Mixer {
    fn default() -> Self {
        Self { volume: 1.0 }
    }
}

impl Mixer {
    pub(crate) fn volume(&self) -> f32 {
        self.volume
    }

    /// Linear gain, 0.0 - 1.0
    pub(crate) fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        }
    }

    pub(crate) fn mix(
        &self,
        input: &[f32],
        in_channels: usize,
        output: &mut [f32],
        out_channels: usize,
    ) {
        if in_channels == 0 || out_channels == 0 {
            output.fill(0.0);
            return;
        }

        let gain = self.volume;
        let frames = output.len() / out_channels;

        for (src, dst) in input
            .chunks_exact(in_channels)
            .zip(output.chunks_exact_mut(out_channels))
            .take(frames)
        {
            if in_channels == out_channels {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s * gain;
                }
            } else if in_channels == 1 {
                dst.fill(src[0] * gain);
            } else if out_channels == 1 {
                dst[0] = src.iter().sum::<f32>() / in_channels as f32 * gain;
            } else {
                let shared = in_channels.min(out_channels);
                for (d, s) in dst[..shared].iter_mut().zip(src) {
                    *d = s * gain;
                }
                dst[shared..].fill(0.0);
            }
        }
    }
}
