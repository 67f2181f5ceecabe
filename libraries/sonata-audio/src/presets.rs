//! Equalizer preset table
//!
//! Fixed 10-band layout (one octave per band) and the named presets offered to
//! the coordinator. Gains are in dB and always within [-12, +12].

use serde::{Deserialize, Serialize};

/// Band centre frequencies (Hz)
pub const EQ_FREQUENCIES: [f32; 10] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Bandwidth of every band, in octaves
pub const EQ_BANDWIDTH_OCTAVES: f32 = 1.0;

/// Gain limit of a band (dB)
pub const MAX_GAIN_DB: f32 = 12.0;

/// A named set of 10 band gains
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualizerPreset {
    pub name: &'static str,
    pub gains: [f32; 10],
}

#[rustfmt::skip]
static PRESETS: [EqualizerPreset; 22] = [
    EqualizerPreset { name: "Flat",           gains: [0.0; 10] },
    EqualizerPreset { name: "Acoustic",       gains: [5.0, 5.0, 4.0, 1.0, 1.75, 1.75, 3.5, 4.0, 3.5, 2.0] },
    EqualizerPreset { name: "Bass Booster",   gains: [5.5, 4.25, 3.5, 2.5, 1.25, 0.0, 0.0, 0.0, 0.0, 0.0] },
    EqualizerPreset { name: "Bass Reducer",   gains: [-5.5, -4.25, -3.5, -2.5, -1.25, 0.0, 0.0, 0.0, 0.0, 0.0] },
    EqualizerPreset { name: "Classical",      gains: [4.75, 3.75, 3.0, 2.5, -1.5, -1.5, 0.0, 2.25, 3.25, 3.75] },
    EqualizerPreset { name: "Dance",          gains: [3.5, 6.5, 5.0, 0.0, 2.0, 3.5, 5.0, 4.5, 3.5, 0.0] },
    EqualizerPreset { name: "Deep",           gains: [5.0, 3.5, 1.75, 1.0, 3.0, 2.5, 1.5, -2.0, -3.5, -4.5] },
    EqualizerPreset { name: "Electronic",     gains: [4.25, 3.75, 1.25, 0.0, -2.0, 2.25, 0.75, 1.25, 4.25, 4.75] },
    EqualizerPreset { name: "Hip-Hop",        gains: [5.0, 4.25, 1.5, 3.0, -1.0, -1.0, 1.5, -0.5, 2.0, 3.0] },
    EqualizerPreset { name: "Jazz",           gains: [4.0, 3.0, 1.5, 2.25, -1.5, -1.5, 0.0, 1.5, 3.0, 3.75] },
    EqualizerPreset { name: "Latin",          gains: [4.5, 3.0, 0.0, 0.0, -1.5, -1.5, -1.5, 0.0, 3.0, 4.5] },
    EqualizerPreset { name: "Loudness",       gains: [6.0, 4.0, 0.0, 0.0, -2.0, 0.0, -1.0, -5.0, 5.0, 1.0] },
    EqualizerPreset { name: "Lounge",         gains: [-3.0, -1.5, -0.5, 1.5, 4.0, 2.5, 0.0, -1.5, 2.0, 1.0] },
    EqualizerPreset { name: "Piano",          gains: [3.0, 2.0, 0.0, 2.5, 3.0, 1.5, 3.5, 4.5, 3.0, 3.5] },
    EqualizerPreset { name: "Pop",            gains: [-1.5, -1.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, -1.0, -1.5] },
    EqualizerPreset { name: "R&B",            gains: [2.5, 7.0, 5.5, 1.25, -2.25, -1.5, 2.25, 2.75, 3.0, 3.75] },
    EqualizerPreset { name: "Rock",           gains: [5.0, 4.0, 3.0, 1.5, -0.5, -1.0, 0.5, 2.5, 3.5, 4.5] },
    EqualizerPreset { name: "Small Speakers", gains: [5.5, 4.25, 3.5, 2.5, 1.25, 0.0, -1.25, -2.5, -3.5, -4.25] },
    EqualizerPreset { name: "Spoken Word",    gains: [-3.5, -0.5, 0.0, 0.5, 3.5, 4.5, 5.0, 4.5, 2.5, 0.0] },
    EqualizerPreset { name: "Treble Booster", gains: [0.0, 0.0, 0.0, 0.0, 0.0, 1.25, 2.5, 3.5, 4.25, 5.5] },
    EqualizerPreset { name: "Treble Reducer", gains: [0.0, 0.0, 0.0, 0.0, 0.0, -1.25, -2.5, -3.5, -4.25, -5.5] },
    EqualizerPreset { name: "Vocal Booster",  gains: [-1.5, -3.0, -3.0, 1.5, 3.5, 3.5, 3.0, 1.5, 0.0, -1.5] },
];

impl EqualizerPreset {
    /// Every preset, in display order
    pub fn all() -> &'static [EqualizerPreset] {
        &PRESETS
    }

    /// Case-insensitive lookup
    pub fn by_name(name: &str) -> Option<&'static EqualizerPreset> {
        let name = name.trim();
        PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn flat() -> &'static EqualizerPreset {
        &PRESETS[0]
    }
}

/// One equalizer band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Centre frequency (Hz)
    pub frequency: f32,

    /// Gain (dB), clamped to [-12, +12]
    pub gain_db: f32,

    /// Bandwidth (octaves)
    pub bandwidth: f32,
}

/// Full equalizer configuration: exactly 10 bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerConfig {
    bands: [EqBand; 10],
}

impl EqualizerConfig {
    /// Build from raw gains; NaN becomes 0 dB and the rest is clamped
    pub fn from_gains(gains: [f32; 10]) -> Self {
        let bands = std::array::from_fn(|i| EqBand {
            frequency: EQ_FREQUENCIES[i],
            gain_db: clamp_gain(gains[i]),
            bandwidth: EQ_BANDWIDTH_OCTAVES,
        });
        Self { bands }
    }

    pub fn from_preset(preset: &EqualizerPreset) -> Self {
        Self::from_gains(preset.gains)
    }

    pub fn flat() -> Self {
        Self::from_gains([0.0; 10])
    }

    pub fn bands(&self) -> &[EqBand; 10] {
        &self.bands
    }

    pub fn gains(&self) -> [f32; 10] {
        self.bands.map(|b| b.gain_db)
    }

    pub fn is_flat(&self) -> bool {
        self.bands.iter().all(|b| b.gain_db == 0.0)
    }
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self::flat()
    }
}

/// What `apply_equalizer` accepts: a preset name or explicit gains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualizerSetting {
    Preset(String),
    Gains([f32; 10]),
}

impl EqualizerSetting {
    /// Resolve to a configuration; `None` for an unknown preset name
    pub fn resolve(&self) -> Option<EqualizerConfig> {
        match self {
            Self::Preset(name) => EqualizerPreset::by_name(name).map(EqualizerConfig::from_preset),
            Self::Gains(gains) => Some(EqualizerConfig::from_gains(*gains)),
        }
    }
}

impl From<&str> for EqualizerSetting {
    fn from(name: &str) -> Self {
        Self::Preset(name.to_string())
    }
}

impl From<[f32; 10]> for EqualizerSetting {
    fn from(gains: [f32; 10]) -> Self {
        Self::Gains(gains)
    }
}

fn clamp_gain(gain_db: f32) -> f32 {
    if gain_db.is_nan() {
        return 0.0;
    }
    gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequencies_ascending() {
        for window in EQ_FREQUENCIES.windows(2) {
            assert!(window[0] < window[1]);
        }
    }

    #[test]
    fn test_preset_table_is_well_formed() {
        let presets = EqualizerPreset::all();
        assert_eq!(presets.len(), 22);

        for preset in presets {
            for gain in preset.gains {
                assert!(
                    (-MAX_GAIN_DB..=MAX_GAIN_DB).contains(&gain),
                    "{} has out-of-range gain {}",
                    preset.name,
                    gain
                );
            }
        }

        let mut names: Vec<_> = presets.iter().map(|p| p.name.to_lowercase()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), presets.len(), "preset names must be unique");
    }

    #[test]
    fn test_lookup_ignores_case() {
        let preset = EqualizerPreset::by_name("bass booster").unwrap();
        assert_eq!(preset.name, "Bass Booster");
        assert_eq!(preset.gains[0], 5.5);

        assert!(EqualizerPreset::by_name("  ROCK ").is_some());
        assert!(EqualizerPreset::by_name("Nightcore").is_none());
        assert!(EqualizerPreset::flat().gains.iter().all(|g| *g == 0.0));
    }

    #[test]
    fn test_gains_are_clamped() {
        let config = EqualizerConfig::from_gains([
            20.0,
            -20.0,
            f32::NAN,
            12.0,
            -12.0,
            0.5,
            0.0,
            0.0,
            0.0,
            f32::INFINITY,
        ]);
        let gains = config.gains();
        assert_eq!(gains[0], 12.0);
        assert_eq!(gains[1], -12.0);
        assert_eq!(gains[2], 0.0);
        assert_eq!(gains[5], 0.5);
        assert_eq!(gains[9], 12.0);
    }

    #[test]
    fn test_config_bands_carry_layout() {
        let config = EqualizerConfig::from_preset(EqualizerPreset::by_name("Pop").unwrap());
        for (band, freq) in config.bands().iter().zip(EQ_FREQUENCIES) {
            assert_eq!(band.frequency, freq);
            assert_eq!(band.bandwidth, 1.0);
        }
        assert!(!config.is_flat());
        assert!(EqualizerConfig::default().is_flat());
    }

    #[test]
    fn test_setting_resolution() {
        assert!(EqualizerSetting::from("Jazz").resolve().is_some());
        assert!(EqualizerSetting::from("Polka").resolve().is_none());

        let gains = [1.0; 10];
        assert_eq!(
            EqualizerSetting::from(gains).resolve().unwrap().gains(),
            gains
        );
    }
}
