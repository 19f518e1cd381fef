//! Deterministic sine-tone generator used as the last synthesis fallback.
//!
//! The tone length tracks the input text: `min(chars × secs_per_char, max_secs)`.
//! Defaults are 440 Hz, amplitude 0.3, 0.1 s per character, capped at 3 s.

use crate::audio::AssembledAudio;

/// Amplitude ceiling that keeps quantised peaks clear of full scale.
const MAX_AMPLITUDE: f32 = 0.9;

/// Produces a fixed-frequency sine wave whose length follows the text length.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneGenerator {
    frequency_hz: f32,
    amplitude: f32,
    secs_per_char: f64,
    max_secs: f64,
}

impl ToneGenerator {
    /// Build a generator.  `amplitude` is clamped to `[0.0, 0.9]`.
    pub fn new(frequency_hz: f32, amplitude: f32, secs_per_char: f64, max_secs: f64) -> Self {
        Self {
            frequency_hz,
            amplitude: amplitude.clamp(0.0, MAX_AMPLITUDE),
            secs_per_char: secs_per_char.max(0.0),
            max_secs: max_secs.max(0.0),
        }
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Tone length in seconds for `text`, counted in characters.
    ///
    /// ```
    /// use text_to_voice::audio::ToneGenerator;
    ///
    /// let tone = ToneGenerator::default();
    /// assert!((tone.duration_secs("Hello") - 0.5).abs() < 1e-9);
    /// assert!((tone.duration_secs(&"x".repeat(500)) - 3.0).abs() < 1e-9);
    /// ```
    pub fn duration_secs(&self, text: &str) -> f64 {
        (text.chars().count() as f64 * self.secs_per_char).min(self.max_secs)
    }

    /// Render the tone for `text` at `sample_rate`.
    pub fn generate(&self, text: &str, sample_rate: u32) -> AssembledAudio {
        let n = (self.duration_secs(text) * sample_rate as f64).round() as usize;
        let step = std::f64::consts::TAU * self.frequency_hz as f64 / sample_rate.max(1) as f64;

        let samples = (0..n)
            .map(|i| (self.amplitude as f64 * (step * i as f64).sin()) as f32)
            .collect();

        AssembledAudio::new(sample_rate, samples)
    }
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new(440.0, 0.3, 0.1, 3.0)
    }
}
