//! Raw PCM buffer produced by every synthesis tier.

/// Mono float PCM at a declared sample rate.
///
/// Samples are kept exactly in the order they were appended; nothing in this
/// type reorders, deduplicates or resamples them.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledAudio {
    /// Sample rate in Hz, taken from the synthesis configuration.
    pub sample_rate: u32,
    /// Samples nominally in `[-1.0, 1.0]`; the encoder clamps out-of-range values.
    pub samples: Vec<f32>,
}

impl AssembledAudio {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// An empty buffer that chunks can be appended to.
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(sample_rate, Vec::new())
    }

    /// Append one chunk's samples after everything received so far.
    pub fn append(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length in seconds; `0.0` when the sample rate is zero.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
