//! RIFF/WAVE encoder for mono 16-bit PCM.
//!
//! Layout of the 44-byte canonical header written by [`WavEncoder`]:
//!
//! | Bytes   | Field            | Value                          |
//! |---------|------------------|--------------------------------|
//! | 0–3     | chunk id         | `"RIFF"`                       |
//! | 4–7     | chunk size       | `36 + data_size` (u32 LE)      |
//! | 8–11    | format           | `"WAVE"`                       |
//! | 12–15   | sub-chunk id     | `"fmt "`                       |
//! | 16–19   | sub-chunk size   | `16`                           |
//! | 20–21   | audio format     | `1` (PCM)                      |
//! | 22–23   | channels         | `1`                            |
//! | 24–27   | sample rate      | Hz                             |
//! | 28–31   | byte rate        | `sample_rate × channels × 2`   |
//! | 32–33   | block align      | `channels × 2`                 |
//! | 34–35   | bits per sample  | `16`                           |
//! | 36–39   | data id          | `"data"`                       |
//! | 40–43   | data size        | `sample_count × 2`             |
//! | 44+     | samples          | i16 LE                         |

use thiserror::Error;

use crate::audio::AssembledAudio;

/// Size of the canonical header in bytes.
pub const WAV_HEADER_LEN: usize = 44;

/// MIME type of every [`EncodedAudio`].
pub const WAV_MIME_TYPE: &str = "audio/wav";

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const PCM_FORMAT: u16 = 1;

// ---------------------------------------------------------------------------
// EncodeError
// ---------------------------------------------------------------------------

/// Reasons assembled audio cannot be turned into a container.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    /// There are no samples to encode.
    #[error("assembled audio contains no samples")]
    Empty,

    /// A zero sample rate cannot be described by the header.
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// The payload does not fit the 32-bit size fields.
    #[error("payload of {samples} samples exceeds the RIFF size limit")]
    TooLarge { samples: usize },

    /// Bytes handed over as a finished container are not RIFF/WAVE.
    #[error("not a RIFF/WAVE container: {0}")]
    InvalidContainer(String),
}

// ---------------------------------------------------------------------------
// EncodedAudio
// ---------------------------------------------------------------------------

/// A finished `audio/wav` byte stream.  Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAudio {
    bytes: Vec<u8>,
}

impl EncodedAudio {
    /// Wrap bytes that already form a RIFF/WAVE container (pass-through for
    /// providers that return finished files).
    ///
    /// The container must carry a usable `fmt ` chunk followed by a non-empty
    /// `data` chunk that lies entirely within `bytes`.
    pub fn from_container(bytes: Vec<u8>) -> Result<Self, EncodeError> {
        if bytes.len() < 12 {
            return Err(EncodeError::InvalidContainer(format!(
                "only {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(EncodeError::InvalidContainer(
                "missing RIFF/WAVE magic".into(),
            ));
        }
        validate_chunks(&bytes)?;
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        WAV_MIME_TYPE
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Walk the RIFF chunk list after the 12-byte preamble.
fn validate_chunks(bytes: &[u8]) -> Result<(), EncodeError> {
    let invalid = |msg: &str| EncodeError::InvalidContainer(msg.to_string());
    let mut pos = 12usize;
    let mut has_fmt = false;

    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]])
            as usize;
        let body = pos + 8;
        let end = body
            .checked_add(size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| invalid("chunk runs past end of payload"))?;

        match id {
            b"fmt " => {
                if size < 16 {
                    return Err(invalid("fmt chunk too short"));
                }
                let channels = u16::from_le_bytes([bytes[body + 2], bytes[body + 3]]);
                let rate = u32::from_le_bytes([
                    bytes[body + 4],
                    bytes[body + 5],
                    bytes[body + 6],
                    bytes[body + 7],
                ]);
                let bits = u16::from_le_bytes([bytes[body + 14], bytes[body + 15]]);
                if channels == 0 || rate == 0 || bits == 0 {
                    return Err(invalid("fmt chunk describes no audio"));
                }
                has_fmt = true;
            }
            b"data" => {
                if !has_fmt {
                    return Err(invalid("data chunk before fmt chunk"));
                }
                if size == 0 {
                    return Err(invalid("empty data chunk"));
                }
                return Ok(());
            }
            _ => {}
        }
        // Chunks are word aligned.
        pos = end + (size & 1);
    }

    Err(invalid(if has_fmt {
        "missing data chunk"
    } else {
        "missing fmt chunk"
    }))
}

// ---------------------------------------------------------------------------
// Quantisation
// ---------------------------------------------------------------------------

/// Convert one float sample to a signed 16-bit word.
///
/// The sample is clamped to `[-1.0, 1.0]` **before** scaling so out-of-range
/// input saturates instead of wrapping.  NaN maps to `0`.
///
/// ```
/// use text_to_voice::audio::quantize;
///
/// assert_eq!(quantize(1.0), 32_767);
/// assert_eq!(quantize(4.2), 32_767);
/// assert_eq!(quantize(-1.0), -32_767);
/// assert_eq!(quantize(-7.0), -32_767);
/// assert_eq!(quantize(0.0), 0);
/// ```
pub fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32_767.0).floor() as i16
}

// ---------------------------------------------------------------------------
// WavEncoder
// ---------------------------------------------------------------------------

/// Stateless mono 16-bit PCM WAV encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl WavEncoder {
    const CHANNELS: u16 = 1;

    pub fn new() -> Self {
        Self
    }

    /// Encode `audio` as a 44-byte header followed by little-endian i16 samples.
    ///
    /// # Errors
    ///
    /// - [`EncodeError::Empty`]: `audio` has no samples.
    /// - [`EncodeError::InvalidSampleRate`]: `audio.sample_rate == 0`.
    /// - [`EncodeError::TooLarge`]: the data size does not fit in a u32.
    pub fn encode(&self, audio: &AssembledAudio) -> Result<EncodedAudio, EncodeError> {
        if audio.is_empty() {
            return Err(EncodeError::Empty);
        }
        if audio.sample_rate == 0 {
            return Err(EncodeError::InvalidSampleRate(0));
        }

        let data_size = audio
            .samples
            .len()
            .checked_mul(usize::from(BYTES_PER_SAMPLE * Self::CHANNELS))
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| n.checked_add(36).is_some())
            .ok_or(EncodeError::TooLarge {
                samples: audio.samples.len(),
            })?;

        let block_align = Self::CHANNELS * BYTES_PER_SAMPLE;
        let byte_rate = audio
            .sample_rate
            .checked_mul(u32::from(block_align))
            .ok_or(EncodeError::InvalidSampleRate(audio.sample_rate))?;

        let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&PCM_FORMAT.to_le_bytes());
        bytes.extend_from_slice(&Self::CHANNELS.to_le_bytes());
        bytes.extend_from_slice(&audio.sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_size.to_le_bytes());

        for &sample in &audio.samples {
            bytes.extend_from_slice(&quantize(sample).to_le_bytes());
        }

        debug_assert_eq!(bytes.len(), WAV_HEADER_LEN + data_size as usize);
        Ok(EncodedAudio { bytes })
    }
}

// ---------------------------------------------------------------------------
// WavHeader
// ---------------------------------------------------------------------------

/// Fields of a canonical 44-byte header, as read back from bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse the canonical layout written by [`WavEncoder`].
    pub fn parse(bytes: &[u8]) -> Result<Self, EncodeError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(EncodeError::InvalidContainer(format!(
                "header needs {WAV_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return Err(EncodeError::InvalidContainer(
                "unexpected chunk layout".into(),
            ));
        }

        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        Ok(Self {
            riff_size: u32_at(4),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }

    /// Number of sample frames declared by `data_size`.
    pub fn sample_count(&self) -> usize {
        if self.block_align == 0 {
            return 0;
        }
        (self.data_size / u32::from(self.block_align)) as usize
    }

    /// Declared playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count() as f64 / self.sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
