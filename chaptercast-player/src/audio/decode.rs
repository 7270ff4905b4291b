//! Raw PCM decoder for generated speech
//!
//! The speech generator returns headerless linear PCM: 16-bit signed,
//! little-endian, mono. Each sample is normalized by dividing by 32768.0, so
//! -32768 maps exactly to -1.0 and +32767 maps just below 1.0. The asymmetric
//! range is intentional and must not be rescaled.

use crate::audio::types::SampleBuffer;
use crate::error::{Error, Result};

/// Normalization divisor for signed 16-bit samples
const I16_SCALE: f32 = 32768.0;

/// Decode little-endian 16-bit mono PCM into a sample buffer
///
/// Output sample count equals `bytes.len() / 2`.
///
/// # Errors
/// - `Error::Decode` for empty input or an odd byte length
/// - `Error::Decode` for a zero sample rate
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32) -> Result<SampleBuffer> {
    if bytes.is_empty() {
        return Err(Error::Decode("Empty PCM payload".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "PCM payload has odd length {} (expected 16-bit samples)",
            bytes.len()
        )));
    }
    if sample_rate == 0 {
        return Err(Error::Decode("Sample rate must be positive".to_string()));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / I16_SCALE)
        .collect();

    Ok(SampleBuffer::mono(samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[f32]) -> Vec<u8> {
        samples
            .iter()
            .flat_map(|s| {
                let q = (s * I16_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                q.to_le_bytes()
            })
            .collect()
    }

    #[test]
    fn test_extremes_are_asymmetric() {
        let bytes = [0x00, 0x80, 0xFF, 0x7F, 0x00, 0x00];
        let buffer = decode_pcm16(&bytes, 24_000).unwrap();

        assert_eq!(buffer.samples[0], -1.0);
        assert_eq!(buffer.samples[1], 32767.0 / 32768.0);
        assert!(buffer.samples[1] < 1.0);
        assert_eq!(buffer.samples[2], 0.0);
    }

    #[test]
    fn test_sample_count_and_format() {
        let buffer = decode_pcm16(&[0u8; 480], 24_000).unwrap();

        assert_eq!(buffer.samples.len(), 240);
        assert_eq!(buffer.channel_count, 1);
        assert_eq!(buffer.sample_rate, 24_000);
        assert_eq!(buffer.duration_ms(), 10);
    }

    #[test]
    fn test_round_trip_within_one_step() {
        let original: Vec<f32> = (0..2000)
            .map(|i| ((i as f32) * 0.013).sin() * 0.9)
            .chain([-1.0, 0.0, 0.999, -0.5])
            .collect();

        let decoded = decode_pcm16(&encode(&original), 24_000).unwrap();

        assert_eq!(decoded.samples.len(), original.len());
        for (a, b) in original.iter().zip(decoded.samples.iter()) {
            assert!((a - b).abs() <= 1.0 / I16_SCALE, "{} vs {}", a, b);
            assert!(*b >= -1.0 && *b < 1.0);
        }
    }

    #[test]
    fn test_every_i16_decodes_in_range() {
        for value in i16::MIN..=i16::MAX {
            let decoded = decode_pcm16(&value.to_le_bytes(), 24_000).unwrap();
            let s = decoded.samples[0];
            assert!((-1.0..1.0).contains(&s), "{} decoded to {}", value, s);
        }
    }

    #[test]
    fn test_rejects_odd_length() {
        let result = decode_pcm16(&[0x01, 0x02, 0x03], 24_000);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(decode_pcm16(&[], 24_000), Err(Error::Decode(_))));
    }

    #[test]
    fn test_rejects_zero_rate() {
        assert!(matches!(decode_pcm16(&[0, 0], 0), Err(Error::Decode(_))));
    }
}
