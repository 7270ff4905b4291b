//! Core audio data types
//!
//! Defines the decoded sample buffer handed from the decoder to the output graph.

use std::time::Duration;

/// SampleBuffer holds decoded audio data ready for playback.
///
/// **Format:**
/// - Samples are f32, nominally in [-1.0, 1.0)
/// - Interleaved when `channel_count > 1` (generated speech is always mono)
/// - Sample rate is the decode rate, not the device rate; the output backend
///   resamples when they differ
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// PCM audio samples
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count (1 for generated speech)
    pub channel_count: u16,
}

impl SampleBuffer {
    /// Create a new mono SampleBuffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channel_count: 1,
        }
    }

    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.samples.len() / self.channel_count as usize
    }

    /// Get duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frame_count() as u64 * 1000) / self.sample_rate as u64
    }

    /// Get playback duration
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
