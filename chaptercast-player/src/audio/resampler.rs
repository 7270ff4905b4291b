//! Audio resampling using rubato
//!
//! Converts decoded speech (24kHz by default) to the output device rate.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler using rubato for sample rate conversion.
pub struct Resampler;

impl Resampler {
    /// Resample mono audio to `output_rate`.
    ///
    /// # Notes
    /// If the rates already match (or the input is empty), returns a copy
    /// without resampling.
    pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
        if input_rate == output_rate || input.is_empty() {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(input.to_vec());
        }
        if input_rate == 0 || output_rate == 0 {
            return Err(Error::AudioOutput(format!(
                "Invalid resample parameters: {}Hz -> {}Hz",
                input_rate, output_rate
            )));
        }

        debug!("Resampling from {}Hz to {}Hz", input_rate, output_rate);

        let mut resampler = Self::create_resampler(input_rate, output_rate, input.len())?;

        let mut output = resampler
            .process(&[input], None)
            .map_err(|e| Error::AudioOutput(format!("Resampling failed: {}", e)))?;
        let output = output.pop().unwrap_or_default();

        debug!(
            "Resampled {} input frames to {} output frames",
            input.len(),
            output.len()
        );

        Ok(output)
    }

    /// Create a mono rubato resampler sized for a single whole-buffer pass.
    fn create_resampler(input_rate: u32, output_rate: u32, chunk_size: usize) -> Result<FastFixedIn<f32>> {
        FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0, // max_relative_ratio (no runtime changes)
            rubato::PolynomialDegree::Septic,
            chunk_size,
            1,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {}", e)))
    }
}
