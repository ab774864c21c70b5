//! WAV decoding for the pipeline's canonical PCM format.

use crate::defaults;
use crate::error::{EchoscriptError, Result};
use std::path::Path;

/// Read a normalized WAV file into f32 samples plus its duration.
///
/// The file must be mono 16kHz 16-bit PCM (the format the ffmpeg
/// normalization step produces). Samples are scaled to [-1.0, 1.0].
pub fn read_samples(path: &Path) -> Result<(Vec<f32>, f64)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| EchoscriptError::AudioDecode {
        message: format!("{}: {e}", path.display()),
    })?;

    let spec = reader.spec();
    if spec.channels != 1
        || spec.sample_rate != defaults::SAMPLE_RATE
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(EchoscriptError::AudioFormat {
            expected: format!("mono {}Hz 16-bit PCM", defaults::SAMPLE_RATE),
            actual: format!(
                "{} channel(s) {}Hz {}-bit {:?}",
                spec.channels, spec.sample_rate, spec.bits_per_sample, spec.sample_format
            ),
        });
    }

    let samples: Vec<f32> = reader
        .samples::<i16>()
        .map(|s| {
            s.map(|sample| sample as f32 / 32768.0)
                .map_err(|e| EchoscriptError::AudioDecode {
                    message: e.to_string(),
                })
        })
        .collect::<Result<_>>()?;

    let duration = samples.len() as f64 / defaults::SAMPLE_RATE as f64;
    Ok((samples, duration))
}
