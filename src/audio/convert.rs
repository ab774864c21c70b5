//! Audio normalization to the pipeline's canonical PCM format.

use crate::error::{EchoscriptError, Result};
use std::path::Path;
use std::time::Duration;
use tempfile::TempPath;
use tokio::process::Command;
use tracing::info;

/// Convert any audio file to mono 16kHz 16-bit PCM WAV via ffmpeg.
///
/// Returns a [`TempPath`] that removes the converted file on drop, so a
/// failed conversion leaves nothing behind.
pub async fn to_pcm_wav(input: &Path, timeout_secs: u64) -> Result<TempPath> {
    let output_path = tempfile::Builder::new()
        .prefix("echoscript-")
        .suffix(".wav")
        .tempfile()?
        .into_temp_path();

    let mut command = Command::new("ffmpeg");
    command
        .arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-ar", "16000", "-ac", "1", "-c:a", "pcm_s16le"])
        .arg(&*output_path);

    info!(input = %input.display(), output = %output_path.display(), "converting audio to WAV");

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), command.output())
        .await
        .map_err(|_| EchoscriptError::AudioConvert {
            message: format!("ffmpeg timed out after {timeout_secs}s"),
        })?
        .map_err(|e| EchoscriptError::AudioConvert {
            message: format!("failed to run ffmpeg: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EchoscriptError::AudioConvert {
            message: format!("ffmpeg exited with {}: {}", output.status, stderr.trim()),
        });
    }

    Ok(output_path)
}

/// Whether ffmpeg is available on PATH. Used by the `check` command.
pub fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_convert_missing_input_fails() {
        // ffmpeg (if present) fails on a nonexistent input; without ffmpeg
        // the spawn itself fails. Either way this is an AudioConvert error.
        let result = to_pcm_wav(Path::new("/nonexistent/input.mp3"), 30).await;
        assert!(matches!(
            result,
            Err(EchoscriptError::AudioConvert { .. })
        ));
    }
}
