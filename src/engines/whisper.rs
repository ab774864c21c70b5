//! Whisper-based speech-to-text backend.
//!
//! Implements the SpeechToText trait using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be
//! installed. Without the feature a stub is compiled that fails every load,
//! which makes the mandatory stage fatal for each job — the worker still
//! starts, so `check` can report the misconfiguration.

use crate::cache::SttLoader;
use crate::config::{ComputeType, Device};
use crate::engines::stt::SpeechToText;
#[cfg(feature = "whisper")]
use crate::engines::stt::Transcription;
use crate::error::{EchoscriptError, Result};
#[cfg(feature = "whisper")]
use crate::segment::RawSegment;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Resolve a configured model name to a file path.
///
/// A value containing a path separator or an extension is used verbatim;
/// a bare name resolves to `models/ggml-<name>.bin`.
pub fn model_file(name: &str) -> PathBuf {
    if name.contains('/') || name.ends_with(".bin") {
        PathBuf::from(name)
    } else {
        PathBuf::from("models").join(format!("ggml-{name}.bin"))
    }
}

/// Whisper-based speech-to-text implementation.
///
/// The WhisperContext is wrapped in a Mutex: the underlying inference
/// handle is not reentrant, so concurrent jobs serialize here.
#[cfg(feature = "whisper")]
pub struct WhisperSpeechToText {
    context: Mutex<WhisperContext>,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperSpeechToText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperSpeechToText")
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

#[cfg(feature = "whisper")]
impl WhisperSpeechToText {
    /// Load a Whisper model from `model_path`.
    ///
    /// # Errors
    /// Returns `EchoscriptError::ModelLoad` if the model file is missing or
    /// fails to load.
    pub fn new(model_path: &Path) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !model_path.exists() {
            return Err(EchoscriptError::ModelLoad {
                capability: "speech_to_text".to_string(),
                message: format!("model file not found at {}", model_path.display()),
            });
        }

        let model_name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let mut context_params = WhisperContextParameters::default();
        context_params.flash_attn(true);
        let context = WhisperContext::new_with_params(
            model_path.to_str().ok_or_else(|| EchoscriptError::ModelLoad {
                capability: "speech_to_text".to_string(),
                message: "invalid UTF-8 in model path".to_string(),
            })?,
            context_params,
        )
        .map_err(|e| EchoscriptError::ModelLoad {
            capability: "speech_to_text".to_string(),
            message: format!("failed to load Whisper model: {e}"),
        })?;

        Ok(Self {
            context: Mutex::new(context),
            model_name,
        })
    }
}

#[cfg(feature = "whisper")]
impl SpeechToText for WhisperSpeechToText {
    fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<Transcription> {
        let context = self
            .context
            .lock()
            .map_err(|e| EchoscriptError::Transcription {
                message: format!("failed to acquire context lock: {e}"),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| EchoscriptError::Transcription {
                message: format!("failed to create Whisper state: {e}"),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| EchoscriptError::Transcription {
                message: format!("Whisper inference failed: {e}"),
            })?;

        let lang_id = state.full_lang_id_from_state();
        let detected = whisper_rs::get_lang_str(lang_id).map(str::to_string);

        // Whisper reports segment boundaries in centiseconds.
        let segments = state
            .as_iter()
            .map(|segment| RawSegment {
                start: Some(segment.start_timestamp() as f64 / 100.0),
                end: Some(segment.end_timestamp() as f64 / 100.0),
                text: Some(segment.to_string()),
                speaker: None,
                words: None,
            })
            .collect();

        Ok(Transcription {
            segments,
            language: detected,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Loader wiring Whisper into the model cache.
#[derive(Debug, Clone)]
pub struct WhisperLoader {
    model_path: PathBuf,
}

impl WhisperLoader {
    /// Create a loader for the configured model name or path.
    pub fn new(model_name: &str) -> Self {
        Self {
            model_path: model_file(model_name),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

#[cfg(feature = "whisper")]
impl SttLoader for WhisperLoader {
    fn load(&self, device: Device, compute_type: ComputeType) -> Result<Arc<dyn SpeechToText>> {
        // whisper.cpp picks its backend at compile time; device and precision
        // are recorded by the cache for observability.
        tracing::info!(
            model = %self.model_path.display(),
            device = %device,
            compute_type = %compute_type,
            "loading Whisper model"
        );
        let stt = WhisperSpeechToText::new(&self.model_path)?;
        Ok(Arc::new(stt))
    }
}

#[cfg(not(feature = "whisper"))]
impl SttLoader for WhisperLoader {
    fn load(&self, _device: Device, _compute_type: ComputeType) -> Result<Arc<dyn SpeechToText>> {
        Err(EchoscriptError::ModelLoad {
            capability: "speech_to_text".to_string(),
            message: concat!(
                "whisper feature not enabled; this binary was built without speech recognition. ",
                "Rebuild with: cargo build --release --features whisper"
            )
            .to_string(),
        })
    }
}
