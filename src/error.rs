//! Error types for echoscript.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EchoscriptError {
    // Job validation errors — detected before the pipeline runs
    #[error("{message}")]
    Validation { message: String },

    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Model loading errors
    #[error("Failed to load {capability} model: {message}")]
    ModelLoad { capability: String, message: String },

    // Inference errors
    #[error("Transcription inference failed: {message}")]
    Transcription { message: String },

    // Audio acquisition errors
    #[error("Audio download failed: {message}")]
    AudioDownload { message: String },

    #[error("Audio conversion failed: {message}")]
    AudioConvert { message: String },

    #[error("Failed to decode audio: {message}")]
    AudioDecode { message: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormat { expected: String, actual: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl EchoscriptError {
    /// Whether the caller should see this as a request problem rather than
    /// a transcription failure.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            EchoscriptError::Validation { .. }
                | EchoscriptError::UnsupportedFormat { .. }
                | EchoscriptError::ConfigValue { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, EchoscriptError>;
