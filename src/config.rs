//! Worker configuration.
//!
//! Loaded once at process start from an optional TOML file, then overridden
//! by environment variables. Never re-read per job: device, precision, and
//! model selection are process-global because the model cache's first load
//! wins.

use crate::defaults;
use crate::error::{EchoscriptError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Device the inference capabilities are loaded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    #[default]
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = EchoscriptError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cuda" => Ok(Device::Cuda),
            "cpu" => Ok(Device::Cpu),
            other => Err(EchoscriptError::ConfigValue {
                key: "device".to_string(),
                message: format!("unknown device: {other}"),
            }),
        }
    }
}

/// Numeric precision the inference capabilities are loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComputeType {
    #[default]
    Float16,
    Float32,
    Int8,
}

impl ComputeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeType::Float16 => "float16",
            ComputeType::Float32 => "float32",
            ComputeType::Int8 => "int8",
        }
    }
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputeType {
    type Err = EchoscriptError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "float16" => Ok(ComputeType::Float16),
            "float32" => Ok(ComputeType::Float32),
            "int8" => Ok(ComputeType::Int8),
            other => Err(EchoscriptError::ConfigValue {
                key: "compute_type".to_string(),
                message: format!("unknown compute type: {other}"),
            }),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub audio: AudioConfig,
}

/// Model loading configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Whisper model name (resolved against `models/`) or an explicit path.
    pub name: String,
    pub device: Device,
    pub compute_type: ComputeType,
    /// Credential required by the diarization provider. When absent the
    /// worker runs permanently in degraded (no-speaker) mode.
    pub diarization_token: Option<String>,
}

/// Audio acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub download_timeout_secs: u64,
    pub ffmpeg_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: defaults::DEFAULT_MODEL.to_string(),
            device: Device::default(),
            compute_type: ComputeType::default(),
            diarization_token: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: defaults::DOWNLOAD_TIMEOUT_SECS,
            ffmpeg_timeout_secs: defaults::FFMPEG_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults when no path is
    /// given or the file does not exist. Invalid TOML is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            _ => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ECHOSCRIPT_MODEL → model.name
    /// - ECHOSCRIPT_DEVICE → model.device
    /// - ECHOSCRIPT_COMPUTE_TYPE → model.compute_type
    /// - HF_TOKEN → model.diarization_token
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(model) = std::env::var("ECHOSCRIPT_MODEL")
            && !model.is_empty()
        {
            self.model.name = model;
        }

        if let Ok(device) = std::env::var("ECHOSCRIPT_DEVICE")
            && !device.is_empty()
        {
            self.model.device = device.parse()?;
        }

        if let Ok(compute) = std::env::var("ECHOSCRIPT_COMPUTE_TYPE")
            && !compute.is_empty()
        {
            self.model.compute_type = compute.parse()?;
        }

        if let Ok(token) = std::env::var("HF_TOKEN")
            && !token.is_empty()
        {
            self.model.diarization_token = Some(token);
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, defaults::DEFAULT_MODEL);
        assert_eq!(config.model.device, Device::Cpu);
        assert_eq!(config.model.compute_type, ComputeType::Float16);
        assert!(config.model.diarization_token.is_none());
        assert_eq!(
            config.audio.download_timeout_secs,
            defaults::DOWNLOAD_TIMEOUT_SECS
        );
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            "[model]\nname = \"base\"\ndevice = \"cuda\"\ncompute_type = \"int8\""
        )
        .expect("write config");

        let config = Config::load(file.path()).expect("load config");
        assert_eq!(config.model.name, "base");
        assert_eq!(config.model.device, Device::Cuda);
        assert_eq!(config.model.compute_type, ComputeType::Int8);
        // Missing sections fall back to defaults
        assert_eq!(
            config.audio.ffmpeg_timeout_secs,
            defaults::FFMPEG_TIMEOUT_SECS
        );
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "model = not valid").expect("write config");

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Some(Path::new("/nonexistent/echoscript.toml")))
            .expect("defaults");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_device_from_str() {
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert!("gpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_compute_type_from_str() {
        assert_eq!(
            "float16".parse::<ComputeType>().unwrap(),
            ComputeType::Float16
        );
        assert_eq!("int8".parse::<ComputeType>().unwrap(), ComputeType::Int8);
        assert!("bf16".parse::<ComputeType>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        assert_eq!(Device::Cuda.to_string(), "cuda");
        assert_eq!(ComputeType::Float32.to_string(), "float32");
    }
}
