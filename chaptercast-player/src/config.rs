//! Configuration management for the chaptercast player
//!
//! Bootstrap configuration is read once from a TOML file located through
//! [`chaptercast_common::config::ConfigResolver`]. Every field has a built-in
//! default, so an absent file yields a runnable configuration (apart from the
//! API key, which may also come from the environment).
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--voice, --port, --device)
//! 2. Environment variables (GEMINI_API_KEY / API_KEY for the key)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use crate::playlist::Narrator;
use chaptercast_common::config::{load_toml_or_default, ConfigResolver, LoggingConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of chapters requested per topic
pub const DEFAULT_CHAPTER_COUNT: usize = 5;

/// Default decode sample rate for generated speech (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Default HTTP control port
pub const DEFAULT_PORT: u16 = 5750;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Narrator voice name (validated against the voice catalogue)
    pub narrator: String,

    /// Chapters requested from the generator per topic
    pub chapter_count: usize,

    pub generator: GeneratorConfig,

    pub audio: AudioConfig,

    pub api: ApiConfig,

    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            narrator: Narrator::default().to_string(),
            chapter_count: DEFAULT_CHAPTER_COUNT,
            generator: GeneratorConfig::default(),
            audio: AudioConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// External content generator settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// API key (falls back to GEMINI_API_KEY, then API_KEY)
    pub api_key: Option<String>,

    /// REST endpoint base URL
    pub base_url: String,

    /// Model for chapter lists and scripts
    pub text_model: String,

    /// Model for cover images
    pub image_model: String,

    /// Model for speech synthesis
    pub speech_model: String,

    /// Per-request timeout in seconds (0 disables the timeout)
    pub request_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl GeneratorConfig {
    /// Request timeout, if any
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Resolve the API key: config file first, then environment
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            debug!("Using API key from configuration file");
            return Ok(key.clone());
        }

        for var in ["GEMINI_API_KEY", "API_KEY"] {
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    debug!("Using API key from {}", var);
                    return Ok(key);
                }
            }
        }

        Err(Error::Config(
            "No API key configured (set generator.api_key, GEMINI_API_KEY or API_KEY)".to_string(),
        ))
    }
}

/// Audio output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate the generated PCM is decoded at
    pub sample_rate: u32,

    /// Output device name (None = system default)
    pub device: Option<String>,

    /// Master gain, clamped to [0.0, 1.0]
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            device: None,
            volume: 1.0,
        }
    }
}

/// HTTP control surface settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl TomlConfig {
    /// Locate and load the configuration file, then validate it
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let resolver = ConfigResolver::new("chaptercast-player");
        let path = resolver.resolve(cli_path);
        let mut config: TomlConfig = load_toml_or_default(path.as_deref())?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Clamp out-of-range values that have an obvious safe substitute
    pub fn normalize(&mut self) {
        if !(0.0..=1.0).contains(&self.audio.volume) {
            warn!(
                "Volume {} outside [0.0, 1.0], clamping",
                self.audio.volume
            );
            self.audio.volume = self.audio.volume.clamp(0.0, 1.0);
        }
    }

    /// Validate settings that have no safe substitute
    pub fn validate(&self) -> Result<()> {
        self.narrator()?;

        if self.chapter_count == 0 {
            return Err(Error::Config("chapter_count must be at least 1".to_string()));
        }
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be positive".to_string()));
        }

        self.logging.validate()?;
        Ok(())
    }

    /// Parsed narrator voice
    pub fn narrator(&self) -> Result<Narrator> {
        self.narrator.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.narrator, "Puck");
        assert_eq!(config.chapter_count, 5);
        assert_eq!(config.audio.sample_rate, 24_000);
        assert_eq!(config.audio.volume, 1.0);
        assert_eq!(config.api.port, 5750);
        assert_eq!(config.api.bind, "127.0.0.1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            narrator = "Charon"

            [audio]
            volume = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.narrator().unwrap(), Narrator::Charon);
        assert_eq!(config.audio.volume, 0.5);
        assert_eq!(config.audio.sample_rate, 24_000);
        assert_eq!(config.generator.text_model, "gemini-2.5-flash");
    }

    #[test]
    fn test_unknown_narrator_rejected() {
        let config = TomlConfig {
            narrator: "Gandalf".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_volume_clamped() {
        let mut config = TomlConfig::default();
        config.audio.volume = 3.0;
        config.normalize();
        assert_eq!(config.audio.volume, 1.0);
    }

    #[test]
    fn test_zero_chapter_count_rejected() {
        let config = TomlConfig {
            chapter_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_zero_disables() {
        let generator = GeneratorConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(generator.request_timeout().is_none());
        assert_eq!(
            GeneratorConfig::default().request_timeout(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    #[serial]
    fn test_api_key_priority() {
        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("API_KEY");

        let mut generator = GeneratorConfig::default();
        assert!(generator.resolve_api_key().is_err());

        std::env::set_var("API_KEY", "generic");
        assert_eq!(generator.resolve_api_key().unwrap(), "generic");

        std::env::set_var("GEMINI_API_KEY", "gemini");
        assert_eq!(generator.resolve_api_key().unwrap(), "gemini");

        generator.api_key = Some("from-file".to_string());
        assert_eq!(generator.resolve_api_key().unwrap(), "from-file");

        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("API_KEY");
    }
}
