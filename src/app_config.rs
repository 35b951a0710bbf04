use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;

use crate::track_assembler::AssemblerConfig;
use crate::vocal_slicer::SlicerConfig;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language of the subtitle track carrying the dialogue text (ISO code)
    #[serde(default = "default_subtitle_language")]
    pub subtitle_language: String,

    /// Language of the original audio track (ISO code)
    #[serde(default = "default_audio_language")]
    pub audio_language: String,

    /// Target dub language (ISO code)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Timeline parser settings
    #[serde(default)]
    pub parser: ParserConfig,

    /// Reference slicer settings
    #[serde(default)]
    pub slicer: SlicerConfig,

    /// Track assembler settings
    #[serde(default)]
    pub assembler: AssemblerConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Timeline parser configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ParserConfig {
    // @field: Style labels excluded from the timeline (defaults when absent)
    #[serde(default)]
    pub exclude_styles: Option<Vec<String>>,

    // @field: Minimum entry duration in ms
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,

    // @field: Collapse repeated identical-text entries
    #[serde(default = "default_true")]
    pub deduplicate: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            exclude_styles: None,
            min_duration_ms: default_min_duration_ms(),
            deduplicate: true,
        }
    }
}

impl ParserConfig {
    /// Convert to the parser's option struct
    pub fn to_parse_options(&self) -> crate::subtitle_parser::ParseOptions {
        crate::subtitle_parser::ParseOptions {
            exclude_styles: self
                .exclude_styles
                .as_ref()
                .map(|v| v.iter().cloned().collect()),
            min_duration_ms: self.min_duration_ms,
            deduplicate: self.deduplicate,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_subtitle_language() -> String {
    "en".to_string()
}

fn default_audio_language() -> String {
    "ja".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_min_duration_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.subtitle_language.is_empty() {
            return Err(anyhow!("subtitle_language must not be empty"));
        }
        if self.audio_language.is_empty() {
            return Err(anyhow!("audio_language must not be empty"));
        }
        if self.target_language.is_empty() {
            return Err(anyhow!("target_language must not be empty"));
        }
        if self.assembler.target_sample_rate == 0 {
            return Err(anyhow!("assembler.target_sample_rate must be positive"));
        }
        if self.slicer.min_reference_s < 0.0 {
            return Err(anyhow!("slicer.min_reference_s must not be negative"));
        }
        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            subtitle_language: default_subtitle_language(),
            audio_language: default_audio_language(),
            target_language: default_target_language(),
            parser: ParserConfig::default(),
            slicer: SlicerConfig::default(),
            assembler: AssemblerConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
