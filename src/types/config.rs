//! Configuration for Refiner.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::requests::RefinementOptions;
use crate::RefinerResult;

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "refiner.toml";

/// Main configuration for Refiner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Default options for every refinement run.
    #[serde(default)]
    pub refinement: RefinementOptions,

    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Completion backend settings.
    #[serde(default)]
    pub backend: BackendConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Command-line completion backend.
///
/// `{model}` and `{temperature}` placeholders in `args` and `vision_args`
/// are substituted per call. The prompt is written to the child's stdin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Command to execute.
    #[serde(default = "default_backend_command")]
    pub command: String,

    /// Arguments for text completion.
    #[serde(default = "default_backend_args")]
    pub args: Vec<String>,

    /// Arguments for image completion. Empty disables vision.
    #[serde(default)]
    pub vision_args: Vec<String>,
}

impl BackendConfig {
    /// Creates a backend configuration.
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            enabled: true,
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            vision_args: Vec::new(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_backend_command(),
            args: default_backend_args(),
            vision_args: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_backend_command() -> String {
    "llm".to_string()
}

fn default_backend_args() -> Vec<String> {
    // llm CLI: -m model, -o temperature value, prompt read from stdin
    ["-m", "{model}", "-o", "temperature", "{temperature}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum cache capacity (number of entries).
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Entry time to live in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_cache_ttl() -> u64 {
    3600 // 1 hour
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> RefinerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> RefinerResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            refinement: RefinementOptions::default(),
            cache: CacheConfig::default(),
            backend: BackendConfig::default(),
        }
    }

    /// Path of the per-user configuration file, if the platform has one.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("refiner").join(CONFIG_FILE_NAME))
    }

    /// Loads from the current directory, then the user config dir, or uses default.
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::load(CONFIG_FILE_NAME) {
            return config;
        }

        Self::user_config_path()
            .filter(|path| path.exists())
            .and_then(|path| Self::load(path).ok())
            .unwrap_or_else(Self::default_config)
    }

    /// Refinement options with the cache switch applied.
    ///
    /// A disabled `[cache]` table wins over `refinement.use_cache`.
    pub fn effective_options(&self) -> RefinementOptions {
        let mut options = self.refinement.clone();
        options.use_cache = options.use_cache && self.cache.enabled;
        options
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = Config::default_config();
        config.refinement.max_iterations = 5;
        config.backend.command = "ollama".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_empty_file_takes_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default_config());
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [refinement]
            model = "claude-sonnet"
            timeout_ms = 5000

            [cache]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.refinement.model, "claude-sonnet");
        assert_eq!(config.refinement.timeout_ms, 5000);
        assert_eq!(config.refinement.max_iterations, 2);
        assert!(!config.cache.enabled);
        assert!(!config.effective_options().use_cache);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_default_backend_uses_placeholders() {
        let backend = BackendConfig::default();
        assert!(backend.args.iter().any(|a| a == "{model}"));
        assert!(backend.args.iter().any(|a| a == "{temperature}"));
        assert!(backend.vision_args.is_empty());
    }
}
