//! File configuration.
//!
//! Settings are layered:
//! 1. Default values
//! 2. Config file (`~/.sequor/config.toml`)
//! 3. Environment variables (provider credentials only)
//!
//! ```toml
//! [run]
//! max_iterations = 8
//! timeout_secs = 120
//! tool_timeout_secs = 20
//!
//! [openai]
//! base_url = "http://localhost:11434/v1"
//! model = "qwen2.5:14b"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::RunConfig;
#[cfg(feature = "openai")]
use crate::llms::OpenAIConfig;

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level contents of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequorConfig {
    /// Limits applied to every run.
    pub run: RunConfig,

    /// OpenAI-compatible endpoint settings.
    #[cfg(feature = "openai")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAIConfig>,
}

impl SequorConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TomlParse`] for malformed TOML or out-of-range
    /// values.
    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Merge environment variables into the configuration.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        #[cfg(feature = "openai")]
        {
            self.openai = match self.openai {
                Some(openai) => Some(openai.with_env()),
                None if std::env::var_os("OPENAI_API_KEY").is_some() => {
                    Some(OpenAIConfig::default().with_env())
                }
                None => None,
            };
        }
        self
    }

    /// Validate the configuration and return any issues found.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let run = &self.run;

        if run.max_iterations == 0 {
            issues.push(ConfigIssue::warning(
                "run.max_iterations",
                "Max iterations is 0 and will be treated as 1",
            ));
        }

        if run.timeout.is_zero() {
            issues.push(ConfigIssue::error(
                "run.timeout_secs",
                "Run timeout is 0, every run would time out immediately",
            ));
        }

        if run.max_provider_attempts == 0 {
            issues.push(ConfigIssue::warning(
                "run.max_provider_attempts",
                "Provider attempts is 0 and will be treated as 1",
            ));
        }

        if let Some(tool_timeout) = run.tool_timeout {
            if tool_timeout.is_zero() {
                issues.push(ConfigIssue::error(
                    "run.tool_timeout_secs",
                    "Tool timeout is 0, every tool call would time out",
                ));
            } else if tool_timeout >= run.timeout {
                issues.push(ConfigIssue::warning(
                    "run.tool_timeout_secs",
                    "Tool timeout is not shorter than the run timeout and has no effect",
                ));
            }
        }

        #[cfg(feature = "openai")]
        if let Some(openai) = &self.openai {
            if openai.api_key.is_empty() {
                issues.push(ConfigIssue::warning(
                    "openai.api_key",
                    "No API key is set. Set OPENAI_API_KEY env var.",
                ));
            }
            if !(openai.base_url.starts_with("http://") || openai.base_url.starts_with("https://"))
            {
                issues.push(ConfigIssue::error(
                    "openai.base_url",
                    format!("Base URL '{}' must start with http:// or https://", openai.base_url),
                ));
            }
        }

        issues
    }

    /// Check if the configuration is valid (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|issue| issue.level != IssueLevel::Error)
    }
}

/// Configuration validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Issue severity level.
    pub level: IssueLevel,
    /// Configuration path (e.g., "run.timeout_secs").
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl ConfigIssue {
    /// Create an error-level issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a warning-level issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.level {
            IssueLevel::Error => "ERROR",
            IssueLevel::Warning => "WARN",
        };
        write!(f, "[{}] {}: {}", prefix, self.path, self.message)
    }
}

/// Severity level for configuration issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// Error that prevents runs from behaving sensibly.
    Error,
    /// Warning about potential issues.
    Warning,
}

/// Get the default config directory path.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sequor")
}

/// Get the default config file path.
#[must_use]
pub fn config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from the default path.
///
/// # Errors
///
/// See [`load_config_from`].
pub async fn load_config() -> ConfigResult<SequorConfig> {
    load_config_from(config_path()).await
}

/// Load configuration from a specific path.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_config_from(path: impl AsRef<Path>) -> ConfigResult<SequorConfig> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await? {
        info!(path = %path.display(), "config file not found, using defaults");
        return Ok(SequorConfig::default());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config = SequorConfig::from_toml(&content)?;
    debug!(path = %path.display(), "loaded config file");

    Ok(config)
}

/// Save configuration to a specific path, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub async fn save_config_to(config: &SequorConfig, path: impl AsRef<Path>) -> ConfigResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let content = toml::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    info!(path = %path.display(), "saved config file");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("sequor-config-{}", uuid::Uuid::new_v4().simple()))
            .join(name)
    }

    #[test]
    fn default_paths() {
        assert!(default_config_dir().ends_with(".sequor"));
        assert!(config_path().ends_with("config.toml"));
    }

    #[test]
    fn defaults_are_valid() {
        let config = SequorConfig::default();
        assert_eq!(config.run, RunConfig::default());
        assert!(config.validate().is_empty());
        assert!(config.is_valid());
    }

    #[test]
    fn parses_run_table() {
        let config = SequorConfig::from_toml("[run]\nmax_iterations = 3\ntimeout_secs = 45").unwrap();
        assert_eq!(config.run.max_iterations, 3);
        assert_eq!(config.run.timeout, Duration::from_secs(45));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = SequorConfig::from_toml("[run\nmax_iterations = 3").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    mod validate {
        use super::*;

        #[test]
        fn zero_timeout_is_an_error() {
            let config = SequorConfig {
                run: RunConfig::new().timeout(Duration::ZERO),
                ..SequorConfig::default()
            };
            let issues = config.validate();
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].level, IssueLevel::Error);
            assert_eq!(issues[0].path, "run.timeout_secs");
            assert!(!config.is_valid());
        }

        #[test]
        fn zero_bounds_are_warnings() {
            let config = SequorConfig {
                run: RunConfig::new().max_iterations(0).max_provider_attempts(0),
                ..SequorConfig::default()
            };
            let issues = config.validate();
            assert_eq!(issues.len(), 2);
            assert!(issues.iter().all(|i| i.level == IssueLevel::Warning));
            assert!(config.is_valid());
        }

        #[test]
        fn ineffective_tool_timeout_is_flagged() {
            let config = SequorConfig {
                run: RunConfig::new()
                    .timeout(Duration::from_secs(10))
                    .tool_timeout(Duration::from_secs(30)),
                ..SequorConfig::default()
            };
            let issues = config.validate();
            assert_eq!(issues[0].path, "run.tool_timeout_secs");
            assert_eq!(issues[0].level, IssueLevel::Warning);
        }

        #[cfg(feature = "openai")]
        #[test]
        fn bad_base_url_is_an_error() {
            let config = SequorConfig {
                openai: Some(OpenAIConfig::new("key").with_base_url("localhost:8080")),
                ..SequorConfig::default()
            };
            let issues = config.validate();
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].path, "openai.base_url");
        }

        #[test]
        fn issue_display() {
            let issue = ConfigIssue::warning("run.max_iterations", "too low");
            assert_eq!(issue.to_string(), "[WARN] run.max_iterations: too low");
        }
    }

    mod files {
        use super::*;

        #[tokio::test]
        async fn missing_file_yields_defaults() {
            let config = load_config_from(scratch_path("absent.toml")).await.unwrap();
            assert_eq!(config, SequorConfig::default());
        }

        #[tokio::test]
        async fn save_then_load() {
            let path = scratch_path("config.toml");
            let config = SequorConfig {
                run: RunConfig::new()
                    .max_iterations(4)
                    .tool_timeout(Duration::from_secs(3)),
                ..SequorConfig::default()
            };
            save_config_to(&config, &path).await.unwrap();
            let loaded = load_config_from(&path).await.unwrap();
            assert_eq!(loaded, config);

            if let Some(dir) = path.parent() {
                tokio::fs::remove_dir_all(dir).await.unwrap();
            }
        }
    }
}
