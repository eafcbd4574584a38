//! Runtime configuration.
//!
//! [`CordConfig`] serializes to TOML; every field has a compile-time
//! default, so a missing file or a partial file both work. Layering
//! is: defaults ← file ← `CORD_*` environment variables (applied by
//! the front end via [`CordConfig::apply_env`]) ← CLI flags.
//!
//! # Defaults
//!
//! | key | default |
//! |-----|---------|
//! | `pipeline.window_ms` | 1000 |
//! | `pipeline.deadline_secs` | 60 |
//! | `pipeline.settle_ms` | 1000 |
//! | `kernel.default_language` | `"csharp"` |
//! | `viewer.base_url` | `"https://localhost:3978"` |
//! | `log.level` | `"info"` |
//! | `log.file` | unset |
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`ConfigError::Io`] | `CONFIG_IO` | Yes |
//! | [`ConfigError::Parse`] | `CONFIG_PARSE` | No |

use std::path::{Path, PathBuf};
use std::time::Duration;

use cord_types::{ErrorCode, SubmissionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration load error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CONFIG_IO",
            Self::Parse(_) => "CONFIG_PARSE",
        }
    }

    fn is_recoverable(&self) -> bool {
        // a missing file may appear; a malformed one must be fixed
        matches!(self, Self::Io(_))
    }
}

/// Main configuration structure.
///
/// # Example
///
/// ```
/// use cord_runtime::CordConfig;
///
/// let config = CordConfig::default();
/// assert_eq!(config.pipeline.window_ms, 1000);
/// assert_eq!(config.kernel.default_language, "csharp");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CordConfig {
    /// Batching and delivery timing.
    pub pipeline: PipelineConfig,

    /// Execution engine settings.
    pub kernel: KernelConfig,

    /// External viewer settings.
    pub viewer: ViewerConfig,

    /// Logging settings.
    pub log: LogConfig,
}

impl CordConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a config file, layering it over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&text)?)
    }

    /// Deserializes from a TOML string. Missing keys fall back to
    /// their defaults section-wise.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML for this
    /// schema.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serializes to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Applies `CORD_*` environment variable overrides.
    ///
    /// Recognized variables: `CORD_WINDOW_MS`, `CORD_DEADLINE_SECS`,
    /// `CORD_SETTLE_MS`, `CORD_DEFAULT_LANGUAGE`,
    /// `CORD_VIEWER_BASE_URL`, `CORD_LOG_LEVEL`, `CORD_LOG_FILE`.
    /// Unparsable numeric values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_u64("CORD_WINDOW_MS") {
            self.pipeline.window_ms = v;
        }
        if let Some(v) = env_u64("CORD_DEADLINE_SECS") {
            self.pipeline.deadline_secs = v;
        }
        if let Some(v) = env_u64("CORD_SETTLE_MS") {
            self.pipeline.settle_ms = v;
        }
        if let Ok(v) = std::env::var("CORD_DEFAULT_LANGUAGE") {
            self.kernel.default_language = v;
        }
        if let Ok(v) = std::env::var("CORD_VIEWER_BASE_URL") {
            self.viewer.base_url = v;
        }
        if let Ok(v) = std::env::var("CORD_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("CORD_LOG_FILE") {
            self.log.file = Some(PathBuf::from(v));
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

/// Batching and delivery timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Batch window in milliseconds.
    pub window_ms: u64,

    /// Per-submission deadline in seconds.
    pub deadline_secs: u64,

    /// Delay before the terminal notice, in milliseconds.
    pub settle_ms: u64,
}

impl PipelineConfig {
    /// Batch window as a [`Duration`].
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Deadline as a [`Duration`].
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Settle delay as a [`Duration`].
    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            deadline_secs: 60,
            settle_ms: 1000,
        }
    }
}

/// Execution engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Language seeded into a conversation when the bot joins.
    pub default_language: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_language: "csharp".to_string(),
        }
    }
}

/// External viewer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Base URL of the viewer deployment.
    pub base_url: String,
}

impl ViewerConfig {
    /// Builds the viewer link for one submission.
    #[must_use]
    pub fn executor_url(&self, id: SubmissionId) -> String {
        format!("{}/executor?Token={id}", self.base_url.trim_end_matches('/'))
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:3978".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default `EnvFilter` directive, e.g. `"info"` or
    /// `"cord_runtime=debug"`.
    pub level: String,

    /// Optional log file; terminal-only when unset.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_table() {
        let config = CordConfig::default();
        assert_eq!(config.pipeline.window_ms, 1000);
        assert_eq!(config.pipeline.deadline_secs, 60);
        assert_eq!(config.pipeline.settle_ms, 1000);
        assert_eq!(config.kernel.default_language, "csharp");
        assert_eq!(config.viewer.base_url, "https://localhost:3978");
        assert_eq!(config.log.level, "info");
        assert!(config.log.file.is_none());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = CordConfig::default();
        config.pipeline.deadline_secs = 180;
        config.viewer.base_url = "https://cord.example".into();

        let toml = config.to_toml().unwrap();
        let back = CordConfig::from_toml(&toml).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = CordConfig::from_toml("[pipeline]\nwindow_ms = 250\n").unwrap();
        assert_eq!(config.pipeline.window_ms, 250);
        assert_eq!(config.pipeline.deadline_secs, 60);
        assert_eq!(config.kernel.default_language, "csharp");
    }

    #[test]
    fn duration_helpers() {
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.window(), Duration::from_secs(1));
        assert_eq!(pipeline.deadline(), Duration::from_secs(60));
        assert_eq!(pipeline.settle(), Duration::from_secs(1));
    }

    #[test]
    fn executor_url_embeds_the_token() {
        let viewer = ViewerConfig {
            base_url: "https://cord.example/".into(),
        };
        let id = SubmissionId::new();
        assert_eq!(
            viewer.executor_url(id),
            format!("https://cord.example/executor?Token={id}")
        );
    }

    #[test]
    fn misspelled_section_leaves_the_real_one_at_default() {
        let config = CordConfig::from_toml("[pipelin]\nwindow_ms = 1\n").unwrap();
        assert_eq!(config.pipeline.window_ms, 1000);
    }
}
