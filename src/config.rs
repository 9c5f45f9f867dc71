//! Settings for the forticfg binary
//!
//! Handles loading and merging settings from multiple sources:
//! - Default values
//! - System settings (/etc/forticfg/forticfg.toml)
//! - User settings (~/.forticfg.toml, ~/.config/forticfg/forticfg.toml)
//! - Project settings (./forticfg.toml)
//! - Environment variables
//!
//! The library never sees this type: it is turned into a [`ConfigPolicy`]
//! and [`CommitOptions`] before any work starts.

use anyhow::{Context, Result};
use forticfg::commit::{CommitOptions, DEFAULT_COMMAND_TIMEOUT};
use forticfg::model::OrderingMode;
use forticfg::policy::ConfigPolicy;
use forticfg::retry::{BackoffStrategy, JitterStrategy, RetryPolicy, DEFAULT_RETRY_CODES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file name
const FILE_NAME: &str = "forticfg.toml";

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Table ordering and ignored attributes
    pub policy: PolicyConfig,

    /// Commit behaviour
    pub commit: CommitConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// `[policy]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Start from the FortiOS conventions
    pub fortios_defaults: bool,

    /// Tables whose entry order is significant
    pub sequenced_tables: Vec<String>,

    /// Tables whose entry order is irrelevant
    pub keyed_tables: Vec<String>,

    /// Device-generated attributes to drop
    pub ignored_attributes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            fortios_defaults: true,
            sequenced_tables: vec![],
            keyed_tables: vec![],
            ignored_attributes: vec![],
        }
    }
}

/// `[commit]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Per-command timeout in seconds
    pub timeout_secs: u64,

    /// Retries for transient rejections
    pub max_retries: u32,

    /// Vendor status codes treated as transient
    pub retry_codes: Vec<i32>,

    /// First retry delay in milliseconds
    pub retry_delay_ms: u64,

    /// Best-effort commit without rollback
    pub force: bool,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            max_retries: 5,
            retry_codes: DEFAULT_RETRY_CODES.to_vec(),
            retry_delay_ms: 200,
            force: false,
        }
    }
}

/// `[output]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Coloured terminal output
    pub color: bool,

    /// Spaces per nesting level in rendered scripts
    pub indent: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            indent: 4,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `-v` is not given
    pub level: Option<String>,
}

impl Config {
    /// Load settings from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of settings file paths to check, lowest priority first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }
        if let Ok(env_config) = std::env::var("FORTICFG_CONFIG") {
            return vec![PathBuf::from(env_config)];
        }

        let mut paths = vec![PathBuf::from("/etc/forticfg").join(FILE_NAME)];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".forticfg.toml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("forticfg").join(FILE_NAME));
        }

        paths.push(PathBuf::from(FILE_NAME));
        paths
    }

    /// Merge settings from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let file_config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; lists accumulate, the other
    /// config's non-default scalars win
    fn merge(&self, other: Config) -> Config {
        let defaults = Config::default();

        let mut sequenced = self.policy.sequenced_tables.clone();
        sequenced.extend(other.policy.sequenced_tables);
        let mut keyed = self.policy.keyed_tables.clone();
        keyed.extend(other.policy.keyed_tables);
        let mut ignored = self.policy.ignored_attributes.clone();
        ignored.extend(other.policy.ignored_attributes);

        Config {
            policy: PolicyConfig {
                fortios_defaults: other.policy.fortios_defaults,
                sequenced_tables: sequenced,
                keyed_tables: keyed,
                ignored_attributes: ignored,
            },
            commit: CommitConfig {
                timeout_secs: if other.commit.timeout_secs != defaults.commit.timeout_secs {
                    other.commit.timeout_secs
                } else {
                    self.commit.timeout_secs
                },
                max_retries: if other.commit.max_retries != defaults.commit.max_retries {
                    other.commit.max_retries
                } else {
                    self.commit.max_retries
                },
                retry_codes: if other.commit.retry_codes != defaults.commit.retry_codes {
                    other.commit.retry_codes
                } else {
                    self.commit.retry_codes.clone()
                },
                retry_delay_ms: if other.commit.retry_delay_ms != defaults.commit.retry_delay_ms {
                    other.commit.retry_delay_ms
                } else {
                    self.commit.retry_delay_ms
                },
                force: other.commit.force || self.commit.force,
            },
            output: OutputConfig {
                color: other.output.color && self.output.color,
                indent: if other.output.indent != defaults.output.indent {
                    other.output.indent
                } else {
                    self.output.indent
                },
            },
            logging: LoggingConfig {
                level: other.logging.level.or_else(|| self.logging.level.clone()),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // FORTICFG_TIMEOUT
        if let Ok(timeout) = std::env::var("FORTICFG_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.commit.timeout_secs = n;
            }
        }

        // FORTICFG_MAX_RETRIES
        if let Ok(retries) = std::env::var("FORTICFG_MAX_RETRIES") {
            if let Ok(n) = retries.parse() {
                self.commit.max_retries = n;
            }
        }

        // FORTICFG_FORCE
        if let Ok(force) = std::env::var("FORTICFG_FORCE") {
            self.commit.force = !matches!(force.as_str(), "" | "0" | "false" | "no");
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() || std::env::var("FORTICFG_NO_COLOR").is_ok() {
            self.output.color = false;
        }

        // FORTICFG_LOG_LEVEL
        if let Ok(level) = std::env::var("FORTICFG_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
    }

    /// The table and attribute conventions to parse and diff with
    pub fn to_policy(&self) -> ConfigPolicy {
        let mut policy = if self.policy.fortios_defaults {
            ConfigPolicy::fortios()
        } else {
            ConfigPolicy::new()
        };
        for name in &self.policy.sequenced_tables {
            policy = policy.with_table(name.as_str(), OrderingMode::Sequenced);
        }
        for name in &self.policy.keyed_tables {
            policy = policy.with_table(name.as_str(), OrderingMode::Keyed);
        }
        for name in &self.policy.ignored_attributes {
            policy = policy.with_ignored(name.as_str());
        }
        policy
    }

    /// Timeouts, retries and force mode for commits
    pub fn to_commit_options(&self) -> CommitOptions {
        let retry = if self.commit.max_retries == 0 {
            RetryPolicy::no_retry()
        } else {
            RetryPolicy::builder()
                .max_retries(self.commit.max_retries)
                .initial_delay(Duration::from_millis(self.commit.retry_delay_ms))
                .backoff(BackoffStrategy::Exponential { multiplier: 2.0 })
                .jitter(JitterStrategy::Equal)
                .retry_codes(self.commit.retry_codes.iter().copied())
                .build()
        };

        CommitOptions::default()
            .with_timeout(Duration::from_secs(self.commit.timeout_secs))
            .with_retry(retry)
            .with_force(self.commit.force)
    }

    /// Load from a specific file only
    #[allow(dead_code)]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.policy.fortios_defaults);
        assert_eq!(config.commit.timeout_secs, 30);
        assert_eq!(config.commit.retry_codes, vec![-3, -23]);
        assert_eq!(config.output.indent, 4);
        assert!(!config.commit.force);
    }

    #[test]
    fn test_config_merge() {
        let base = Config::default();
        let other = Config {
            commit: CommitConfig {
                timeout_secs: 10,
                ..CommitConfig::default()
            },
            policy: PolicyConfig {
                sequenced_tables: vec!["router access-list".to_string()],
                ..PolicyConfig::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.commit.timeout_secs, 10);
        assert_eq!(merged.policy.sequenced_tables, vec!["router access-list"]);
    }

    #[test]
    fn test_from_file_and_policy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[policy]
fortios_defaults = false
keyed_tables = ["firewall policy"]
ignored_attributes = ["uuid"]

[commit]
timeout_secs = 5
max_retries = 0
force = true
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        let policy = config.to_policy();
        assert_eq!(policy.table_mode("firewall policy"), Some(OrderingMode::Keyed));
        assert!(policy.is_ignored("uuid"));
        assert!(!policy.is_ignored("snmp-index"));

        let options = config.to_commit_options();
        assert_eq!(options.command_timeout, Duration::from_secs(5));
        assert_eq!(options.retry.max_retries, 0);
        assert!(options.force);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("FORTICFG_MAX_RETRIES", "9");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.commit.max_retries, 9);
        std::env::remove_var("FORTICFG_MAX_RETRIES");
    }
}
