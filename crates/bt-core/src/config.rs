use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{NotificationSettings, TeamConfig};

/// Top-level configuration loaded from `~/.botteam/config.toml`.
///
/// This struct never stores API keys. The executor credential is read from
/// the environment variable named by `executor.api_key_env`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub team: TeamSection,
    #[serde(default)]
    pub discussion: DiscussionConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    /// Load config from `~/.botteam/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.team.validate()?;
        self.discussion.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        botteam_home().join("config.toml")
    }
}

fn botteam_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".botteam")
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `"human"` or `"json"`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.log_format.as_str() {
            "human" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "general.log_format must be 'human' or 'json', got '{}'",
                other
            ))),
        }
    }
}

fn default_project_name() -> String {
    "botteam".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "human".into()
}

/// `[team]`: seeds the persisted [`TeamConfig`] on first run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_concurrent_bots")]
    pub max_concurrent_bots: usize,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_true")]
    pub allow_duplicate_specializations: bool,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default = "default_true")]
    pub notify_on_complete: bool,
    #[serde(default = "default_true")]
    pub notify_on_error: bool,
}

impl Default for TeamSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent_bots: default_max_concurrent_bots(),
            default_model: default_model(),
            allow_duplicate_specializations: true,
            project_path: None,
            notify_on_complete: true,
            notify_on_error: true,
        }
    }
}

impl TeamSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_bots == 0 {
            return Err(ConfigError::Validation(
                "team.max_concurrent_bots must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_team_config(&self) -> TeamConfig {
        TeamConfig {
            enabled: self.enabled,
            max_concurrent_bots: self.max_concurrent_bots,
            notifications: NotificationSettings {
                on_complete: self.notify_on_complete,
                on_error: self.notify_on_error,
                on_discussion: true,
            },
            project_path: self.project_path.clone(),
        }
    }
}

fn default_max_concurrent_bots() -> usize {
    3
}
fn default_model() -> String {
    "claude-sonnet".into()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscussionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_typing_min")]
    pub typing_delay_min_ms: u64,
    #[serde(default = "default_typing_max")]
    pub typing_delay_max_ms: u64,
    /// Most-recent messages sent as context to each conversational call.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_true")]
    pub follow_up_round: bool,
    #[serde(default = "default_max_responders")]
    pub max_responders: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_chat_max_tokens")]
    pub max_tokens: u32,
}

impl Default for DiscussionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            typing_delay_min_ms: default_typing_min(),
            typing_delay_max_ms: default_typing_max(),
            context_window: default_context_window(),
            follow_up_round: true,
            max_responders: default_max_responders(),
            temperature: default_temperature(),
            max_tokens: default_chat_max_tokens(),
        }
    }
}

impl DiscussionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.typing_delay_min_ms > self.typing_delay_max_ms {
            return Err(ConfigError::Validation(format!(
                "discussion.typing_delay_min_ms ({}) exceeds typing_delay_max_ms ({})",
                self.typing_delay_min_ms, self.typing_delay_max_ms
            )));
        }
        if !(1..=2).contains(&self.max_responders) {
            return Err(ConfigError::Validation(format!(
                "discussion.max_responders must be 1 or 2, got {}",
                self.max_responders
            )));
        }
        if self.context_window == 0 {
            return Err(ConfigError::Validation(
                "discussion.context_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_typing_min() -> u64 {
    1500
}
fn default_typing_max() -> u64 {
    3500
}
fn default_context_window() -> usize {
    6
}
fn default_max_responders() -> usize {
    2
}
fn default_temperature() -> f32 {
    0.8
}
fn default_chat_max_tokens() -> u32 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }
}

fn default_store_path() -> String {
    "~/.botteam/state".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_url")]
    pub base_url: String,
    #[serde(default = "default_executor_timeout")]
    pub timeout_secs: u64,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: default_executor_url(),
            timeout_secs: default_executor_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_executor_url() -> String {
    "http://127.0.0.1:8787".into()
}
fn default_executor_timeout() -> u64 {
    300
}
fn default_api_key_env() -> String {
    "BOTTEAM_API_KEY".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    /// Prometheus text file rewritten on every stats tick. Off when unset.
    #[serde(default)]
    pub metrics_path: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval(),
            metrics_path: None,
        }
    }
}

impl DaemonConfig {
    pub fn resolved_metrics_path(&self) -> Option<PathBuf> {
        self.metrics_path.as_deref().map(expand_home)
    }
}

fn default_stats_interval() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/var/lib/bt"), PathBuf::from("/var/lib/bt"));
    }

    #[test]
    fn team_section_seeds_team_config() {
        let section = TeamSection {
            max_concurrent_bots: 5,
            notify_on_error: false,
            ..TeamSection::default()
        };
        let team = section.to_team_config();
        assert_eq!(team.max_concurrent_bots, 5);
        assert!(!team.notifications.on_error);
        assert!(team.enabled);
    }
}
