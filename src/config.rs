//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Outbound channel settings
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Workflow definition file
    #[serde(default = "default_workflow_file")]
    pub workflow_file: PathBuf,
}

fn default_workflow_file() -> PathBuf {
    PathBuf::from(".chatflow/workflow.json")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            engine: EngineConfig::default(),
            channel: ChannelConfig::default(),
            workflow_file: default_workflow_file(),
        }
    }
}

/// Engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Idle window after which a session is evicted on lookup
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Jump budget for jump steps without their own
    #[serde(default = "default_max_jumps")]
    pub max_jumps: u32,

    /// Button label of list prompts generated from oversized option sets
    #[serde(default = "default_list_button")]
    pub list_button: String,
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_max_jumps() -> u32 {
    10
}

fn default_list_button() -> String {
    "Select".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            idle_timeout: default_idle_timeout(),
            max_jumps: default_max_jumps(),
            list_button: default_list_button(),
        }
    }
}

/// Outbound channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelConfig {
    /// WhatsApp Cloud API
    Whatsapp {
        #[serde(default = "default_api_url")]
        api_url: String,
        /// Sender phone number id; `${VAR}` values resolve from the
        /// environment
        phone_number_id: String,
        /// Bearer token; `${VAR}` values resolve from the environment
        token: String,
    },
    /// Print to stdout (local simulation)
    Console,
}

fn default_api_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig::Console
    }
}

/// Resolve `${VAR}` values from the environment; anything else passes
/// through, including an unset variable reference.
pub fn resolve_env(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

impl Config {
    /// Load configuration from file or default locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(|| {
            let local = PathBuf::from(".chatflow/config.toml");
            if local.exists() {
                return Some(local);
            }
            dirs::home_dir().map(|h| h.join(".chatflow/config.toml"))
        });

        match config_path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(&p)?;
                let config: Config = toml::from_str(&content)?;
                Ok(config)
            }
            _ => Ok(Config::default()),
        }
    }
}

/// Initialize the .chatflow directory with a default config.
pub fn init() -> Result<()> {
    let dir = PathBuf::from(".chatflow");

    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }

    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        let default_config = Config::default();
        let config_str = toml::to_string_pretty(&default_config)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(&config_path, config_str)?;
    }

    Ok(())
}

// Custom serde module for Duration using humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
