use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::commands::retry::RetryPolicy;
use crate::panel::server::parse_server_list;
use crate::security::token_cache::{TokenSource, DEFAULT_TOKEN_ENV};

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Environment variable the bearer token is read from on every call
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Inline token; takes precedence over `token_env`
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Normalized control API base URLs
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub hide_ban_creator: bool,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            token: None,
            servers: Vec::new(),
            hide_ban_creator: false,
            retry: RetryPolicy::default(),
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl PanelConfig {
    /// Load from a JSON file. `servers` may be a list or a comma-separated
    /// string.
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let mut cfg: serde_json::Value = serde_json::from_str(&raw).context("parsing JSON")?;

        let servers = match cfg.get("servers") {
            Some(serde_json::Value::String(s)) => parse_server_list(s),
            Some(serde_json::Value::Array(items)) => {
                let joined = items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                parse_server_list(&joined)
            }
            _ => Vec::new(),
        };
        if let Some(obj) = cfg.as_object_mut() {
            obj.remove("servers");
        }

        let mut typed: PanelConfig = serde_json::from_value(cfg).context("mapping to PanelConfig")?;
        typed.servers = servers;
        Ok(typed)
    }

    /// Build from environment variables only.
    ///
    /// - `OP_FW_SERVERS`: comma-separated server list
    /// - `HIDE_BAN_CREATOR`: hide staff names in kick reasons
    /// - `OP_FW_RETRY_ATTEMPTS`, `OP_FW_RETRY_DELAY_MS`: retry overrides
    /// - `OP_FW_TIMEOUT_SECS`: default request timeout
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// Overlay environment variables that are set.
    pub fn apply_env(&mut self) {
        if let Ok(servers) = std::env::var("OP_FW_SERVERS") {
            self.servers = parse_server_list(&servers);
        }
        if let Some(hide) = env_flag("HIDE_BAN_CREATOR") {
            self.hide_ban_creator = hide;
        }
        if let Some(attempts) = env_parse::<u32>("OP_FW_RETRY_ATTEMPTS") {
            self.retry.attempts = attempts;
        }
        if let Some(delay) = env_parse::<u64>("OP_FW_RETRY_DELAY_MS") {
            self.retry.delay_ms = delay;
        }
        if let Some(timeout) = env_parse::<u64>("OP_FW_TIMEOUT_SECS") {
            self.default_timeout_secs = timeout;
        }
    }

    pub fn token_source(&self) -> TokenSource {
        match &self.token {
            Some(token) if !token.is_empty() => TokenSource::fixed(token.clone()),
            _ => TokenSource::env(self.token_env.clone()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone()
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn first_server(&self) -> Option<&str> {
        self.servers.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "servers": "c3s1.example.net, c3s2.example.net/op-framework/",
                "hide_ban_creator": true,
                "retry": {{"attempts": 3}},
                "default_timeout_secs": 5
            }}"#
        )
        .unwrap();

        let config = PanelConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(
            config.servers,
            vec![
                "https://c3s1.example.net/op-framework/".to_string(),
                "https://c3s2.example.net/op-framework/".to_string(),
            ]
        );
        assert!(config.hide_ban_creator);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.delay_ms, 2000);
        assert_eq!(config.default_timeout(), Duration::from_secs(5));
        assert_eq!(config.token_env, "OP_FW_TOKEN");
    }

    #[test]
    fn test_servers_as_list() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"servers": ["a.example.net", "", "b.example.net"]}}"#).unwrap();

        let config = PanelConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.first_server(), Some("https://a.example.net/op-framework/"));
    }

    #[test]
    fn test_config_missing_file() {
        let result = PanelConfig::from_file("/nonexistent/path/config.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{invalid json").unwrap();

        let result = PanelConfig::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn inline_token_takes_precedence() {
        let cfg = PanelConfig {
            token: Some("inline".into()),
            ..PanelConfig::default()
        };
        assert!(matches!(cfg.token_source(), TokenSource::Cached(_)));

        let cfg = PanelConfig {
            token_env: "CUSTOM_TOKEN".into(),
            ..PanelConfig::default()
        };
        assert!(matches!(cfg.token_source(), TokenSource::Env(ref v) if v == "CUSTOM_TOKEN"));
    }

    #[test]
    fn default_matches_retry_constants() {
        let cfg = PanelConfig::default();
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.default_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn retry_overrides_from_env() {
        std::env::set_var("OP_FW_RETRY_ATTEMPTS", "3");
        std::env::set_var("OP_FW_RETRY_DELAY_MS", "0");
        let cfg = PanelConfig::from_env();
        std::env::remove_var("OP_FW_RETRY_ATTEMPTS");
        std::env::remove_var("OP_FW_RETRY_DELAY_MS");

        assert_eq!(cfg.retry.attempts, 3);
        assert_eq!(cfg.retry.delay_ms, 0);
        assert_eq!(cfg.retry_policy().delay(), Duration::ZERO);
        assert!(!cfg.retry.stop_on_auth_error);
    }
}
