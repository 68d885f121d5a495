//! Configuration
//!
//! Defaults, optionally overlaid by a JSON file named in `ROOSTDB_CONFIG`,
//! then by individual `ROOSTDB_*` environment variables.

use crate::aof::SyncPolicy;
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable naming a JSON config file
pub const CONFIG_FILE_ENV: &str = "ROOSTDB_CONFIG";

/// Default commit log location
pub const DEFAULT_AOF_PATH: &str = "roostdb.aof";

/// Storage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Commit log location; `None` keeps everything in memory
    pub aof_path: Option<PathBuf>,
    pub sync_policy: SyncPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            aof_path: Some(PathBuf::from(DEFAULT_AOF_PATH)),
            sync_policy: SyncPolicy::default(),
        }
    }
}

/// Process configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen address
    pub server_address: String,

    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,

    /// Lifetime of issued session tokens
    pub session_ttl_secs: u64,

    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_address: "127.0.0.1:8080".to_string(),
            log_filter: "info".to_string(),
            session_ttl_secs: 15 * 60,
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load from the process environment
    pub fn load() -> anyhow::Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load from an explicit variable set
    pub fn from_vars(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        let mut config = match vars.get(CONFIG_FILE_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        if let Some(addr) = vars.get("ROOSTDB_SERVER_ADDRESS") {
            config.server_address = addr.clone();
        }
        if let Some(filter) = vars.get("ROOSTDB_LOG") {
            config.log_filter = filter.clone();
        }
        if let Some(ttl) = vars.get("ROOSTDB_SESSION_TTL_SECS") {
            config.session_ttl_secs = ttl
                .parse()
                .with_context(|| format!("invalid ROOSTDB_SESSION_TTL_SECS '{}'", ttl))?;
        }
        if let Some(path) = vars.get("ROOSTDB_AOF_PATH") {
            // An empty value disables the commit log
            config.store.aof_path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(policy) = vars.get("ROOSTDB_SYNC_POLICY") {
            config.store.sync_policy = policy.parse().map_err(anyhow::Error::msg)?;
        }

        config.session_ttl()?;
        Ok(config)
    }

    /// Session lifetime, rejecting values `chrono` cannot represent
    pub fn session_ttl(&self) -> anyhow::Result<chrono::Duration> {
        i64::try_from(self.session_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .with_context(|| format!("session TTL of {}s is out of range", self.session_ttl_secs))
    }

    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {:?}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid config file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.server_address, "127.0.0.1:8080");
        assert_eq!(config.store.aof_path, Some(PathBuf::from("roostdb.aof")));
        assert_eq!(config.store.sync_policy, SyncPolicy::EverySecond);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_vars(&vars(&[
            ("ROOSTDB_SERVER_ADDRESS", "0.0.0.0:9000"),
            ("ROOSTDB_AOF_PATH", ""),
            ("ROOSTDB_SYNC_POLICY", "always"),
            ("ROOSTDB_LOG", "roostdb=debug"),
        ]))
        .unwrap();

        assert_eq!(config.server_address, "0.0.0.0:9000");
        assert_eq!(config.store.aof_path, None);
        assert_eq!(config.store.sync_policy, SyncPolicy::Always);
        assert_eq!(config.log_filter, "roostdb=debug");
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roostdb.json");
        std::fs::write(
            &path,
            r#"{ "server_address": "10.0.0.1:80", "store": { "sync_policy": "no" } }"#,
        )
        .unwrap();

        let config = Config::from_vars(&vars(&[
            (CONFIG_FILE_ENV, path.to_str().unwrap()),
            ("ROOSTDB_SESSION_TTL_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.server_address, "10.0.0.1:80");
        assert_eq!(config.store.sync_policy, SyncPolicy::No);
        assert_eq!(config.store.aof_path, Some(PathBuf::from(DEFAULT_AOF_PATH)));
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(Config::from_vars(&vars(&[("ROOSTDB_SYNC_POLICY", "often")])).is_err());
        assert!(Config::from_vars(&vars(&[("ROOSTDB_SESSION_TTL_SECS", "soon")])).is_err());
    }

    #[test]
    fn test_session_ttl_range() {
        let config = Config::from_vars(&vars(&[("ROOSTDB_SESSION_TTL_SECS", "90")])).unwrap();
        assert_eq!(config.session_ttl().unwrap(), chrono::Duration::seconds(90));

        for huge in ["18446744073709551615", "9223372036854775807"] {
            let err = Config::from_vars(&vars(&[("ROOSTDB_SESSION_TTL_SECS", huge)])).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{}", err);
        }
    }

    #[test]
    fn test_null_aof_path_disables_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roostdb.json");
        std::fs::write(&path, r#"{ "store": { "aof_path": null } }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.store.aof_path, None);
        assert_eq!(config.store.sync_policy, SyncPolicy::EverySecond);
    }
}
