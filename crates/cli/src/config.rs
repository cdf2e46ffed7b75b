//! Configuration management for the CLI
//!
//! Settings are layered: built-in defaults, then an optional JSON config
//! file, then `POD_KILLER_*` environment variables. Command-line flags
//! are applied on top by the individual commands.

use anyhow::{Context, Result};
use killer_lib::safety::{DEFAULT_PROTECTED_NAMESPACES, DEFAULT_PROTECTED_OWNER_KINDS};
use killer_lib::{ProtectionPolicy, RemovalMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "POD_KILLER";

/// Pod killer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillerConfig {
    /// Namespace to select from
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Targeting label selector; empty targets every pod
    #[serde(default)]
    pub selector: String,

    /// Owner kinds whose pods are never disrupted
    #[serde(default = "default_protected_owner_kinds")]
    pub protected_owner_kinds: Vec<String>,

    /// Namespaces whose pods are never disrupted
    #[serde(default = "default_protected_namespaces")]
    pub protected_namespaces: Vec<String>,

    /// Removal mode (delete or evict)
    #[serde(default)]
    pub mode: RemovalMode,

    /// Select without removing
    #[serde(default)]
    pub dry_run: bool,

    /// Deadline for each API call in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_protected_owner_kinds() -> Vec<String> {
    DEFAULT_PROTECTED_OWNER_KINDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_protected_namespaces() -> Vec<String> {
    DEFAULT_PROTECTED_NAMESPACES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for KillerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            selector: String::new(),
            protected_owner_kinds: default_protected_owner_kinds(),
            protected_namespaces: default_protected_namespaces(),
            mode: RemovalMode::default(),
            dry_run: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl KillerConfig {
    /// Load configuration from file and environment
    ///
    /// An explicitly given file must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, ENV_PREFIX)
    }

    fn load_with_env(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();

        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path().ok(),
        };
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(path.is_some()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(prefix)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("protected_owner_kinds")
                .with_list_parse_key("protected_namespaces"),
        );

        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("pod-killer").join("config.json"))
    }

    pub fn protection(&self) -> ProtectionPolicy {
        ProtectionPolicy::new(
            self.protected_owner_kinds.iter().cloned(),
            self.protected_namespaces.iter().cloned(),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = KillerConfig::default();
        assert_eq!(config.namespace, "default");
        assert!(config.selector.is_empty());
        assert_eq!(config.mode, RemovalMode::Delete);
        assert_eq!(config.timeout(), Duration::from_secs(10));

        let policy = config.protection();
        assert!(policy.owner_kinds.contains("DaemonSet"));
        assert!(policy.namespaces.contains("kube-system"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"namespace": "shop", "selector": "app=web", "mode": "evict",
                "protected_namespaces": ["payments"]}}"#
        )
        .unwrap();

        let config = KillerConfig::load_with_env(Some(file.path()), "POD_KILLER_TEST_FILE").unwrap();
        assert_eq!(config.namespace, "shop");
        assert_eq!(config.selector, "app=web");
        assert_eq!(config.mode, RemovalMode::Evict);
        assert_eq!(config.protected_namespaces, vec!["payments".to_string()]);
        assert_eq!(config.protected_owner_kinds, vec!["DaemonSet".to_string()]);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(KillerConfig::load_with_env(Some(&missing), "POD_KILLER_TEST_MISSING").is_err());
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("POD_KILLER_TEST_ENV_NAMESPACE", "staging");
        std::env::set_var("POD_KILLER_TEST_ENV_PROTECTED_NAMESPACES", "kube-system,infra");
        std::env::set_var("POD_KILLER_TEST_ENV_DRY_RUN", "true");

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, "{}").unwrap();

        let config = KillerConfig::load_with_env(Some(&file), "POD_KILLER_TEST_ENV").unwrap();
        assert_eq!(config.namespace, "staging");
        assert!(config.dry_run);
        assert_eq!(
            config.protected_namespaces,
            vec!["kube-system".to_string(), "infra".to_string()]
        );
    }
}
