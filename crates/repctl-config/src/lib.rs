//! Node configuration and the operation-scoped context threaded through
//! every subsystem.
//!
//! Configuration is loaded from, in increasing precedence:
//! 1. Built-in defaults
//! 2. `~/.config/repctl/config.toml` (user defaults)
//! 3. `repctl.toml` (the `-f <config-file>` project/node config)
//! 4. `repctl.local.toml` (gitignored local overrides)
//! 5. `REPCTL_*` environment variables

mod context;
mod error;
mod loader;
mod paths;

pub use context::{Context, Voice};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The contents of a node's `repctl.toml`: its own identity plus the
/// operational thresholds and timeouts every subsystem consults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepctlConfig {
    pub node_id: i32,
    pub node_name: String,
    pub conninfo: String,
    pub data_directory: PathBuf,
    pub repluser: String,
    pub pg_bindir: PathBuf,
    pub ssh: SshConfig,
    pub thresholds: ThresholdConfig,
    pub timeouts: TimeoutConfig,
    pub log_level: String,
    pub event_notification_command: Option<String>,
    /// Whether replication slots are part of this cluster's topology
    /// (spec.md §3/§4.5 step 6) — a property of the cluster, not of any
    /// one invocation's flags.
    pub use_replication_slots: bool,
    /// Present when standbys in this cluster are cloned from a managed
    /// backup catalog rather than streamed directly from the upstream.
    pub backup_catalog: Option<BackupCatalogConfig>,
}

impl Default for RepctlConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            node_name: String::new(),
            conninfo: String::new(),
            data_directory: PathBuf::new(),
            repluser: "repl".to_string(),
            pg_bindir: PathBuf::new(),
            ssh: SshConfig::default(),
            thresholds: ThresholdConfig::default(),
            timeouts: TimeoutConfig::default(),
            log_level: "notice".to_string(),
            event_notification_command: None,
            use_replication_slots: true,
            backup_catalog: None,
        }
    }
}

/// Shell commands that drive the catalog-backup clone mode (spec.md §4.5):
/// `list_command` prints the line-oriented backup listing, and
/// `restore_command` (templated with `{backup_id}`/`{destination}`)
/// restores the chosen one into place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupCatalogConfig {
    pub list_command: String,
    pub restore_command: String,
    pub wal_directory: Option<PathBuf>,
}

impl Default for BackupCatalogConfig {
    fn default() -> Self {
        Self {
            list_command: String::new(),
            restore_command: String::new(),
            wal_directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub remote_user: String,
    pub port: Option<u16>,
    pub extra_options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            remote_user: "postgres".to_string(),
            port: None,
            extra_options: Vec::new(),
        }
    }
}

/// Warning/critical pairs for the checks the switchover precheck and
/// node-check protocol perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub replication_lag_warning_secs: u64,
    pub replication_lag_critical_secs: u64,
    pub archive_ready_warning: u32,
    pub archive_ready_critical: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            replication_lag_warning_secs: 60,
            replication_lag_critical_secs: 300,
            archive_ready_warning: 16,
            archive_ready_critical: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub promote_check_timeout_secs: u64,
    pub promote_check_interval_secs: u64,
    pub standby_reconnect_timeout_secs: u64,
    pub shutdown_check_timeout_secs: u64,
    pub wal_receive_check_timeout_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            promote_check_timeout_secs: 60,
            promote_check_interval_secs: 2,
            standby_reconnect_timeout_secs: 60,
            shutdown_check_timeout_secs: 30,
            wal_receive_check_timeout_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn promote_check_timeout(&self) -> Duration {
        Duration::from_secs(self.promote_check_timeout_secs)
    }

    pub fn promote_check_interval(&self) -> Duration {
        Duration::from_secs(self.promote_check_interval_secs)
    }

    pub fn standby_reconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.standby_reconnect_timeout_secs)
    }
}

impl RepctlConfig {
    pub fn load(config_file: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        ConfigLoader::new().with_config_file(config_file).load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_thresholds() {
        let config = RepctlConfig::default();
        assert_eq!(config.thresholds.replication_lag_warning_secs, 60);
        assert_eq!(config.ssh.remote_user, "postgres");
        assert_eq!(config.log_level, "notice");
    }
}
