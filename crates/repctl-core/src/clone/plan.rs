//! Shared types between the direct and catalog-backup clone algorithms.

use repctl_db::UpstreamGucs;
use repctl_types::NodeRecord;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CloneRequest {
    pub destination_data_directory: PathBuf,
    /// Connection used to probe/introspect before choosing the upstream;
    /// may differ from the eventual upstream (spec.md §4.5 step 2).
    pub source_conninfo: String,
    /// Explicit upstream override; `None` means "use the primary".
    pub upstream_node_id: Option<i32>,
    pub force: bool,
    pub fast_checkpoint: bool,
    pub verify_backup: bool,
    /// `old=new` pairs passed straight through to the base-backup utility.
    pub tablespace_mappings: Vec<(String, String)>,
    pub copy_external_config_files: Option<ExternalConfigMode>,
    pub use_replication_slot: bool,
    pub wal_method: WalMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalConfigMode {
    SamePath,
    Pgdata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalMethod {
    Stream,
    Fetch,
}

impl WalMethod {
    pub fn as_basebackup_flag(self) -> &'static str {
        match self {
            WalMethod::Stream => "stream",
            WalMethod::Fetch => "fetch",
        }
    }

    /// spec.md §4.5 step 4: 1 sender if fetching, 2 if streaming
    /// concurrently with the base backup itself.
    pub fn required_wal_senders(self) -> u32 {
        match self {
            WalMethod::Fetch => 1,
            WalMethod::Stream => 2,
        }
    }
}

/// Everything read off the upstream before attempting a base backup
/// (spec.md §4.5 step 4). Each `bool` is already the pass/fail verdict;
/// the raw settings live with whichever subsystem queried them.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamConfigCheck {
    pub wal_level_sufficient: bool,
    pub enough_free_wal_senders: bool,
    pub max_replication_slots_ok: bool,
    pub archive_command_configured_if_archiving: bool,
    pub hot_standby_enabled: bool,
    pub enough_free_replication_connections: bool,
}

impl UpstreamConfigCheck {
    pub fn failures(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.wal_level_sufficient {
            out.push("wal_level is not sufficient for hot standby / logical replication");
        }
        if !self.enough_free_wal_senders {
            out.push("not enough free WAL sender slots on the upstream");
        }
        if !self.max_replication_slots_ok {
            out.push("max_replication_slots is 0 but replication slots are enabled");
        }
        if !self.archive_command_configured_if_archiving {
            out.push("archiving is enabled but archive_command is empty");
        }
        if !self.hot_standby_enabled {
            out.push("hot_standby is not enabled on the upstream");
        }
        if !self.enough_free_replication_connections {
            out.push("not enough free replication connections available");
        }
        out
    }

    pub fn is_ok(&self) -> bool {
        self.failures().is_empty()
    }

    /// Turns the raw GUCs/activity counts from [`UpstreamGucs`] into the
    /// pass/fail verdicts this struct reports, weighed against what `req`
    /// is actually asking the clone to do (spec.md §4.5 step 4).
    pub fn from_gucs(gucs: &UpstreamGucs, req: &CloneRequest) -> Self {
        let required_senders = i32::try_from(req.wal_method.required_wal_senders()).unwrap_or(i32::MAX);
        let free_wal_senders = (gucs.max_wal_senders - gucs.active_wal_senders).max(0);
        let free_replication_slots = (gucs.max_replication_slots - gucs.active_replication_slots).max(0);
        Self {
            wal_level_sufficient: matches!(gucs.wal_level.as_str(), "replica" | "logical" | "hot_standby"),
            enough_free_wal_senders: free_wal_senders >= required_senders,
            max_replication_slots_ok: !req.use_replication_slot || free_replication_slots > 0,
            archive_command_configured_if_archiving: gucs.archive_mode != "on" || !gucs.archive_command.trim().is_empty(),
            hot_standby_enabled: gucs.hot_standby,
            // One sender of headroom beyond what the backup itself needs,
            // so a concurrent admin/monitoring connection isn't starved.
            enough_free_replication_connections: free_wal_senders > required_senders,
        }
    }
}

/// Resolution of spec.md §4.5 step 3: the node actually being cloned from
/// is tracked separately from the node whose recovery config we end up
/// writing (they coincide in the common case).
#[derive(Debug, Clone)]
pub struct ResolvedUpstream {
    pub record: NodeRecord,
}

#[derive(Debug, Clone)]
pub struct CloneOutcome {
    pub recovery: repctl_recovery::WriteOutcome,
    pub slot_created: Option<String>,
    pub duration: Duration,
}
