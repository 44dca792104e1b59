use crate::error::Result;
use async_trait::async_trait;
use repctl_types::{
    AttachState, CheckpointRecord, NodeRecord, NodeType, ReplicationInfo, ReplicationSlot,
    SystemIdentification,
};

/// What `GetRecoveryType` reports about whatever database the connection
/// points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryType {
    Primary,
    Standby,
    Unknown,
}

/// Re-exported alias; `IsDownstreamAttached` returns the same tri-state the
/// node-check protocol uses for attach status.
pub type SiblingAttachState = AttachState;

/// The role a connection was opened to fulfil, used only for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationRole {
    Primary,
    Standby,
}

/// Raw GUCs and activity counts a clone precondition check needs off the
/// upstream (spec.md §4.5 step 4). Kept as raw values rather than
/// pre-computed booleans so the core can weigh them against the requested
/// WAL method and slot policy itself.
#[derive(Debug, Clone)]
pub struct UpstreamGucs {
    pub wal_level: String,
    pub hot_standby: bool,
    pub max_wal_senders: i32,
    pub active_wal_senders: i32,
    pub max_replication_slots: i32,
    pub active_replication_slots: i32,
    pub archive_mode: String,
    pub archive_command: String,
}

/// Every operation the core needs against a live database connection:
/// catalog lookups/updates (always issued against the primary) and
/// direct database introspection (issued against whichever node is
/// connected, which may or may not be the primary).
///
/// Object-safe so the core can hold `Box<dyn DbConn>` for several
/// simultaneously open connections (one per node under consideration).
#[async_trait]
pub trait DbConn: Send + Sync {
    // --- Catalog lookups ---
    async fn get_node(&self, id: i32) -> Result<NodeRecord>;
    async fn get_node_by_name(&self, name: &str) -> Result<NodeRecord>;
    async fn get_primary_id(&self) -> Result<i32>;
    async fn get_all_nodes(&self) -> Result<Vec<NodeRecord>>;
    async fn get_active_siblings(&self, of_node_id: i32, excluding_id: i32) -> Result<Vec<NodeRecord>>;

    // --- Catalog mutations ---
    async fn create_node(&self, rec: &NodeRecord) -> Result<()>;
    async fn update_node(&self, rec: &NodeRecord) -> Result<()>;
    async fn update_node_status(
        &self,
        id: i32,
        node_type: NodeType,
        upstream_node_id: Option<i32>,
        active: bool,
    ) -> Result<()>;
    async fn update_node_set_primary(&self, id: i32) -> Result<()>;
    async fn update_slot_name(&self, id: i32, name: &str) -> Result<()>;
    async fn delete_node(&self, id: i32) -> Result<()>;

    // --- Replication slots ---
    async fn get_slot(&self, name: &str) -> Result<Option<ReplicationSlot>>;
    async fn create_replication_slot(&self, name: &str, upstream_rec: &NodeRecord) -> Result<()>;
    async fn drop_replication_slot(&self, name: &str) -> Result<()>;

    // --- Direct database introspection ---
    async fn get_replication_info(&self, role: ReplicationRole) -> Result<ReplicationInfo>;
    async fn get_recovery_type(&self) -> Result<RecoveryType>;
    async fn get_system_identification(&self) -> Result<SystemIdentification>;
    async fn get_checkpoint_record(&self) -> Result<CheckpointRecord>;
    async fn is_downstream_attached(&self, app_name: &str) -> Result<SiblingAttachState>;

    /// `SHOW server_version_num`: the version-dispatch table everything
    /// under `repctl_recovery::Features` keys off.
    async fn server_version(&self) -> Result<u32>;

    /// The GUCs/activity counts a clone precondition check needs (spec.md
    /// §4.5 step 4): wal_level, hot_standby, WAL sender headroom,
    /// replication slot headroom, and archiving configuration.
    async fn get_upstream_gucs(&self) -> Result<UpstreamGucs>;

    /// `SELECT pg_promote()`: the in-SQL promotion mechanism, available on
    /// versions >= 12 (spec.md §4.8 step 2).
    async fn promote_to_primary(&self) -> Result<()>;

    /// Appends a row to the events log (spec.md §6 persisted state: `{node_id,
    /// event_type, timestamp, success, details}`). Best-effort: callers must
    /// not fail the enclosing operation if this fails.
    async fn record_event(&self, node_id: i32, event_type: &str, success: bool, details: &str) -> Result<()>;
}
