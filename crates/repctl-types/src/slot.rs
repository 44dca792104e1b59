use serde::{Deserialize, Serialize};

/// A replication slot as it exists inside the database right now (transient —
/// never itself persisted in the cluster catalog, only referenced by name
/// from [`crate::NodeRecord::slot_name`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationSlot {
    pub slot_name: String,
    /// A consumer is currently streaming from this slot.
    pub active: bool,
}

/// The result of asking the database's replication-activity view whether a
/// given `application_name` is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachState {
    Attached,
    NotAttached,
    Unknown,
}
