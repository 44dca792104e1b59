use crate::Lsn;
use serde::{Deserialize, Serialize};

/// An instantaneous replication snapshot queried from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationInfo {
    pub last_wal_receive_lsn: Lsn,
    pub last_wal_replay_lsn: Lsn,
    pub last_wal_flush_lsn: Lsn,
    /// As opposed to replaying from an archive.
    pub receiving_streamed_wal: bool,
    /// Seconds since last contact with upstream; `None` if never contacted
    /// or not currently a standby.
    pub upstream_last_seen: Option<u64>,
}

/// The database cluster's immutable 64-bit system identifier and current timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemIdentification {
    pub system_identifier: u64,
    pub timeline_id: u32,
}
