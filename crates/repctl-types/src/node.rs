use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The persistent identity of a database server in the cluster.
///
/// Every field here is catalog-visible: `register`'s `--wait-sync` polls
/// until a standby's local replica of this struct matches the primary's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Cluster-unique, immutable.
    pub node_id: i32,
    /// Cluster-unique among active rows; used as the replication `application_name`.
    pub node_name: String,
    pub node_type: NodeType,
    /// `None` for the primary or an unknown upstream.
    pub upstream_node_id: Option<i32>,
    /// Client connection string usable by any peer to reach this node.
    pub conninfo: String,
    pub repluser: String,
    /// This node's dedicated replication slot on its upstream; empty if slots are disabled.
    pub slot_name: String,
    pub config_file: PathBuf,
    pub data_directory: PathBuf,
    /// Opaque to the core; preserved for external failover logic.
    pub priority: u32,
    pub location: String,
    pub active: bool,
}

impl NodeRecord {
    /// The fields `register --wait-sync` compares between the local replica
    /// and the primary's row, per spec.md §4.6 step 8.
    pub fn sync_fields_eq(&self, other: &NodeRecord) -> bool {
        self.upstream_node_id == other.upstream_node_id
            && self.node_type == other.node_type
            && self.priority == other.priority
            && self.location == other.location
            && self.active == other.active
            && self.node_name == other.node_name
            && self.conninfo == other.conninfo
            && self.slot_name == other.slot_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    Primary,
    Standby,
    Witness,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeType::Primary => "primary",
            NodeType::Standby => "standby",
            NodeType::Witness => "witness",
        };
        f.write_str(s)
    }
}
