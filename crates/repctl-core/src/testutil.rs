//! In-memory fakes shared by this crate's unit tests. Not exposed outside
//! `#[cfg(test)]` builds.
#![cfg(test)]

use async_trait::async_trait;
use repctl_db::{DbConn, RecoveryType, ReplicationRole, Result as CoreResult, UpstreamGucs};
use repctl_types::{
    AttachState, CheckpointRecord, NodeRecord, NodeType, ReplicationInfo, ShutdownState,
    SystemIdentification,
};
use std::sync::Mutex;

/// An in-process stand-in for a live catalog connection, backed by a
/// `Vec<NodeRecord>` and canned answers for every other query. Tests build
/// one with [`FakeDbConn::with_nodes`] and then poke individual fields.
pub struct FakeDbConn {
    pub nodes: Mutex<Vec<NodeRecord>>,
    pub recovery_type: Mutex<RecoveryType>,
    pub replication_info: Mutex<ReplicationInfo>,
    pub checkpoint: Mutex<CheckpointRecord>,
    pub attach_state: Mutex<AttachState>,
    pub events: Mutex<Vec<(i32, String, bool, String)>>,
    pub fail_create_slot: bool,
    pub server_version: Mutex<u32>,
    pub promotions: Mutex<u32>,
}

impl FakeDbConn {
    pub fn with_nodes(nodes: Vec<NodeRecord>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            recovery_type: Mutex::new(RecoveryType::Standby),
            replication_info: Mutex::new(ReplicationInfo {
                last_wal_receive_lsn: repctl_types::Lsn::ZERO,
                last_wal_replay_lsn: repctl_types::Lsn::ZERO,
                last_wal_flush_lsn: repctl_types::Lsn::ZERO,
                receiving_streamed_wal: true,
                upstream_last_seen: Some(0),
            }),
            checkpoint: Mutex::new(CheckpointRecord {
                last_checkpoint_lsn: repctl_types::Lsn::ZERO,
                shutdown_state: ShutdownState::Running,
            }),
            attach_state: Mutex::new(AttachState::Attached),
            events: Mutex::new(Vec::new()),
            fail_create_slot: false,
            server_version: Mutex::new(160_000),
            promotions: Mutex::new(0),
        }
    }
}

#[async_trait]
impl DbConn for FakeDbConn {
    async fn get_node(&self, id: i32) -> CoreResult<NodeRecord> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.node_id == id)
            .cloned()
            .ok_or(repctl_db::Error::NodeNotFound(id))
    }

    async fn get_node_by_name(&self, name: &str) -> CoreResult<NodeRecord> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.node_name == name)
            .cloned()
            .ok_or_else(|| repctl_db::Error::NodeNameNotFound(name.to_string()))
    }

    async fn get_primary_id(&self) -> CoreResult<i32> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.node_type == NodeType::Primary && n.active)
            .map(|n| n.node_id)
            .ok_or(repctl_db::Error::NoPrimary)
    }

    async fn get_all_nodes(&self) -> CoreResult<Vec<NodeRecord>> {
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn get_active_siblings(&self, of_node_id: i32, excluding_id: i32) -> CoreResult<Vec<NodeRecord>> {
        let nodes = self.nodes.lock().unwrap();
        Ok(nodes
            .iter()
            .filter(|n| n.upstream_node_id == Some(of_node_id) && n.node_id != excluding_id && n.active)
            .cloned()
            .collect())
    }

    async fn create_node(&self, rec: &NodeRecord) -> CoreResult<()> {
        self.nodes.lock().unwrap().push(rec.clone());
        Ok(())
    }

    async fn update_node(&self, rec: &NodeRecord) -> CoreResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(existing) = nodes.iter_mut().find(|n| n.node_id == rec.node_id) {
            *existing = rec.clone();
        }
        Ok(())
    }

    async fn update_node_status(
        &self,
        id: i32,
        node_type: NodeType,
        upstream_node_id: Option<i32>,
        active: bool,
    ) -> CoreResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(n) = nodes.iter_mut().find(|n| n.node_id == id) {
            n.node_type = node_type;
            n.upstream_node_id = upstream_node_id;
            n.active = active;
        }
        Ok(())
    }

    async fn update_node_set_primary(&self, id: i32) -> CoreResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        for n in nodes.iter_mut() {
            if n.node_id == id {
                n.node_type = NodeType::Primary;
                n.upstream_node_id = None;
            }
        }
        Ok(())
    }

    async fn update_slot_name(&self, id: i32, name: &str) -> CoreResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(n) = nodes.iter_mut().find(|n| n.node_id == id) {
            n.slot_name = name.to_string();
        }
        Ok(())
    }

    async fn delete_node(&self, id: i32) -> CoreResult<()> {
        self.nodes.lock().unwrap().retain(|n| n.node_id != id);
        Ok(())
    }

    async fn get_slot(&self, _name: &str) -> CoreResult<Option<repctl_types::ReplicationSlot>> {
        Ok(None)
    }

    async fn create_replication_slot(&self, _name: &str, _upstream_rec: &NodeRecord) -> CoreResult<()> {
        if self.fail_create_slot {
            return Err(repctl_db::Error::MalformedRow("slot creation disabled".to_string()));
        }
        Ok(())
    }

    async fn drop_replication_slot(&self, _name: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn get_replication_info(&self, _role: ReplicationRole) -> CoreResult<ReplicationInfo> {
        Ok(*self.replication_info.lock().unwrap())
    }

    async fn get_recovery_type(&self) -> CoreResult<RecoveryType> {
        Ok(*self.recovery_type.lock().unwrap())
    }

    async fn get_system_identification(&self) -> CoreResult<SystemIdentification> {
        Ok(SystemIdentification {
            system_identifier: 1,
            timeline_id: 1,
        })
    }

    async fn get_checkpoint_record(&self) -> CoreResult<CheckpointRecord> {
        Ok(*self.checkpoint.lock().unwrap())
    }

    async fn is_downstream_attached(&self, _app_name: &str) -> CoreResult<AttachState> {
        Ok(*self.attach_state.lock().unwrap())
    }

    async fn server_version(&self) -> CoreResult<u32> {
        Ok(*self.server_version.lock().unwrap())
    }

    async fn get_upstream_gucs(&self) -> CoreResult<UpstreamGucs> {
        Ok(UpstreamGucs {
            wal_level: "replica".to_string(),
            hot_standby: true,
            max_wal_senders: 10,
            active_wal_senders: 0,
            max_replication_slots: 10,
            active_replication_slots: 0,
            archive_mode: "off".to_string(),
            archive_command: String::new(),
        })
    }

    async fn promote_to_primary(&self) -> CoreResult<()> {
        *self.promotions.lock().unwrap() += 1;
        Ok(())
    }

    async fn record_event(&self, node_id: i32, event_type: &str, success: bool, details: &str) -> CoreResult<()> {
        self.events
            .lock()
            .unwrap()
            .push((node_id, event_type.to_string(), success, details.to_string()));
        Ok(())
    }
}

pub fn sample_node(node_id: i32, node_type: NodeType, upstream: Option<i32>) -> NodeRecord {
    NodeRecord {
        node_id,
        node_name: format!("node{node_id}"),
        node_type,
        upstream_node_id: upstream,
        conninfo: format!("host=node{node_id} user=repl"),
        repluser: "repl".to_string(),
        slot_name: repctl_types::slot_name_for_node(node_id),
        config_file: std::path::PathBuf::from(format!("/etc/repctl/node{node_id}.conf")),
        data_directory: std::path::PathBuf::from("/var/lib/postgresql/data"),
        priority: 100,
        location: "dc1".to_string(),
        active: true,
    }
}
