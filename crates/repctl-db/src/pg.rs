use crate::conn::{DbConn, RecoveryType, ReplicationRole, SiblingAttachState, UpstreamGucs};
use crate::error::{Error, Result};
use async_trait::async_trait;
use repctl_types::{
    AttachState, CheckpointRecord, NodeRecord, NodeType, ReplicationInfo, ReplicationSlot,
    ShutdownState, SystemIdentification,
};
use tokio_postgres::{Client, NoTls, Row};
use tracing::warn;

/// A catalog connection backed by a single direct `tokio_postgres` client.
///
/// No pooling: `repctl` is a short-lived process that opens one connection
/// per node it needs to talk to for the duration of a single command, so a
/// pool would only add bookkeeping this client never recoups.
pub struct PgCatalog {
    client: Client,
}

impl PgCatalog {
    /// Connects using `conninfo` (a canonical `key=value` connection string)
    /// and spawns the connection's I/O driver onto the current runtime.
    pub async fn connect(conninfo: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(conninfo, NoTls)
            .await
            .map_err(Error::Connect)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection driver exited with an error");
            }
        });

        Ok(PgCatalog { client })
    }

    fn row_to_node(row: &Row) -> Result<NodeRecord> {
        let node_type_str: String = row.try_get("type").map_err(Error::Query)?;
        let node_type = match node_type_str.as_str() {
            "primary" => NodeType::Primary,
            "standby" => NodeType::Standby,
            "witness" => NodeType::Witness,
            other => return Err(Error::MalformedRow(format!("unknown node type {other:?}"))),
        };
        Ok(NodeRecord {
            node_id: row.try_get("node_id").map_err(Error::Query)?,
            node_name: row.try_get("node_name").map_err(Error::Query)?,
            node_type,
            upstream_node_id: row.try_get("upstream_node_id").map_err(Error::Query)?,
            conninfo: row.try_get("conninfo").map_err(Error::Query)?,
            repluser: row.try_get("repluser").map_err(Error::Query)?,
            slot_name: row.try_get("slot_name").map_err(Error::Query)?,
            config_file: row
                .try_get::<_, String>("config_file")
                .map_err(Error::Query)?
                .into(),
            data_directory: row
                .try_get::<_, String>("data_directory")
                .map_err(Error::Query)?
                .into(),
            priority: {
                let p: i32 = row.try_get("priority").map_err(Error::Query)?;
                p.max(0) as u32
            },
            location: row.try_get("location").map_err(Error::Query)?,
            active: row.try_get("active").map_err(Error::Query)?,
        })
    }
}

#[async_trait]
impl DbConn for PgCatalog {
    async fn get_node(&self, id: i32) -> Result<NodeRecord> {
        let row = self
            .client
            .query_opt("SELECT * FROM repmgr.nodes WHERE node_id = $1", &[&id])
            .await
            .map_err(Error::Query)?
            .ok_or(Error::NodeNotFound(id))?;
        Self::row_to_node(&row)
    }

    async fn get_node_by_name(&self, name: &str) -> Result<NodeRecord> {
        let row = self
            .client
            .query_opt("SELECT * FROM repmgr.nodes WHERE node_name = $1", &[&name])
            .await
            .map_err(Error::Query)?
            .ok_or_else(|| Error::NodeNameNotFound(name.to_string()))?;
        Self::row_to_node(&row)
    }

    async fn get_primary_id(&self) -> Result<i32> {
        let row = self
            .client
            .query_opt(
                "SELECT node_id FROM repmgr.nodes WHERE type = 'primary' AND active",
                &[],
            )
            .await
            .map_err(Error::Query)?
            .ok_or(Error::NoPrimary)?;
        row.try_get("node_id").map_err(Error::Query)
    }

    async fn get_all_nodes(&self) -> Result<Vec<NodeRecord>> {
        let rows = self
            .client
            .query("SELECT * FROM repmgr.nodes ORDER BY node_id", &[])
            .await
            .map_err(Error::Query)?;
        rows.iter().map(Self::row_to_node).collect()
    }

    async fn get_active_siblings(&self, of_node_id: i32, excluding_id: i32) -> Result<Vec<NodeRecord>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM repmgr.nodes \
                 WHERE upstream_node_id = $1 AND node_id != $2 AND active \
                 ORDER BY node_id",
                &[&of_node_id, &excluding_id],
            )
            .await
            .map_err(Error::Query)?;
        rows.iter().map(Self::row_to_node).collect()
    }

    async fn create_node(&self, rec: &NodeRecord) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO repmgr.nodes \
                 (node_id, node_name, type, upstream_node_id, conninfo, repluser, \
                  slot_name, config_file, data_directory, priority, location, active) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
                &[
                    &rec.node_id,
                    &rec.node_name,
                    &rec.node_type.to_string(),
                    &rec.upstream_node_id,
                    &rec.conninfo,
                    &rec.repluser,
                    &rec.slot_name,
                    &rec.config_file.to_string_lossy().into_owned(),
                    &rec.data_directory.to_string_lossy().into_owned(),
                    &(rec.priority as i32),
                    &rec.location,
                    &rec.active,
                ],
            )
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn update_node(&self, rec: &NodeRecord) -> Result<()> {
        self.client
            .execute(
                "UPDATE repmgr.nodes SET \
                 node_name = $2, type = $3, upstream_node_id = $4, conninfo = $5, \
                 repluser = $6, slot_name = $7, config_file = $8, data_directory = $9, \
                 priority = $10, location = $11, active = $12 \
                 WHERE node_id = $1",
                &[
                    &rec.node_id,
                    &rec.node_name,
                    &rec.node_type.to_string(),
                    &rec.upstream_node_id,
                    &rec.conninfo,
                    &rec.repluser,
                    &rec.slot_name,
                    &rec.config_file.to_string_lossy().into_owned(),
                    &rec.data_directory.to_string_lossy().into_owned(),
                    &(rec.priority as i32),
                    &rec.location,
                    &rec.active,
                ],
            )
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn update_node_status(
        &self,
        id: i32,
        node_type: NodeType,
        upstream_node_id: Option<i32>,
        active: bool,
    ) -> Result<()> {
        self.client
            .execute(
                "UPDATE repmgr.nodes SET type = $2, upstream_node_id = $3, active = $4 \
                 WHERE node_id = $1",
                &[&id, &node_type.to_string(), &upstream_node_id, &active],
            )
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn update_node_set_primary(&self, id: i32) -> Result<()> {
        self.client
            .execute(
                "UPDATE repmgr.nodes SET type = 'primary', upstream_node_id = NULL \
                 WHERE node_id = $1",
                &[&id],
            )
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn update_slot_name(&self, id: i32, name: &str) -> Result<()> {
        self.client
            .execute(
                "UPDATE repmgr.nodes SET slot_name = $2 WHERE node_id = $1",
                &[&id, &name],
            )
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn delete_node(&self, id: i32) -> Result<()> {
        self.client
            .execute("DELETE FROM repmgr.nodes WHERE node_id = $1", &[&id])
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn get_slot(&self, name: &str) -> Result<Option<ReplicationSlot>> {
        let row = self
            .client
            .query_opt(
                "SELECT slot_name, active FROM pg_replication_slots WHERE slot_name = $1",
                &[&name],
            )
            .await
            .map_err(Error::Query)?;
        row.map(|r| {
            Ok(ReplicationSlot {
                slot_name: r.try_get("slot_name").map_err(Error::Query)?,
                active: r.try_get("active").map_err(Error::Query)?,
            })
        })
        .transpose()
    }

    async fn create_replication_slot(&self, name: &str, _upstream_rec: &NodeRecord) -> Result<()> {
        self.client
            .execute(
                "SELECT pg_create_physical_replication_slot($1)",
                &[&name],
            )
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn drop_replication_slot(&self, name: &str) -> Result<()> {
        let row = self.get_slot(name).await?;
        if row.is_none() {
            return Err(Error::SlotNotFound(name.to_string()));
        }
        self.client
            .execute("SELECT pg_drop_replication_slot($1)", &[&name])
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn get_replication_info(&self, _role: ReplicationRole) -> Result<ReplicationInfo> {
        let row = self
            .client
            .query_one(
                "SELECT pg_last_wal_receive_lsn()::text AS receive_lsn, \
                        pg_last_wal_replay_lsn()::text AS replay_lsn, \
                        pg_current_wal_flush_lsn()::text AS flush_lsn",
                &[],
            )
            .await
            .map_err(Error::Query)?;
        let parse_lsn = |col: &str| -> repctl_types::Lsn {
            row.try_get::<_, Option<String>>(col)
                .ok()
                .flatten()
                .and_then(|v| v.parse().ok())
                .unwrap_or(repctl_types::Lsn(0))
        };
        Ok(ReplicationInfo {
            last_wal_receive_lsn: parse_lsn("receive_lsn"),
            last_wal_replay_lsn: parse_lsn("replay_lsn"),
            last_wal_flush_lsn: parse_lsn("flush_lsn"),
            receiving_streamed_wal: true,
            upstream_last_seen: None,
        })
    }

    async fn get_recovery_type(&self) -> Result<RecoveryType> {
        let row = self
            .client
            .query_one("SELECT pg_is_in_recovery() AS in_recovery", &[])
            .await
            .map_err(Error::Query)?;
        let in_recovery: bool = row.try_get("in_recovery").map_err(Error::Query)?;
        Ok(if in_recovery {
            RecoveryType::Standby
        } else {
            RecoveryType::Primary
        })
    }

    async fn get_system_identification(&self) -> Result<SystemIdentification> {
        let row = self
            .client
            .query_one(
                "SELECT system_identifier, timeline_id FROM pg_control_system()",
                &[],
            )
            .await
            .map_err(Error::Query)?;
        let system_identifier: i64 = row.try_get("system_identifier").map_err(Error::Query)?;
        let timeline_id: i32 = row.try_get("timeline_id").map_err(Error::Query)?;
        Ok(SystemIdentification {
            system_identifier: system_identifier as u64,
            timeline_id: timeline_id as u32,
        })
    }

    async fn get_checkpoint_record(&self) -> Result<CheckpointRecord> {
        let row = self
            .client
            .query_one(
                "SELECT checkpoint_lsn::text AS checkpoint_lsn FROM pg_control_checkpoint()",
                &[],
            )
            .await
            .map_err(Error::Query)?;
        let lsn_str: String = row.try_get("checkpoint_lsn").map_err(Error::Query)?;
        Ok(CheckpointRecord {
            last_checkpoint_lsn: lsn_str.parse().unwrap_or(repctl_types::Lsn(0)),
            shutdown_state: ShutdownState::Unknown,
        })
    }

    async fn is_downstream_attached(&self, app_name: &str) -> Result<SiblingAttachState> {
        let row = self
            .client
            .query_opt(
                "SELECT state FROM pg_stat_replication WHERE application_name = $1",
                &[&app_name],
            )
            .await
            .map_err(Error::Query)?;
        Ok(match row {
            Some(r) => {
                let state: String = r.try_get("state").unwrap_or_default();
                if state.is_empty() {
                    AttachState::Unknown
                } else {
                    AttachState::Attached
                }
            }
            None => AttachState::NotAttached,
        })
    }

    async fn server_version(&self) -> Result<u32> {
        let row = self
            .client
            .query_one("SHOW server_version_num", &[])
            .await
            .map_err(Error::Query)?;
        let raw: String = row.try_get(0).map_err(Error::Query)?;
        raw.parse()
            .map_err(|_| Error::MalformedRow(format!("server_version_num {raw:?} was not an integer")))
    }

    async fn get_upstream_gucs(&self) -> Result<UpstreamGucs> {
        let row = self
            .client
            .query_one(
                "SELECT \
                    current_setting('wal_level') AS wal_level, \
                    current_setting('hot_standby') = 'on' AS hot_standby, \
                    current_setting('max_wal_senders')::int AS max_wal_senders, \
                    current_setting('max_replication_slots')::int AS max_replication_slots, \
                    current_setting('archive_mode') AS archive_mode, \
                    current_setting('archive_command') AS archive_command, \
                    (SELECT count(*)::int FROM pg_stat_replication) AS active_wal_senders, \
                    (SELECT count(*)::int FROM pg_replication_slots) AS active_replication_slots",
                &[],
            )
            .await
            .map_err(Error::Query)?;
        Ok(UpstreamGucs {
            wal_level: row.try_get("wal_level").map_err(Error::Query)?,
            hot_standby: row.try_get("hot_standby").map_err(Error::Query)?,
            max_wal_senders: row.try_get("max_wal_senders").map_err(Error::Query)?,
            active_wal_senders: row.try_get("active_wal_senders").map_err(Error::Query)?,
            max_replication_slots: row.try_get("max_replication_slots").map_err(Error::Query)?,
            active_replication_slots: row.try_get("active_replication_slots").map_err(Error::Query)?,
            archive_mode: row.try_get("archive_mode").map_err(Error::Query)?,
            archive_command: row.try_get("archive_command").map_err(Error::Query)?,
        })
    }

    async fn promote_to_primary(&self) -> Result<()> {
        self.client
            .query_one("SELECT pg_promote()", &[])
            .await
            .map_err(Error::Query)?;
        Ok(())
    }

    async fn record_event(&self, node_id: i32, event_type: &str, success: bool, details: &str) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO repmgr.events (node_id, event_type, event_timestamp, successful, details) \
                 VALUES ($1, $2, now(), $3, $4)",
                &[&node_id, &event_type, &success, &details],
            )
            .await
            .map_err(Error::Query)?;
        Ok(())
    }
}
