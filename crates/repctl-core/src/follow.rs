//! `standby follow`: repoints a standby's recovery configuration at a new
//! upstream and waits for the primary daemon (if any) to resume streaming.

use crate::error::{Error, Result};
use repctl_db::DbConn;
use repctl_recovery::{RecoveryParams, RecoveryWriter};
use repctl_types::NodeRecord;
use tracing::info;

pub struct FollowRequest {
    pub new_upstream: NodeRecord,
    pub params: RecoveryParams,
}

/// Writes the new recovery configuration pointing this standby at
/// `req.new_upstream`, updates the catalog's `upstream_node_id`, and
/// records a `standby_follow` event. Does not restart the database itself
/// (callers run that over the transport before/after as appropriate).
pub async fn follow(
    conn: &dyn DbConn,
    writer: &RecoveryWriter,
    local: &NodeRecord,
    req: &FollowRequest,
) -> Result<()> {
    writer
        .write(local, &req.params)
        .map_err(|e| Error::Follow(e.to_string()))?;

    conn.update_node_status(
        local.node_id,
        local.node_type,
        Some(req.new_upstream.node_id),
        local.active,
    )
    .await?;
    conn.record_event(
        local.node_id,
        "standby_follow",
        true,
        &format!("now following node {}", req.new_upstream.node_id),
    )
    .await
    .ok();
    info!(
        node_id = local.node_id,
        new_upstream = req.new_upstream.node_id,
        "standby now following new upstream"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_node, FakeDbConn};
    use repctl_recovery::Features;
    use repctl_types::NodeType;

    fn params() -> RecoveryParams {
        RecoveryParams {
            upstream_conninfo: vec![("host".to_string(), "node1".to_string())],
            node_name: "node2".to_string(),
            passfile: None,
            password: None,
            slot_name: Some("repmgr_slot_2".to_string()),
            min_apply_delay: None,
            restore_command: None,
            archive_cleanup_command: None,
        }
    }

    #[tokio::test]
    async fn follow_repoints_upstream_and_records_event() {
        let conn = FakeDbConn::with_nodes(vec![
            sample_node(1, NodeType::Primary, None),
            sample_node(3, NodeType::Primary, None),
            sample_node(2, NodeType::Standby, Some(1)),
        ]);
        let writer = RecoveryWriter::new(Features::for_version(140001), true, true);
        let local = sample_node(2, NodeType::Standby, Some(1));
        let new_upstream = sample_node(3, NodeType::Primary, None);
        let req = FollowRequest {
            new_upstream: new_upstream.clone(),
            params: params(),
        };
        follow(&conn, &writer, &local, &req).await.unwrap();
        let rec = conn.get_node(2).await.unwrap();
        assert_eq!(rec.upstream_node_id, Some(3));
        assert_eq!(conn.events.lock().unwrap().last().unwrap().1, "standby_follow");
    }
}
