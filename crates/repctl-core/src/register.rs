//! Adds (or updates) a standby's row in the cluster catalog.

use crate::error::{Error, Result};
use repctl_db::DbConn;
use repctl_types::{AttachState, NodeRecord, NodeType};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub record: NodeRecord,
    pub force: bool,
    pub wait_sync: Option<std::time::Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    RegisteredSyncPending,
}

/// `standby register`, per spec.md §4.6.
///
/// `local` is the connection to the node being registered (may be absent —
/// callers pass `None` when `--force` was given and primary parameters were
/// supplied directly); `primary` is always required.
pub async fn register(
    local: Option<&dyn DbConn>,
    primary: &dyn DbConn,
    req: &RegisterRequest,
) -> Result<RegisterOutcome> {
    let rec = &req.record;

    if let Ok(existing) = primary.get_node_by_name(&rec.node_name).await {
        if existing.node_id != rec.node_id {
            return Err(Error::Config(format!(
                "node_name {:?} is already registered under node_id {}",
                rec.node_name, existing.node_id
            )));
        }
    }

    let existing_by_id = primary.get_node(rec.node_id).await.ok();
    if existing_by_id.is_some() && !req.force {
        return Err(Error::Config(format!(
            "node_id {} is already registered (use --force to update)",
            rec.node_id
        )));
    }

    if let Some(upstream_id) = rec.upstream_node_id {
        if upstream_id == rec.node_id {
            return Err(Error::Config("a node cannot follow itself".to_string()));
        }
        match primary.get_node(upstream_id).await {
            Ok(upstream) if !upstream.active && !req.force => {
                return Err(Error::Config(format!(
                    "upstream node {upstream_id} is not active (use --force to register anyway)"
                )));
            }
            Ok(_) => {}
            Err(_) if req.force => {
                warn!(upstream_id, "upstream not yet registered, proceeding under --force");
            }
            Err(e) => return Err(e.into()),
        }

        if let (Some(local), Ok(upstream)) = (local, primary.get_node(upstream_id).await) {
            match local.is_downstream_attached(&rec.node_name).await {
                Ok(AttachState::NotAttached) => {
                    return Err(Error::Config(format!(
                        "{} is not attached to upstream {} per its replication activity",
                        rec.node_name, upstream.node_name
                    )));
                }
                Ok(_) | Err(_) => {}
            }
        }
    }

    if existing_by_id.is_some() {
        primary.update_node(rec).await?;
    } else {
        primary.create_node(rec).await?;
    }
    primary
        .record_event(rec.node_id, "standby_register", true, "registered via standby register")
        .await
        .ok();
    info!(node_id = rec.node_id, node_name = %rec.node_name, "registered standby");

    let Some(timeout) = req.wait_sync else {
        return Ok(RegisterOutcome::Registered);
    };
    let Some(local) = local else {
        return Ok(RegisterOutcome::Registered);
    };

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(local_rec) = local.get_node(rec.node_id).await {
            if local_rec.sync_fields_eq(rec) {
                return Ok(RegisterOutcome::Registered);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            primary
                .record_event(
                    rec.node_id,
                    "standby_register_sync",
                    false,
                    "timed out waiting for catalog replica to converge",
                )
                .await
                .ok();
            return Ok(RegisterOutcome::RegisteredSyncPending);
        }
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
}

/// `standby unregister`, per spec.md §4.7. The target must be a standby;
/// primary removal is a separate operation outside this crate's scope.
pub async fn unregister(primary: &dyn DbConn, node_id: i32) -> Result<()> {
    let rec = primary.get_node(node_id).await?;
    if rec.node_type != NodeType::Standby {
        return Err(Error::Config(format!(
            "node {node_id} is a {}, not a standby; unregister only removes standbys",
            rec.node_type
        )));
    }
    primary.delete_node(node_id).await?;
    primary
        .record_event(node_id, "standby_unregister", true, "removed via standby unregister")
        .await
        .ok();
    info!(node_id, "unregistered standby");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_node, FakeDbConn};

    #[tokio::test]
    async fn registers_new_node_against_primary() {
        let primary = FakeDbConn::with_nodes(vec![sample_node(1, NodeType::Primary, None)]);
        let rec = sample_node(2, NodeType::Standby, Some(1));
        let req = RegisterRequest {
            record: rec.clone(),
            force: false,
            wait_sync: None,
        };
        let outcome = register(None, &primary, &req).await.unwrap();
        assert_eq!(outcome, RegisterOutcome::Registered);
        assert!(primary.get_node(2).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_duplicate_node_id_without_force() {
        let primary = FakeDbConn::with_nodes(vec![
            sample_node(1, NodeType::Primary, None),
            sample_node(2, NodeType::Standby, Some(1)),
        ]);
        let req = RegisterRequest {
            record: sample_node(2, NodeType::Standby, Some(1)),
            force: false,
            wait_sync: None,
        };
        let err = register(None, &primary, &req).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn rejects_name_collision_across_different_ids() {
        let primary = FakeDbConn::with_nodes(vec![
            sample_node(1, NodeType::Primary, None),
            sample_node(2, NodeType::Standby, Some(1)),
        ]);
        let mut rec = sample_node(3, NodeType::Standby, Some(1));
        rec.node_name = "node2".to_string();
        let req = RegisterRequest {
            record: rec,
            force: false,
            wait_sync: None,
        };
        let err = register(None, &primary, &req).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn unregister_removes_standby_and_rejects_primary() {
        let primary = FakeDbConn::with_nodes(vec![
            sample_node(1, NodeType::Primary, None),
            sample_node(2, NodeType::Standby, Some(1)),
        ]);
        unregister(&primary, 2).await.unwrap();
        assert!(primary.get_node(2).await.is_err());

        let err = unregister(&primary, 1).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
