//! Promotes the local standby to primary, per spec.md §4.8.

use crate::error::{Error, Result};
use repctl_config::TimeoutConfig;
use repctl_db::{DbConn, RecoveryType};
use tracing::{info, warn};

/// How the promotion was actually carried out, tried in this order.
#[derive(Debug, Clone)]
pub enum PromotionMechanism {
    /// Operator-supplied shell command, run via the caller's transport.
    ServiceCommand(String),
    /// `SELECT pg_promote()` (or equivalent), versions >= 12 only.
    SqlPromote,
    /// The service-control layer's own `promote` action.
    ServiceControlAction,
}

/// Picks the mechanism spec.md §4.8 step 1 prescribes: operator override >
/// in-SQL promote (if available) > service-control action.
pub fn choose_mechanism(
    service_command: Option<String>,
    has_sql_promote_function: bool,
) -> PromotionMechanism {
    if let Some(cmd) = service_command {
        return PromotionMechanism::ServiceCommand(cmd);
    }
    if has_sql_promote_function {
        return PromotionMechanism::SqlPromote;
    }
    PromotionMechanism::ServiceControlAction
}

#[derive(Debug, Clone)]
pub struct PromotionPreconditions {
    pub is_standby: bool,
    pub replay_safe_to_promote: bool,
    pub no_other_active_primary: bool,
    pub enough_wal_senders_and_slots: bool,
}

impl PromotionPreconditions {
    pub fn failures(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.is_standby {
            out.push("local node is not a standby");
        }
        if !self.replay_safe_to_promote {
            out.push("WAL replay is paused in a way that would delay promotion");
        }
        if !self.no_other_active_primary {
            out.push("another active primary already exists in the cluster");
        }
        if !self.enough_wal_senders_and_slots {
            out.push("not enough free WAL senders/replication slots for sibling standbys");
        }
        out
    }
}

pub struct PromoteRequest {
    pub node_id: i32,
    pub siblings_follow: bool,
}

/// Runs the mechanism, then polls `GetRecoveryType` until the node reports
/// PRIMARY or the timeout elapses (spec.md §4.8 steps 2-4).
pub async fn promote(
    conn: &dyn DbConn,
    mechanism: &PromotionMechanism,
    invoke: impl FnOnce(&PromotionMechanism) -> std::result::Result<(), String>,
    timeouts: &TimeoutConfig,
    req: &PromoteRequest,
) -> Result<()> {
    if let Err(detail) = invoke(mechanism) {
        conn.record_event(req.node_id, "standby_promote", false, &detail).await.ok();
        return Err(Error::Promotion(detail));
    }

    let deadline = tokio::time::Instant::now() + timeouts.promote_check_timeout();
    loop {
        match conn.get_recovery_type().await {
            Ok(RecoveryType::Primary) => break,
            _ => {}
        }
        if tokio::time::Instant::now() >= deadline {
            let detail = "timed out waiting for node to report PRIMARY".to_string();
            conn.record_event(req.node_id, "standby_promote", false, &detail).await.ok();
            return Err(Error::Promotion(detail));
        }
        tokio::time::sleep(timeouts.promote_check_interval()).await;
    }

    conn.update_node_set_primary(req.node_id).await?;
    conn.record_event(req.node_id, "standby_promote", true, "promoted to primary").await.ok();
    info!(node_id = req.node_id, "promotion succeeded");

    if req.siblings_follow {
        info!(node_id = req.node_id, "siblings-follow requested; caller should now run sibling reconfiguration");
    }
    Ok(())
}

pub fn check_preconditions(p: &PromotionPreconditions) -> Result<()> {
    let failures = p.failures();
    if failures.is_empty() {
        Ok(())
    } else {
        warn!(?failures, "promotion preconditions not satisfied");
        Err(Error::Promotion(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_node, FakeDbConn};
    use repctl_types::NodeType;

    fn timeouts() -> TimeoutConfig {
        TimeoutConfig {
            promote_check_timeout_secs: 1,
            promote_check_interval_secs: 0,
            standby_reconnect_timeout_secs: 1,
            shutdown_check_timeout_secs: 1,
            wal_receive_check_timeout_secs: 1,
        }
    }

    #[test]
    fn service_command_override_wins() {
        let m = choose_mechanism(Some("custom".to_string()), true);
        assert!(matches!(m, PromotionMechanism::ServiceCommand(_)));
    }

    #[test]
    fn sql_promote_preferred_over_service_control() {
        let m = choose_mechanism(None, true);
        assert!(matches!(m, PromotionMechanism::SqlPromote));
        let m = choose_mechanism(None, false);
        assert!(matches!(m, PromotionMechanism::ServiceControlAction));
    }

    #[tokio::test]
    async fn promote_flips_recovery_type_and_updates_catalog() {
        let conn = FakeDbConn::with_nodes(vec![sample_node(2, NodeType::Standby, Some(1))]);
        *conn.recovery_type.lock().unwrap() = RecoveryType::Primary;
        let req = PromoteRequest {
            node_id: 2,
            siblings_follow: false,
        };
        promote(&conn, &PromotionMechanism::SqlPromote, |_| Ok(()), &timeouts(), &req)
            .await
            .unwrap();
        let rec = conn.get_node(2).await.unwrap();
        assert_eq!(rec.node_type, NodeType::Primary);
        assert_eq!(conn.events.lock().unwrap().last().unwrap().1, "standby_promote");
    }

    #[tokio::test]
    async fn promote_fails_when_invoke_fails() {
        let conn = FakeDbConn::with_nodes(vec![sample_node(2, NodeType::Standby, Some(1))]);
        let req = PromoteRequest {
            node_id: 2,
            siblings_follow: false,
        };
        let err = promote(
            &conn,
            &PromotionMechanism::SqlPromote,
            |_| Err("service control refused".to_string()),
            &timeouts(),
            &req,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Promotion(_)));
    }

    #[test]
    fn precondition_failures_are_reported() {
        let p = PromotionPreconditions {
            is_standby: true,
            replay_safe_to_promote: true,
            no_other_active_primary: false,
            enough_wal_senders_and_slots: true,
        };
        let err = check_preconditions(&p).unwrap_err();
        assert!(matches!(err, Error::Promotion(_)));
    }
}
