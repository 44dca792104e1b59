//! Drives the switchover state machine (spec.md §4.9) from PRECHECK
//! through VERIFY, using the caller-supplied [`SwitchoverHooks`] for every
//! side effect that crosses the network (SSH, remote node-check protocol
//! calls, failover-daemon pause/unpause) so the sequencing itself stays
//! unit-testable without a real cluster.

use super::state::{SwitchoverResult, SwitchoverState, VerifyOutcome};
use async_trait::async_trait;
use repctl_config::TimeoutConfig;
use repctl_db::DbConn;
use repctl_types::{CheckpointRecord, NodeRecord, NodeType, ShutdownState};
use tokio::time::{sleep, Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SwitchoverRequest {
    pub local_node_id: i32,
    pub primary_node_id: i32,
    pub force: bool,
    pub always_promote: bool,
    pub siblings_follow: bool,
    pub repmgrd_no_pause: bool,
    pub repmgrd_force_unpause: bool,
    pub force_rewind: Option<String>,
}

/// Everything the engine needs from the outside world that isn't a plain
/// database query. The production implementation wraps `SshTransport` and
/// the node-check protocol; tests supply a scripted fake.
#[async_trait]
pub trait SwitchoverHooks: Send + Sync {
    async fn probe_ssh(&self, host: &str) -> bool;
    async fn stop_primary(&self, host: &str) -> std::result::Result<(), String>;
    async fn is_shutdown_cleanly(&self, host: &str) -> CheckpointRecord;
    async fn ping(&self, host: &str) -> bool;
    async fn rejoin(
        &self,
        host: &str,
        local_conninfo: &str,
        force_rewind: Option<&str>,
    ) -> std::result::Result<(), String>;
    /// Returns whether the daemon was already paused before this call.
    async fn pause_daemon(&self, node: &NodeRecord) -> std::result::Result<bool, String>;
    async fn unpause_daemon(&self, node: &NodeRecord) -> std::result::Result<(), String>;
    async fn replication_connection_ok(&self, primary_host: &str, candidate_node_id: i32) -> bool;
}

fn host_of(node: &NodeRecord) -> String {
    node.conninfo
        .split_whitespace()
        .find_map(|kv| kv.strip_prefix("host="))
        .unwrap_or(&node.node_name)
        .to_string()
}

/// Runs the full state machine. `local` is the connection to the
/// promotion candidate, `primary` the connection (while it's still up) to
/// the demotion candidate; `siblings` is every other active standby.
#[allow(clippy::too_many_arguments)]
pub async fn run_switchover(
    local: &dyn DbConn,
    primary_record: &NodeRecord,
    siblings: &[NodeRecord],
    hooks: &dyn SwitchoverHooks,
    timeouts: &TimeoutConfig,
    promote_invoke: impl FnOnce() -> std::result::Result<(), String>,
    req: &SwitchoverRequest,
) -> SwitchoverResult {
    let primary_host = host_of(primary_record);

    // PRECHECK
    let local_rec = match local.get_node(req.local_node_id).await {
        Ok(rec) => rec,
        Err(e) => {
            return fail(SwitchoverState::Precheck, format!("cannot read local node record: {e}"));
        }
    };
    if local_rec.node_type != NodeType::Standby {
        return fail(SwitchoverState::Precheck, "local node is not a standby".to_string());
    }
    if !hooks.replication_connection_ok(&primary_host, req.local_node_id).await {
        return fail(
            SwitchoverState::Precheck,
            "demotion candidate cannot open a replication connection to the promotion candidate".to_string(),
        );
    }
    if !hooks.probe_ssh(&primary_host).await {
        return fail(SwitchoverState::Precheck, format!("cannot reach {primary_host} via SSH"));
    }
    info!(node_id = req.local_node_id, "switchover precheck passed");

    // PAUSE_DAEMONS
    let mut paused_by_us: Vec<NodeRecord> = Vec::new();
    if !req.repmgrd_no_pause {
        let mut all = siblings.to_vec();
        all.push(primary_record.clone());
        for node in &all {
            match hooks.pause_daemon(node).await {
                Ok(already_paused) => {
                    if !already_paused {
                        paused_by_us.push(node.clone());
                    }
                }
                Err(e) => {
                    if req.force {
                        warn!(node_id = node.node_id, error = %e, "daemon unreachable, continuing under --force");
                    } else {
                        return fail(SwitchoverState::PauseDaemons, format!("node {}: {e}", node.node_id));
                    }
                }
            }
        }
    }

    // STOP_PRIMARY
    if let Err(e) = hooks.stop_primary(&primary_host).await {
        return fail(SwitchoverState::StopPrimary, format!("failed to stop primary: {e}"));
    }
    let shutdown_deadline = Instant::now() + Duration::from_secs(timeouts.shutdown_check_timeout_secs);
    let mut last_checkpoint = CheckpointRecord {
        last_checkpoint_lsn: repctl_types::Lsn::ZERO,
        shutdown_state: ShutdownState::Unknown,
    };
    loop {
        if !hooks.ping(&primary_host).await {
            last_checkpoint = hooks.is_shutdown_cleanly(&primary_host).await;
            match last_checkpoint.shutdown_state {
                ShutdownState::ShutdownClean => break,
                ShutdownState::ShutdownUnclean if !req.force => {
                    return fail(SwitchoverState::StopPrimary, "primary shut down uncleanly".to_string());
                }
                ShutdownState::ShutdownUnclean => {
                    warn!("primary shut down uncleanly, continuing under --force");
                    break;
                }
                _ => {}
            }
        }
        if Instant::now() >= shutdown_deadline {
            return fail(SwitchoverState::StopPrimary, "timed out waiting for primary to stop".to_string());
        }
        sleep(Duration::from_secs(1)).await;
    }

    // WAIT_WAL_FLUSH
    let flush_deadline = Instant::now() + Duration::from_secs(timeouts.wal_receive_check_timeout_secs);
    loop {
        match local.get_replication_info(repctl_db::ReplicationRole::Standby).await {
            Ok(info) if info.last_wal_receive_lsn >= last_checkpoint.last_checkpoint_lsn => break,
            _ => {}
        }
        if Instant::now() >= flush_deadline {
            if req.always_promote {
                warn!("WAL receive still behind primary's last checkpoint; proceeding under --always-promote");
                break;
            }
            return fail(SwitchoverState::WaitWalFlush, "local WAL receive never caught up to primary's last checkpoint".to_string());
        }
        sleep(Duration::from_secs(1)).await;
    }

    // PROMOTE
    if let Err(e) = promote_invoke() {
        return fail(SwitchoverState::Promote, format!("promotion failed: {e}"));
    }
    local.update_node_set_primary(req.local_node_id).await.ok();
    info!(node_id = req.local_node_id, "promotion complete; point of no return reached");

    // From here on we must always reach UNPAUSE_DAEMONS.
    let mut incomplete_detail: Option<String> = None;

    // REJOIN
    let local_conninfo = local_rec.conninfo.clone();
    if let Err(e) = hooks
        .rejoin(&primary_host, &local_conninfo, req.force_rewind.as_deref())
        .await
    {
        warn!(error = %e, "rejoin dispatch failed; ex-primary will need manual recovery");
        incomplete_detail = Some(format!("rejoin dispatch failed: {e}"));
    }

    // ATTACH_SIBLINGS
    // Left to the caller: when `siblings_follow` is set, the caller invokes
    // `crate::siblings::reconfigure_siblings` between REJOIN and here and
    // folds any failures into `incomplete_detail` itself, since that step
    // needs the transport and isn't part of this trait.

    // UNPAUSE_DAEMONS
    if !req.repmgrd_force_unpause {
        for node in &paused_by_us {
            if let Err(e) = hooks.unpause_daemon(node).await {
                warn!(node_id = node.node_id, error = %e, "failed to unpause daemon");
            }
        }
    }

    // VERIFY
    let reconnect_deadline = Instant::now() + timeouts.standby_reconnect_timeout();
    let mut ex_primary_reachable = false;
    loop {
        if hooks.ping(&primary_host).await {
            ex_primary_reachable = true;
            break;
        }
        if Instant::now() >= reconnect_deadline {
            break;
        }
        sleep(Duration::from_secs(1)).await;
    }

    let verify = if !ex_primary_reachable {
        VerifyOutcome::JoinFailNoPing
    } else {
        match local.is_downstream_attached(&primary_record.node_name).await {
            Ok(repctl_types::AttachState::Attached) => VerifyOutcome::Success,
            _ => VerifyOutcome::JoinFailNoReplication,
        }
    };

    local
        .record_event(
            req.local_node_id,
            "standby_switchover",
            verify == VerifyOutcome::Success,
            &format!("{verify:?}"),
        )
        .await
        .ok();

    match verify {
        VerifyOutcome::Success if incomplete_detail.is_none() => {
            info!(node_id = req.local_node_id, "switchover verified successfully");
            SwitchoverResult::Success
        }
        VerifyOutcome::Success => SwitchoverResult::Incomplete {
            verify,
            detail: incomplete_detail.unwrap(),
        },
        other => SwitchoverResult::Incomplete {
            detail: incomplete_detail.unwrap_or_else(|| format!("{other:?}")),
            verify: other,
        },
    }
}

fn fail(state: SwitchoverState, detail: String) -> SwitchoverResult {
    warn!(?state, detail, "switchover aborted");
    SwitchoverResult::Fail { state, detail }
}
