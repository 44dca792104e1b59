//! Sibling reconfiguration (spec.md §4.10): after a promotion or
//! switchover, every other standby attached to the old primary is told to
//! follow the new one.
//!
//! Siblings are reconfigured concurrently (spec.md §5 permits any
//! implementation parallelism here as long as observable output matches a
//! sequential ascending-`node_id` ordering), so results are always sorted
//! back into that order before being handed to the caller.

use futures::stream::{self, StreamExt};
use repctl_transport::SshTransport;
use repctl_types::{NodeRecord, NodeType};
use tracing::{info, warn};

const MAX_CONCURRENT: usize = 8;

#[derive(Debug, Clone)]
pub struct SiblingResult {
    pub node_id: i32,
    pub node_name: String,
    pub outcome: std::result::Result<(), String>,
}

/// Reconfigures every sibling in `siblings` to follow `new_primary`, via
/// `standby follow` (standbys) or `witness register ... --force` (witnesses).
/// Before a witness command, the witness's database is pinged and told to
/// short-circuit its own primary discovery ("notify follow primary") —
/// modelled here as a caller-supplied hook so this module stays free of any
/// particular RPC transport detail.
pub async fn reconfigure_siblings(
    transport: &SshTransport,
    remote_user: &str,
    new_primary: &NodeRecord,
    siblings: &[NodeRecord],
    notify_witness_follow_primary: impl Fn(&NodeRecord) -> bool + Sync,
) -> Vec<SiblingResult> {
    let mut sorted: Vec<&NodeRecord> = siblings.iter().collect();
    sorted.sort_by_key(|n| n.node_id);

    let mut results: Vec<SiblingResult> = stream::iter(sorted.into_iter())
        .map(|sibling| {
            let notify = &notify_witness_follow_primary;
            async move {
                let outcome = reconfigure_one(transport, remote_user, new_primary, sibling, notify).await;
                SiblingResult {
                    node_id: sibling.node_id,
                    node_name: sibling.node_name.clone(),
                    outcome,
                }
            }
        })
        .buffer_unordered(MAX_CONCURRENT)
        .collect()
        .await;

    results.sort_by_key(|r| r.node_id);
    let (ok, failed): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.outcome.is_ok());
    info!(succeeded = ok.len(), failed = failed.len(), "sibling reconfiguration complete");
    results
}

async fn reconfigure_one(
    transport: &SshTransport,
    remote_user: &str,
    new_primary: &NodeRecord,
    sibling: &NodeRecord,
    notify_witness_follow_primary: &(impl Fn(&NodeRecord) -> bool + Sync),
) -> std::result::Result<(), String> {
    let host = sibling
        .conninfo
        .split_whitespace()
        .find_map(|kv| kv.strip_prefix("host="))
        .unwrap_or(&sibling.node_name);

    if sibling.node_type == NodeType::Witness {
        if !notify_witness_follow_primary(sibling) {
            warn!(node_id = sibling.node_id, "witness did not acknowledge follow-primary notification");
        }
        let cmd = format!(
            "repctl witness register -d '{}' --force",
            new_primary.conninfo
        );
        transport
            .run_checked(host, remote_user, &cmd)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    } else {
        let cmd = "repctl standby follow".to_string();
        transport
            .run_checked(host, remote_user, &cmd)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
