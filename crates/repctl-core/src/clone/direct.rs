//! Direct clone mode: invokes the base-backup utility against the upstream
//! and writes the recovery configuration straight away. Default mode per
//! spec.md §4.5.

use super::plan::{CloneOutcome, CloneRequest, ResolvedUpstream, UpstreamConfigCheck};
use crate::error::{Error, Result};
use repctl_db::DbConn;
use repctl_recovery::{RecoveryParams, RecoveryWriter};
use repctl_types::{NodeRecord, NodeType};
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{info, warn};

/// Step 1: destination must not exist, must be empty, or (with `--force`)
/// must not contain a running database (recognised here by the presence of
/// `postmaster.pid`, the same marker the server itself uses).
pub fn validate_destination(path: &Path, force: bool) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut entries = std::fs::read_dir(path)
        .map_err(|e| Error::Config(format!("cannot read destination directory {}: {e}", path.display())))?;
    if entries.next().is_none() {
        return Ok(());
    }
    if !force {
        return Err(Error::Config(format!(
            "destination data directory {} already exists and is not empty (use --force)",
            path.display()
        )));
    }
    if path.join("postmaster.pid").exists() {
        return Err(Error::Config(format!(
            "destination data directory {} appears to contain a running database",
            path.display()
        )));
    }
    Ok(())
}

/// Step 2: a witness's system identifier never matches any real data
/// node's, so comparing it against the rest of the catalog is enough to
/// reject it as a clone source without a dedicated round trip.
pub fn reject_witness_source(source: &NodeRecord) -> Result<()> {
    if source.node_type == NodeType::Witness {
        return Err(Error::Config(
            "witness nodes cannot be used as a clone source".to_string(),
        ));
    }
    Ok(())
}

/// Step 3: resolves the explicit `--upstream-node-id` if given, else falls
/// back to whichever node the catalog currently lists as primary.
pub async fn resolve_upstream(
    catalog: &dyn DbConn,
    req: &CloneRequest,
) -> Result<ResolvedUpstream> {
    let record = match req.upstream_node_id {
        Some(id) => catalog.get_node(id).await?,
        None => {
            let primary_id = catalog.get_primary_id().await?;
            catalog.get_node(primary_id).await?
        }
    };
    Ok(ResolvedUpstream { record })
}

pub fn check_upstream_config(check: &UpstreamConfigCheck) -> Result<()> {
    if check.is_ok() {
        Ok(())
    } else {
        Err(Error::Backup(check.failures().join("; ")))
    }
}

/// Step 6: slot handling depends on whether the source we're streaming
/// WAL through during the backup is the same node we'll recover from
/// afterwards.
pub async fn reserve_slot_for_backup(
    source: &dyn DbConn,
    upstream: &dyn DbConn,
    source_is_upstream: bool,
    slot_name: &str,
    upstream_rec: &NodeRecord,
) -> Result<()> {
    if source_is_upstream {
        upstream.create_replication_slot(slot_name, upstream_rec).await?;
    } else {
        source.create_replication_slot(slot_name, upstream_rec).await?;
    }
    Ok(())
}

/// Drops the source-side slot and recreates it on the real upstream, once
/// the base backup has finished streaming through the source.
pub async fn rehome_slot_after_backup(
    source: &dyn DbConn,
    upstream: &dyn DbConn,
    slot_name: &str,
    upstream_rec: &NodeRecord,
) -> Result<()> {
    source.drop_replication_slot(slot_name).await?;
    upstream.create_replication_slot(slot_name, upstream_rec).await?;
    Ok(())
}

/// Step 7: builds the base-backup utility's argv. Kept separate from
/// execution so tests can assert on the command line without running it.
pub fn build_basebackup_args(req: &CloneRequest, upstream_conninfo: &str) -> Vec<String> {
    let mut args = vec![
        "-D".to_string(),
        req.destination_data_directory.display().to_string(),
        "-d".to_string(),
        upstream_conninfo.to_string(),
        "-X".to_string(),
        req.wal_method.as_basebackup_flag().to_string(),
        "-P".to_string(),
    ];
    if req.fast_checkpoint {
        args.push("-c".to_string());
        args.push("fast".to_string());
    }
    for (old, new) in &req.tablespace_mappings {
        args.push("-T".to_string());
        args.push(format!("{old}={new}"));
    }
    args
}

/// Step 7 continued: runs the base-backup utility and treats any non-zero
/// exit as fatal.
pub async fn run_basebackup(bindir: &Path, args: &[String]) -> Result<()> {
    let program = bindir.join("pg_basebackup");
    let output = Command::new(&program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Backup(format!("failed to spawn {}: {e}", program.display())))?;

    if !output.status.success() {
        return Err(Error::Backup(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Step 9: copies external configuration files (those living outside the
/// data directory) to their destination, if requested.
pub fn copy_external_config_files(files: &[(std::path::PathBuf, std::path::PathBuf)]) -> Result<()> {
    for (src, dst) in files {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Backup(format!("creating {}: {e}", parent.display())))?;
        }
        std::fs::copy(src, dst)
            .map_err(|e| Error::Backup(format!("copying {} to {}: {e}", src.display(), dst.display())))?;
    }
    Ok(())
}

/// Runs the full direct clone algorithm (spec.md §4.5 steps 1-11).
#[allow(clippy::too_many_arguments)]
pub async fn clone_direct(
    catalog: &dyn DbConn,
    source: &dyn DbConn,
    pg_bindir: &Path,
    node_id: i32,
    req: &CloneRequest,
    upstream: &ResolvedUpstream,
    upstream_config: &UpstreamConfigCheck,
    recovery_params: &RecoveryParams,
    writer: &RecoveryWriter,
    local_node: &NodeRecord,
    external_config_files: &[(std::path::PathBuf, std::path::PathBuf)],
) -> Result<CloneOutcome> {
    let started = Instant::now();
    let report_failure = |detail: &str| {
        warn!(node_id, detail, "clone failed; destination directory may need manual cleanup");
    };

    validate_destination(&req.destination_data_directory, req.force)?;
    reject_witness_source(&upstream.record)?;
    check_upstream_config(upstream_config).map_err(|e| {
        report_failure(&e.to_string());
        e
    })?;

    let source_is_upstream = req.source_conninfo == upstream.record.conninfo;
    let slot_created = if req.use_replication_slot {
        let slot_name = repctl_types::slot_name_for_node(node_id);
        if let Err(e) = reserve_slot_for_backup(source, catalog, source_is_upstream, &slot_name, &upstream.record).await {
            report_failure(&e.to_string());
            return Err(e);
        }
        Some(slot_name)
    } else {
        None
    };

    let args = build_basebackup_args(req, &upstream.record.conninfo);
    if let Err(e) = run_basebackup(pg_bindir, &args).await {
        if let Some(slot) = &slot_created {
            source.drop_replication_slot(slot).await.ok();
        }
        report_failure(&e.to_string());
        catalog
            .record_event(node_id, "standby_clone", false, &e.to_string())
            .await
            .ok();
        return Err(e);
    }

    if !source_is_upstream {
        if let (Some(slot), true) = (&slot_created, req.use_replication_slot) {
            rehome_slot_after_backup(source, catalog, slot, &upstream.record).await?;
        }
    }

    copy_external_config_files(external_config_files)?;

    let recovery = writer
        .write(local_node, recovery_params)
        .map_err(|e| Error::Backup(e.to_string()))?;

    catalog
        .record_event(node_id, "standby_clone", true, "direct clone completed")
        .await
        .ok();
    info!(node_id, elapsed = ?started.elapsed(), "direct clone completed");

    Ok(CloneOutcome {
        recovery,
        slot_created,
        duration: started.elapsed(),
    })
}
