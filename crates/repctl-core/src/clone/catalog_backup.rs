//! Catalog-backup clone mode: reconstructs a data directory from a managed
//! backup catalog (rsync of file sets) instead of running the base-backup
//! utility directly (spec.md §4.5).

use super::plan::{CloneOutcome, CloneRequest, ResolvedUpstream};
use crate::error::{Error, Result};
use repctl_db::DbConn;
use repctl_recovery::{RecoveryParams, RecoveryWriter};
use repctl_types::NodeRecord;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupListingEntry {
    pub backup_id: String,
    pub database_version: u32,
    /// `oid -> location`; empty if the backup has no extra tablespaces.
    pub tablespaces: BTreeMap<String, String>,
}

/// Parses a line-oriented backup listing such as:
/// `20240102T030000 | version=140005 | tablespace=16401:/mnt/ts1 tablespace=16402:/mnt/ts2`
///
/// Tolerant of missing tablespace fields; a line with no `tablespace=` pairs
/// parses to an empty map.
pub fn parse_backup_listing(line: &str) -> Result<BackupListingEntry> {
    let mut fields = line.split('|').map(str::trim);
    let backup_id = fields
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Backup("backup listing line is missing an identifier".to_string()))?
        .to_string();

    let mut database_version = None;
    let mut tablespaces = BTreeMap::new();
    for field in fields {
        for token in field.split_whitespace() {
            if let Some(v) = token.strip_prefix("version=") {
                database_version = v.parse().ok();
            } else if let Some(rest) = token.strip_prefix("tablespace=") {
                if let Some((oid, location)) = rest.split_once(':') {
                    tablespaces.insert(oid.to_string(), location.to_string());
                }
            }
        }
    }

    let database_version = database_version
        .ok_or_else(|| Error::Backup(format!("backup listing line {backup_id:?} has no version field")))?;

    Ok(BackupListingEntry {
        backup_id,
        database_version,
        tablespaces,
    })
}

/// Chooses the most recent entry (lines are assumed newest-last, matching
/// the backup tool's own listing order) — spec.md §4.5's "extract the
/// chosen backup identifier".
pub fn choose_backup<'a>(entries: &'a [BackupListingEntry]) -> Result<&'a BackupListingEntry> {
    entries
        .last()
        .ok_or_else(|| Error::Backup("backup catalog has no entries".to_string()))
}

/// Subdirectories a restored data directory needs that the backup itself
/// does not preserve. `pg_wal`/`pg_replslot`/`pg_commit_ts`/`pg_dynshmem`/
/// `pg_logical` only apply to versions new enough to have them; everything
/// else is universal.
pub fn standard_empty_subdirs(major_version: u32) -> Vec<&'static str> {
    let mut dirs = vec!["pg_notify", "pg_stat_tmp", "pg_twophase", "pg_subtrans", "pg_tblspc"];
    if major_version >= 10 {
        dirs.extend(["pg_wal", "pg_commit_ts", "pg_dynshmem", "pg_logical", "pg_replslot"]);
    }
    dirs
}

pub fn create_standard_subdirs(data_directory: &Path, major_version: u32) -> Result<()> {
    for name in standard_empty_subdirs(major_version) {
        let path = data_directory.join(name);
        std::fs::create_dir_all(&path)
            .map_err(|e| Error::Backup(format!("creating {}: {e}", path.display())))?;
    }
    Ok(())
}

/// `TABLESPACE_MAP` synthesis for versions that record tablespaces that
/// way (>= 12); older versions get real `pg_tblspc` symlinks instead via
/// [`create_tablespace_symlinks`].
pub fn synthesize_tablespace_map(entry: &BackupListingEntry) -> String {
    entry
        .tablespaces
        .iter()
        .map(|(oid, location)| format!("{oid} {location}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn create_tablespace_symlinks(data_directory: &Path, entry: &BackupListingEntry) -> Result<()> {
    let pg_tblspc = data_directory.join("pg_tblspc");
    std::fs::create_dir_all(&pg_tblspc)
        .map_err(|e| Error::Backup(format!("creating {}: {e}", pg_tblspc.display())))?;
    for (oid, location) in &entry.tablespaces {
        let link = pg_tblspc.join(oid);
        symlink(Path::new(location), &link)
            .map_err(|e| Error::Backup(format!("symlinking {} -> {}: {e}", link.display(), location)))?;
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Resolves the optional WAL-directory symlink (`--waldir`-equivalent):
/// when set, `pg_wal` inside the restored data directory points elsewhere.
pub fn honour_wal_directory_symlink(data_directory: &Path, wal_directory: Option<&Path>) -> Result<()> {
    let Some(wal_dir) = wal_directory else {
        return Ok(());
    };
    let link = data_directory.join("pg_wal");
    if link.exists() {
        std::fs::remove_dir_all(&link)
            .map_err(|e| Error::Backup(format!("removing stock pg_wal before relinking: {e}")))?;
    }
    symlink(wal_dir, &link)
        .map_err(|e| Error::Backup(format!("symlinking pg_wal -> {}: {e}", wal_dir.display())))
}

/// Removes any leftover staging files under `scratch_dir` once the restore
/// has completed or failed — spec.md §4.5's temp-file cleanup step.
pub fn cleanup_scratch(scratch_dir: &Path) -> Result<()> {
    if scratch_dir.exists() {
        std::fs::remove_dir_all(scratch_dir)
            .map_err(|e| Error::Backup(format!("cleaning up {}: {e}", scratch_dir.display())))?;
    }
    Ok(())
}

/// Runs `list_command` (expected to print the line-oriented listing
/// [`parse_backup_listing`] understands) and parses every non-blank line.
async fn list_backups(list_command: &str) -> Result<Vec<BackupListingEntry>> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(list_command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Backup(format!("failed to run backup catalog listing command: {e}")))?;
    if !output.status.success() {
        return Err(Error::Backup(format!(
            "backup catalog listing command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_backup_listing)
        .collect()
}

/// Runs `restore_command_template` with `{backup_id}`/`{destination}`
/// substituted in, expected to leave a restored data directory behind.
async fn restore_backup(restore_command_template: &str, backup_id: &str, destination: &Path) -> Result<()> {
    let cmd = restore_command_template
        .replace("{backup_id}", backup_id)
        .replace("{destination}", &destination.display().to_string());
    let output = Command::new("sh")
        .arg("-c")
        .arg(&cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Backup(format!("failed to run backup restore command: {e}")))?;
    if !output.status.success() {
        return Err(Error::Backup(format!(
            "backup restore command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Runs the full catalog-backup clone algorithm: list the catalog, pick a
/// backup, restore it, reconstruct the subdirectories/tablespace metadata
/// the backup doesn't preserve, then write the recovery configuration
/// (spec.md §4.5's catalog-backup mode).
#[allow(clippy::too_many_arguments)]
pub async fn clone_catalog_backup(
    catalog: &dyn DbConn,
    node_id: i32,
    req: &CloneRequest,
    upstream: &ResolvedUpstream,
    list_command: &str,
    restore_command: &str,
    wal_directory: Option<&Path>,
    recovery_params: &RecoveryParams,
    writer: &RecoveryWriter,
    local_node: &NodeRecord,
) -> Result<CloneOutcome> {
    let started = Instant::now();

    super::direct::validate_destination(&req.destination_data_directory, req.force)?;
    super::direct::reject_witness_source(&upstream.record)?;

    let entries = list_backups(list_command).await?;
    let chosen = match choose_backup(&entries) {
        Ok(entry) => entry.clone(),
        Err(e) => {
            catalog.record_event(node_id, "standby_clone", false, &e.to_string()).await.ok();
            return Err(e);
        }
    };

    if let Err(e) = restore_backup(restore_command, &chosen.backup_id, &req.destination_data_directory).await {
        catalog.record_event(node_id, "standby_clone", false, &e.to_string()).await.ok();
        return Err(e);
    }

    create_standard_subdirs(&req.destination_data_directory, chosen.database_version)?;
    if !chosen.tablespaces.is_empty() {
        if chosen.database_version >= 12 {
            let map_path = req.destination_data_directory.join("tablespace_map");
            std::fs::write(&map_path, synthesize_tablespace_map(&chosen))
                .map_err(|e| Error::Backup(format!("writing {}: {e}", map_path.display())))?;
        } else {
            create_tablespace_symlinks(&req.destination_data_directory, &chosen)?;
        }
    }
    honour_wal_directory_symlink(&req.destination_data_directory, wal_directory)?;

    let slot_created = if req.use_replication_slot {
        let slot_name = repctl_types::slot_name_for_node(node_id);
        catalog.create_replication_slot(&slot_name, &upstream.record).await?;
        Some(slot_name)
    } else {
        None
    };

    let recovery = writer
        .write(local_node, recovery_params)
        .map_err(|e| Error::Backup(e.to_string()))?;

    cleanup_scratch(&req.destination_data_directory.join(".repctl-scratch"))?;

    catalog
        .record_event(node_id, "standby_clone", true, "catalog-backup clone completed")
        .await
        .ok();
    info!(node_id, backup_id = %chosen.backup_id, elapsed = ?started.elapsed(), "catalog-backup clone completed");

    Ok(CloneOutcome {
        recovery,
        slot_created,
        duration: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_line_with_tablespaces() {
        let line = "20240102T030000 | version=140005 | tablespace=16401:/mnt/ts1 tablespace=16402:/mnt/ts2";
        let entry = parse_backup_listing(line).unwrap();
        assert_eq!(entry.backup_id, "20240102T030000");
        assert_eq!(entry.database_version, 140005);
        assert_eq!(entry.tablespaces.get("16401"), Some(&"/mnt/ts1".to_string()));
    }

    #[test]
    fn parses_listing_line_without_tablespaces() {
        let entry = parse_backup_listing("20240102T030000 | version=130004").unwrap();
        assert!(entry.tablespaces.is_empty());
    }

    #[test]
    fn rejects_line_missing_version() {
        assert!(parse_backup_listing("20240102T030000 | nothing=here").is_err());
    }

    #[test]
    fn choose_backup_picks_the_last_entry() {
        let entries = vec![
            parse_backup_listing("a | version=130000").unwrap(),
            parse_backup_listing("b | version=130000").unwrap(),
        ];
        assert_eq!(choose_backup(&entries).unwrap().backup_id, "b");
    }

    #[test]
    fn standard_subdirs_are_version_gated() {
        let old = standard_empty_subdirs(9);
        assert!(!old.contains(&"pg_wal"));
        let new = standard_empty_subdirs(14);
        assert!(new.contains(&"pg_wal"));
        assert!(new.contains(&"pg_replslot"));
    }

    #[test]
    fn synthesize_tablespace_map_is_deterministic() {
        let entry = parse_backup_listing(
            "x | version=140000 | tablespace=2:/b tablespace=1:/a",
        )
        .unwrap();
        assert_eq!(synthesize_tablespace_map(&entry), "1 /a\n2 /b");
    }
}
