use crate::features::Features;
use crate::params::RecoveryParams;
use repctl_types::NodeRecord;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("recovery config already exists at {path} (use --force to overwrite)")]
    AlreadyExists { path: PathBuf },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// What actually happened: in dry-run mode the caller gets the buffer back
/// without anything touching disk.
#[derive(Debug)]
pub enum WriteOutcome {
    Written { paths: Vec<PathBuf> },
    DryRun { rendered: String },
}

pub struct RecoveryWriter {
    pub features: Features,
    pub force: bool,
    pub dry_run: bool,
}

impl RecoveryWriter {
    pub fn new(features: Features, force: bool, dry_run: bool) -> Self {
        Self {
            features,
            force,
            dry_run,
        }
    }

    /// Writes (or renders, in dry-run) the recovery configuration for
    /// `node` to start replicating per `params`.
    pub fn write(&self, node: &NodeRecord, params: &RecoveryParams) -> Result<WriteOutcome> {
        let rendered = self.render(params);

        if self.dry_run {
            return Ok(WriteOutcome::DryRun { rendered });
        }

        if self.features.uses_recovery_conf_file {
            let path = node.data_directory.join("recovery.conf");
            self.guard_existing(&path)?;
            self.write_file(&path, &rendered, 0o600)?;
            Ok(WriteOutcome::Written { paths: vec![path] })
        } else {
            let auto_conf = node.data_directory.join("postgresql.auto.conf");
            let signal = node.data_directory.join("standby.signal");
            self.merge_into_auto_conf(&auto_conf, &rendered)?;
            self.write_file(&signal, "", 0o644)?;
            Ok(WriteOutcome::Written {
                paths: vec![auto_conf, signal],
            })
        }
    }

    /// Builds the body of the recovery parameters, independent of which
    /// file they end up in.
    fn render(&self, params: &RecoveryParams) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "primary_conninfo = '{}'",
            params.render_primary_conninfo()
        ));
        if let Some(slot) = &params.slot_name {
            lines.push(format!("primary_slot_name = '{slot}'"));
        }
        lines.push("recovery_target_timeline = 'latest'".to_string());
        if let Some(delay) = params.min_apply_delay {
            lines.push(format!("recovery_min_apply_delay = '{}s'", delay.as_secs()));
        }
        if let Some(cmd) = &params.restore_command {
            lines.push(format!("restore_command = '{cmd}'"));
        }
        if let Some(cmd) = &params.archive_cleanup_command {
            lines.push(format!("archive_cleanup_command = '{cmd}'"));
        }
        if self.features.uses_recovery_conf_file {
            lines.push("standby_mode = 'on'".to_string());
        }
        lines.join("\n") + "\n"
    }

    fn guard_existing(&self, path: &PathBuf) -> Result<()> {
        if path.exists() && !self.force {
            return Err(Error::AlreadyExists { path: path.clone() });
        }
        Ok(())
    }

    fn write_file(&self, path: &PathBuf, contents: &str, mode: u32) -> Result<()> {
        fs::write(path, contents).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        set_mode(path, mode).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })
    }

    /// Merges our keys into `postgresql.auto.conf`, replacing any prior
    /// occurrence of the same key (by exact `key = ` prefix match) and
    /// appending the rest.
    fn merge_into_auto_conf(&self, path: &PathBuf, rendered: &str) -> Result<()> {
        if !self.force && path.exists() {
            let existing = fs::read_to_string(path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            if existing.contains("primary_conninfo") {
                return Err(Error::AlreadyExists { path: path.clone() });
            }
        }

        let new_keys: Vec<&str> = rendered
            .lines()
            .filter_map(|l| l.split_once('=').map(|(k, _)| k.trim()))
            .collect();

        let existing = fs::read_to_string(path).unwrap_or_default();
        let kept: Vec<&str> = existing
            .lines()
            .filter(|line| {
                let key = line.split_once('=').map(|(k, _)| k.trim());
                match key {
                    Some(k) => !new_keys.contains(&k),
                    None => true,
                }
            })
            .collect();

        let mut merged = kept.join("\n");
        if !merged.is_empty() {
            merged.push('\n');
        }
        merged.push_str(rendered);

        self.write_file(path, &merged, 0o644)
    }
}

#[cfg(unix)]
fn set_mode(path: &PathBuf, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(mode);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_mode(_path: &PathBuf, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn node(data_dir: PathBuf) -> NodeRecord {
        NodeRecord {
            node_id: 2,
            node_name: "node2".to_string(),
            node_type: repctl_types::NodeType::Standby,
            upstream_node_id: Some(1),
            conninfo: "host=n2".to_string(),
            repluser: "repl".to_string(),
            slot_name: "repmgr_slot_2".to_string(),
            config_file: PathBuf::from("/etc/repctl/node2.conf"),
            data_directory: data_dir,
            priority: 100,
            location: "dc1".to_string(),
            active: true,
        }
    }

    fn params() -> RecoveryParams {
        RecoveryParams {
            upstream_conninfo: vec![
                ("host".to_string(), "n1".to_string()),
                ("port".to_string(), "5432".to_string()),
                ("user".to_string(), "repl".to_string()),
            ],
            node_name: "node2".to_string(),
            passfile: None,
            password: None,
            slot_name: Some("repmgr_slot_2".to_string()),
            min_apply_delay: None,
            restore_command: None,
            archive_cleanup_command: None,
        }
    }

    #[test]
    fn pre_12_writes_recovery_conf_with_mode_0600() {
        let dir = tempdir().unwrap();
        let writer = RecoveryWriter::new(Features::for_version(110005), false, false);
        let outcome = writer.write(&node(dir.path().to_path_buf()), &params()).unwrap();
        let WriteOutcome::Written { paths } = outcome else {
            panic!("expected Written outcome");
        };
        assert_eq!(paths.len(), 1);
        let contents = fs::read_to_string(&paths[0]).unwrap();
        assert!(contents.contains("standby_mode = 'on'"));
        assert!(contents.contains("primary_slot_name = 'repmgr_slot_2'"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&paths[0]).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn v12_writes_auto_conf_and_signal_file() {
        let dir = tempdir().unwrap();
        let writer = RecoveryWriter::new(Features::for_version(140001), false, false);
        let outcome = writer.write(&node(dir.path().to_path_buf()), &params()).unwrap();
        let WriteOutcome::Written { paths } = outcome else {
            panic!("expected Written outcome");
        };
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("standby.signal"));
        assert!(paths[1].exists());
        let contents = fs::read_to_string(&paths[0]).unwrap();
        assert!(!contents.contains("standby_mode"));
    }

    #[test]
    fn refuses_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let n = node(dir.path().to_path_buf());
        let writer = RecoveryWriter::new(Features::for_version(110005), false, false);
        writer.write(&n, &params()).unwrap();

        let err = writer.write(&n, &params()).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn dry_run_does_not_touch_disk() {
        let dir = tempdir().unwrap();
        let n = node(dir.path().to_path_buf());
        let writer = RecoveryWriter::new(Features::for_version(140001), false, true);
        let outcome = writer.write(&n, &params()).unwrap();
        assert!(matches!(outcome, WriteOutcome::DryRun { .. }));
        assert!(!dir.path().join("standby.signal").exists());
        assert!(!dir.path().join("postgresql.auto.conf").exists());
    }

    #[test]
    fn min_apply_delay_is_rendered_in_seconds() {
        let dir = tempdir().unwrap();
        let mut p = params();
        p.min_apply_delay = Some(Duration::from_secs(300));
        let writer = RecoveryWriter::new(Features::for_version(140001), false, true);
        let WriteOutcome::DryRun { rendered } = writer.write(&node(dir.path().to_path_buf()), &p).unwrap() else {
            panic!("expected dry run");
        };
        assert!(rendered.contains("recovery_min_apply_delay = '300s'"));
    }
}
