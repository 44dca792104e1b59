//! Centralises every decision the core makes based on the target database's
//! major version, instead of scattering `if version >= ...` checks through
//! every subsystem (spec.md §9 "two-way version dispatch" redesign note).
//!
//! `version` follows Postgres's own `server_version_num` convention: an
//! integer `MMmmpp` (e.g. `130004` is major 13, minor 0, patch 4). Only the
//! major component (`version / 10000`) drives any decision here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub major: u32,
    /// `recovery.conf` (< 12) vs `postgresql.auto.conf` + `standby.signal` (>= 12).
    pub uses_recovery_conf_file: bool,
    /// `wal_keep_segments` (< 13) vs `wal_keep_size` (>= 13).
    pub wal_keep_param_name: &'static str,
    /// Whether the in-SQL `pg_promote()` function is available (>= 12).
    pub has_sql_promote_function: bool,
    /// Whether `pg_rewind` needs an explicit list of config files preserved
    /// across rewind (< 13 required `--restore-target-wal`-style handling
    /// that the core works around by snapshotting config files itself).
    pub rewind_needs_config_preservation: bool,
    /// Whether the verify-backup utility exists for this version (>= 13).
    pub has_verify_backup_utility: bool,
    /// Whether replication config file ownership is meaningfully checked
    /// (>= 12; earlier versions didn't split replication config out).
    pub checks_replication_config_owner: bool,
}

impl Features {
    pub fn for_version(version: u32) -> Features {
        let major = version / 10000;
        Features {
            major,
            uses_recovery_conf_file: major < 12,
            wal_keep_param_name: if major < 13 {
                "wal_keep_segments"
            } else {
                "wal_keep_size"
            },
            has_sql_promote_function: major >= 12,
            rewind_needs_config_preservation: major < 13,
            has_verify_backup_utility: major >= 13,
            checks_replication_config_owner: major >= 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_12_uses_recovery_conf() {
        let f = Features::for_version(110005);
        assert!(f.uses_recovery_conf_file);
        assert!(!f.has_sql_promote_function);
    }

    #[test]
    fn v12_switches_to_auto_conf_and_sql_promote() {
        let f = Features::for_version(120002);
        assert!(!f.uses_recovery_conf_file);
        assert!(f.has_sql_promote_function);
        assert_eq!(f.wal_keep_param_name, "wal_keep_segments");
    }

    #[test]
    fn v13_switches_wal_keep_param_and_adds_verify_backup() {
        let f = Features::for_version(130004);
        assert_eq!(f.wal_keep_param_name, "wal_keep_size");
        assert!(f.has_verify_backup_utility);
        assert!(!f.rewind_needs_config_preservation);
    }
}
