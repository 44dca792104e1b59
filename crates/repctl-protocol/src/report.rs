use crate::options::{Options, OptionsBuilder};
use repctl_types::{CheckpointRecord, ShutdownState};

/// The six structured reports a peer `repctl node check`/`node status`
/// invocation can emit, per spec.md §4.3.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// `node status --is-shutdown-cleanly`
    ShutdownStatus(CheckpointRecord),
    /// `node check --archive-ready --optformat`
    ArchiveReady {
        status: CheckOutcome,
        files: Option<u32>,
        threshold: Option<u32>,
        error: Option<ArchiveError>,
    },
    /// `node check --replication-connection --remote-node-id=<id>`
    ReplicationConnection(ReplicationConnectionStatus),
    /// `node check --data-directory-config`
    DataDirectoryConfig {
        status: CheckOutcome,
        error: Option<String>,
    },
    /// `node check --replication-config-owner`
    ReplicationConfigOwner(CheckOutcome),
    /// `node check --db-connection [--superuser=<u>]`
    DbConnection(DbConnectionStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl CheckOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CheckOutcome::Ok => "OK",
            CheckOutcome::Warning => "WARNING",
            CheckOutcome::Critical => "CRITICAL",
            CheckOutcome::Unknown => "UNKNOWN",
        }
    }

    fn parse(s: &str) -> CheckOutcome {
        match s {
            "OK" => CheckOutcome::Ok,
            "WARNING" => CheckOutcome::Warning,
            "CRITICAL" => CheckOutcome::Critical,
            _ => CheckOutcome::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveError {
    DbConnection,
    ConninfoParse,
    Unknown,
}

impl ArchiveError {
    fn as_str(self) -> &'static str {
        match self {
            ArchiveError::DbConnection => "DB_CONNECTION",
            ArchiveError::ConninfoParse => "CONNINFO_PARSE",
            ArchiveError::Unknown => "UNKNOWN",
        }
    }

    fn parse(s: &str) -> ArchiveError {
        match s {
            "DB_CONNECTION" => ArchiveError::DbConnection,
            "CONNINFO_PARSE" => ArchiveError::ConninfoParse,
            _ => ArchiveError::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationConnectionStatus {
    Ok,
    Bad,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbConnectionStatus {
    Ok,
    Bad,
    Unknown,
}

impl Report {
    pub fn to_line(&self) -> String {
        match self {
            Report::ShutdownStatus(rec) => Options::builder()
                .set("state", rec.shutdown_state.as_wire_str())
                .set("last-checkpoint-lsn", rec.last_checkpoint_lsn)
                .build(),
            Report::ArchiveReady {
                status,
                files,
                threshold,
                error,
            } => {
                let mut b: OptionsBuilder = Options::builder().set("status", status.as_str());
                b = b.set_opt("files", *files);
                b = b.set_opt("threshold", *threshold);
                b = b.set_opt("error", (*error).map(ArchiveError::as_str));
                b.build()
            }
            Report::ReplicationConnection(status) => {
                let s = match status {
                    ReplicationConnectionStatus::Ok => "OK",
                    ReplicationConnectionStatus::Bad => "BAD",
                    ReplicationConnectionStatus::Unknown => "UNKNOWN",
                };
                Options::builder().set("connection", s).build()
            }
            Report::DataDirectoryConfig { status, error } => {
                let mut b = Options::builder().set("configured-data-directory", status.as_str());
                b = b.set_opt("error", error.clone());
                b.build()
            }
            Report::ReplicationConfigOwner(status) => Options::builder()
                .set("replication-config-owner", status.as_str())
                .build(),
            Report::DbConnection(status) => {
                let s = match status {
                    DbConnectionStatus::Ok => "OK",
                    DbConnectionStatus::Bad => "BAD",
                    DbConnectionStatus::Unknown => "UNKNOWN",
                };
                Options::builder().set("db-connection", s).build()
            }
        }
    }

    pub fn parse_shutdown_status(line: &str) -> CheckpointRecord {
        let opts = Options::parse(line);
        let shutdown_state = opts
            .get("state")
            .map(ShutdownState::from_wire_str)
            .unwrap_or(ShutdownState::Unknown);
        let last_checkpoint_lsn = opts
            .get_parsed("last-checkpoint-lsn")
            .unwrap_or(repctl_types::Lsn::ZERO);
        CheckpointRecord {
            last_checkpoint_lsn,
            shutdown_state,
        }
    }

    pub fn parse_archive_ready(line: &str) -> Report {
        let opts = Options::parse(line);
        Report::ArchiveReady {
            status: opts.get("status").map(CheckOutcome::parse).unwrap_or(CheckOutcome::Unknown),
            files: opts.get_parsed("files"),
            threshold: opts.get_parsed("threshold"),
            error: opts.get("error").map(ArchiveError::parse),
        }
    }

    pub fn parse_replication_connection(line: &str) -> ReplicationConnectionStatus {
        match Options::parse(line).get("connection") {
            Some("OK") => ReplicationConnectionStatus::Ok,
            Some("BAD") => ReplicationConnectionStatus::Bad,
            _ => ReplicationConnectionStatus::Unknown,
        }
    }

    pub fn parse_data_directory_config(line: &str) -> Report {
        let opts = Options::parse(line);
        Report::DataDirectoryConfig {
            status: opts
                .get("configured-data-directory")
                .map(CheckOutcome::parse)
                .unwrap_or(CheckOutcome::Unknown),
            error: opts.get("error").map(str::to_string),
        }
    }

    pub fn parse_replication_config_owner(line: &str) -> CheckOutcome {
        Options::parse(line)
            .get("replication-config-owner")
            .map(CheckOutcome::parse)
            .unwrap_or(CheckOutcome::Unknown)
    }

    pub fn parse_db_connection(line: &str) -> DbConnectionStatus {
        match Options::parse(line).get("db-connection") {
            Some("OK") => DbConnectionStatus::Ok,
            Some("BAD") => DbConnectionStatus::Bad,
            _ => DbConnectionStatus::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repctl_types::Lsn;

    #[test]
    fn shutdown_status_round_trips() {
        let rec = CheckpointRecord {
            last_checkpoint_lsn: Lsn::from_parts(0, 0x300),
            shutdown_state: ShutdownState::ShutdownClean,
        };
        let line = Report::ShutdownStatus(rec).to_line();
        let parsed = Report::parse_shutdown_status(&line);
        assert_eq!(parsed, rec);
    }

    #[test]
    fn empty_line_yields_unknown_everywhere() {
        assert_eq!(
            Report::parse_shutdown_status("").shutdown_state,
            ShutdownState::Unknown
        );
        assert_eq!(
            Report::parse_replication_connection(""),
            ReplicationConnectionStatus::Unknown
        );
        assert_eq!(Report::parse_db_connection(""), DbConnectionStatus::Unknown);
    }

    #[test]
    fn archive_ready_round_trips_with_optional_fields() {
        let report = Report::ArchiveReady {
            status: CheckOutcome::Warning,
            files: Some(12),
            threshold: Some(10),
            error: None,
        };
        let line = report.to_line();
        let parsed = Report::parse_archive_ready(&line);
        assert_eq!(parsed, report);
    }

    #[test]
    fn archive_ready_with_error_round_trips() {
        let report = Report::ArchiveReady {
            status: CheckOutcome::Critical,
            files: None,
            threshold: None,
            error: Some(ArchiveError::DbConnection),
        };
        let line = report.to_line();
        assert_eq!(Report::parse_archive_ready(&line), report);
    }
}
