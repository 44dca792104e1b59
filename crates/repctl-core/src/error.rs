use thiserror::Error;

/// One variant per error kind in spec.md §7, each mapped to a distinct exit
/// code (spec.md §6) by [`Error::exit_code`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] repctl_transport::Error),

    #[error("database connection error: {0}")]
    DbConn(String),

    #[error("database query error: {0}")]
    DbQuery(String),

    #[error("catalog record not found: {0}")]
    CatalogNotFound(String),

    #[error("promotion failed: {0}")]
    Promotion(String),

    #[error("follow failed: {0}")]
    Follow(String),

    #[error("switchover failed: {0}")]
    SwitchoverFail(String),

    #[error("switchover incomplete: {0}")]
    SwitchoverIncomplete(String),

    #[error("backup failed: {0}")]
    Backup(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<repctl_db::Error> for Error {
    fn from(e: repctl_db::Error) -> Self {
        match e {
            repctl_db::Error::Connect(source) => Error::DbConn(source.to_string()),
            repctl_db::Error::NodeNotFound(id) => Error::CatalogNotFound(format!("node {id}")),
            repctl_db::Error::NodeNameNotFound(name) => {
                Error::CatalogNotFound(format!("node {name:?}"))
            }
            repctl_db::Error::NoPrimary => Error::CatalogNotFound("no active primary".to_string()),
            repctl_db::Error::SlotNotFound(name) => {
                Error::CatalogNotFound(format!("slot {name:?}"))
            }
            other => Error::DbQuery(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes from spec.md §6. Implementations may renumber but must keep
/// distinct codes per category; these are the values the original tool uses.
impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 1,
            Error::Transport(_) => 6,
            Error::Backup(_) => 7,
            Error::Promotion(_) => 8,
            Error::DbConn(_) => 9,
            Error::DbQuery(_) => 10,
            Error::SwitchoverFail(_) => 16,
            Error::SwitchoverIncomplete(_) => 24,
            Error::Follow(_) => 25,
            Error::CatalogNotFound(_) => 1,
            Error::Internal(_) => 32,
        }
    }
}

/// Distinct exit codes the CLI layer needs that aren't represented by a
/// dedicated `Error` variant (registration-sync timeout, catalog-backup
/// failure) — named here so `repctl-cli` doesn't hardcode magic numbers.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const CONFIG: i32 = 1;
    pub const TRANSPORT: i32 = 6;
    pub const BACKUP: i32 = 7;
    pub const PROMOTION: i32 = 8;
    pub const DB_CONNECTION: i32 = 9;
    pub const DB_QUERY: i32 = 10;
    pub const SWITCHOVER_FAIL: i32 = 16;
    pub const SWITCHOVER_INCOMPLETE: i32 = 24;
    pub const FOLLOW_FAIL: i32 = 25;
    pub const REGISTRATION_SYNC_FAIL: i32 = 26;
    pub const NO_RESTART_FAIL: i32 = 27;
    pub const RSYNC_FAIL: i32 = 28;
    pub const CATALOG_BACKUP_FAIL: i32 = 29;
    pub const OUT_OF_MEMORY: i32 = 31;
    pub const INTERNAL: i32 = 32;
}
