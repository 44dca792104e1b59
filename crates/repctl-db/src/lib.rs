//! Typed access to the catalog (the table of node records, shared by every
//! node in the cluster) and to whichever database a caller happens to be
//! connected to (used for the recovery-type/replication-activity checks that
//! run against a standby or primary directly, not through the catalog).

mod conn;
mod error;
mod pg;

pub use conn::{DbConn, RecoveryType, ReplicationRole, SiblingAttachState, UpstreamGucs};
pub use error::{Error, Result};
pub use pg::PgCatalog;
