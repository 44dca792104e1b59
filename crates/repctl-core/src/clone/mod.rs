//! `standby clone`: materialises a new standby's data directory, either by
//! running the base-backup utility directly or by reconstructing one from
//! a managed backup catalog (spec.md §4.5). A third, legacy mode is
//! reserved but not implemented.

pub mod catalog_backup;
pub mod direct;
pub mod plan;

pub use catalog_backup::clone_catalog_backup;
pub use direct::clone_direct;
pub use plan::{CloneOutcome, CloneRequest, ExternalConfigMode, ResolvedUpstream, UpstreamConfigCheck, WalMethod};
