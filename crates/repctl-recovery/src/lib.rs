//! Renders the parameters a standby's database needs to start replicating
//! from a given upstream.
//!
//! For database versions < 12 this is a dedicated `recovery.conf`; for
//! versions >= 12 the same keys are merged into `postgresql.auto.conf` plus
//! an empty `standby.signal` marker file (spec.md §4.4).

pub mod features;
mod params;
mod writer;

pub use features::Features;
pub use params::RecoveryParams;
pub use writer::{RecoveryWriter, WriteOutcome};
