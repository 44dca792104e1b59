//! Remote command execution over SSH.
//!
//! Every node-touching subsystem above this crate talks to a possibly-down
//! database through here: SSH is the one channel guaranteed to work even
//! when the target node's database is shut down.

mod conninfo;
mod error;
mod ssh;

pub use conninfo::render_conninfo;
pub use error::{Error, Result};
pub use ssh::{CommandOutput, SshOptions, SshTransport};
