//! The node-check protocol: a peer `repctl` instance, invoked over SSH,
//! emits a single line of `--key=value` flags on stdout. The caller parses
//! it with the same grammar the CLI itself uses for arguments.
//!
//! Parsing is tolerant by design (spec.md §4.3): unknown keys are ignored,
//! missing keys yield `Unknown`/`None`, and an empty line yields `Unknown`.
//! An opt-in `--strict` mode (new, additive — see SPEC_FULL.md §9) is
//! offered via [`Options::parse_strict`] for callers that want unknown keys
//! to be a hard parse error instead.

mod options;
mod report;

pub use options::{Options, OptionsError};
pub use report::{
    ArchiveError, ArchiveStatus, CheckOutcome, DbConnectionStatus, Report,
    ReplicationConnectionStatus,
};
