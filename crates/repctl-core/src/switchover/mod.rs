//! `standby switchover`: promotes this standby while demoting the current
//! primary, end to end, per spec.md §4.9.

mod engine;
mod state;

pub use engine::{run_switchover, SwitchoverHooks, SwitchoverRequest};
pub use state::{SwitchoverResult, SwitchoverState, VerifyOutcome};
