//! Version-gated Postgres behaviour.
//!
//! The table lives in `repctl-recovery` because the recovery-config writer
//! was the first consumer and the core would otherwise depend on recovery
//! for a single struct. Re-exported here under the path other crates and
//! SPEC_FULL.md expect.
pub use repctl_recovery::Features;
