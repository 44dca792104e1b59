//! Standby lifecycle orchestration: clone, register, unregister, promote,
//! follow, and switchover a Postgres standby against a shared cluster
//! catalog.
//!
//! Every subsystem here takes its dependencies (an open [`repctl_db::DbConn`],
//! an [`repctl_transport::SshTransport`], a [`repctl_recovery::RecoveryWriter`])
//! as plain arguments rather than reaching for ambient/global state — see
//! `repctl_config::Context`, which the CLI layer builds once per invocation
//! and threads through by reference.

pub mod clone;
pub mod error;
pub mod features;
pub mod follow;
pub mod promote;
pub mod register;
pub mod siblings;
pub mod switchover;

#[cfg(test)]
mod testutil;

pub use error::{Error, Result};
