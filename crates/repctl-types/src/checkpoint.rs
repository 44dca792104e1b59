use crate::Lsn;
use serde::{Deserialize, Serialize};

/// Returned by the node-check protocol's `--is-shutdown-cleanly` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub last_checkpoint_lsn: Lsn,
    pub shutdown_state: ShutdownState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    ShutdownClean,
    ShutdownUnclean,
    Unknown,
}

impl ShutdownState {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            ShutdownState::Running => "RUNNING",
            ShutdownState::ShuttingDown => "SHUTTING_DOWN",
            ShutdownState::ShutdownClean => "SHUTDOWN",
            ShutdownState::ShutdownUnclean => "UNCLEAN_SHUTDOWN",
            ShutdownState::Unknown => "UNKNOWN",
        }
    }

    pub fn from_wire_str(s: &str) -> Self {
        match s {
            "RUNNING" => ShutdownState::Running,
            "SHUTTING_DOWN" => ShutdownState::ShuttingDown,
            "SHUTDOWN" => ShutdownState::ShutdownClean,
            "UNCLEAN_SHUTDOWN" => ShutdownState::ShutdownUnclean,
            _ => ShutdownState::Unknown,
        }
    }
}
