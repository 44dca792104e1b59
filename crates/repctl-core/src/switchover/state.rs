//! The switchover state machine's states and final classification, per
//! spec.md §4.9.

/// Executed, in order, on the promotion candidate (the local standby being
/// promoted). No state is ever re-entered (spec.md §5 ordering guarantee).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SwitchoverState {
    Init,
    Precheck,
    PauseDaemons,
    StopPrimary,
    WaitWalFlush,
    Promote,
    Rejoin,
    AttachSiblings,
    UnpauseDaemons,
    Verify,
    Done,
}

impl SwitchoverState {
    pub const SEQUENCE: [SwitchoverState; 11] = [
        SwitchoverState::Init,
        SwitchoverState::Precheck,
        SwitchoverState::PauseDaemons,
        SwitchoverState::StopPrimary,
        SwitchoverState::WaitWalFlush,
        SwitchoverState::Promote,
        SwitchoverState::Rejoin,
        SwitchoverState::AttachSiblings,
        SwitchoverState::UnpauseDaemons,
        SwitchoverState::Verify,
        SwitchoverState::Done,
    ];

    /// Once this state has completed successfully, the engine must always
    /// continue on to `UnpauseDaemons` even if a later state fails —
    /// paused failover daemons must never be left paused (spec.md §5
    /// cancellation rule).
    pub fn reached_point_of_no_return(self) -> bool {
        self >= SwitchoverState::Promote
    }
}

/// The classification VERIFY assigns, and the event detail recorded
/// alongside the `standby_switchover` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Success,
    JoinFailNoPing,
    JoinFailNoReplication,
}

/// What the engine as a whole reports, and the exit-code family it maps to
/// (spec.md §6: distinct codes for SUCCESS, INCOMPLETE, FAIL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchoverResult {
    Success,
    /// Reached PROMOTE but VERIFY was partial (`JoinFail*`).
    Incomplete { verify: VerifyOutcome, detail: String },
    /// Failed before PROMOTE; `state` names where it stopped.
    Fail { state: SwitchoverState, detail: String },
}

impl SwitchoverResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            SwitchoverResult::Success => 0,
            SwitchoverResult::Incomplete { .. } => 24,
            SwitchoverResult::Fail { .. } => 16,
        }
    }
}
