//! Transition table for the leave request lifecycle.
//!
//! `Pending` is the only state with outgoing edges; the three outcomes are terminal.

use super::domain::{Decision, LeaveStatus};

/// Actions that move a request out of its current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveTransition {
    Cancel,
    Approve,
    Reject,
}

impl LeaveTransition {
    pub const fn label(self) -> &'static str {
        match self {
            LeaveTransition::Cancel => "cancel",
            LeaveTransition::Approve => "approve",
            LeaveTransition::Reject => "reject",
        }
    }
}

impl From<Decision> for LeaveTransition {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approve => LeaveTransition::Approve,
            Decision::Reject => LeaveTransition::Reject,
        }
    }
}

const TRANSITIONS: [(LeaveStatus, LeaveTransition, LeaveStatus); 3] = [
    (
        LeaveStatus::Pending,
        LeaveTransition::Cancel,
        LeaveStatus::Cancelled,
    ),
    (
        LeaveStatus::Pending,
        LeaveTransition::Approve,
        LeaveStatus::Approved,
    ),
    (
        LeaveStatus::Pending,
        LeaveTransition::Reject,
        LeaveStatus::Rejected,
    ),
];

/// Target status for `transition` from `from`, or `None` when the edge does not exist.
pub fn next_status(from: LeaveStatus, transition: LeaveTransition) -> Option<LeaveStatus> {
    TRANSITIONS
        .iter()
        .find(|(source, action, _)| *source == from && *action == transition)
        .map(|(_, _, target)| *target)
}

pub fn is_terminal(status: LeaveStatus) -> bool {
    TRANSITIONS.iter().all(|(source, _, _)| *source != status)
}
