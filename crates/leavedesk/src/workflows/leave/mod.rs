//! Leave management workflow: application, approval, and notification services over a
//! conditional-write record store.
//!
//! Every request status change is a conditional write expecting `Pending`, so concurrent
//! cancels and decisions on one request resolve to exactly one winner. Notifications
//! leave the services through a fire-and-forget dispatch queue.

pub mod application;
pub mod approval;
pub mod desk;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod notification;
pub(crate) mod records;
pub mod roster;
pub mod router;
pub mod store;
pub mod trigger;

#[cfg(test)]
mod tests;

pub use application::{date_range, parse_leave_dates, LeaveApplicationService, MAX_REQUEST_DAYS};
pub use approval::{LeaveApprovalService, DEFAULT_PENDING_LIMIT};
pub use desk::LeaveDesk;
pub use domain::{
    Decision, EmployeeId, EmployeeProfile, LeaveApplication, LeaveDecision, LeaveEvent,
    LeaveRecord, LeaveRequest, LeaveStatus, LeaveStatusView, LeaveType, RecordKey, RecordType,
    RequestId,
};
pub use error::WorkflowError;
pub use lifecycle::{next_status, LeaveTransition};
pub use notification::{
    notification_queue, ChannelError, DispatchWorker, FanoutChannel, InMemoryTopic,
    NotificationDispatch, NotificationJob, NotificationReceipt, NotificationService,
    QueuedDispatcher,
};
pub use roster::{sample_roster, seed_roster, RosterError, RosterImporter};
pub use router::leave_router;
pub use store::{MemoryRequestStore, RequestStore, StoreError, WriteCondition};
pub use trigger::{handle_action, ActionGroupEvent, ActionGroupResponse};
