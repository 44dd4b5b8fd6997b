use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use super::domain::{
    Decision, EmployeeId, LeaveDecision, LeaveEvent, LeaveRecord, LeaveRequest, LeaveStatus,
    RequestId,
};
use super::error::WorkflowError;
use super::lifecycle::{next_status, LeaveTransition};
use super::notification::dispatch::dispatch_or_warn;
use super::notification::{NotificationDispatch, NotificationJob};
use super::records::{
    all_requests, ensure_balance, load_request, transition_error, update_balance,
};
use super::store::{RequestStore, WriteCondition};
use crate::config::NotificationConfig;

pub const DEFAULT_PENDING_LIMIT: usize = 10;

/// Records approver decisions on pending requests.
pub struct LeaveApprovalService<S, D> {
    store: Arc<S>,
    dispatch: Arc<D>,
    recipients: NotificationConfig,
}

impl<S, D> LeaveApprovalService<S, D>
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
{
    pub fn new(store: Arc<S>, dispatch: Arc<D>, recipients: NotificationConfig) -> Self {
        Self {
            store,
            dispatch,
            recipients,
        }
    }

    /// Approve or reject a `Pending` request.
    ///
    /// The status write is conditional on the request still being `Pending`, so of
    /// two concurrent decisions exactly one lands; the other observes
    /// [`WorkflowError::InvalidState`]. Approval draws the request's days from the
    /// employee's balance before the status write and hands them back if that write
    /// is lost, so an error before the commit leaves the request decidable.
    pub fn decide(
        &self,
        leave_id: RequestId,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<LeaveDecision, WorkflowError> {
        let transition = LeaveTransition::from(decision);
        let request = load_request(self.store.as_ref(), leave_id)?;
        let target =
            next_status(request.status, transition).ok_or(WorkflowError::InvalidState {
                id: leave_id,
                status: request.status,
                attempted: transition.label(),
            })?;

        let remaining = if decision == Decision::Approve {
            let days = request.duration();
            let remaining = update_balance(
                self.store.as_ref(),
                request.employee_id,
                request.leave_type,
                |profile| {
                    ensure_balance(profile, request.leave_type, days)
                        .map(|available| available - days)
                },
            )?;
            Some(remaining)
        } else {
            None
        };

        let observed = request.status;
        let mut updated = request;
        updated.status = target;
        if let Err(err) = self.store.put_if(
            LeaveRecord::Request(updated.clone()),
            WriteCondition::StatusIs(observed),
        ) {
            if remaining.is_some() {
                self.restore_balance(&updated);
            }
            return Err(transition_error(err, leave_id, transition, observed));
        }

        if let Some(remaining) = remaining {
            info!(
                %leave_id,
                employee_id = %updated.employee_id,
                leave_type = %updated.leave_type,
                remaining,
                "leave balance updated"
            );
        }

        let outcome = LeaveDecision {
            id: leave_id,
            decision,
            status: target,
            reason: reason
                .map(|reason| reason.trim().to_string())
                .filter(|reason| !reason.is_empty()),
            approver_email: self.recipients.approver_email.clone(),
            decided_at: Utc::now(),
        };
        // The status is committed; a missing decision record only loses the reason.
        if let Err(err) = self.store.put_if(
            LeaveRecord::Decision(outcome.clone()),
            WriteCondition::NotExists,
        ) {
            error!(%leave_id, status = %target, error = %err, "failed to record leave decision");
        }

        info!(%leave_id, status = %target, "leave request decided");

        dispatch_or_warn(
            self.dispatch.as_ref(),
            NotificationJob {
                leave_id,
                event: LeaveEvent::for_status(target),
            },
        );

        Ok(outcome)
    }

    fn restore_balance(&self, request: &LeaveRequest) {
        let days = request.duration();
        let restored = update_balance(
            self.store.as_ref(),
            request.employee_id,
            request.leave_type,
            |profile| {
                Ok(profile
                    .leave_balances
                    .get(&request.leave_type)
                    .copied()
                    .unwrap_or_default()
                    .saturating_add(days))
            },
        );
        match restored {
            Ok(balance) => debug!(
                leave_id = %request.id,
                employee_id = %request.employee_id,
                balance,
                "leave balance restored after a lost decision"
            ),
            Err(err) => error!(
                leave_id = %request.id,
                employee_id = %request.employee_id,
                days,
                error = %err,
                "failed to restore leave balance after a lost decision"
            ),
        }
    }

    /// Pending requests, oldest first, optionally narrowed to one employee.
    pub fn pending(
        &self,
        employee_id: Option<EmployeeId>,
        limit: usize,
    ) -> Result<Vec<LeaveRequest>, WorkflowError> {
        let mut requests: Vec<LeaveRequest> = all_requests(self.store.as_ref())?
            .into_iter()
            .filter(|request| request.status == LeaveStatus::Pending)
            .filter(|request| employee_id.map_or(true, |id| request.employee_id == id))
            .collect();
        requests.sort_by(|a, b| a.applied_at.cmp(&b.applied_at).then(a.id.cmp(&b.id)));
        requests.truncate(limit);
        Ok(requests)
    }
}
