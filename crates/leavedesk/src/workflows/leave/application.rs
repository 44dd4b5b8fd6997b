use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use super::domain::{
    EmployeeId, EmployeeProfile, LeaveApplication, LeaveEvent, LeaveRecord, LeaveRequest,
    LeaveStatus, LeaveStatusView, LeaveType, RequestId,
};
use super::error::WorkflowError;
use super::lifecycle::{next_status, LeaveTransition};
use super::notification::dispatch::dispatch_or_warn;
use super::notification::{NotificationDispatch, NotificationJob};
use super::records::{
    all_requests, ensure_balance, load_decision, load_employee, load_request, transition_error,
};
use super::store::{RequestStore, StoreError, WriteCondition};
use crate::config::NotificationConfig;

/// Accepts new leave requests and cancellations.
pub struct LeaveApplicationService<S, D> {
    store: Arc<S>,
    dispatch: Arc<D>,
    recipients: NotificationConfig,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Upper bound on id collisions tolerated before `apply` gives up.
const MAX_ID_ATTEMPTS: usize = 32;

fn next_request_id() -> RequestId {
    RequestId(REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

impl<S, D> LeaveApplicationService<S, D>
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

    /// Create a `Pending` request and queue the `Applied` notification.
    pub fn apply(&self, application: LeaveApplication) -> Result<LeaveRequest, WorkflowError> {
        let LeaveApplication {
            employee_id,
            dates,
            reason,
            leave_type,
        } = application;

        let dates = parse_leave_dates(&dates)?;
        let reason = reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());
        let employee = load_employee(self.store.as_ref(), employee_id)?;
        let days = u32::try_from(dates.len()).unwrap_or(u32::MAX);
        ensure_balance(&employee, leave_type, days)?;

        let mut request = LeaveRequest {
            id: next_request_id(),
            employee_id,
            employee_name: employee.name,
            leave_type,
            dates,
            reason,
            status: LeaveStatus::Pending,
            employee_email: self.recipients.employee_email.clone(),
            approver_email: self.recipients.approver_email.clone(),
            applied_at: Utc::now(),
            cancelled_at: None,
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.store.put_if(
                LeaveRecord::Request(request.clone()),
                WriteCondition::NotExists,
            ) {
                Ok(()) => break,
                Err(StoreError::ConditionFailed { key, .. }) if attempts < MAX_ID_ATTEMPTS => {
                    debug!(%key, "request id taken, allocating another");
                    request.id = next_request_id();
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(
            leave_id = %request.id,
            employee_id = %request.employee_id,
            leave_type = %request.leave_type,
            days = request.duration(),
            "leave request submitted"
        );

        dispatch_or_warn(
            self.dispatch.as_ref(),
            NotificationJob {
                leave_id: request.id,
                event: LeaveEvent::Applied,
            },
        );

        Ok(request)
    }

    /// Move a `Pending` request to `Cancelled`.
    pub fn cancel(&self, leave_id: RequestId) -> Result<LeaveRequest, WorkflowError> {
        let current = load_request(self.store.as_ref(), leave_id)?;
        let target = next_status(current.status, LeaveTransition::Cancel).ok_or(
            WorkflowError::InvalidState {
                id: leave_id,
                status: current.status,
                attempted: LeaveTransition::Cancel.label(),
            },
        )?;

        let observed = current.status;
        let mut updated = current;
        updated.status = target;
        updated.cancelled_at = Some(Utc::now());

        self.store
            .put_if(
                LeaveRecord::Request(updated.clone()),
                WriteCondition::StatusIs(observed),
            )
            .map_err(|err| transition_error(err, leave_id, LeaveTransition::Cancel, observed))?;

        info!(%leave_id, "leave request cancelled");

        dispatch_or_warn(
            self.dispatch.as_ref(),
            NotificationJob {
                leave_id,
                event: LeaveEvent::Cancelled,
            },
        );

        Ok(updated)
    }

    /// Cancel the most recently applied request matching employee, type, and first day.
    pub fn cancel_matching(
        &self,
        employee_id: EmployeeId,
        leave_type: LeaveType,
        start_date: NaiveDate,
    ) -> Result<LeaveRequest, WorkflowError> {
        let candidate = all_requests(self.store.as_ref())?
            .into_iter()
            .filter(|request| {
                request.employee_id == employee_id
                    && request.leave_type == leave_type
                    && request.start_date() == Some(start_date)
            })
            .max_by_key(|request| request.applied_at)
            .ok_or_else(|| {
                WorkflowError::validation(format!(
                    "no {leave_type} leave request for employee {employee_id} starting {start_date}"
                ))
            })?;

        self.cancel(candidate.id)
    }

    pub fn status(&self, leave_id: RequestId) -> Result<LeaveStatusView, WorkflowError> {
        let request = load_request(self.store.as_ref(), leave_id)?;
        let decision = load_decision(self.store.as_ref(), leave_id)?;
        Ok(LeaveStatusView::new(&request, decision.as_ref()))
    }

    /// Requests filed by an employee, newest first.
    pub fn history(&self, employee_id: EmployeeId) -> Result<Vec<LeaveRequest>, WorkflowError> {
        let mut requests: Vec<LeaveRequest> = all_requests(self.store.as_ref())?
            .into_iter()
            .filter(|request| request.employee_id == employee_id)
            .collect();
        requests.sort_by(|a, b| b.applied_at.cmp(&a.applied_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    pub fn balance(&self, employee_id: EmployeeId) -> Result<EmployeeProfile, WorkflowError> {
        load_employee(self.store.as_ref(), employee_id)
    }
}

/// Longest request accepted, in days. Covers a full leap year.
pub const MAX_REQUEST_DAYS: usize = 366;

/// Parse `YYYY-MM-DD` strings into a sorted, de-duplicated list of days.
pub fn parse_leave_dates(raw: &[String]) -> Result<Vec<NaiveDate>, WorkflowError> {
    if raw.is_empty() {
        return Err(WorkflowError::validation(
            "at least one leave date is required",
        ));
    }
    if raw.len() > MAX_REQUEST_DAYS {
        return Err(WorkflowError::validation(format!(
            "a leave request may cover at most {MAX_REQUEST_DAYS} days, got {}",
            raw.len()
        )));
    }

    let mut days = BTreeSet::new();
    for value in raw {
        let trimmed = value.trim();
        let day = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|err| {
            WorkflowError::validation(format!(
                "failed to parse '{trimmed}' as YYYY-MM-DD ({err})"
            ))
        })?;
        days.insert(day);
    }

    Ok(days.into_iter().collect())
}

/// Expand an inclusive `start..=end` range into individual days.
pub fn date_range(start: &str, end: Option<&str>) -> Result<Vec<String>, WorkflowError> {
    let parsed = parse_leave_dates(&[start.to_string()])?;
    let first = parsed[0];
    let last = match end.map(str::trim).filter(|end| !end.is_empty()) {
        Some(end) => parse_leave_dates(&[end.to_string()])?[0],
        None => first,
    };

    if last < first {
        return Err(WorkflowError::validation(format!(
            "end date {last} is before start date {first}"
        )));
    }
    let span = (last - first).num_days() + 1;
    if span > MAX_REQUEST_DAYS as i64 {
        return Err(WorkflowError::validation(format!(
            "a leave request may cover at most {MAX_REQUEST_DAYS} days, got {first} to {last} ({span} days)"
        )));
    }

    Ok(first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|day| day.format("%Y-%m-%d").to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_sorted_and_deduplicated() {
        let parsed = parse_leave_dates(&[
            "2024-06-03".to_string(),
            " 2024-06-01 ".to_string(),
            "2024-06-03".to_string(),
        ])
        .expect("valid dates");
        assert_eq!(
            parsed,
            vec![
                NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid"),
                NaiveDate::from_ymd_opt(2024, 6, 3).expect("valid"),
            ]
        );
    }

    #[test]
    fn empty_and_malformed_dates_fail_validation() {
        assert!(matches!(
            parse_leave_dates(&[]),
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            parse_leave_dates(&["06/01/2024".to_string()]),
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            parse_leave_dates(&["2024-02-30".to_string()]),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn date_range_is_inclusive() {
        let days = date_range("2024-06-28", Some("2024-07-01")).expect("range");
        assert_eq!(
            days,
            vec!["2024-06-28", "2024-06-29", "2024-06-30", "2024-07-01"]
        );
        assert_eq!(date_range("2024-06-28", None).expect("single"), vec!["2024-06-28"]);
        assert!(date_range("2024-06-28", Some("2024-06-01")).is_err());
    }

    #[test]
    fn oversized_requests_are_rejected_before_expansion() {
        match date_range("0001-01-01", Some("9999-12-31")) {
            Err(WorkflowError::Validation(message)) => assert!(message.contains("at most 366")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(
            date_range("2024-01-01", Some("2024-12-31"))
                .expect("leap year fits")
                .len(),
            MAX_REQUEST_DAYS
        );
        assert!(date_range("2024-01-01", Some("2025-01-01")).is_err());

        let too_many = vec!["2024-06-01".to_string(); MAX_REQUEST_DAYS + 1];
        assert!(matches!(
            parse_leave_dates(&too_many),
            Err(WorkflowError::Validation(_))
        ));
    }
}
