//! Typed lookups over the untyped record store.

use super::domain::{
    EmployeeId, EmployeeProfile, LeaveDecision, LeaveRecord, LeaveRequest, LeaveStatus, LeaveType,
    RecordKey, RecordType, RequestId,
};
use super::error::WorkflowError;
use super::lifecycle::LeaveTransition;
use super::store::{RequestStore, StoreError, WriteCondition};

/// Lost revision races tolerated before a balance update gives up.
const MAX_BALANCE_ATTEMPTS: usize = 16;

pub(crate) fn load_request<S>(store: &S, id: RequestId) -> Result<LeaveRequest, WorkflowError>
where
    S: RequestStore + ?Sized,
{
    let key = RecordKey::request(id);
    store
        .get(key)?
        .into_request()
        .ok_or_else(|| mismatched(key))
}

pub(crate) fn load_decision<S>(
    store: &S,
    id: RequestId,
) -> Result<Option<LeaveDecision>, WorkflowError>
where
    S: RequestStore + ?Sized,
{
    match store.get(RecordKey::decision(id)) {
        Ok(record) => Ok(record.into_decision()),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn load_employee<S>(
    store: &S,
    id: EmployeeId,
) -> Result<EmployeeProfile, WorkflowError>
where
    S: RequestStore + ?Sized,
{
    let key = RecordKey::employee(id);
    store
        .get(key)?
        .into_employee()
        .ok_or_else(|| mismatched(key))
}

pub(crate) fn all_requests<S>(store: &S) -> Result<Vec<LeaveRequest>, WorkflowError>
where
    S: RequestStore + ?Sized,
{
    Ok(store
        .scan(RecordType::Request)?
        .into_iter()
        .filter_map(LeaveRecord::into_request)
        .collect())
}

/// Maps a lost conditional write onto the caller-facing transition error.
pub(crate) fn transition_error(
    err: StoreError,
    id: RequestId,
    transition: LeaveTransition,
    observed: LeaveStatus,
) -> WorkflowError {
    match err {
        StoreError::ConditionFailed { actual, .. } => WorkflowError::InvalidState {
            id,
            status: actual.unwrap_or(observed),
            attempted: transition.label(),
        },
        other => other.into(),
    }
}

/// Confirms the employee holds enough of `leave_type` for `days`.
pub(crate) fn ensure_balance(
    profile: &EmployeeProfile,
    leave_type: LeaveType,
    days: u32,
) -> Result<u32, WorkflowError> {
    let available = profile
        .leave_balances
        .get(&leave_type)
        .copied()
        .ok_or_else(|| {
            WorkflowError::validation(format!(
                "leave type {leave_type} not found in {}'s leave balances",
                profile.name
            ))
        })?;

    if available < days {
        return Err(WorkflowError::validation(format!(
            "insufficient {leave_type} leave balance: available {available}, required {days}"
        )));
    }

    Ok(available)
}

/// Rewrites one leave balance with a revision-guarded compare-and-swap.
///
/// `update` receives the freshly loaded profile and returns the new balance; it is
/// re-run against the latest profile whenever another writer got in first.
pub(crate) fn update_balance<S, F>(
    store: &S,
    employee_id: EmployeeId,
    leave_type: LeaveType,
    update: F,
) -> Result<u32, WorkflowError>
where
    S: RequestStore + ?Sized,
    F: Fn(&EmployeeProfile) -> Result<u32, WorkflowError>,
{
    for _ in 0..MAX_BALANCE_ATTEMPTS {
        let mut profile = load_employee(store, employee_id)?;
        let balance = update(&profile)?;
        let expected = profile.revision;
        profile.leave_balances.insert(leave_type, balance);
        profile.revision = expected.wrapping_add(1);

        match store.put_if(
            LeaveRecord::Employee(profile),
            WriteCondition::RevisionIs(expected),
        ) {
            Ok(()) => return Ok(balance),
            Err(StoreError::ConditionFailed { .. }) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(WorkflowError::Store(StoreError::Unavailable(format!(
        "balance of employee {employee_id} kept changing underneath the update"
    ))))
}

fn mismatched(key: RecordKey) -> WorkflowError {
    WorkflowError::Store(StoreError::Unavailable(format!(
        "record {key} holds an unexpected payload"
    )))
}
