use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{LeaveRecord, LeaveStatus, RecordKey, RecordType, RequestId};

/// Precondition evaluated atomically against the entry currently stored under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// No entry exists for the key yet.
    NotExists,
    /// An entry exists and carries this status.
    StatusIs(LeaveStatus),
    /// An employee profile exists at exactly this revision.
    RevisionIs(u64),
}

impl WriteCondition {
    fn holds(self, current: Option<&LeaveRecord>) -> bool {
        match self {
            WriteCondition::NotExists => current.is_none(),
            WriteCondition::StatusIs(expected) => {
                current.and_then(LeaveRecord::status) == Some(expected)
            }
            WriteCondition::RevisionIs(expected) => {
                current.and_then(LeaveRecord::revision) == Some(expected)
            }
        }
    }
}

/// Keyed storage for leave records. `(id, type)` is the only key.
pub trait RequestStore: Send + Sync {
    /// Insert or overwrite the entry for the record's key.
    fn put(&self, record: LeaveRecord) -> Result<(), StoreError>;
    /// Write only when `condition` holds for the current entry.
    fn put_if(&self, record: LeaveRecord, condition: WriteCondition) -> Result<(), StoreError>;
    fn get(&self, key: RecordKey) -> Result<LeaveRecord, StoreError>;
    /// Request and decision records sharing a request id, ordered by record type.
    fn query(&self, id: RequestId) -> Result<Vec<LeaveRecord>, StoreError>;
    fn scan(&self, kind: RecordType) -> Result<Vec<LeaveRecord>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(RecordKey),
    #[error("conditional write on {key} failed (current status: {})", describe_status(.actual))]
    ConditionFailed {
        key: RecordKey,
        actual: Option<LeaveStatus>,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

fn describe_status(status: &Option<LeaveStatus>) -> &'static str {
    status.map(LeaveStatus::label).unwrap_or("none")
}

/// Single-lock in-memory table; every operation is linearizable.
#[derive(Debug, Default)]
pub struct MemoryRequestStore {
    records: Mutex<BTreeMap<RecordKey, LeaveRecord>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = LeaveRecord>,
    {
        let records = records
            .into_iter()
            .map(|record| (record.key(), record))
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|guard| guard.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<RecordKey, LeaveRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("record table lock poisoned".to_string()))
    }
}

impl RequestStore for MemoryRequestStore {
    fn put(&self, record: LeaveRecord) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.insert(record.key(), record);
        Ok(())
    }

    fn put_if(&self, record: LeaveRecord, condition: WriteCondition) -> Result<(), StoreError> {
        let key = record.key();
        let mut guard = self.lock()?;
        let current = guard.get(&key);
        if !condition.holds(current) {
            return Err(StoreError::ConditionFailed {
                key,
                actual: current.and_then(LeaveRecord::status),
            });
        }
        guard.insert(key, record);
        Ok(())
    }

    fn get(&self, key: RecordKey) -> Result<LeaveRecord, StoreError> {
        let guard = self.lock()?;
        guard.get(&key).cloned().ok_or(StoreError::NotFound(key))
    }

    fn query(&self, id: RequestId) -> Result<Vec<LeaveRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .iter()
            .filter(|(key, _)| key.id == id.0 && key.kind != RecordType::Employee)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn scan(&self, kind: RecordType) -> Result<Vec<LeaveRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::leave::domain::{
        Decision, EmployeeId, EmployeeProfile, LeaveDecision, LeaveRequest, LeaveType,
    };
    use chrono::{NaiveDate, TimeZone, Utc};

    fn pending(id: u64) -> LeaveRecord {
        LeaveRecord::Request(LeaveRequest {
            id: RequestId(id),
            employee_id: EmployeeId(1001),
            employee_name: "John Doe".to_string(),
            leave_type: LeaveType::Annual,
            dates: vec![NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")],
            reason: None,
            status: LeaveStatus::Pending,
            employee_email: "employee@example.com".to_string(),
            approver_email: "approver@example.com".to_string(),
            applied_at: Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap(),
            cancelled_at: None,
        })
    }

    fn with_status(record: LeaveRecord, status: LeaveStatus) -> LeaveRecord {
        let mut request = record.into_request().expect("request record");
        request.status = status;
        LeaveRecord::Request(request)
    }

    #[test]
    fn get_reports_missing_keys() {
        let store = MemoryRequestStore::new();
        let key = RecordKey::request(RequestId(7));
        match store.get(key) {
            Err(StoreError::NotFound(missing)) => assert_eq!(missing, key),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn not_exists_condition_rejects_duplicates() {
        let store = MemoryRequestStore::new();
        store
            .put_if(pending(1), WriteCondition::NotExists)
            .expect("first insert");

        match store.put_if(pending(1), WriteCondition::NotExists) {
            Err(StoreError::ConditionFailed { actual, .. }) => {
                assert_eq!(actual, Some(LeaveStatus::Pending))
            }
            other => panic!("expected condition failure, got {other:?}"),
        }
    }

    #[test]
    fn status_condition_guards_transitions() {
        let store = MemoryRequestStore::new();
        store.put(pending(2)).expect("seed");

        store
            .put_if(
                with_status(pending(2), LeaveStatus::Approved),
                WriteCondition::StatusIs(LeaveStatus::Pending),
            )
            .expect("pending -> approved");

        let err = store
            .put_if(
                with_status(pending(2), LeaveStatus::Rejected),
                WriteCondition::StatusIs(LeaveStatus::Pending),
            )
            .expect_err("second transition loses");
        assert!(matches!(
            err,
            StoreError::ConditionFailed {
                actual: Some(LeaveStatus::Approved),
                ..
            }
        ));
    }

    #[test]
    fn revision_condition_rejects_stale_profiles() {
        let profile = EmployeeProfile {
            id: EmployeeId(1001),
            name: "John Doe".to_string(),
            department: "Engineering".to_string(),
            email: "employee@example.com".to_string(),
            leave_balances: LeaveType::default_balances(),
            revision: 0,
        };
        let store = MemoryRequestStore::with_records([LeaveRecord::Employee(profile.clone())]);

        let mut first = profile.clone();
        first.revision = 1;
        store
            .put_if(LeaveRecord::Employee(first), WriteCondition::RevisionIs(0))
            .expect("fresh revision");

        let mut stale = profile;
        stale.revision = 1;
        assert!(matches!(
            store.put_if(LeaveRecord::Employee(stale), WriteCondition::RevisionIs(0)),
            Err(StoreError::ConditionFailed { actual: None, .. })
        ));
        assert!(matches!(
            store.put_if(pending(9), WriteCondition::RevisionIs(0)),
            Err(StoreError::ConditionFailed { .. })
        ));
    }

    #[test]
    fn query_returns_every_view_of_an_id() {
        let store = MemoryRequestStore::new();
        store.put(pending(3)).expect("request");
        store
            .put(LeaveRecord::Decision(LeaveDecision {
                id: RequestId(3),
                decision: Decision::Reject,
                status: LeaveStatus::Rejected,
                reason: Some("deadline".to_string()),
                approver_email: "approver@example.com".to_string(),
                decided_at: Utc.with_ymd_and_hms(2024, 5, 21, 9, 0, 0).unwrap(),
            }))
            .expect("decision");
        store.put(pending(4)).expect("other request");

        let records = store.query(RequestId(3)).expect("query");
        let kinds: Vec<RecordType> = records.iter().map(|record| record.key().kind).collect();
        assert_eq!(kinds, vec![RecordType::Request, RecordType::Decision]);
        assert_eq!(store.scan(RecordType::Request).expect("scan").len(), 2);
    }
}
