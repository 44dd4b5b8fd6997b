use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::body::to_bytes;
use axum::response::Response;
use serde_json::Value;

use crate::config::NotificationConfig;
use crate::workflows::leave::domain::{
    EmployeeId, LeaveApplication, LeaveRecord, LeaveType, RecordKey, RecordType, RequestId,
};
use crate::workflows::leave::notification::{
    ChannelError, DispatchError, FanoutChannel, InMemoryTopic, MessageId, NotificationDispatch,
    NotificationJob, NotificationService, OutboundMessage,
};
use crate::workflows::leave::roster::{sample_roster, seed_roster};
use crate::workflows::leave::store::{MemoryRequestStore, RequestStore, StoreError, WriteCondition};
use crate::workflows::leave::LeaveDesk;

pub(super) const JOHN: EmployeeId = EmployeeId(1001);
pub(super) const JANE: EmployeeId = EmployeeId(1002);

/// Records every job instead of queueing it.
#[derive(Default)]
pub(super) struct MemoryDispatch {
    jobs: Mutex<Vec<NotificationJob>>,
}

impl MemoryDispatch {
    pub(super) fn jobs(&self) -> Vec<NotificationJob> {
        self.jobs.lock().expect("dispatch lock").clone()
    }
}

impl NotificationDispatch for MemoryDispatch {
    fn dispatch(&self, job: NotificationJob) -> Result<(), DispatchError> {
        self.jobs.lock().expect("dispatch lock").push(job);
        Ok(())
    }
}

pub(super) struct ClosedDispatch;

impl NotificationDispatch for ClosedDispatch {
    fn dispatch(&self, _job: NotificationJob) -> Result<(), DispatchError> {
        Err(DispatchError::Closed)
    }
}

pub(super) struct FailingTopic;

impl FanoutChannel for FailingTopic {
    fn publish(&self, _message: OutboundMessage) -> Result<MessageId, ChannelError> {
        Err(ChannelError::Transport("connection reset".to_string()))
    }
}

/// Every operation fails as if the backing table were offline.
pub(super) struct UnavailableStore;

impl RequestStore for UnavailableStore {
    fn put(&self, _record: LeaveRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("table offline".to_string()))
    }

    fn put_if(&self, _record: LeaveRecord, _condition: WriteCondition) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("table offline".to_string()))
    }

    fn get(&self, _key: RecordKey) -> Result<LeaveRecord, StoreError> {
        Err(StoreError::Unavailable("table offline".to_string()))
    }

    fn query(&self, _id: RequestId) -> Result<Vec<LeaveRecord>, StoreError> {
        Err(StoreError::Unavailable("table offline".to_string()))
    }

    fn scan(&self, _kind: RecordType) -> Result<Vec<LeaveRecord>, StoreError> {
        Err(StoreError::Unavailable("table offline".to_string()))
    }
}

/// In-memory store that can stall profile reads or refuse writes of one record type.
#[derive(Default)]
pub(super) struct FlakyStore {
    inner: MemoryRequestStore,
    profile_read_delay: Option<Duration>,
    failing_writes: Mutex<Option<RecordType>>,
}

impl FlakyStore {
    /// Stall every employee read so concurrent callers observe the same revision.
    pub(super) fn with_slow_profile_reads(delay: Duration) -> Self {
        Self {
            profile_read_delay: Some(delay),
            ..Self::default()
        }
    }

    pub(super) fn fail_writes_of(&self, kind: Option<RecordType>) {
        *self.failing_writes.lock().expect("failure lock") = kind;
    }

    fn check_write(&self, record: &LeaveRecord) -> Result<(), StoreError> {
        match *self.failing_writes.lock().expect("failure lock") {
            Some(kind) if record.key().kind == kind => {
                Err(StoreError::Unavailable("throttled".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl RequestStore for FlakyStore {
    fn put(&self, record: LeaveRecord) -> Result<(), StoreError> {
        self.check_write(&record)?;
        self.inner.put(record)
    }

    fn put_if(&self, record: LeaveRecord, condition: WriteCondition) -> Result<(), StoreError> {
        self.check_write(&record)?;
        self.inner.put_if(record, condition)
    }

    fn get(&self, key: RecordKey) -> Result<LeaveRecord, StoreError> {
        if let (RecordType::Employee, Some(delay)) = (key.kind, self.profile_read_delay) {
            thread::sleep(delay);
        }
        self.inner.get(key)
    }

    fn query(&self, id: RequestId) -> Result<Vec<LeaveRecord>, StoreError> {
        self.inner.query(id)
    }

    fn scan(&self, kind: RecordType) -> Result<Vec<LeaveRecord>, StoreError> {
        self.inner.scan(kind)
    }
}

pub(super) type TestDesk = LeaveDesk<MemoryRequestStore, MemoryDispatch, InMemoryTopic>;

pub(super) struct Harness {
    pub desk: Arc<TestDesk>,
    pub store: Arc<MemoryRequestStore>,
    pub dispatch: Arc<MemoryDispatch>,
    pub topic: Arc<InMemoryTopic>,
}

pub(super) fn recipients() -> NotificationConfig {
    NotificationConfig {
        employee_email: "employee@corp.test".to_string(),
        approver_email: "approver@corp.test".to_string(),
        topic: "leave-test".to_string(),
    }
}

pub(super) fn seeded_store() -> Arc<MemoryRequestStore> {
    let store = Arc::new(MemoryRequestStore::new());
    seed_roster(store.as_ref(), sample_roster(&recipients().employee_email)).expect("seed roster");
    store
}

pub(super) fn build_desk() -> Harness {
    let store = seeded_store();
    let dispatch = Arc::new(MemoryDispatch::default());
    let topic = Arc::new(InMemoryTopic::for_recipients(&recipients()));
    let notifications = Arc::new(NotificationService::new(
        store.clone(),
        topic.clone(),
        recipients(),
    ));
    let desk = Arc::new(LeaveDesk::new(store.clone(), dispatch.clone(), notifications));
    Harness {
        desk,
        store,
        dispatch,
        topic,
    }
}

/// Desk over any store, seeded with the sample roster and recording dispatched jobs.
pub(super) fn desk_over<S>(
    store: Arc<S>,
) -> (Arc<LeaveDesk<S, MemoryDispatch, InMemoryTopic>>, Arc<MemoryDispatch>)
where
    S: RequestStore + 'static,
{
    seed_roster(store.as_ref(), sample_roster(&recipients().employee_email)).expect("seed roster");
    let dispatch = Arc::new(MemoryDispatch::default());
    let topic = Arc::new(InMemoryTopic::for_recipients(&recipients()));
    let notifications = Arc::new(NotificationService::new(store.clone(), topic, recipients()));
    let desk = Arc::new(LeaveDesk::new(store, dispatch.clone(), notifications));
    (desk, dispatch)
}

pub(super) fn application(employee_id: EmployeeId, dates: &[&str]) -> LeaveApplication {
    LeaveApplication {
        employee_id,
        dates: dates.iter().map(|date| date.to_string()).collect(),
        reason: Some("Family trip".to_string()),
        leave_type: LeaveType::Annual,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
