use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::channel::FanoutChannel;
use super::service::NotificationService;
use crate::workflows::leave::domain::{LeaveEvent, RequestId};
use crate::workflows::leave::store::RequestStore;

/// Notification handed off by the application and approval services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub leave_id: RequestId,
    pub event: LeaveEvent,
}

/// Outbound hand-off for notifications. Callers never wait on delivery.
pub trait NotificationDispatch: Send + Sync {
    fn dispatch(&self, job: NotificationJob) -> Result<(), DispatchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("notification queue is closed")]
    Closed,
}

/// Enqueue `job`, logging instead of failing when the queue is gone.
pub(crate) fn dispatch_or_warn<D>(dispatch: &D, job: NotificationJob)
where
    D: NotificationDispatch + ?Sized,
{
    match dispatch.dispatch(job) {
        Ok(()) => debug!(leave_id = %job.leave_id, event = job.event.label(), "notification queued"),
        Err(err) => warn!(
            leave_id = %job.leave_id,
            event = job.event.label(),
            error = %err,
            "notification dropped"
        ),
    }
}

/// Sender half of the in-process notification queue.
#[derive(Debug, Clone)]
pub struct QueuedDispatcher {
    sender: mpsc::UnboundedSender<NotificationJob>,
}

impl NotificationDispatch for QueuedDispatcher {
    fn dispatch(&self, job: NotificationJob) -> Result<(), DispatchError> {
        self.sender.send(job).map_err(|_| DispatchError::Closed)
    }
}

/// Drains the queue and drives the notification service.
pub struct DispatchWorker<S, C> {
    receiver: mpsc::UnboundedReceiver<NotificationJob>,
    service: Arc<NotificationService<S, C>>,
}

/// Build a connected dispatcher/worker pair.
pub fn notification_queue<S, C>(
    service: Arc<NotificationService<S, C>>,
) -> (QueuedDispatcher, DispatchWorker<S, C>)
where
    S: RequestStore + 'static,
    C: FanoutChannel + 'static,
{
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        QueuedDispatcher { sender },
        DispatchWorker { receiver, service },
    )
}

/// Counters reported when a worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

impl<S, C> DispatchWorker<S, C>
where
    S: RequestStore + 'static,
    C: FanoutChannel + 'static,
{
    /// Runs until every dispatcher handle is dropped.
    pub async fn run(mut self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        while let Some(job) = self.receiver.recv().await {
            match self.service.notify(job.leave_id, job.event) {
                Ok(_) => summary.delivered += 1,
                Err(err) => {
                    summary.failed += 1;
                    error!(
                        leave_id = %job.leave_id,
                        event = job.event.label(),
                        kind = err.kind(),
                        error = %err,
                        "queued notification failed"
                    );
                }
            }
        }

        info!(
            delivered = summary.delivered,
            failed = summary.failed,
            "notification worker stopped"
        );
        summary
    }
}
