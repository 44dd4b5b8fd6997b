use std::sync::Arc;

use super::application::LeaveApplicationService;
use super::approval::LeaveApprovalService;
use super::notification::{FanoutChannel, NotificationDispatch, NotificationService};
use super::store::RequestStore;
use crate::config::NotificationConfig;

/// The three workflow services wired over one store.
pub struct LeaveDesk<S, D, C> {
    pub applications: LeaveApplicationService<S, D>,
    pub approvals: LeaveApprovalService<S, D>,
    pub notifications: Arc<NotificationService<S, C>>,
}

impl<S, D, C> LeaveDesk<S, D, C>
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    pub fn new(
        store: Arc<S>,
        dispatch: Arc<D>,
        notifications: Arc<NotificationService<S, C>>,
    ) -> Self {
        let recipients: NotificationConfig = notifications.config().clone();
        Self {
            applications: LeaveApplicationService::new(
                store.clone(),
                dispatch.clone(),
                recipients.clone(),
            ),
            approvals: LeaveApprovalService::new(store, dispatch, recipients),
            notifications,
        }
    }
}
