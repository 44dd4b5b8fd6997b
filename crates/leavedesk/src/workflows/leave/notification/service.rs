use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::channel::{FanoutChannel, MessageId, OutboundMessage};
use super::templates::render;
use crate::config::NotificationConfig;
use crate::workflows::leave::domain::{LeaveEvent, RequestId};
use crate::workflows::leave::error::WorkflowError;
use crate::workflows::leave::records::{load_decision, load_request};
use crate::workflows::leave::store::RequestStore;

/// Read-only service rendering workflow events and publishing them to the topic.
pub struct NotificationService<S, C> {
    store: Arc<S>,
    channel: Arc<C>,
    config: NotificationConfig,
}

/// What was published for one `notify` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationReceipt {
    pub leave_id: RequestId,
    pub event: LeaveEvent,
    pub approver_email: String,
    pub employee_email: String,
    pub message_ids: Vec<MessageId>,
}

impl<S, C> NotificationService<S, C>
where
    S: RequestStore + 'static,
    C: FanoutChannel + 'static,
{
    pub fn new(store: Arc<S>, channel: Arc<C>, config: NotificationConfig) -> Self {
        Self {
            store,
            channel,
            config,
        }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Render `event` for the request and publish one message per recipient.
    ///
    /// Publish failures are logged and returned; nothing is retried here.
    pub fn notify(
        &self,
        leave_id: RequestId,
        event: LeaveEvent,
    ) -> Result<NotificationReceipt, WorkflowError> {
        let request = load_request(self.store.as_ref(), leave_id)?;
        let decision = load_decision(self.store.as_ref(), leave_id)?;
        let rendered = render(event, &request, decision.as_ref());

        let outbound = [
            OutboundMessage::addressed_to(
                rendered.subject.clone(),
                rendered.approver_body,
                self.config.approver_email.clone(),
            ),
            OutboundMessage::addressed_to(
                rendered.subject,
                rendered.employee_body,
                self.config.employee_email.clone(),
            ),
        ];

        let mut message_ids = Vec::with_capacity(outbound.len());
        for message in outbound {
            let destination = message.destination().unwrap_or_default().to_string();
            match self.channel.publish(message) {
                Ok(id) => message_ids.push(id),
                Err(err) => {
                    error!(%leave_id, event = event.label(), %destination, error = %err, "notification publish failed");
                    return Err(err.into());
                }
            }
        }

        info!(%leave_id, event = event.label(), messages = message_ids.len(), "notifications sent");

        Ok(NotificationReceipt {
            leave_id,
            event,
            approver_email: self.config.approver_email.clone(),
            employee_email: self.config.employee_email.clone(),
            message_ids,
        })
    }

    /// Re-send the notification matching the request's current status.
    pub fn resend(&self, leave_id: RequestId) -> Result<NotificationReceipt, WorkflowError> {
        let request = load_request(self.store.as_ref(), leave_id)?;
        self.notify(leave_id, LeaveEvent::for_status(request.status))
    }
}
