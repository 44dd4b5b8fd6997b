use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::config::NotificationConfig;

/// Message attribute the subscription filters match on.
pub const EMAIL_ATTRIBUTE: &str = "email";

/// One message handed to the fan-out channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Message carrying the destination address in its `email` attribute.
    pub fn addressed_to(
        subject: impl Into<String>,
        body: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(EMAIL_ATTRIBUTE.to_string(), email.into());
        Self {
            subject: subject.into(),
            body: body.into(),
            attributes,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        self.attributes.get(EMAIL_ATTRIBUTE).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publish side of a publish/subscribe topic.
pub trait FanoutChannel: Send + Sync {
    fn publish(&self, message: OutboundMessage) -> Result<MessageId, ChannelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel transport unavailable: {0}")]
    Transport(String),
    #[error("message rejected by channel: {0}")]
    Rejected(String),
}

/// Allow-list filter over a single message attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterPolicy {
    pub attribute: String,
    pub allowed: Vec<String>,
}

impl FilterPolicy {
    pub fn email_equals(address: impl Into<String>) -> Self {
        Self {
            attribute: EMAIL_ATTRIBUTE.to_string(),
            allowed: vec![address.into()],
        }
    }

    pub fn matches(&self, attributes: &BTreeMap<String, String>) -> bool {
        attributes
            .get(&self.attribute)
            .is_some_and(|value| self.allowed.iter().any(|allowed| allowed == value))
    }
}

/// E-mail endpoint registered on a topic together with its filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub name: String,
    pub endpoint: String,
    pub filter: FilterPolicy,
}

impl Subscription {
    /// Subscription that only accepts messages addressed to its own endpoint.
    pub fn email(name: impl Into<String>, address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: name.into(),
            filter: FilterPolicy::email_equals(address.clone()),
            endpoint: address,
        }
    }
}

/// A message as received by one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub message_id: MessageId,
    pub subscription: String,
    pub endpoint: String,
    pub subject: String,
    pub body: String,
}

/// Topic that fans messages out to in-process mailboxes.
#[derive(Debug)]
pub struct InMemoryTopic {
    name: String,
    subscriptions: Vec<Subscription>,
    sequence: AtomicU64,
    deliveries: Mutex<Vec<Delivery>>,
}

impl InMemoryTopic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriptions: Vec::new(),
            sequence: AtomicU64::new(1),
            deliveries: Mutex::new(Vec::new()),
        }
    }

    /// Topic with the approver and employee subscriptions from configuration.
    pub fn for_recipients(config: &NotificationConfig) -> Self {
        Self::new(config.topic.clone())
            .subscribe(Subscription::email(
                "approver-email",
                config.approver_email.clone(),
            ))
            .subscribe(Subscription::email(
                "employee-email",
                config.employee_email.clone(),
            ))
    }

    pub fn subscribe(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Deliveries received by one endpoint, oldest first.
    pub fn mailbox(&self, endpoint: &str) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|delivery| delivery.endpoint == endpoint)
            .collect()
    }
}

impl FanoutChannel for InMemoryTopic {
    fn publish(&self, message: OutboundMessage) -> Result<MessageId, ChannelError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let message_id = MessageId(format!("{}-{sequence:06}", self.name));

        let matched: Vec<Delivery> = self
            .subscriptions
            .iter()
            .filter(|subscription| subscription.filter.matches(&message.attributes))
            .map(|subscription| Delivery {
                message_id: message_id.clone(),
                subscription: subscription.name.clone(),
                endpoint: subscription.endpoint.clone(),
                subject: message.subject.clone(),
                body: message.body.clone(),
            })
            .collect();

        debug!(
            topic = %self.name,
            %message_id,
            destination = message.destination().unwrap_or("-"),
            matched = matched.len(),
            "message published"
        );

        let mut guard = self
            .deliveries
            .lock()
            .map_err(|_| ChannelError::Transport("mailbox lock poisoned".to_string()))?;
        guard.extend(matched);
        Ok(message_id)
    }
}
