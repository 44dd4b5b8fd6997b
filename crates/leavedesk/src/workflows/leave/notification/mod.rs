//! E-mail notification over a filtered fan-out topic, fed by an outbound job queue.

pub mod channel;
pub mod dispatch;
pub mod service;
pub mod templates;

pub use channel::{
    ChannelError, Delivery, FanoutChannel, FilterPolicy, InMemoryTopic, MessageId,
    OutboundMessage, Subscription, EMAIL_ATTRIBUTE,
};
pub use dispatch::{
    notification_queue, DispatchError, DispatchSummary, DispatchWorker, NotificationDispatch,
    NotificationJob, QueuedDispatcher,
};
pub use service::{NotificationReceipt, NotificationService};
pub use templates::RenderedNotification;
