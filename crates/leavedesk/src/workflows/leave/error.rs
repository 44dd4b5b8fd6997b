use super::domain::{LeaveStatus, RecordKey, RecordType, RequestId};
use super::notification::ChannelError;
use super::store::StoreError;

/// Errors surfaced by the application, approval, and notification services.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Malformed input; the caller must correct it and resubmit.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{} {id} not found", noun(.kind))]
    NotFound { kind: RecordType, id: u64 },
    /// Illegal lifecycle transition. Terminal for this attempt.
    #[error("leave request {id} is {status}; cannot {attempted}")]
    InvalidState {
        id: RequestId,
        status: LeaveStatus,
        attempted: &'static str,
    },
    #[error("notification delivery failed: {0}")]
    Delivery(#[from] ChannelError),
    #[error(transparent)]
    Store(StoreError),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short machine-readable label used in API payloads.
    pub const fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::NotFound { .. } => "not_found_error",
            WorkflowError::InvalidState { .. } => "invalid_state_error",
            WorkflowError::Delivery(_) => "delivery_error",
            WorkflowError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(RecordKey { id, kind }) => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

fn noun(kind: &RecordType) -> &'static str {
    match kind {
        RecordType::Request => "leave request",
        RecordType::Decision => "leave decision",
        RecordType::Employee => "employee",
    }
}
