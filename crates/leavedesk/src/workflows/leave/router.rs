use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::approval::DEFAULT_PENDING_LIMIT;
use super::desk::LeaveDesk;
use super::domain::{
    Decision, EmployeeId, LeaveApplication, LeaveEvent, LeaveStatus, LeaveStatusView, RequestId,
};
use super::error::WorkflowError;
use super::notification::{FanoutChannel, NotificationDispatch};
use super::store::{RequestStore, StoreError};
use super::trigger::{handle_action, ActionGroupEvent};

type SharedDesk<S, D, C> = Arc<LeaveDesk<S, D, C>>;

/// HTTP surface over the leave desk plus the agent action endpoint.
pub fn leave_router<S, D, C>(desk: SharedDesk<S, D, C>) -> Router
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    Router::new()
        .route(
            "/api/v1/leave/requests",
            post(apply_handler::<S, D, C>).get(list_handler::<S, D, C>),
        )
        .route(
            "/api/v1/leave/requests/:leave_id",
            get(status_handler::<S, D, C>),
        )
        .route(
            "/api/v1/leave/requests/:leave_id/cancel",
            post(cancel_handler::<S, D, C>),
        )
        .route(
            "/api/v1/leave/requests/:leave_id/decision",
            post(decision_handler::<S, D, C>),
        )
        .route(
            "/api/v1/leave/requests/:leave_id/notifications",
            post(notification_handler::<S, D, C>),
        )
        .route(
            "/api/v1/leave/employees/:employee_id/balance",
            get(balance_handler::<S, D, C>),
        )
        .route("/api/v1/agent/actions", post(action_handler::<S, D, C>))
        .with_state(desk)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub employee_id: Option<u64>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionPayload {
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub event: Option<String>,
}

pub(crate) async fn apply_handler<S, D, C>(
    State(desk): State<SharedDesk<S, D, C>>,
    axum::Json(application): axum::Json<LeaveApplication>,
) -> Response
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    match desk.applications.apply(application) {
        Ok(request) => (
            StatusCode::CREATED,
            axum::Json(LeaveStatusView::new(&request, None)),
        )
            .into_response(),
        Err(err) => workflow_error_response(err),
    }
}

/// `status=pending` lists the approval queue; otherwise an employee's history.
pub(crate) async fn list_handler<S, D, C>(
    State(desk): State<SharedDesk<S, D, C>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    let status = match query.status.as_deref().map(str::parse::<LeaveStatus>) {
        Some(Ok(status)) => Some(status),
        Some(Err(message)) => return workflow_error_response(WorkflowError::Validation(message)),
        None => None,
    };
    let employee_id = query.employee_id.map(EmployeeId);

    let listed = match (status, employee_id) {
        (Some(LeaveStatus::Pending), _) => desk
            .approvals
            .pending(employee_id, query.limit.unwrap_or(DEFAULT_PENDING_LIMIT)),
        (_, Some(employee_id)) => desk.applications.history(employee_id).map(|history| {
            history
                .into_iter()
                .filter(|request| status.map_or(true, |status| request.status == status))
                .take(query.limit.unwrap_or(usize::MAX))
                .collect()
        }),
        (_, None) => Err(WorkflowError::validation(
            "employee_id is required unless status=pending",
        )),
    };

    match listed {
        Ok(requests) => {
            let views: Vec<LeaveStatusView> = requests
                .iter()
                .map(|request| LeaveStatusView::new(request, None))
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn status_handler<S, D, C>(
    State(desk): State<SharedDesk<S, D, C>>,
    Path(leave_id): Path<u64>,
) -> Response
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    match desk.applications.status(RequestId(leave_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn cancel_handler<S, D, C>(
    State(desk): State<SharedDesk<S, D, C>>,
    Path(leave_id): Path<u64>,
) -> Response
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    match desk.applications.cancel(RequestId(leave_id)) {
        Ok(request) => (
            StatusCode::OK,
            axum::Json(LeaveStatusView::new(&request, None)),
        )
            .into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn decision_handler<S, D, C>(
    State(desk): State<SharedDesk<S, D, C>>,
    Path(leave_id): Path<u64>,
    axum::Json(payload): axum::Json<DecisionPayload>,
) -> Response
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    match desk
        .approvals
        .decide(RequestId(leave_id), payload.decision, payload.reason)
    {
        Ok(decision) => (StatusCode::OK, axum::Json(decision)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

/// Re-send the notification for the current status, or for `?event=` when given.
pub(crate) async fn notification_handler<S, D, C>(
    State(desk): State<SharedDesk<S, D, C>>,
    Path(leave_id): Path<u64>,
    Query(query): Query<NotificationQuery>,
) -> Response
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    let leave_id = RequestId(leave_id);
    let sent = match query.event.as_deref().map(str::parse::<LeaveEvent>) {
        Some(Ok(event)) => desk.notifications.notify(leave_id, event),
        Some(Err(message)) => Err(WorkflowError::Validation(message)),
        None => desk.notifications.resend(leave_id),
    };

    match sent {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn balance_handler<S, D, C>(
    State(desk): State<SharedDesk<S, D, C>>,
    Path(employee_id): Path<u64>,
) -> Response
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    match desk.applications.balance(EmployeeId(employee_id)) {
        Ok(profile) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn action_handler<S, D, C>(
    State(desk): State<SharedDesk<S, D, C>>,
    axum::Json(event): axum::Json<ActionGroupEvent>,
) -> Response
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    let response = handle_action(desk.as_ref(), event);
    (StatusCode::OK, axum::Json(response)).into_response()
}

pub(crate) fn status_for(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::InvalidState { .. } => StatusCode::CONFLICT,
        WorkflowError::Delivery(_) => StatusCode::BAD_GATEWAY,
        WorkflowError::Store(StoreError::ConditionFailed { .. }) => StatusCode::CONFLICT,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn workflow_error_response(err: WorkflowError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, kind = err.kind(), "leave request failed");
    }
    let payload = json!({
        "error": err.to_string(),
        "kind": err.kind(),
    });
    (status, axum::Json(payload)).into_response()
}
