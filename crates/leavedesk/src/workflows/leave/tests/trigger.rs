use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use crate::workflows::leave::domain::LeaveType;
use crate::workflows::leave::trigger::{handle_action, ActionGroupEvent, ActionGroupResponse};
use crate::workflows::leave::leave_router;

fn invoke(harness: &Harness, event: ActionGroupEvent) -> (ActionGroupResponse, Value) {
    let response = handle_action(harness.desk.as_ref(), event);
    let body = response.body().expect("json text body");
    (response, body)
}

fn apply_event(start: &str, end: &str) -> ActionGroupEvent {
    ActionGroupEvent::new("LeaveApplication", "apply_leave")
        .with_parameter("employee_id", "1001")
        .with_parameter("start_date", start)
        .with_parameter("end_date", end)
        .with_parameter("leave_type", "annual")
}

#[test]
fn apply_leave_expands_date_range_and_echoes_envelope() {
    let harness = build_desk();
    let mut event = apply_event("2024-07-01", "2024-07-03");
    event
        .session_attributes
        .insert("conversation".to_string(), "abc".to_string());

    let (response, body) = invoke(&harness, event);

    assert_eq!(response.message_version, "1.0");
    assert_eq!(response.response.action_group, "LeaveApplication");
    assert_eq!(response.response.function, "apply_leave");
    assert_eq!(response.session_attributes["conversation"], "abc");
    assert_eq!(body["success"], true);
    assert_eq!(body["request"]["duration"], 3);
    assert_eq!(body["request"]["status"], "PENDING");
}

#[test]
fn apply_leave_refuses_multi_year_ranges() {
    let harness = build_desk();
    let (_, body) = invoke(&harness, apply_event("0001-01-01", "9999-12-31"));

    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"]
        .as_str()
        .expect("message text")
        .contains("at most 366 days"));
    assert!(harness.dispatch.jobs().is_empty());
}

#[test]
fn approve_then_balance_reflects_deduction() {
    let harness = build_desk();
    let (_, applied) = invoke(&harness, apply_event("2024-07-01", "2024-07-02"));
    let leave_id = applied["request"]["leave_id"].as_u64().expect("leave id");

    let (_, approved) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveApproval", "approve_leave")
            .with_parameter("leave_id", leave_id.to_string()),
    );
    assert_eq!(approved["success"], true);
    assert_eq!(approved["decision"]["status"], "APPROVED");

    let (_, balance) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveApplication", "get_leave_balance")
            .with_parameter("employee_id", "1001"),
    );
    assert_eq!(
        balance["leave_balances"][LeaveType::Annual.label()],
        LeaveType::Annual.default_allowance() - 2
    );

    let (_, again) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveApproval", "reject_leave")
            .with_parameter("leave_id", leave_id.to_string()),
    );
    assert_eq!(again["success"], false);
    assert_eq!(again["error"], "invalid_state_error");
}

#[test]
fn cancel_leave_by_lookup() {
    let harness = build_desk();
    invoke(&harness, apply_event("2024-10-07", "2024-10-08"));

    let (_, cancelled) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveApplication", "cancel_leave")
            .with_parameter("employee_id", "1001")
            .with_parameter("leave_type", "Annual")
            .with_parameter("start_date", "2024-10-07"),
    );

    assert_eq!(cancelled["success"], true);
    assert_eq!(cancelled["request"]["status"], "CANCELLED");
}

#[test]
fn status_and_pending_queries() {
    let harness = build_desk();
    let (_, applied) = invoke(&harness, apply_event("2024-11-04", ""));
    let leave_id = applied["request"]["leave_id"].as_u64().expect("leave id");

    let (_, status) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveApplication", "get_leave_status")
            .with_parameter("leave_id", leave_id.to_string()),
    );
    assert_eq!(status["request"]["duration"], 1);

    let (_, history) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveApplication", "get_leave_status")
            .with_parameter("employee_id", "1001"),
    );
    assert_eq!(history["requests"].as_array().expect("array").len(), 1);

    let (_, pending) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveApproval", "get_pending_leave_requests")
            .with_parameter("limit", "5"),
    );
    assert_eq!(pending["requests"][0]["leave_id"], leave_id);
}

#[test]
fn notification_functions_publish_to_topic() {
    let harness = build_desk();
    let (_, applied) = invoke(&harness, apply_event("2024-07-01", "2024-07-01"));
    let leave_id = applied["request"]["leave_id"].as_u64().expect("leave id");

    let (_, notified) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveNotification", "notify_leave_request")
            .with_parameter("leave_id", leave_id.to_string())
            .with_parameter("event", "applied"),
    );
    let (_, resent) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveNotification", "resend_notification")
            .with_parameter("leave_id", leave_id.to_string()),
    );

    assert_eq!(notified["receipt"]["event"], "applied");
    assert_eq!(resent["success"], true);
    assert_eq!(harness.topic.mailbox("employee@corp.test").len(), 2);
}

#[test]
fn bad_input_yields_unsuccessful_bodies() {
    let harness = build_desk();

    let (_, unknown) = invoke(&harness, ActionGroupEvent::new("LeaveApproval", "fire_employee"));
    assert_eq!(unknown["success"], false);
    assert_eq!(unknown["message"], "Unknown function: fire_employee");

    let (_, missing) = invoke(&harness, ActionGroupEvent::new("LeaveApproval", "approve_leave"));
    assert_eq!(missing["error"], "validation_error");

    let (_, malformed) = invoke(
        &harness,
        ActionGroupEvent::new("LeaveApproval", "approve_leave").with_parameter("leave_id", "ten"),
    );
    assert!(malformed["message"]
        .as_str()
        .expect("message")
        .contains("leave_id"));
}

#[tokio::test]
async fn agent_route_accepts_raw_envelope() {
    let harness = build_desk();
    let envelope = serde_json::json!({
        "messageVersion": "1.0",
        "actionGroup": "LeaveApplication",
        "function": "get_leave_balance",
        "parameters": [{ "name": "employee_id", "type": "integer", "value": 1002 }],
        "sessionAttributes": {},
        "promptSessionAttributes": {}
    });

    let response = leave_router(harness.desk.clone())
        .oneshot(
            Request::post("/api/v1/agent/actions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(envelope.to_string()))
                .expect("request"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let text = payload["response"]["functionResponse"]["responseBody"]["TEXT"]["body"]
        .as_str()
        .expect("text body");
    let body: Value = serde_json::from_str(text).expect("json body");
    assert_eq!(body["employee_name"], "Jane Smith");
}
