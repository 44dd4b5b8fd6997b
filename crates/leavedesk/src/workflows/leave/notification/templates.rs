use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};

use crate::workflows::leave::domain::{LeaveDecision, LeaveEvent, LeaveRequest};

const UNSPECIFIED: &str = "Not specified";

/// Subject plus one body per recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub subject: String,
    pub approver_body: String,
    pub employee_body: String,
}

pub fn render(
    event: LeaveEvent,
    request: &LeaveRequest,
    decision: Option<&LeaveDecision>,
) -> RenderedNotification {
    let who = format!("{} ({})", request.employee_name, request.id);
    let details = details_block(request, event);

    let (subject, approver_intro, employee_intro, trailer) = match event {
        LeaveEvent::Applied => (
            format!("New Leave Request: {who}"),
            "A new leave request is waiting for your review.",
            "Your leave request has been submitted and is pending approval.",
            Trailer::Applied,
        ),
        LeaveEvent::Approved => (
            format!("Leave Request Approved: {who}"),
            "You approved the following leave request.",
            "Your leave request has been approved.",
            Trailer::Decided {
                label: "Approved At",
                at: decision.map(|decision| decision.decided_at),
                reason: None,
            },
        ),
        LeaveEvent::Rejected => (
            format!("Leave Request Rejected: {who}"),
            "You rejected the following leave request.",
            "Your leave request has been rejected.",
            Trailer::Decided {
                label: "Rejected At",
                at: decision.map(|decision| decision.decided_at),
                reason: Some(
                    decision
                        .and_then(|decision| decision.reason.clone())
                        .unwrap_or_else(|| "No reason provided".to_string()),
                ),
            },
        ),
        LeaveEvent::Cancelled => (
            format!("Leave Request Cancelled: {who}"),
            "The following leave request has been cancelled.",
            "Your leave request has been cancelled.",
            Trailer::Decided {
                label: "Cancelled At",
                at: request.cancelled_at,
                reason: None,
            },
        ),
    };

    let trailer = trailer.render();
    let mut approver_body = format!("{approver_intro}\n\n{details}{trailer}");
    let mut employee_body = format!("{employee_intro}\n\n{details}{trailer}");

    match event {
        LeaveEvent::Applied => {
            approver_body.push_str("\nPlease review this request at your earliest convenience.\n");
            employee_body
                .push_str("\nYou will be notified when your request is approved or rejected.\n");
        }
        LeaveEvent::Approved | LeaveEvent::Rejected | LeaveEvent::Cancelled => {}
    }

    RenderedNotification {
        subject,
        approver_body,
        employee_body,
    }
}

enum Trailer {
    Applied,
    Decided {
        label: &'static str,
        at: Option<DateTime<Utc>>,
        reason: Option<String>,
    },
}

impl Trailer {
    fn render(self) -> String {
        match self {
            Trailer::Applied => String::new(),
            Trailer::Decided { label, at, reason } => {
                let mut out = format!(
                    "{label}: {}\n",
                    at.map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| UNSPECIFIED.to_string())
                );
                if let Some(reason) = reason {
                    let _ = writeln!(out, "Reason: {reason}");
                }
                out
            }
        }
    }
}

fn details_block(request: &LeaveRequest, event: LeaveEvent) -> String {
    let status = match event {
        LeaveEvent::Applied => "PENDING APPROVAL".to_string(),
        LeaveEvent::Approved | LeaveEvent::Rejected | LeaveEvent::Cancelled => {
            event.label().to_ascii_uppercase()
        }
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Employee: {} (ID: {})",
        request.employee_name, request.employee_id
    );
    let _ = writeln!(out, "Leave Type: {}", request.leave_type);
    let _ = writeln!(
        out,
        "Period: {} to {} ({} day{})",
        format_date(request.start_date()),
        format_date(request.end_date()),
        request.duration(),
        if request.duration() == 1 { "" } else { "s" }
    );
    if let Some(reason) = &request.reason {
        let _ = writeln!(out, "Employee Note: {reason}");
    }
    let _ = writeln!(out, "Status: {status}");
    let _ = writeln!(out, "Leave ID: {}", request.id);
    out
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNSPECIFIED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::leave::domain::{
        Decision, EmployeeId, LeaveStatus, LeaveType, RequestId,
    };
    use chrono::TimeZone;

    fn request() -> LeaveRequest {
        LeaveRequest {
            id: RequestId(10011234),
            employee_id: EmployeeId(1001),
            employee_name: "John Doe".to_string(),
            leave_type: LeaveType::Sick,
            dates: vec![
                NaiveDate::from_ymd_opt(2024, 6, 3).expect("valid"),
                NaiveDate::from_ymd_opt(2024, 6, 4).expect("valid"),
            ],
            reason: Some("flu".to_string()),
            status: LeaveStatus::Pending,
            employee_email: "employee@example.com".to_string(),
            approver_email: "approver@example.com".to_string(),
            applied_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            cancelled_at: None,
        }
    }

    #[test]
    fn applied_notification_asks_approver_to_review() {
        let rendered = render(LeaveEvent::Applied, &request(), None);
        assert_eq!(rendered.subject, "New Leave Request: John Doe (10011234)");
        assert!(rendered.approver_body.contains("Please review"));
        assert!(rendered.approver_body.contains("Period: 2024-06-03 to 2024-06-04 (2 days)"));
        assert!(rendered.employee_body.contains("pending approval"));
        assert!(rendered.employee_body.contains("Status: PENDING APPROVAL"));
    }

    #[test]
    fn rejection_carries_reason_and_timestamp() {
        let decision = LeaveDecision {
            id: RequestId(10011234),
            decision: Decision::Reject,
            status: LeaveStatus::Rejected,
            reason: Some("Critical project deadline".to_string()),
            approver_email: "approver@example.com".to_string(),
            decided_at: Utc.with_ymd_and_hms(2024, 6, 2, 9, 30, 0).unwrap(),
        };

        let rendered = render(LeaveEvent::Rejected, &request(), Some(&decision));
        assert!(rendered.subject.starts_with("Leave Request Rejected"));
        assert!(rendered
            .employee_body
            .contains("Reason: Critical project deadline"));
        assert!(rendered
            .approver_body
            .contains("Rejected At: 2024-06-02T09:30:00+00:00"));
    }

    #[test]
    fn missing_timestamps_render_placeholder() {
        let rendered = render(LeaveEvent::Cancelled, &request(), None);
        assert!(rendered.employee_body.contains("Cancelled At: Not specified"));
    }
}
