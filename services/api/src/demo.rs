use crate::infra::{build_runtime, parse_date};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use leavedesk::config::AppConfig;
use leavedesk::error::AppError;
use leavedesk::workflows::leave::notification::Delivery;
use leavedesk::workflows::leave::{
    date_range, Decision, EmployeeId, LeaveApplication, LeaveType, WorkflowError,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Employee roster CSV used instead of the sample staff
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Reject the request instead of approving it
    #[arg(long)]
    pub(crate) reject: bool,
    /// First day of leave (YYYY-MM-DD). Defaults to a week from today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Number of consecutive days requested
    #[arg(long, default_value_t = 3)]
    pub(crate) days: u32,
    /// Employee applying for leave
    #[arg(long, default_value_t = 1001)]
    pub(crate) employee: u64,
}

#[derive(Debug, Serialize)]
struct MailboxView<'a> {
    recipient: &'a str,
    messages: Vec<&'a Delivery>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(roster) = args.roster {
        config.roster_csv = Some(roster);
    }

    let runtime = build_runtime(&config)?;
    let worker = tokio::spawn(runtime.worker.run());
    let desk = runtime.desk;

    let start = args
        .start
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(7));
    let end = start + Duration::days(i64::from(args.days.max(1)) - 1);
    let dates = date_range(&start.to_string(), Some(&end.to_string()))?;

    println!("Leave desk demo");
    let request = desk.applications.apply(LeaveApplication {
        employee_id: EmployeeId(args.employee),
        dates,
        reason: Some("Demo trip".to_string()),
        leave_type: LeaveType::Annual,
    })?;
    println!(
        "  Applied: request {} for {} ({} to {}, {} day(s)) -> {}",
        request.id,
        request.employee_name,
        start,
        end,
        request.duration(),
        request.status
    );

    let decision = if args.reject {
        Decision::Reject
    } else {
        Decision::Approve
    };
    let outcome = desk.approvals.decide(
        request.id,
        decision,
        args.reject.then(|| "Team coverage is too thin".to_string()),
    )?;
    println!("  Decided: {} -> {}", decision.label(), outcome.status);

    for (attempt, result) in [
        ("late reject", desk.approvals.decide(request.id, Decision::Reject, None).map(|_| ())),
        ("cancel", desk.applications.cancel(request.id).map(|_| ())),
    ] {
        match result {
            Err(WorkflowError::InvalidState { status, .. }) => {
                println!("  {attempt}: refused, request already {status}")
            }
            Err(err) => return Err(err.into()),
            Ok(()) => println!("  {attempt}: unexpectedly accepted"),
        }
    }

    let profile = desk.applications.balance(request.employee_id)?;
    println!(
        "  Remaining {} balance: {}",
        LeaveType::Annual,
        profile
            .leave_balances
            .get(&LeaveType::Annual)
            .copied()
            .unwrap_or_default()
    );

    drop(desk);
    match worker.await {
        Ok(summary) => println!(
            "  Notifications: {} delivered, {} failed",
            summary.delivered, summary.failed
        ),
        Err(err) => println!("  Notification worker stopped abnormally: {err}"),
    }

    let deliveries = runtime.topic.deliveries();
    let recipients = [
        config.notifications.approver_email.as_str(),
        config.notifications.employee_email.as_str(),
    ];
    let mailboxes: Vec<MailboxView<'_>> = recipients
        .iter()
        .map(|&recipient| MailboxView {
            recipient,
            messages: deliveries
                .iter()
                .filter(|delivery| delivery.endpoint == recipient)
                .collect(),
        })
        .collect();

    match serde_json::to_string_pretty(&mailboxes) {
        Ok(json) => println!("\nMailboxes:\n{json}"),
        Err(err) => println!("\nMailboxes unavailable: {err}"),
    }

    Ok(())
}
