use chrono::NaiveDate;
use leavedesk::config::AppConfig;
use leavedesk::error::AppError;
use leavedesk::workflows::leave::{
    notification_queue, sample_roster, seed_roster, DispatchWorker, InMemoryTopic, LeaveDesk,
    MemoryRequestStore, NotificationService, QueuedDispatcher, RosterImporter,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ServiceDesk = LeaveDesk<MemoryRequestStore, QueuedDispatcher, InMemoryTopic>;

/// Wired services plus the notification worker, which the caller must spawn.
pub(crate) struct LeaveRuntime {
    pub(crate) desk: Arc<ServiceDesk>,
    pub(crate) topic: Arc<InMemoryTopic>,
    pub(crate) worker: DispatchWorker<MemoryRequestStore, InMemoryTopic>,
}

pub(crate) fn build_runtime(config: &AppConfig) -> Result<LeaveRuntime, AppError> {
    let recipients = config.notifications.clone();
    let profiles = match config.roster_csv.as_deref() {
        Some(path) => load_roster(path, &recipients.employee_email)?,
        None => sample_roster(&recipients.employee_email),
    };

    let store = Arc::new(MemoryRequestStore::new());
    let seeded = seed_roster(store.as_ref(), profiles)?;
    let topic = Arc::new(InMemoryTopic::for_recipients(&recipients));
    let notifications = Arc::new(NotificationService::new(
        store.clone(),
        topic.clone(),
        recipients,
    ));
    let (dispatcher, worker) = notification_queue(notifications.clone());
    let desk = Arc::new(LeaveDesk::new(store, Arc::new(dispatcher), notifications));

    info!(employees = seeded, topic = topic.name(), "leave desk wired");

    Ok(LeaveRuntime {
        desk,
        topic,
        worker,
    })
}

fn load_roster(
    path: &Path,
    default_email: &str,
) -> Result<Vec<leavedesk::workflows::leave::EmployeeProfile>, AppError> {
    let profiles = RosterImporter::from_path(path, default_email)?;
    info!(path = %path.display(), employees = profiles.len(), "roster imported");
    Ok(profiles)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
