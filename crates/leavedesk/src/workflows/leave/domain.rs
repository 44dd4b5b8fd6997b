use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Numeric identifier shared by every record that belongs to one leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an employee profile in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub u64);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sort-key discriminator. Together with the numeric id it forms the unique store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Request,
    Decision,
    Employee,
}

impl RecordType {
    pub const fn label(self) -> &'static str {
        match self {
            RecordType::Request => "request",
            RecordType::Decision => "decision",
            RecordType::Employee => "employee",
        }
    }
}

/// Composite `(id, type)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub id: u64,
    pub kind: RecordType,
}

impl RecordKey {
    pub const fn request(id: RequestId) -> Self {
        Self {
            id: id.0,
            kind: RecordType::Request,
        }
    }

    pub const fn decision(id: RequestId) -> Self {
        Self {
            id: id.0,
            kind: RecordType::Decision,
        }
    }

    pub const fn employee(id: EmployeeId) -> Self {
        Self {
            id: id.0,
            kind: RecordType::Employee,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.kind.label())
    }
}

/// Lifecycle status of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeaveStatus::Pending => "PENDING",
            LeaveStatus::Approved => "APPROVED",
            LeaveStatus::Rejected => "REJECTED",
            LeaveStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LeaveStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown leave status '{other}'")),
        }
    }
}

/// Approver verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Self::Approve),
            "reject" | "rejected" => Ok(Self::Reject),
            other => Err(format!("unknown decision '{other}'")),
        }
    }
}

/// Workflow event a notification is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveEvent {
    Applied,
    Cancelled,
    Approved,
    Rejected,
}

impl LeaveEvent {
    pub const fn label(self) -> &'static str {
        match self {
            LeaveEvent::Applied => "applied",
            LeaveEvent::Cancelled => "cancelled",
            LeaveEvent::Approved => "approved",
            LeaveEvent::Rejected => "rejected",
        }
    }

    /// Event announcing that a request reached `status`.
    pub const fn for_status(status: LeaveStatus) -> Self {
        match status {
            LeaveStatus::Pending => LeaveEvent::Applied,
            LeaveStatus::Approved => LeaveEvent::Approved,
            LeaveStatus::Rejected => LeaveEvent::Rejected,
            LeaveStatus::Cancelled => LeaveEvent::Cancelled,
        }
    }
}

impl FromStr for LeaveEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "applied" | "pending" => Ok(Self::Applied),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown leave event '{other}'")),
        }
    }
}

/// Leave categories from the company leave policy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LeaveType {
    #[default]
    Annual,
    Sick,
    Maternity,
    Paternity,
    Casual,
    Bereavement,
    Marriage,
    #[serde(rename = "WFH")]
    Wfh,
}

impl LeaveType {
    pub const ALL: [LeaveType; 8] = [
        LeaveType::Annual,
        LeaveType::Sick,
        LeaveType::Maternity,
        LeaveType::Paternity,
        LeaveType::Casual,
        LeaveType::Bereavement,
        LeaveType::Marriage,
        LeaveType::Wfh,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            LeaveType::Annual => "Annual",
            LeaveType::Sick => "Sick",
            LeaveType::Maternity => "Maternity",
            LeaveType::Paternity => "Paternity",
            LeaveType::Casual => "Casual",
            LeaveType::Bereavement => "Bereavement",
            LeaveType::Marriage => "Marriage",
            LeaveType::Wfh => "WFH",
        }
    }

    /// Yearly allowance granted to a new employee, in days.
    pub const fn default_allowance(self) -> u32 {
        match self {
            LeaveType::Annual => 20,
            LeaveType::Sick => 12,
            LeaveType::Maternity => 26 * 5,
            LeaveType::Paternity => 4 * 5,
            LeaveType::Casual => 6,
            LeaveType::Bereavement => 5,
            LeaveType::Marriage => 5,
            LeaveType::Wfh => 24,
        }
    }

    pub fn default_balances() -> BTreeMap<LeaveType, u32> {
        Self::ALL
            .iter()
            .map(|kind| (*kind, kind.default_allowance()))
            .collect()
    }
}

impl fmt::Display for LeaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LeaveType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        LeaveType::ALL
            .iter()
            .copied()
            .find(|kind| kind.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown leave type '{trimmed}'"))
    }
}

/// Input accepted by the application service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveApplication {
    pub employee_id: EmployeeId,
    /// Requested calendar days as `YYYY-MM-DD` strings.
    pub dates: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub leave_type: LeaveType,
}

/// The request record written once by the application service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: RequestId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub leave_type: LeaveType,
    pub dates: Vec<NaiveDate>,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub employee_email: String,
    pub approver_email: String,
    pub applied_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl LeaveRequest {
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Number of distinct days requested.
    pub fn duration(&self) -> u32 {
        u32::try_from(self.dates.len()).unwrap_or(u32::MAX)
    }
}

/// Outcome appended by the approval service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveDecision {
    pub id: RequestId,
    pub decision: Decision,
    pub status: LeaveStatus,
    pub reason: Option<String>,
    pub approver_email: String,
    pub decided_at: DateTime<Utc>,
}

/// Roster entry holding remaining leave balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub id: EmployeeId,
    pub name: String,
    pub department: String,
    pub email: String,
    pub leave_balances: BTreeMap<LeaveType, u32>,
    /// Bumped on every balance change; guards concurrent read-modify-write cycles.
    #[serde(default)]
    pub revision: u64,
}

/// Every kind of record the store holds, keyed by `(id, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeaveRecord {
    Request(LeaveRequest),
    Decision(LeaveDecision),
    Employee(EmployeeProfile),
}

impl LeaveRecord {
    pub fn key(&self) -> RecordKey {
        match self {
            LeaveRecord::Request(request) => RecordKey::request(request.id),
            LeaveRecord::Decision(decision) => RecordKey::decision(decision.id),
            LeaveRecord::Employee(profile) => RecordKey::employee(profile.id),
        }
    }

    /// Status carried by the record, if it has one.
    pub fn status(&self) -> Option<LeaveStatus> {
        match self {
            LeaveRecord::Request(request) => Some(request.status),
            LeaveRecord::Decision(decision) => Some(decision.status),
            LeaveRecord::Employee(_) => None,
        }
    }

    /// Revision of an employee profile; other records are unversioned.
    pub fn revision(&self) -> Option<u64> {
        match self {
            LeaveRecord::Employee(profile) => Some(profile.revision),
            LeaveRecord::Request(_) | LeaveRecord::Decision(_) => None,
        }
    }

    pub fn into_request(self) -> Option<LeaveRequest> {
        match self {
            LeaveRecord::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn into_decision(self) -> Option<LeaveDecision> {
        match self {
            LeaveRecord::Decision(decision) => Some(decision),
            _ => None,
        }
    }

    pub fn into_employee(self) -> Option<EmployeeProfile> {
        match self {
            LeaveRecord::Employee(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Sanitized view of a request and its outcome for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveStatusView {
    pub leave_id: RequestId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub leave_type: LeaveType,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration: u32,
    pub status: LeaveStatus,
    pub applied_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
}

impl LeaveStatusView {
    pub fn new(request: &LeaveRequest, decision: Option<&LeaveDecision>) -> Self {
        Self {
            leave_id: request.id,
            employee_id: request.employee_id,
            employee_name: request.employee_name.clone(),
            leave_type: request.leave_type,
            start_date: request.start_date(),
            end_date: request.end_date(),
            duration: request.duration(),
            status: request.status,
            applied_at: request.applied_at,
            cancelled_at: request.cancelled_at,
            decided_at: decision.map(|decision| decision.decided_at),
            decision_reason: decision.and_then(|decision| decision.reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_type_parses_case_insensitively() {
        assert_eq!("annual".parse::<LeaveType>(), Ok(LeaveType::Annual));
        assert_eq!("wfh".parse::<LeaveType>(), Ok(LeaveType::Wfh));
        assert!("sabbatical".parse::<LeaveType>().is_err());
    }

    #[test]
    fn default_balances_cover_every_leave_type() {
        let balances = LeaveType::default_balances();
        assert_eq!(balances.len(), LeaveType::ALL.len());
        assert_eq!(balances.get(&LeaveType::Maternity), Some(&130));
    }

    #[test]
    fn record_keys_share_id_across_types() {
        let id = RequestId(42);
        assert_eq!(RecordKey::request(id).id, RecordKey::decision(id).id);
        assert_ne!(RecordKey::request(id), RecordKey::decision(id));
        assert_eq!(RecordKey::request(id).to_string(), "42/request");
    }

    #[test]
    fn status_serializes_in_upper_case() {
        let encoded = serde_json::to_string(&LeaveStatus::Cancelled).expect("serializes");
        assert_eq!(encoded, "\"CANCELLED\"");
    }
}
