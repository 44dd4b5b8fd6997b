//! Employee roster: the built-in sample staff and CSV imports.
//!
//! CSV files carry `id,name,department,email` plus optional one-column-per-leave-type
//! balances (`Annual`, `Sick`, `WFH`, ...). Missing balance columns fall back to the
//! policy allowance.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use super::domain::{EmployeeId, EmployeeProfile, LeaveRecord, LeaveType};
use super::store::{RequestStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to read roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid roster CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("roster is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("roster line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

const SAMPLE_STAFF: [(u64, &str, &str); 5] = [
    (1001, "John Doe", "Engineering"),
    (1002, "Jane Smith", "HR"),
    (1003, "Michael Johnson", "Finance"),
    (1004, "Emily Davis", "Marketing"),
    (1005, "Robert Wilson", "Engineering"),
];

/// Five sample employees sharing the configured employee address.
pub fn sample_roster(employee_email: &str) -> Vec<EmployeeProfile> {
    SAMPLE_STAFF
        .iter()
        .map(|(id, name, department)| EmployeeProfile {
            id: EmployeeId(*id),
            name: (*name).to_string(),
            department: (*department).to_string(),
            email: employee_email.to_string(),
            leave_balances: LeaveType::default_balances(),
            revision: 0,
        })
        .collect()
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        default_email: &str,
    ) -> Result<Vec<EmployeeProfile>, RosterError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, default_email)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        default_email: &str,
    ) -> Result<Vec<EmployeeProfile>, RosterError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let column = |name: &'static str| {
            headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(name))
        };
        let id_column = column("id").ok_or(RosterError::MissingColumn("id"))?;
        let name_column = column("name").ok_or(RosterError::MissingColumn("name"))?;
        let department_column = column("department");
        let email_column = column("email");
        let balance_columns: Vec<(usize, LeaveType)> = headers
            .iter()
            .enumerate()
            .filter_map(|(index, header)| header.parse::<LeaveType>().ok().map(|kind| (index, kind)))
            .collect();

        let mut profiles = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let line = row.position().map(|position| position.line()).unwrap_or_default();
            let invalid = |message: String| RosterError::InvalidRow { line, message };

            let raw_id = row.get(id_column).unwrap_or_default();
            let id = raw_id
                .parse::<u64>()
                .map_err(|_| invalid(format!("employee id '{raw_id}' is not a number")))?;
            let name = row.get(name_column).unwrap_or_default();
            if name.is_empty() {
                return Err(invalid("employee name is empty".to_string()));
            }

            let mut leave_balances: BTreeMap<LeaveType, u32> = LeaveType::default_balances();
            for (index, kind) in &balance_columns {
                let raw = row.get(*index).unwrap_or_default();
                if raw.is_empty() {
                    continue;
                }
                let days = raw
                    .parse::<u32>()
                    .map_err(|_| invalid(format!("{kind} balance '{raw}' is not a whole number")))?;
                leave_balances.insert(*kind, days);
            }

            let text = |column: Option<usize>| {
                column
                    .and_then(|index| row.get(index))
                    .filter(|value| !value.is_empty())
            };

            profiles.push(EmployeeProfile {
                id: EmployeeId(id),
                name: name.to_string(),
                department: text(department_column).unwrap_or("N/A").to_string(),
                email: text(email_column).unwrap_or(default_email).to_string(),
                leave_balances,
                revision: 0,
            });
        }

        Ok(profiles)
    }
}

/// Write every profile into the store, replacing existing entries.
pub fn seed_roster<S>(store: &S, profiles: Vec<EmployeeProfile>) -> Result<usize, StoreError>
where
    S: RequestStore + ?Sized,
{
    let count = profiles.len();
    for profile in profiles {
        store.put(LeaveRecord::Employee(profile))?;
    }
    Ok(count)
}
