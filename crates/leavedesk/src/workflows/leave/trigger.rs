//! Agent action-group envelope: a function name plus named string parameters in, a JSON
//! text body out.
//!
//! Every outcome, including unknown functions and bad parameters, is reported inside the
//! body as `{"success": false, ...}`; the envelope itself always serializes.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::application::date_range;
use super::approval::DEFAULT_PENDING_LIMIT;
use super::desk::LeaveDesk;
use super::domain::{
    Decision, EmployeeId, LeaveApplication, LeaveEvent, LeaveStatusView, LeaveType, RequestId,
};
use super::error::WorkflowError;
use super::notification::{FanoutChannel, NotificationDispatch, NotificationReceipt};
use super::store::RequestStore;

pub const MESSAGE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupEvent {
    #[serde(default = "message_version")]
    pub message_version: String,
    #[serde(default)]
    pub action_group: String,
    pub function: String,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
    #[serde(default)]
    pub session_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub prompt_session_attributes: BTreeMap<String, String>,
}

impl ActionGroupEvent {
    pub fn new(action_group: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            message_version: message_version(),
            action_group: action_group.into(),
            function: function.into(),
            parameters: Vec::new(),
            session_attributes: BTreeMap::new(),
            prompt_session_attributes: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(ActionParameter {
            name: name.into(),
            kind: "string".to_string(),
            value: Value::String(value.into()),
        });
        self
    }
}

/// Agents send every value as a string; numbers and booleans are accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: Value,
}

impl ActionParameter {
    fn text(&self) -> String {
        match &self.value {
            Value::String(text) => text.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupResponse {
    pub message_version: String,
    pub response: FunctionInvocation,
    pub session_attributes: BTreeMap<String, String>,
    pub prompt_session_attributes: BTreeMap<String, String>,
}

impl ActionGroupResponse {
    /// Decode the JSON text body.
    pub fn body(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.response.function_response.response_body.text.body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocation {
    pub action_group: String,
    pub function: String,
    pub function_response: FunctionResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub response_body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "TEXT")]
    pub text: TextBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl ActionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::UnknownFunction(_) => "unknown_function",
            ActionError::MissingParameter(_) | ActionError::InvalidParameter { .. } => {
                "validation_error"
            }
            ActionError::Workflow(err) => err.kind(),
        }
    }
}

/// Run one action-group invocation against the desk.
pub fn handle_action<S, D, C>(desk: &LeaveDesk<S, D, C>, event: ActionGroupEvent) -> ActionGroupResponse
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    let ActionGroupEvent {
        action_group,
        function,
        parameters,
        session_attributes,
        prompt_session_attributes,
        ..
    } = event;

    debug!(%action_group, %function, parameters = parameters.len(), "action invoked");
    let params = Parameters::new(&parameters);
    let body = match invoke(desk, &function, &params) {
        Ok(mut payload) => {
            if let Value::Object(fields) = &mut payload {
                fields.insert("success".to_string(), Value::Bool(true));
            }
            payload
        }
        Err(err) => {
            warn!(%function, error = %err, "action failed");
            json!({
                "success": false,
                "error": err.kind(),
                "message": err.to_string(),
            })
        }
    };

    ActionGroupResponse {
        message_version: message_version(),
        response: FunctionInvocation {
            action_group,
            function,
            function_response: FunctionResponse {
                response_body: ResponseBody {
                    text: TextBody {
                        body: body.to_string(),
                    },
                },
            },
        },
        session_attributes,
        prompt_session_attributes,
    }
}

fn invoke<S, D, C>(
    desk: &LeaveDesk<S, D, C>,
    function: &str,
    params: &Parameters,
) -> Result<Value, ActionError>
where
    S: RequestStore + 'static,
    D: NotificationDispatch + 'static,
    C: FanoutChannel + 'static,
{
    match function {
        "apply_leave" => {
            let employee_id = EmployeeId(params.required("employee_id")?);
            let start_date = params.text("start_date").ok_or(ActionError::MissingParameter("start_date"))?;
            let dates = date_range(start_date, params.text("end_date"))?;
            let leave_type = params.parsed::<LeaveType>("leave_type")?.unwrap_or_default();
            let request = desk.applications.apply(LeaveApplication {
                employee_id,
                dates,
                reason: params.text("reason").map(str::to_string),
                leave_type,
            })?;
            Ok(json!({
                "message": format!(
                    "{} leave request {} submitted for {} day(s)",
                    request.leave_type,
                    request.id,
                    request.duration()
                ),
                "request": LeaveStatusView::new(&request, None),
            }))
        }
        "cancel_leave" => {
            let request = match params.parsed::<u64>("leave_id")? {
                Some(id) => desk.applications.cancel(RequestId(id))?,
                None => {
                    let employee_id = EmployeeId(params.required("employee_id")?);
                    let leave_type = params
                        .parsed::<LeaveType>("leave_type")?
                        .ok_or(ActionError::MissingParameter("leave_type"))?;
                    let start_date = params
                        .parsed::<chrono::NaiveDate>("start_date")?
                        .ok_or(ActionError::MissingParameter("start_date"))?;
                    desk.applications
                        .cancel_matching(employee_id, leave_type, start_date)?
                }
            };
            Ok(json!({
                "message": format!("leave request {} cancelled", request.id),
                "request": LeaveStatusView::new(&request, None),
            }))
        }
        "get_leave_balance" => {
            let profile = desk
                .applications
                .balance(EmployeeId(params.required("employee_id")?))?;
            Ok(json!({
                "message": format!("leave balances for {}", profile.name),
                "employee_id": profile.id,
                "employee_name": profile.name,
                "leave_balances": profile.leave_balances,
            }))
        }
        "get_leave_status" => {
            if let Some(id) = params.parsed::<u64>("leave_id")? {
                let view = desk.applications.status(RequestId(id))?;
                return Ok(json!({
                    "message": format!("leave request {} is {}", view.leave_id, view.status),
                    "request": view,
                }));
            }
            let employee_id = params
                .parsed::<u64>("employee_id")?
                .map(EmployeeId)
                .ok_or(ActionError::MissingParameter("leave_id"))?;
            let requests: Vec<LeaveStatusView> = desk
                .applications
                .history(employee_id)?
                .iter()
                .map(|request| LeaveStatusView::new(request, None))
                .collect();
            Ok(json!({
                "message": format!("found {} leave request(s) for employee {employee_id}", requests.len()),
                "employee_id": employee_id,
                "requests": requests,
            }))
        }
        "approve_leave" | "reject_leave" => {
            let decision = if function == "approve_leave" {
                Decision::Approve
            } else {
                Decision::Reject
            };
            let leave_id = RequestId(params.required("leave_id")?);
            let outcome = desk.approvals.decide(
                leave_id,
                decision,
                params.text("reason").map(str::to_string),
            )?;
            Ok(json!({
                "message": format!("leave request {leave_id} {}", outcome.status.label().to_ascii_lowercase()),
                "decision": outcome,
            }))
        }
        "get_pending_leave_requests" => {
            let employee_id = params.parsed::<u64>("employee_id")?.map(EmployeeId);
            let limit = params
                .parsed::<usize>("limit")?
                .unwrap_or(DEFAULT_PENDING_LIMIT);
            let requests: Vec<LeaveStatusView> = desk
                .approvals
                .pending(employee_id, limit)?
                .iter()
                .map(|request| LeaveStatusView::new(request, None))
                .collect();
            Ok(json!({
                "message": format!("{} pending leave request(s)", requests.len()),
                "requests": requests,
            }))
        }
        "notify_leave_request" => {
            let leave_id = RequestId(params.required("leave_id")?);
            let receipt = match params.parsed::<LeaveEvent>("event")? {
                Some(event) => desk.notifications.notify(leave_id, event)?,
                None => desk.notifications.resend(leave_id)?,
            };
            Ok(receipt_payload(&receipt))
        }
        "resend_notification" => {
            let receipt = desk
                .notifications
                .resend(RequestId(params.required("leave_id")?))?;
            Ok(receipt_payload(&receipt))
        }
        other => Err(ActionError::UnknownFunction(other.to_string())),
    }
}

fn receipt_payload(receipt: &NotificationReceipt) -> Value {
    json!({
        "message": format!(
            "{} notification sent for leave request {}",
            receipt.event.label(),
            receipt.leave_id
        ),
        "receipt": receipt,
    })
}

fn message_version() -> String {
    MESSAGE_VERSION.to_string()
}

struct Parameters {
    values: BTreeMap<String, String>,
}

impl Parameters {
    fn new(parameters: &[ActionParameter]) -> Self {
        let values = parameters
            .iter()
            .map(|parameter| (parameter.name.clone(), parameter.text()))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        Self { values }
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn parsed<T>(&self, name: &'static str) -> Result<Option<T>, ActionError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.text(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|err| ActionError::InvalidParameter {
                    name,
                    message: err.to_string(),
                })
            })
            .transpose()
    }

    fn required(&self, name: &'static str) -> Result<u64, ActionError> {
        self.parsed::<u64>(name)?
            .ok_or(ActionError::MissingParameter(name))
    }
}
