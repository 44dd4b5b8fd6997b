use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_EMPLOYEE_EMAIL: &str = "employee@example.com";
pub const DEFAULT_APPROVER_EMAIL: &str = "approver@example.com";
pub const DEFAULT_TOPIC: &str = "leave-notifications";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub notifications: NotificationConfig,
    pub roster_csv: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let notifications = NotificationConfig {
            employee_email: email_var("EMPLOYEE_EMAIL", DEFAULT_EMPLOYEE_EMAIL)?,
            approver_email: email_var("APPROVER_EMAIL", DEFAULT_APPROVER_EMAIL)?,
            topic: env::var("NOTIFICATION_TOPIC").unwrap_or_else(|_| DEFAULT_TOPIC.to_string()),
        };
        // Each subscription filters on its own address; a shared inbox would match both.
        if notifications
            .employee_email
            .eq_ignore_ascii_case(&notifications.approver_email)
        {
            return Err(ConfigError::SharedRecipient {
                address: notifications.employee_email,
            });
        }

        let roster_csv = env::var("LEAVE_ROSTER_CSV")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            notifications,
            roster_csv,
        })
    }
}

fn email_var(name: &'static str, default: &str) -> Result<String, ConfigError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    let value = value.trim().to_string();
    if value.contains('@') {
        Ok(value)
    } else {
        Err(ConfigError::InvalidEmail {
            variable: name,
            value,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Fixed notification recipients. Each address doubles as the filter of its subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub employee_email: String,
    pub approver_email: String,
    pub topic: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            employee_email: DEFAULT_EMPLOYEE_EMAIL.to_string(),
            approver_email: DEFAULT_APPROVER_EMAIL.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidEmail { variable: &'static str, value: String },
    SharedRecipient { address: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidEmail { variable, value } => {
                write!(f, "{variable} must be an e-mail address, got '{value}'")
            }
            ConfigError::SharedRecipient { address } => write!(
                f,
                "EMPLOYEE_EMAIL and APPROVER_EMAIL must differ, both are '{address}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidEmail { .. }
            | ConfigError::SharedRecipient { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
