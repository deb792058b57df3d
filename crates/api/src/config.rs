use std::str::FromStr;

use rcalloc_core::allocation::DEFAULT_EXTENSION_DAYS;
use rcalloc_core::config::WorkflowConfig;

use crate::auth::jwt::JwtConfig;

/// Startup configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background jobs after shutdown starts (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// How often the allocation expiry job runs (default: one day). Must be
    /// non-zero.
    pub expiry_interval_secs: u64,
    /// JWT validation settings.
    pub jwt: JwtConfig,
    /// Email and center settings used by the workflow runners.
    pub workflow: WorkflowConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default                    |
    /// |-----------------------------------|----------------------------|
    /// | `HOST`                            | `0.0.0.0`                  |
    /// | `PORT`                            | `3000`                     |
    /// | `CORS_ORIGINS`                    | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`            | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`           | `30`                       |
    /// | `ALLOCATION_EXPIRY_INTERVAL_SECS` | `86400`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_parse("PORT", 3000u16)?;

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30u64)?,
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 30u64)?,
            expiry_interval_secs: env_nonzero("ALLOCATION_EXPIRY_INTERVAL_SECS", 86_400)?,
            jwt: JwtConfig::from_env()?,
            workflow: workflow_from_env()?,
        })
    }
}

/// Build the workflow settings from the environment.
///
/// | Env Var                    | Default                       |
/// |----------------------------|-------------------------------|
/// | `EMAIL_ENABLED`            | `false`                       |
/// | `EMAIL_SENDER`             | `noreply@rcalloc.local`       |
/// | `PROGRAM_NAME_SHORT`       | `RC`                          |
/// | `CENTER_NAME`              | `Research Computing`          |
/// | `CENTER_HELP_EMAIL`        | `help@rcalloc.local`          |
/// | `CENTER_USER_GUIDE`        | empty                         |
/// | `CENTER_LOGIN_GUIDE`       | empty                         |
/// | `EMAIL_SIGNATURE`          | `Research Computing`          |
/// | `PRIMARY_COMPUTE_RESOURCE` | unset                         |
/// | `ALLOWED_EXTENSION_DAYS`   | `30,60,90`                    |
fn workflow_from_env() -> Result<WorkflowConfig, ConfigError> {
    let defaults = WorkflowConfig::default();

    let allowed_extension_days = match std::env::var("ALLOWED_EXTENSION_DAYS") {
        Ok(raw) => split_list(&raw)
            .into_iter()
            .map(|d| {
                d.parse::<i32>().map_err(|_| ConfigError::Invalid {
                    name: "ALLOWED_EXTENSION_DAYS",
                    value: raw.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Err(_) => DEFAULT_EXTENSION_DAYS.to_vec(),
    };

    Ok(WorkflowConfig {
        email_enabled: env_parse("EMAIL_ENABLED", defaults.email_enabled)?,
        email_sender: env_or("EMAIL_SENDER", defaults.email_sender),
        program_name_short: env_or("PROGRAM_NAME_SHORT", defaults.program_name_short),
        center_name: env_or("CENTER_NAME", defaults.center_name),
        center_help_email: env_or("CENTER_HELP_EMAIL", defaults.center_help_email),
        center_user_guide: env_or("CENTER_USER_GUIDE", defaults.center_user_guide),
        center_login_guide: env_or("CENTER_LOGIN_GUIDE", defaults.center_login_guide),
        email_signature: env_or("EMAIL_SIGNATURE", defaults.email_signature),
        primary_compute_resource: std::env::var("PRIMARY_COMPUTE_RESOURCE")
            .ok()
            .filter(|v| !v.trim().is_empty()),
        allowed_extension_days,
    })
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

pub(crate) fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Like [`env_parse`], but zero is rejected.
fn env_nonzero(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env_parse(name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            value: "0".into(),
        }),
        value => Ok(value),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
