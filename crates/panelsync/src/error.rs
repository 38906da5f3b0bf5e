//! Startup error types with miette diagnostics.
//!
//! Once the reconciliation loop is running nothing surfaces here; every
//! variant describes why the process refused to start.

use miette::Diagnostic;
use thiserror::Error;

use panelsync_config::{ConfigError, config_path};
use panelsync_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
}

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Missing required setting {field}")]
    #[diagnostic(
        code(panelsync::config_missing),
        help(
            "Set it in {path} (or the file named by PANELSYNC_CONFIG),\n\
             or through the environment: {env}"
        )
    )]
    ConfigMissing {
        field: String,
        path: String,
        env: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(panelsync::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(panelsync::config))]
    Config(Box<figment::Error>),

    // ── Startup ──────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(panelsync::startup))]
    Startup(#[from] CoreError),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing { field } => Self::ConfigMissing {
                env: env_hint(&field),
                path: config_path().display().to_string(),
                field,
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Figment(e) => Self::Config(e),
        }
    }
}

impl AppError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigMissing { .. } | Self::Validation { .. } | Self::Config(_) => {
                exit_code::CONFIG
            }
            Self::Startup(CoreError::ConfigMissing { .. } | CoreError::Config { .. }) => {
                exit_code::CONFIG
            }
            Self::Startup(_) => exit_code::GENERAL,
        }
    }
}

/// Environment variable that supplies `field`, if any.
fn env_hint(field: &str) -> String {
    match field {
        "device.base_url" => "NANOLEAF_BASE_URL".into(),
        "device.auth_token" => "NANOLEAF_AUTH_TOKEN".into(),
        "entities" => "[[entities]] tables are only read from the config file".into(),
        other => format!("PANELSYNC_{}", other.replace('.', "__").to_uppercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_hint_names_variables() {
        assert_eq!(env_hint("device.auth_token"), "NANOLEAF_AUTH_TOKEN");
        assert_eq!(env_hint("feed.url"), "PANELSYNC_FEED__URL");
    }

    #[test]
    fn config_errors_exit_with_usage_code() {
        let err = AppError::from(ConfigError::Validation {
            field: "backoff".into(),
            reason: "bad".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);

        let err = AppError::from(CoreError::StreamStalled { idle_secs: 1 });
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
