//! Environment variable handling.

use std::env;
use thiserror::Error;

use crate::types::RestcallConfig;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    pub const RESTCALL_CONFIG_PATH: &str = "RESTCALL_CONFIG_PATH";
    pub const RESTCALL_BASE_URI: &str = "RESTCALL_BASE_URI";
    pub const RESTCALL_URI_PARAMETERS: &str = "RESTCALL_URI_PARAMETERS";
    pub const RESTCALL_MAX_RETRIES: &str = "RESTCALL_MAX_RETRIES";
    pub const RESTCALL_TIMEOUT_SECS: &str = "RESTCALL_TIMEOUT_SECS";
    pub const RESTCALL_ENV: &str = "RESTCALL_ENV";
}

/// Environment configuration.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Initialize environment from .env files.
    ///
    /// `.env.local` overrides `.env`; `.env.<RESTCALL_ENV>` overrides both.
    /// Missing files are not an error.
    pub fn init() -> Result<Self, EnvError> {
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename_override(".env.local");

        if let Ok(profile) = env::var(vars::RESTCALL_ENV) {
            let _ = dotenvy::from_filename_override(format!(".env.{}", profile));
        }

        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet { var: var.to_string() })
    }

    /// Get an optional, non-blank string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        Self::get(var).unwrap_or_else(|| default.to_string())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        env::var(var)
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Get a numeric variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        match env::var(var) {
            Ok(v) => v.trim().parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: format!("expected integer, got {v:?}"),
            }),
            Err(_) => Ok(None),
        }
    }
}

/// Apply `RESTCALL_*` overrides on top of a loaded configuration.
pub fn apply_env_overrides(config: &mut RestcallConfig) -> Result<(), EnvError> {
    if let Some(base_uri) = Environment::get(vars::RESTCALL_BASE_URI) {
        config.endpoint.base_uri = base_uri;
    }
    if let Some(parameters) = Environment::get(vars::RESTCALL_URI_PARAMETERS) {
        config.endpoint.uri_parameters = parameters;
    }
    if let Some(max_retries) = Environment::get_int(vars::RESTCALL_MAX_RETRIES)? {
        config.request.max_retries = max_retries;
    }
    if let Some(timeout) = Environment::get_int(vars::RESTCALL_TIMEOUT_SECS)? {
        config.request.timeout_secs = timeout;
    }
    Ok(())
}
