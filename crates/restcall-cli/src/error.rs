//! CLI error handling.

use thiserror::Error;

use crate::Exit;

/// CLI error type with context
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        hint: Option<String>,
    },

    #[error("{message}")]
    Network { message: String, url: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Configuration error wrapping its cause.
    pub fn config(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Config {
            message: source.to_string(),
            source: Some(Box::new(source)),
            hint: None,
        }
    }

    /// Attach a hint to a configuration error.
    pub fn with_hint(mut self, text: impl Into<String>) -> Self {
        if let Self::Config { hint, .. } = &mut self {
            *hint = Some(text.into());
        }
        self
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> Exit {
        match self {
            Self::Config { .. } => Exit::ConfigError,
            Self::Network { .. } => Exit::NetworkError,
            Self::Other(_) => Exit::GeneralError,
        }
    }

    /// Optional hint shown under the message.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }
}

impl From<restcall_client::ConfigurationError> for CliError {
    fn from(e: restcall_client::ConfigurationError) -> Self {
        Self::config(e)
    }
}
