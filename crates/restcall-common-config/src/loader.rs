//! Configuration file loading and parsing.

use crate::types::RestcallConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Upper bound on the retry budget accepted from configuration.
pub const MAX_CONFIGURED_RETRIES: u8 = 10;

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
pub struct ConfigLoader {
    config_path: PathBuf,
    required: bool,
}

impl ConfigLoader {
    /// Create a loader for `<project_dir>/.restcall/config.yaml`.
    ///
    /// A missing file yields the default configuration.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: project_dir.as_ref().join(".restcall/config.yaml"),
            required: false,
        }
    }

    /// Create a loader for an explicit file, which must exist.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            required: true,
        }
    }

    /// Path this loader reads and writes.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and validate the configuration.
    pub fn load(&self) -> Result<RestcallConfig, ConfigError> {
        if !self.config_path.exists() {
            if self.required {
                return Err(ConfigError::NotFound {
                    path: self.config_path.clone(),
                });
            }
            return Ok(RestcallConfig::default());
        }

        let contents = std::fs::read_to_string(&self.config_path)?;
        let expanded = expand_env_vars(&contents)?;

        let config: RestcallConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        validate(&config)?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, config: &RestcallConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(&self.config_path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is a valid regex")
    })
}

/// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
pub fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = content.to_string();

    for cap in env_var_pattern().captures_iter(content) {
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default {
                Some(d) => d.to_string(),
                None => {
                    return Err(ConfigError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            },
        };

        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}

/// Validate configuration values.
pub fn validate(config: &RestcallConfig) -> Result<(), ConfigError> {
    if config.request.timeout_secs < 0 {
        return Err(ConfigError::ValidationError {
            message: "request.timeout_secs must be zero or larger".to_string(),
        });
    }

    if config.request.max_retries > MAX_CONFIGURED_RETRIES {
        return Err(ConfigError::ValidationError {
            message: format!("request.max_retries must be at most {MAX_CONFIGURED_RETRIES}"),
        });
    }

    if config.request.method.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            message: "request.method must not be empty".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_config(dir: &Path, contents: &str) {
        let restcall_dir = dir.join(".restcall");
        fs::create_dir_all(&restcall_dir).unwrap();
        fs::write(restcall_dir.join("config.yaml"), contents).unwrap();
    }

    #[test]
    fn test_load_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.request.max_retries, 5);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempdir().unwrap();
        let result = ConfigLoader::from_path(dir.path().join("missing.yaml")).load();
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
endpoint:
  base_uri: http://localhost:52101/Service1
  uri_parameters: TestPost
request:
  method: post
  timeout_secs: 5
  retry_delay_ms: 250
  headers:
    X-Trace: abc
"#,
        );

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.endpoint.base_uri, "http://localhost:52101/Service1");
        assert_eq!(config.endpoint.uri_parameters, "TestPost");
        assert_eq!(config.request.method, "post");
        assert_eq!(config.request.timeout_secs, 5);
        assert_eq!(config.request.retry_delay_ms, 250);
        assert_eq!(config.request.headers.get("X-Trace").map(String::as_str), Some("abc"));
        assert_eq!(config.request.max_retries, 5);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("RESTCALL_TEST_HOST", "example.org");
        let result = expand_env_vars("base_uri: https://${RESTCALL_TEST_HOST}/api").unwrap();
        assert_eq!(result, "base_uri: https://example.org/api");
        std::env::remove_var("RESTCALL_TEST_HOST");
    }

    #[test]
    fn test_env_var_default() {
        let result = expand_env_vars("key: ${RESTCALL_NONEXISTENT:-fallback}").unwrap();
        assert_eq!(result, "key: fallback");
    }

    #[test]
    fn test_env_var_missing_error() {
        match expand_env_vars("key: ${RESTCALL_MISSING_VAR}") {
            Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "RESTCALL_MISSING_VAR"),
            other => panic!("Expected EnvVarNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors() {
        let mut config = RestcallConfig::default();
        config.request.timeout_secs = -1;
        match validate(&config) {
            Err(ConfigError::ValidationError { message }) => assert!(message.contains("timeout_secs")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }

        let mut config = RestcallConfig::default();
        config.request.max_retries = MAX_CONFIGURED_RETRIES + 1;
        match validate(&config) {
            Err(ConfigError::ValidationError { message }) => assert!(message.contains("max_retries")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }

        let mut config = RestcallConfig::default();
        config.request.method = " ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
endpoint:
  base_uri: http://localhost
  broken: [unclosed
"#,
        );

        match ConfigLoader::new(dir.path()).load() {
            Err(ConfigError::ParseError { line, .. }) => assert!(line.is_some()),
            other => panic!("Expected ParseError with line number, got {other:?}"),
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());

        let mut config = RestcallConfig::default();
        config.endpoint.base_uri = "https://api.example.com".to_string();
        config.request.max_retries = 3;
        loader.save(&config).unwrap();

        assert!(loader.path().exists());
        let loaded = loader.load().unwrap();
        assert_eq!(loaded.endpoint.base_uri, "https://api.example.com");
        assert_eq!(loaded.request.max_retries, 3);
    }
}
