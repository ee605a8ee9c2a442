//! Configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestcallConfig {
    /// Target endpoint.
    pub endpoint: EndpointConfig,
    /// Defaults for requests built from this config.
    pub request: RequestDefaults,
    /// Transport construction settings.
    pub transport: TransportSettings,
}

/// Target endpoint, split the same way the client composes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base address, e.g. `https://api.example.com/v1`.
    pub base_uri: String,
    /// Address suffix appended after a `/`.
    pub uri_parameters: String,
}

/// Request policy defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    /// HTTP verb.
    pub method: String,
    /// Content type sent with the request.
    pub content_type: Option<String>,
    /// Text encoding label for bodies.
    pub encoding: Option<String>,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: i64,
    /// Additional attempts after the first.
    pub max_retries: u8,
    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            method: "get".to_string(),
            content_type: Some("application/json".to_string()),
            encoding: Some("utf-8".to_string()),
            timeout_secs: 30,
            max_retries: 5,
            retry_delay_ms: 0,
            headers: HashMap::new(),
        }
    }
}

/// Minimum TLS protocol version accepted by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "tls1_1")]
    Tls1_1,
    #[default]
    #[serde(rename = "tls1_2")]
    Tls1_2,
    #[serde(rename = "tls1_3")]
    Tls1_3,
}

/// Transport construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Default request timeout in seconds, used when a request sets none.
    pub request_timeout_secs: u64,
    /// User agent override.
    pub user_agent: Option<String>,
    /// Minimum TLS version.
    pub min_tls_version: TlsVersion,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: None,
            min_tls_version: TlsVersion::default(),
            gzip: true,
        }
    }
}
