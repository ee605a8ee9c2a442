//! Transport backed by `reqwest`.
//!
//! The client is async, but the engine drives calls from blocking code, so
//! each transport owns a small runtime and blocks on its handle.

use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use restcall_common_config::{TlsVersion, TransportSettings};
use restcall_common_core::FaultKind;
use tokio::runtime::{Handle, Runtime};

use super::{
    CancellationToken, CancellationWatcher, Transport, TransportCall, TransportFault,
    TransportRequest, TransportResponse,
};
use crate::request::Method;

/// Transport construction settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout applied when a request carries a zero timeout.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Minimum TLS version negotiated.
    pub min_tls_version: TlsVersion,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("restcall/{}", env!("CARGO_PKG_VERSION")),
            min_tls_version: TlsVersion::Tls1_2,
            gzip: true,
        }
    }
}

impl From<&TransportSettings> for TransportConfig {
    fn from(settings: &TransportSettings) -> Self {
        let defaults = Self::default();
        Self {
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            user_agent: settings.user_agent.clone().unwrap_or(defaults.user_agent),
            min_tls_version: settings.min_tls_version,
            gzip: settings.gzip,
        }
    }
}

fn tls_version(version: TlsVersion) -> reqwest::tls::Version {
    match version {
        TlsVersion::Tls1_1 => reqwest::tls::Version::TLS_1_1,
        TlsVersion::Tls1_2 => reqwest::tls::Version::TLS_1_2,
        TlsVersion::Tls1_3 => reqwest::tls::Version::TLS_1_3,
    }
}

/// Build a configured HTTP client.
pub fn build_client(config: &TransportConfig) -> Result<Client, TransportBuildError> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .min_tls_version(tls_version(config.min_tls_version));

    if config.gzip {
        builder = builder.gzip(true);
    }

    builder.build().map_err(TransportBuildError::ClientBuild)
}

/// Transport construction errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportBuildError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("failed to start transport runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Production transport.
///
/// Calls block the current thread. Do not dispatch from inside an async
/// task; use [`crate::Client::send_async`] there instead.
pub struct ReqwestTransport {
    client: Client,
    runtime: Option<Runtime>,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with default settings.
    pub fn new() -> Result<Self, TransportBuildError> {
        Self::with_config(TransportConfig::default())
    }

    /// Create a transport with custom settings.
    pub fn with_config(config: TransportConfig) -> Result<Self, TransportBuildError> {
        let client = build_client(&config)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("restcall-transport")
            .enable_all()
            .build()
            .map_err(TransportBuildError::Runtime)?;

        Ok(Self {
            client,
            runtime: Some(runtime),
            default_timeout: config.request_timeout,
        })
    }

    fn handle(&self) -> Result<Handle, TransportFault> {
        self.runtime
            .as_ref()
            .map(|rt| rt.handle().clone())
            .ok_or_else(|| TransportFault::new(FaultKind::Connect, "transport runtime has shut down"))
    }
}

impl Drop for ReqwestTransport {
    fn drop(&mut self) {
        // The last owner may be an async task; a blocking shutdown would panic there.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Transport for ReqwestTransport {
    fn open(&self, request: TransportRequest) -> Result<Box<dyn TransportCall>, TransportFault> {
        let (token, watcher) = CancellationToken::new();
        Ok(Box::new(ReqwestCall {
            client: self.client.clone(),
            handle: self.handle()?,
            request,
            body: Vec::new(),
            token,
            watcher,
            default_timeout: self.default_timeout,
        }))
    }
}

struct ReqwestCall {
    client: Client,
    handle: Handle,
    request: TransportRequest,
    body: Vec<u8>,
    token: CancellationToken,
    watcher: CancellationWatcher,
    default_timeout: Duration,
}

impl ReqwestCall {
    fn build(&self) -> Result<reqwest::RequestBuilder, TransportFault> {
        let timeout = if self.request.timeout.is_zero() {
            self.default_timeout
        } else {
            self.request.timeout
        };

        let mut builder = self
            .client
            .request(http_method(self.request.method), &self.request.url)
            .timeout(timeout);

        if let Some(content_type) = &self.request.content_type {
            builder = builder.header(CONTENT_TYPE, header_value(content_type)?);
        }

        for header in &self.request.headers {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
                TransportFault::new(
                    FaultKind::Protocol,
                    format!("invalid header name {:?}: {e}", header.name),
                )
            })?;
            let value = header_value(header.value.as_deref().unwrap_or_default())?;
            builder = builder.header(name, value);
        }

        if !self.body.is_empty() {
            builder = builder.body(self.body.clone());
        }

        Ok(builder)
    }
}

impl TransportCall for ReqwestCall {
    fn write_body(&mut self, body: &[u8]) -> Result<(), TransportFault> {
        self.body.extend_from_slice(body);
        Ok(())
    }

    fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }

    fn dispatch(self: Box<Self>) -> Result<TransportResponse, TransportFault> {
        let builder = self.build()?;
        let ReqwestCall {
            handle,
            request,
            token,
            mut watcher,
            ..
        } = *self;

        tracing::debug!(method = %request.method, url = %request.url, "dispatching request");

        let outcome = handle.block_on(async move {
            tokio::select! {
                biased;
                _ = watcher.cancelled() => Err(TransportFault::aborted()),
                result = exchange(builder) => result,
            }
        });
        drop(token);

        match &outcome {
            Ok(response) => tracing::debug!(status = %response.status, "response received"),
            Err(fault) => tracing::debug!(kind = ?fault.kind(), error = %fault, "call failed"),
        }
        outcome
    }
}

async fn exchange(builder: reqwest::RequestBuilder) -> Result<TransportResponse, TransportFault> {
    let response = builder.send().await.map_err(fault_from_reqwest)?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await.map_err(fault_from_reqwest)?;

    let mut received = TransportResponse::new(status).with_body(bytes.to_vec());
    if let Some(content_type) = content_type {
        received = received.with_content_type(content_type);
    }

    if status.is_client_error() || status.is_server_error() {
        return Err(TransportFault::status(received));
    }
    Ok(received)
}

fn fault_from_reqwest(e: reqwest::Error) -> TransportFault {
    let kind = if e.is_timeout() {
        FaultKind::Timeout
    } else if e.is_body() || e.is_decode() || e.is_builder() {
        FaultKind::Protocol
    } else {
        FaultKind::Connect
    };
    TransportFault::new(kind, e.to_string())
}

fn header_value(value: &str) -> Result<HeaderValue, TransportFault> {
    HeaderValue::from_str(value).map_err(|e| {
        TransportFault::new(FaultKind::Protocol, format!("invalid header value {value:?}: {e}"))
    })
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}
