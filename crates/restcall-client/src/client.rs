//! The transaction engine.
//!
//! A [`Client`] targets one address (`base_uri` + `/` + `uri_parameters`)
//! and runs one transaction at a time: up to `max_retries + 1` attempts,
//! each on a fresh transport call, returning the first success or the
//! last failure. Transport failures never escape as errors; they are
//! captured in the returned [`Response`]'s log. Only configuration
//! mistakes are raised, as [`ConfigurationError`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::StatusCode;
use restcall_common_config::RestcallConfig;
use restcall_common_core::{Log, TextEncoding};
use restcall_common_log::spans::{attempt_span, record_error, transaction_span, Timer};
use tracing::{debug, error, info, warn};

use crate::delivery::{DeliveryContext, ProgressHooks};
use crate::request::{Request, RequestBuilder, ValidationError};
use crate::response::Response;
use crate::retry::{classify, Classification};
use crate::transport::{
    CancellationToken, Header, ReqwestTransport, Transport, TransportBuildError, TransportConfig,
    TransportFault, TransportRequest, TransportResponse,
};

/// Mistakes in how the client was set up. Raised, never logged.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Request is not defined.")]
    MissingRequest,

    #[error("BaseUri is not set.")]
    BlankBaseUri,

    #[error("UriParameters is not set.")]
    BlankUriParameters,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportBuildError),

    #[error("failed to start transaction worker: {0}")]
    Worker(#[source] std::io::Error),
}

/// Compose the target address, rejecting blank parts.
pub fn compose_uri(base_uri: &str, uri_parameters: &str) -> Result<String, ConfigurationError> {
    if base_uri.trim().is_empty() {
        return Err(ConfigurationError::BlankBaseUri);
    }
    if uri_parameters.trim().is_empty() {
        return Err(ConfigurationError::BlankUriParameters);
    }
    if base_uri.ends_with('/') {
        Ok(format!("{base_uri}{uri_parameters}"))
    } else {
        Ok(format!("{base_uri}/{uri_parameters}"))
    }
}

/// Aborts whatever transport call is currently in flight.
///
/// Cloneable and usable from any thread while a blocking send runs.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl AbortHandle {
    /// Cancel the in-flight call. Returns `false` when nothing was in flight.
    ///
    /// The cancelled attempt counts as a transport fault and is retried
    /// while budget remains.
    pub fn abort(&self) -> bool {
        match self.slot.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a transport call is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn arm(&self, token: CancellationToken) {
        *self.slot.lock() = Some(token);
    }

    fn disarm(&self) {
        self.slot.lock().take();
    }
}

/// Single-transaction HTTP client.
pub struct Client {
    base_uri: String,
    uri_parameters: String,
    full_uri: String,
    request: Option<Request>,
    log: Arc<Mutex<Log>>,
    hooks: ProgressHooks,
    transport: Arc<dyn Transport>,
    in_flight: AbortHandle,
}

impl Client {
    /// Client for `base_uri` on its own default transport.
    pub fn new(base_uri: impl Into<String>) -> Result<Self, ConfigurationError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(base_uri, String::new(), transport)
    }

    /// Client for `base_uri` + `/` + `uri_parameters`.
    pub fn with_parameters(
        base_uri: impl Into<String>,
        uri_parameters: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let uri_parameters = uri_parameters.into();
        if uri_parameters.trim().is_empty() {
            return Err(ConfigurationError::BlankUriParameters);
        }
        let mut client = Self::new(base_uri)?;
        client.uri_parameters = uri_parameters;
        Ok(client)
    }

    /// Client with an address and a default request.
    pub fn with_request(
        base_uri: impl Into<String>,
        uri_parameters: impl Into<String>,
        request: Request,
    ) -> Result<Self, ConfigurationError> {
        let mut client = Self::with_parameters(base_uri, uri_parameters)?;
        client.request = Some(request);
        Ok(client)
    }

    /// Client over a caller-supplied transport.
    ///
    /// Sharing one transport between clients is cheap; create one client
    /// per concurrent transaction.
    pub fn with_transport(
        base_uri: impl Into<String>,
        uri_parameters: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigurationError> {
        let base_uri = base_uri.into();
        if base_uri.trim().is_empty() {
            return Err(ConfigurationError::BlankBaseUri);
        }
        Ok(Self {
            base_uri,
            uri_parameters: uri_parameters.into(),
            full_uri: String::new(),
            request: None,
            log: Arc::new(Mutex::new(Log::new())),
            hooks: ProgressHooks::default(),
            transport,
            in_flight: AbortHandle::default(),
        })
    }

    /// Client built from loaded configuration, default request included.
    pub fn from_config(config: &RestcallConfig) -> Result<Self, ConfigurationError> {
        let transport = ReqwestTransport::with_config(TransportConfig::from(&config.transport))?;
        let request = RequestBuilder::from_defaults(&config.request).build()?;
        let mut client = Self::with_transport(
            config.endpoint.base_uri.clone(),
            config.endpoint.uri_parameters.clone(),
            Arc::new(transport),
        )?;
        client.request = Some(request);
        Ok(client)
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn set_base_uri(&mut self, base_uri: impl Into<String>) {
        self.base_uri = base_uri.into();
    }

    pub fn uri_parameters(&self) -> &str {
        &self.uri_parameters
    }

    pub fn set_uri_parameters(&mut self, uri_parameters: impl Into<String>) {
        self.uri_parameters = uri_parameters.into();
    }

    /// Address used by the most recent send; empty before the first.
    pub fn full_uri(&self) -> &str {
        &self.full_uri
    }

    /// The stored request, as last sent or configured.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn set_request(&mut self, request: Request) {
        self.request = Some(request);
    }

    pub fn set_progress_hooks(&mut self, hooks: ProgressHooks) {
        self.hooks = hooks;
    }

    /// Snapshot of the client-level log.
    pub fn log(&self) -> Log {
        self.log.lock().clone()
    }

    /// Handle that aborts the in-flight call from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.in_flight.clone()
    }

    /// Abort the in-flight call, if any.
    pub fn abort(&self) -> bool {
        let aborted = self.in_flight.abort();
        if aborted {
            info!(uri = %self.full_uri, "abort requested");
        }
        aborted
    }

    /// Run a transaction and block until it finishes.
    ///
    /// Blocks the calling thread; from async code use [`Client::send_async`].
    pub fn send(&mut self, request: Request) -> Result<Response, ConfigurationError> {
        let transaction = self.prepare(request)?;
        let (response, diagnostics) = transaction.run();
        self.log.lock().merge_from(&diagnostics);
        Ok(response)
    }

    /// Send the stored request.
    pub fn send_current(&mut self) -> Result<Response, ConfigurationError> {
        let request = self.request.clone().ok_or(ConfigurationError::MissingRequest)?;
        self.send(request)
    }

    /// Run a transaction on the blocking pool and await the result.
    pub async fn send_async(&mut self, request: Request) -> Result<Response, ConfigurationError> {
        let transaction = self.prepare(request)?;
        let encoding = transaction.request.body_encoding();

        let (response, diagnostics) = match tokio::task::spawn_blocking(move || transaction.run()).await {
            Ok(done) => done,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {
                let mut response = Response::new(encoding);
                response.log_mut().capture_fault(TransportFault::aborted().into_parts().0);
                (response, Log::new())
            }
        };

        self.log.lock().merge_from(&diagnostics);
        Ok(response)
    }

    /// Run a transaction on a worker thread and post `on_complete` to
    /// `context` when it finishes.
    ///
    /// The hold hook fires before the worker starts; the release hook runs
    /// on `context` right before `on_complete`.
    pub fn send_with_continuation<F>(
        &mut self,
        request: Request,
        context: Arc<dyn DeliveryContext>,
        on_complete: F,
    ) -> Result<(), ConfigurationError>
    where
        F: FnOnce(Response) + Send + 'static,
    {
        let transaction = self.prepare(request)?;
        let hooks = self.hooks.clone();
        let log = Arc::clone(&self.log);

        self.hooks.hold();
        let spawned = std::thread::Builder::new()
            .name("restcall-send".to_string())
            .spawn(move || {
                let (response, diagnostics) = transaction.run();
                log.lock().merge_from(&diagnostics);
                context.post(Box::new(move || {
                    hooks.release();
                    on_complete(response);
                }));
            });

        if let Err(e) = spawned {
            self.hooks.release();
            return Err(ConfigurationError::Worker(e));
        }
        Ok(())
    }

    fn prepare(&mut self, request: Request) -> Result<Transaction, ConfigurationError> {
        let full_uri = compose_uri(&self.base_uri, &self.uri_parameters)?;
        self.full_uri = full_uri.clone();
        self.request = Some(request.clone());

        Ok(Transaction {
            full_uri,
            request,
            transport: Arc::clone(&self.transport),
            in_flight: self.in_flight.clone(),
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_uri", &self.base_uri)
            .field("uri_parameters", &self.uri_parameters)
            .field("full_uri", &self.full_uri)
            .field("request", &self.request)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

enum Attempt {
    Completed(Response),
    Faulted(TransportFault),
}

/// Everything one transaction needs, detached from the client.
struct Transaction {
    full_uri: String,
    request: Request,
    transport: Arc<dyn Transport>,
    in_flight: AbortHandle,
}

impl Transaction {
    /// Run the attempt loop. Returns the response and client-level diagnostics.
    fn run(self) -> (Response, Log) {
        let policy = self.request.retry_policy();
        let max_attempts = policy.max_attempts();
        let span = transaction_span(self.request.method().as_str(), &self.full_uri);
        let _entered = span.enter();
        let timer = Timer::start("transaction");
        let mut diagnostics = Log::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = {
                let _attempt = attempt_span(attempt, max_attempts).entered();
                self.attempt()
            };

            let fault = match outcome {
                Attempt::Completed(mut response) => {
                    response.set_attempts(attempt);
                    span.record("attempts", attempt);
                    debug!(status = ?response.status(), "transaction completed");
                    diagnostics.record_information(format!(
                        "{} {} completed after {attempt} attempt(s)",
                        self.request.method(),
                        self.full_uri
                    ));
                    timer.finish();
                    return (response, diagnostics);
                }
                Attempt::Faulted(fault) => fault,
            };

            let message = fault.to_string();
            let mut response = self.response_for_fault(fault);
            response.set_attempts(attempt);

            if !policy.should_retry(attempt) {
                span.record("attempts", attempt);
                if let Some(fault) = response.log().fault() {
                    record_error(fault);
                }
                error!(error = %message, attempts = attempt, "retry budget exhausted");
                diagnostics.record_warning(format!(
                    "Attempt {attempt} of {max_attempts} failed: {message}"
                ));
                diagnostics.record_information(format!(
                    "{} {} gave up after {attempt} attempt(s)",
                    self.request.method(),
                    self.full_uri
                ));
                timer.finish();
                return (response, diagnostics);
            }

            warn!(error = %message, attempt, "attempt failed, retrying");
            diagnostics.record_warning(format!(
                "Attempt {attempt} of {max_attempts} failed: {message}"
            ));
            if !policy.delay().is_zero() {
                std::thread::sleep(policy.delay());
            }
        }
    }

    fn attempt(&self) -> Attempt {
        let call_request = TransportRequest {
            url: self.full_uri.clone(),
            method: self.request.method(),
            content_type: self.request.content_type().map(str::to_string),
            timeout: self.request.timeout(),
            headers: wire_headers(self.request.headers()),
        };

        let mut call = match self.transport.open(call_request) {
            Ok(call) => call,
            Err(fault) => return Attempt::Faulted(fault),
        };

        self.in_flight.arm(call.cancellation());
        let result = self.write_body(call.as_mut()).and_then(|()| call.dispatch());
        self.in_flight.disarm();

        match result {
            Ok(received) => self.interpret(received),
            Err(fault) => Attempt::Faulted(fault),
        }
    }

    fn write_body(&self, call: &mut dyn crate::transport::TransportCall) -> Result<(), TransportFault> {
        if !self.request.method().carries_body() {
            return Ok(());
        }
        match self.request.body() {
            Some(body) if !body.trim().is_empty() => {
                call.write_body(&self.request.body_encoding().encode(body))
            }
            _ => Ok(()),
        }
    }

    /// Turn a received response into the transaction result.
    fn interpret(&self, mut received: TransportResponse) -> Attempt {
        let encoding = received.reported_encoding().unwrap_or(TextEncoding::Utf8);
        let mut response = Response::new(encoding);
        response.set_status(received.status, received.status_text.clone());
        response.set_content_type(received.content_type.clone());

        if received.status != StatusCode::OK {
            response
                .log_mut()
                .record_error(format!("Request failed. Received HTTP {}", received.status));
            return Attempt::Completed(response);
        }

        match received.read_text(self.request.body_encoding()) {
            Ok(text) => {
                response.set_raw(text);
                Attempt::Completed(response)
            }
            Err(e) => Attempt::Faulted(TransportFault::new(
                restcall_common_core::FaultKind::Protocol,
                format!("failed to read response body: {e}"),
            )),
        }
    }

    /// Build the result for a failed attempt.
    fn response_for_fault(&self, fault: TransportFault) -> Response {
        match classify(fault) {
            Classification::Bare(fault) => {
                let mut response = Response::new(self.request.body_encoding());
                response.log_mut().capture_fault(fault);
                response
            }
            Classification::WithResponse(fault, mut received) => {
                let encoding = received
                    .reported_encoding()
                    .or(self.request.encoding())
                    .unwrap_or(TextEncoding::Utf8);
                let mut response = Response::new(encoding);
                response.set_status(received.status, received.status_text.clone());
                response.set_content_type(received.content_type.clone());

                if received.content_length.is_some_and(|n| n > 0) {
                    match received.read_text(TextEncoding::Utf8) {
                        Ok(text) => response.set_raw(text),
                        Err(e) => response
                            .log_mut()
                            .record_warning(format!("failed to read error response body: {e}")),
                    }
                }
                response.log_mut().capture_fault(fault);
                response
            }
        }
    }
}

/// Headers as sent: blank names dropped, blank values sent bare.
fn wire_headers(headers: &HashMap<String, String>) -> Vec<Header> {
    let mut wire: Vec<Header> = headers
        .iter()
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, value)| Header {
            name: name.clone(),
            value: (!value.trim().is_empty()).then(|| value.clone()),
        })
        .collect();
    // stable order for recorded calls
    wire.sort_by(|a, b| a.name.cmp(&b.name));
    wire
}
