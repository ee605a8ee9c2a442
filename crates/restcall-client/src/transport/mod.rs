//! The seam between the transaction engine and the network.
//!
//! The engine opens one [`TransportCall`] per attempt, optionally writes a
//! body into it, then dispatches it and waits for the outcome. A status of
//! 400 or above is reported as a [`TransportFault`] that carries the
//! response, mirroring how most HTTP stacks surface protocol errors.

pub mod cancel;
pub mod http;

use std::fmt;
use std::io::{self, Cursor, Read};
use std::time::Duration;

use reqwest::StatusCode;
use restcall_common_core::{Fault, FaultKind, TextEncoding};

use crate::request::Method;

pub use cancel::{CancellationToken, CancellationWatcher};
pub use http::{ReqwestTransport, TransportBuildError, TransportConfig};

/// One header as sent on the wire. `None` sends the name with an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: Option<String>,
}

/// Everything a transport needs to open a call.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub content_type: Option<String>,
    /// Per-attempt timeout. Zero means the transport default.
    pub timeout: Duration,
    pub headers: Vec<Header>,
}

/// A response received from the server, body not yet consumed.
pub struct TransportResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub content_type: Option<String>,
    /// Charset label reported by the server, if any.
    pub charset: Option<String>,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl TransportResponse {
    /// Response with the canonical reason phrase and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            content_type: None,
            charset: None,
            content_length: Some(0),
            body: Box::new(io::empty()),
        }
    }

    /// Replace the body with an in-memory buffer.
    pub fn with_body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        self.content_length = Some(bytes.len() as u64);
        self.body = Box::new(Cursor::new(bytes));
        self
    }

    /// Set the content type, picking up its charset parameter.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.charset = restcall_common_core::encoding::charset_from_content_type(&content_type)
            .map(str::to_string);
        self.content_type = Some(content_type);
        self
    }

    /// Encoding named by the reported charset, if recognised.
    pub fn reported_encoding(&self) -> Option<TextEncoding> {
        self.charset.as_deref().and_then(TextEncoding::from_label)
    }

    /// Read the whole body and decode it.
    pub fn read_text(&mut self, encoding: TextEncoding) -> io::Result<String> {
        let mut bytes = Vec::new();
        self.body.read_to_end(&mut bytes)?;
        Ok(encoding.decode(&bytes))
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("content_type", &self.content_type)
            .field("charset", &self.charset)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// A failed transport call, possibly with the server's response attached.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportFault {
    kind: FaultKind,
    message: String,
    response: Option<TransportResponse>,
}

impl TransportFault {
    /// Fault with no response attached.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            response: None,
        }
    }

    /// Protocol error status carrying the response the server sent.
    pub fn status(response: TransportResponse) -> Self {
        let message = format!(
            "The remote server returned an error: ({}) {}.",
            response.status.as_u16(),
            response.status_text
        );
        Self {
            kind: FaultKind::Status,
            message,
            response: Some(response),
        }
    }

    /// The call was cancelled through its [`CancellationToken`].
    pub fn aborted() -> Self {
        Self::new(FaultKind::Aborted, "The request was aborted: The request was canceled.")
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response(&self) -> Option<&TransportResponse> {
        self.response.as_ref()
    }

    /// Split into the loggable fault and the embedded response.
    pub fn into_parts(self) -> (Fault, Option<TransportResponse>) {
        let mut fault = Fault::new(self.kind, self.message);
        if let Some(response) = &self.response {
            fault = fault.with_status(response.status.as_u16());
        }
        (fault, self.response)
    }
}

/// Opens calls against a remote server.
pub trait Transport: Send + Sync {
    /// Prepare a call. Nothing is sent until [`TransportCall::dispatch`].
    fn open(&self, request: TransportRequest) -> Result<Box<dyn TransportCall>, TransportFault>;
}

/// One attempt's worth of network exchange.
pub trait TransportCall: Send {
    /// Append bytes to the request body.
    fn write_body(&mut self, body: &[u8]) -> Result<(), TransportFault>;

    /// Token that aborts this call when cancelled.
    fn cancellation(&self) -> CancellationToken;

    /// Send the request and wait for the response.
    fn dispatch(self: Box<Self>) -> Result<TransportResponse, TransportFault>;
}
