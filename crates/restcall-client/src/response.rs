//! Transaction results.

use reqwest::StatusCode;
use restcall_common_core::{from_json, Log, SerializationFault, TextEncoding};
use serde::de::DeserializeOwned;

/// Outcome of one transaction.
///
/// Always returned, even when every attempt failed; inspect
/// [`Response::log`] to tell success from failure.
#[derive(Debug, Clone)]
pub struct Response {
    status: Option<StatusCode>,
    status_text: String,
    content_type: Option<String>,
    encoding: TextEncoding,
    raw: String,
    attempts: u32,
    log: Log,
}

impl Response {
    /// Empty response decoded with `encoding`.
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            status: None,
            status_text: String::new(),
            content_type: None,
            encoding,
            raw: String::new(),
            attempts: 0,
            log: Log::new(),
        }
    }

    /// Response holding already-received text.
    pub fn with_text(status: StatusCode, raw: impl Into<String>, encoding: TextEncoding) -> Self {
        let mut response = Self::new(encoding);
        response.set_status(status, status.canonical_reason().unwrap_or_default());
        response.raw = raw.into();
        response
    }

    /// Status of the last attempt that reached the server.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Encoding the body was decoded with.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Body text; empty when nothing was read.
    pub fn raw_response(&self) -> &str {
        &self.raw
    }

    /// Number of attempts made for this transaction.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut Log {
        &mut self.log
    }

    /// 200 with nothing recorded as an error.
    pub fn is_success(&self) -> bool {
        self.status == Some(StatusCode::OK) && !self.log.has_errors()
    }

    /// Parse the body as JSON.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, SerializationFault> {
        from_json(&self.raw, self.encoding)
    }

    /// Parse the body as JSON, capturing any failure in this response's log.
    pub fn try_deserialize<T: DeserializeOwned>(&mut self) -> Option<T> {
        match self.deserialize() {
            Ok(value) => Some(value),
            Err(fault) => {
                self.log.capture_fault(fault);
                None
            }
        }
    }

    pub(crate) fn set_status(&mut self, status: StatusCode, status_text: impl Into<String>) {
        self.status = Some(status);
        self.status_text = status_text.into();
    }

    pub(crate) fn set_content_type(&mut self, content_type: Option<String>) {
        self.content_type = content_type;
    }

    pub(crate) fn set_raw(&mut self, raw: String) {
        self.raw = raw;
    }

    pub(crate) fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }
}
