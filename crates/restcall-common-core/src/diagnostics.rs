//! Diagnostic logs attached to requests, responses and clients.
//!
//! A [`Log`] is plain data: one optional captured [`Fault`] plus ordered
//! error, warning and information messages. Callers inspect
//! [`Log::has_errors`] after a transaction instead of handling transport
//! errors themselves.

use serde::{Deserialize, Serialize};

/// Delimiter used when joining a category into one string.
pub const DEFAULT_DELIMITER: &str = "  ";

/// Kind of a captured fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The connection could not be established or was dropped.
    Connect,
    /// The transport gave up waiting for the server.
    Timeout,
    /// The server answered with an error status.
    Status,
    /// The call was cancelled while in flight.
    Aborted,
    /// The exchange violated the protocol (bad headers, unreadable body).
    Protocol,
    /// A payload could not be serialized or deserialized.
    Serialization,
}

/// A fault recorded into a [`Log`] without being raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct Fault {
    kind: FaultKind,
    message: String,
    status: Option<u16>,
}

impl Fault {
    /// Create a new fault.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Attach the HTTP status the fault was raised for.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Fault kind.
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status carried by the fault, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

/// Message category of a [`Log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Errors,
    Warnings,
    Information,
}

/// Accumulator of errors, warnings, information and one captured fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    delimiter: String,
    fault: Option<Fault>,
    errors: Vec<String>,
    warnings: Vec<String>,
    information: Vec<String>,
}

impl Log {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            fault: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            information: Vec::new(),
        }
    }

    /// Record an error message. Blank text is ignored.
    pub fn record_error(&mut self, text: impl AsRef<str>) {
        push_non_blank(&mut self.errors, text.as_ref());
    }

    /// Record a warning message. Blank text is ignored.
    pub fn record_warning(&mut self, text: impl AsRef<str>) {
        push_non_blank(&mut self.warnings, text.as_ref());
    }

    /// Record an information message. Blank text is ignored.
    pub fn record_information(&mut self, text: impl AsRef<str>) {
        push_non_blank(&mut self.information, text.as_ref());
    }

    /// Capture a fault. A log holds at most one; the latest wins.
    pub fn capture_fault(&mut self, fault: impl Into<Fault>) {
        self.fault = Some(fault.into());
    }

    /// True when a fault was captured or at least one error was recorded.
    pub fn has_errors(&self) -> bool {
        self.fault.is_some() || !self.errors.is_empty()
    }

    /// The captured fault.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Recorded errors, oldest first.
    pub fn error_entries(&self) -> &[String] {
        &self.errors
    }

    /// Recorded warnings, oldest first.
    pub fn warning_entries(&self) -> &[String] {
        &self.warnings
    }

    /// Recorded information, oldest first.
    pub fn information_entries(&self) -> &[String] {
        &self.information
    }

    /// Current join delimiter.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Override the join delimiter. An empty delimiter restores the default.
    pub fn set_delimiter(&mut self, delimiter: impl Into<String>) {
        let delimiter = delimiter.into();
        self.delimiter = if delimiter.is_empty() {
            DEFAULT_DELIMITER.to_string()
        } else {
            delimiter
        };
    }

    /// All errors joined with the log delimiter.
    pub fn errors(&self) -> String {
        self.joined_with(Category::Errors, &self.delimiter)
    }

    /// All warnings joined with the log delimiter.
    pub fn warnings(&self) -> String {
        self.joined_with(Category::Warnings, &self.delimiter)
    }

    /// All information joined with the log delimiter.
    pub fn information(&self) -> String {
        self.joined_with(Category::Information, &self.delimiter)
    }

    /// Join one category with an explicit delimiter.
    pub fn joined_with(&self, category: Category, delimiter: &str) -> String {
        let entries = match category {
            Category::Errors => &self.errors,
            Category::Warnings => &self.warnings,
            Category::Information => &self.information,
        };
        entries.join(delimiter)
    }

    /// Append the entries of `other`. A fault in `other` replaces ours.
    pub fn merge_from(&mut self, other: &Log) {
        self.errors.extend(other.errors.iter().cloned());
        self.warnings.extend(other.warnings.iter().cloned());
        self.information.extend(other.information.iter().cloned());
        if let Some(fault) = &other.fault {
            self.fault = Some(fault.clone());
        }
    }

    /// True when nothing at all has been recorded.
    pub fn is_empty(&self) -> bool {
        self.fault.is_none()
            && self.errors.is_empty()
            && self.warnings.is_empty()
            && self.information.is_empty()
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

fn push_non_blank(entries: &mut Vec<String>, text: &str) {
    if !text.trim().is_empty() {
        entries.push(text.to_string());
    }
}
