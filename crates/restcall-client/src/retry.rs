//! Attempt budgeting and fault classification.

use std::time::Duration;

use restcall_common_core::Fault;

use crate::transport::{TransportFault, TransportResponse};

/// How many attempts a transaction may make and how they are paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u8,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u8, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// Pause between a failed attempt and the next one.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Total attempts allowed, the first included.
    pub fn max_attempts(&self) -> u32 {
        u32::from(self.max_retries) + 1
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::request::DEFAULT_MAX_RETRIES, Duration::ZERO)
    }
}

/// A transport fault split by whether the server answered.
#[derive(Debug)]
pub enum Classification {
    /// No response reached us: connection, timeout or abort.
    Bare(Fault),
    /// The server answered with an error status.
    WithResponse(Fault, TransportResponse),
}

/// Classify a transport fault.
pub fn classify(fault: TransportFault) -> Classification {
    match fault.into_parts() {
        (fault, Some(response)) => Classification::WithResponse(fault, response),
        (fault, None) => Classification::Bare(fault),
    }
}
