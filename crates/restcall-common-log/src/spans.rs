//! Span helpers for transactions and their attempts.

use tracing::{info_span, Span};

/// Create a span covering one transaction, retries included.
pub fn transaction_span(method: &str, uri: &str) -> Span {
    info_span!(
        "transaction",
        method = %method,
        uri = %uri,
        attempts = tracing::field::Empty,
        error = tracing::field::Empty
    )
}

/// Create a span for a single transport attempt.
pub fn attempt_span(attempt: u32, max_attempts: u32) -> Span {
    info_span!("attempt", n = attempt, of = max_attempts)
}

/// Record an error on the current transaction span.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Milliseconds elapsed so far.
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Complete the timer and record duration.
    pub fn finish(self) {
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %self.elapsed_ms(),
            "operation completed"
        );
    }
}
