//! Structured span definitions for tracing.

use std::time::Instant;

use tracing::{Level, Span, field, span};

/// Tracks one outbound FHIR request.
pub struct RequestSpan {
    span: Span,
    start: Instant,
}

impl RequestSpan {
    pub fn new(method: &str, url: &str, strategy: &str) -> Self {
        let span = span!(
            Level::DEBUG,
            "fhir.request",
            method = method,
            url = url,
            auth = strategy,
            otel.name = "fhir.request",
            status = field::Empty,
            latency_ms = field::Empty,
            error = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn record_status(&self, status: u16) {
        self.span.record("status", status);
    }

    pub fn record_error(&self, error: &dyn std::fmt::Display) {
        self.span.record("error", field::display(error));
    }

    pub fn finish(self) -> u64 {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("latency_ms", latency_ms);
        latency_ms
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
