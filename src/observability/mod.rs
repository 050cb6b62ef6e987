//! Observability for outbound FHIR traffic.
//!
//! Requests are wrapped in a `fhir.request` span carrying method, URL, the
//! auth strategy, response status and latency. Installing a subscriber is up
//! to the application.

mod spans;

pub use spans::RequestSpan;
