//! Client for the SOAP circuit-status telemetry service.

pub mod client;
pub mod error;
pub mod fetcher;
pub(crate) mod retry;

pub use client::SoapTelemetryClient;
pub use error::FetchError;
pub use fetcher::TelemetryFetcher;
