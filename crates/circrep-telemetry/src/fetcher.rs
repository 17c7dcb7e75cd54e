use std::future::Future;

use circrep_core::TelemetryRecord;

use crate::error::FetchError;

/// Source of hourly telemetry for one circuit.
///
/// An empty vector is a successful fetch with no data, not an error.
pub trait TelemetryFetcher: Send + Sync {
    fn fetch(
        &self,
        node_id: &str,
        interface_id: &str,
    ) -> impl Future<Output = Result<Vec<TelemetryRecord>, FetchError>> + Send;
}
