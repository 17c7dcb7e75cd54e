//! Exponential back-off with jitter for telemetry requests.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Whether a failed `circuitStatus` call is attempted again.
///
/// Only failures of the transport are retried: timeouts, refused or dropped
/// connections, and 5xx statuses from the SOAP gateway. A 4xx status means
/// the request itself was rejected.
///
/// Once the service has answered with a body, the answer is final. The PHP
/// endpoint prints notices ahead of the envelope and returns an empty
/// `return` for circuits it has no data for, so `MissingEnvelope`,
/// `MissingReturn`, `Xml` and `Deserialize` describe what the service holds
/// for that node and interface, and the same body comes back on every
/// attempt. The circuit is reported as failed instead. `InvalidEndpoint` is a
/// configuration error and never reaches the network.
pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        FetchError::InvalidEndpoint { .. }
        | FetchError::MissingEnvelope
        | FetchError::MissingReturn
        | FetchError::Xml(_)
        | FetchError::Deserialize { .. } => false,
    }
}

/// Runs one telemetry call with up to `max_retries` additional attempts when
/// [`is_retriable`] allows it.
///
/// The wait before attempt `n + 1` is `backoff_base_ms * 2^(n - 1)`, capped at
/// 60 s and jittered by ±25 %. Retries are off by default; with 3 retries and
/// a 500 ms base a circuit whose gateway stays down waits about 3.5 s in total
/// before it is reported as failed.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "telemetry request failed, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
