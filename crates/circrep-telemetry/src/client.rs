//! HTTP client for the circuit-status SOAP endpoint.
//!
//! The service answers a `circuitStatus` call with a SOAP envelope whose
//! `return` element carries a JSON document, entity-encoded once by the XML
//! layer and sometimes a second time by the service itself. The body may also
//! carry PHP notices ahead of the envelope.

use std::sync::LazyLock;
use std::time::Duration;

use circrep_core::config::DEFAULT_NAMESPACE;
use circrep_core::{AppConfig, TelemetryRecord};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};

use crate::error::FetchError;
use crate::fetcher::TelemetryFetcher;
use crate::retry::retry_with_backoff;

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

static ENVELOPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\?xml.*?</(?:[\w-]+:)?Envelope>").expect("valid envelope regex")
});

/// Client for the `circuitStatus` SOAP operation.
///
/// Use [`SoapTelemetryClient::new`] with the loaded [`AppConfig`], or
/// [`SoapTelemetryClient::with_base_url`] to point at a mock server in tests.
#[derive(Debug, Clone)]
pub struct SoapTelemetryClient {
    client: Client,
    endpoint: Url,
    soap_action: String,
    namespace: String,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl SoapTelemetryClient {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`FetchError::InvalidEndpoint`] if the configured URL is invalid.
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        Ok(
            Self::with_base_url(&config.telemetry_url, config.telemetry_timeout_secs)?
                .with_soap_action(&config.telemetry_soap_action)
                .with_namespace(&config.telemetry_namespace)
                .with_retry(config.telemetry_max_retries, config.telemetry_retry_backoff_ms),
        )
    }

    /// Creates a client for `base_url` with the default SOAP action
    /// (`<base_url>/circuitStatus`), namespace and no retries.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`FetchError::InvalidEndpoint`] if `base_url` is not a valid URL.
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("circrep/0.1 (circuit-reports)")
            .build()?;

        let trimmed = base_url.trim_end_matches('/');
        let endpoint = Url::parse(trimmed).map_err(|e| FetchError::InvalidEndpoint {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            endpoint,
            soap_action: format!("{trimmed}/circuitStatus"),
            namespace: DEFAULT_NAMESPACE.to_owned(),
            max_retries: 0,
            retry_backoff_ms: 500,
        })
    }

    #[must_use]
    pub fn with_soap_action(mut self, soap_action: &str) -> Self {
        soap_action.clone_into(&mut self.soap_action);
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        namespace.clone_into(&mut self.namespace);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff_ms;
        self
    }

    /// Fetches the hourly records for one circuit.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Http`] on network failure or non-2xx status.
    /// - [`FetchError::MissingEnvelope`] / [`FetchError::MissingReturn`] when
    ///   the response is not the expected SOAP shape.
    /// - [`FetchError::Xml`] / [`FetchError::Deserialize`] when the envelope or
    ///   the embedded JSON is malformed.
    pub async fn circuit_status(
        &self,
        node_id: &str,
        interface_id: &str,
    ) -> Result<Vec<TelemetryRecord>, FetchError> {
        let envelope = build_envelope(&self.namespace, node_id, interface_id);
        let body = retry_with_backoff(self.max_retries, self.retry_backoff_ms, || {
            self.post(envelope.clone())
        })
        .await?;

        let records = parse_response(&body)?;
        tracing::debug!(
            node_id,
            interface_id,
            records = records.len(),
            "fetched circuit telemetry"
        );
        Ok(records)
    }

    async fn post(&self, envelope: String) -> Result<String, FetchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("SOAPAction", self.soap_action.as_str())
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(envelope)
            .send()
            .await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }
}

impl TelemetryFetcher for SoapTelemetryClient {
    async fn fetch(
        &self,
        node_id: &str,
        interface_id: &str,
    ) -> Result<Vec<TelemetryRecord>, FetchError> {
        self.circuit_status(node_id, interface_id).await
    }
}

fn build_envelope(namespace: &str, node_id: &str, interface_id: &str) -> String {
    use quick_xml::escape::escape;

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"
               xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
               xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <soap:Body>
    <circuitStatus xmlns="{}">
      <nodID>{}</nodID>
      <itfID>{}</itfID>
    </circuitStatus>
  </soap:Body>
</soap:Envelope>"#,
        escape(namespace),
        escape(node_id),
        escape(interface_id),
    )
}

/// Extracts the records carried by a `circuitStatus` response body.
pub(crate) fn parse_response(body: &str) -> Result<Vec<TelemetryRecord>, FetchError> {
    let envelope = ENVELOPE_RE
        .find(body)
        .ok_or(FetchError::MissingEnvelope)?
        .as_str();

    let text = return_text(envelope)?.ok_or(FetchError::MissingReturn)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(FetchError::MissingReturn);
    }

    let payload = decode_payload(text)?;
    Ok(TelemetryRecord::from_payload(&payload))
}

/// Parses the `return` text as JSON, undoing the extra encoding layers some
/// deployments add on top of the XML escaping: a second level of entities,
/// backslash-escaped quotes and `\uXXXX` sequences, or both.
///
/// The first error is reported when no decoding parses.
fn decode_payload(text: &str) -> Result<serde_json::Value, FetchError> {
    let first_err = match serde_json::from_str(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let entities = unescape_entities(text);
    let candidates = [
        entities.as_deref().and_then(unescape_backslashes),
        entities,
        unescape_backslashes(text),
    ];
    for candidate in candidates.iter().flatten() {
        if let Ok(value) = serde_json::from_str(candidate) {
            return Ok(value);
        }
    }

    Err(FetchError::Deserialize {
        context: "circuitStatus return".to_owned(),
        source: first_err,
    })
}

/// Second level of XML/HTML entity encoding. `None` when there is nothing to
/// undo or the text does not unescape cleanly.
fn unescape_entities(text: &str) -> Option<String> {
    if !text.contains('&') {
        return None;
    }
    quick_xml::escape::unescape(text)
        .ok()
        .map(std::borrow::Cow::into_owned)
}

/// Decodes backslash escapes (`\"`, `\\`, `\n`, `\uXXXX`) by reading the text
/// as the body of a JSON string literal. `None` when there is nothing to
/// undo or the escapes are malformed.
fn unescape_backslashes(text: &str) -> Option<String> {
    if !text.contains('\\') {
        return None;
    }
    let literal = text
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    serde_json::from_str::<String>(&format!("\"{literal}\"")).ok()
}

/// Text content of the first `return` element, namespace prefix ignored.
fn return_text(xml: &str) -> Result<Option<String>, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut inside = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"return" => inside = true,
            Event::Empty(e) if e.local_name().as_ref() == b"return" => {
                return Ok(Some(String::new()));
            }
            Event::End(e) if inside && e.local_name().as_ref() == b"return" => {
                return Ok(Some(text));
            }
            Event::Text(e) if inside => text.push_str(&e.unescape()?),
            Event::CData(e) if inside => text.push_str(&String::from_utf8_lossy(e.as_ref())),
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
