use thiserror::Error;

/// Errors returned while fetching one circuit's telemetry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or TLS failure, or a non-2xx HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured endpoint is not a valid URL.
    #[error("invalid telemetry endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// No `<?xml ... </...:Envelope>` block was found in the response body.
    #[error("response does not contain a SOAP envelope")]
    MissingEnvelope,

    /// The envelope has no `return` element, or it is empty.
    #[error("SOAP envelope has no return value")]
    MissingReturn,

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The `return` payload is not valid JSON.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
