//! Raw telemetry records as returned by the circuit-status service.
//!
//! The service is loosely typed: identifiers may arrive as strings or numbers,
//! rates as numbers or numeric strings, and the timestamp either as a
//! `{ "date": "..." }` object or a bare string. [`TelemetryRecord::from_json`]
//! captures every shape without failing; interpretation happens later.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const KEY_CIRCUIT_CODE: &str = "Customer_Curcuit_ID";
const KEY_CIRCUIT_CODE_ALT: &str = "Customer_Circuit_ID";
const KEY_DISPLAY_NAME: &str = "Address";
const KEY_TIMESTAMP: &str = "Timestamp";
const KEY_BANDWIDTH: &str = "Bandwidth";
const KEY_INBOUND: &str = "In_Averagebps";
const KEY_OUTBOUND: &str = "Out_Averagebps";

/// Timestamp field exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawTimestamp {
    /// `{ "date": "2024-01-15 13:00:00.000000", ... }`
    Structured(String),
    /// A bare string such as `"15/01/2024 13"`.
    Text(String),
    #[default]
    Missing,
    /// Any other JSON shape, kept as its JSON text for diagnostics.
    Other(String),
}

/// Inbound or outbound rate exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawRate {
    /// Absent key or JSON `null`.
    #[default]
    Missing,
    Number(f64),
    Text(String),
    /// Booleans, arrays and objects, kept as JSON text.
    Other(String),
}

impl RawRate {
    /// Numeric value when the rate is a finite number or a numeric string.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawRate::Missing => Some(0.0),
            RawRate::Number(n) => Some(*n).filter(|n| n.is_finite()),
            RawRate::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            RawRate::Other(_) => None,
        }
    }

    /// Verbatim rendering used when the value cannot be interpreted as a number.
    #[must_use]
    pub fn verbatim(&self) -> String {
        match self {
            RawRate::Missing => "0".to_string(),
            RawRate::Number(n) => n.to_string(),
            RawRate::Text(s) | RawRate::Other(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub circuit_code: Option<String>,
    pub display_name: Option<String>,
    pub timestamp: RawTimestamp,
    pub bandwidth: Option<String>,
    pub inbound: RawRate,
    pub outbound: RawRate,
}

impl TelemetryRecord {
    /// Extracts a record from one JSON object. Non-object values yield an
    /// empty record rather than an error.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let circuit_code = obj
            .get(KEY_CIRCUIT_CODE)
            .or_else(|| obj.get(KEY_CIRCUIT_CODE_ALT))
            .and_then(text_field);

        Self {
            circuit_code,
            display_name: obj.get(KEY_DISPLAY_NAME).and_then(text_field),
            timestamp: obj.get(KEY_TIMESTAMP).map_or(RawTimestamp::Missing, timestamp_field),
            bandwidth: obj.get(KEY_BANDWIDTH).and_then(text_field),
            inbound: obj.get(KEY_INBOUND).map_or(RawRate::Missing, rate_field),
            outbound: obj.get(KEY_OUTBOUND).map_or(RawRate::Missing, rate_field),
        }
    }

    /// Converts a decoded payload (a single object or an array of objects).
    #[must_use]
    pub fn from_payload(payload: &Value) -> Vec<Self> {
        match payload {
            Value::Array(items) => items.iter().map(Self::from_json).collect(),
            Value::Null => Vec::new(),
            other => vec![Self::from_json(other)],
        }
    }
}

fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn timestamp_field(value: &Value) -> RawTimestamp {
    match value {
        Value::Object(obj) => match obj.get("date") {
            Some(Value::String(s)) => RawTimestamp::Structured(s.clone()),
            _ => RawTimestamp::Other(value.to_string()),
        },
        Value::String(s) => RawTimestamp::Text(s.clone()),
        Value::Null => RawTimestamp::Missing,
        other => RawTimestamp::Other(other.to_string()),
    }
}

fn rate_field(value: &Value) -> RawRate {
    match value {
        Value::Null => RawRate::Missing,
        Value::Number(n) => n
            .as_f64()
            .map_or_else(|| RawRate::Other(n.to_string()), RawRate::Number),
        Value::String(s) => RawRate::Text(s.clone()),
        other => RawRate::Other(other.to_string()),
    }
}
