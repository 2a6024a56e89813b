// Define message types for the runtime: {"s": <steering>, "a": <throttle>}

use serde::Serialize;
use serde_json::error::Category;
use serde_json::{Map, Value};

/// JSON key carrying the steering intent
pub const KEY_STEERING: &str = "s";
/// JSON key carrying the throttle intent
pub const KEY_THROTTLE: &str = "a";

// Command from teleop/remote -> runtime
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SteeringCommand {
    /// Left/right intent, nominally [-1, 1] but unbounded on input
    #[serde(rename = "s")]
    pub steering: f64,
    /// Forward/backward intent, nominally [-1, 1], clamped by the mixer
    #[serde(rename = "a")]
    pub throttle: f64,
}

impl SteeringCommand {
    pub fn new(steering: f64, throttle: f64) -> Self {
        Self { steering, throttle }
    }
}

/// Why an inbound payload could not be turned into a `SteeringCommand`
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    EncodingInvalid(#[from] std::str::Utf8Error),

    #[error("malformed JSON: {0}")]
    SyntaxInvalid(serde_json::Error),

    #[error("invalid field type: {0}")]
    FieldTypeInvalid(String),
}

/// Decode a raw bus payload into a steering command.
///
/// Pure function: no logging, no state. The caller decides what to do with
/// a failure (the runtime logs it and drops the message).
pub fn decode(payload: &[u8]) -> Result<SteeringCommand, DecodeError> {
    let text = std::str::from_utf8(payload)?;

    // A Map target rejects top-level arrays and scalars as a data error
    let fields: Map<String, Value> = serde_json::from_str(text).map_err(|e| match e.classify() {
        Category::Data => DecodeError::FieldTypeInvalid(e.to_string()),
        _ => DecodeError::SyntaxInvalid(e),
    })?;

    Ok(SteeringCommand {
        steering: numeric_field(&fields, KEY_STEERING)?,
        throttle: numeric_field(&fields, KEY_THROTTLE)?,
    })
}

/// Read an optional numeric field; missing or null means 0
fn numeric_field(fields: &Map<String, Value>, key: &str) -> Result<f64, DecodeError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        // Magnitude is not checked here; the mixer clamps
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            DecodeError::FieldTypeInvalid(format!("\"{}\" is not representable as f64", key))
        }),
        Some(other) => Err(DecodeError::FieldTypeInvalid(format!(
            "\"{}\" must be a number, got {}",
            key, other
        ))),
    }
}
