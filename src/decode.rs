// Response decoding.
//
// Every remote function answers with the same envelope,
// `{statusCode, body: {result, data | error: {message}}}`, where the body
// takes a success or a failure shape. The envelope is read once into
// `Envelope`, which keeps the discriminant (status code plus result tag)
// next to whichever payload was present. A call succeeded only when the
// status code is 200 *and* the result tag is `"success"`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Status code the backend uses for a completed call.
pub const STATUS_OK: i64 = 200;

/// Result tag the backend uses for a completed call.
pub const RESULT_SUCCESS: &str = "success";

/// Why a response could not be turned into a success payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The bytes matched neither the success nor the failure shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The backend reported a failure.
    #[error("{message}")]
    Remote { status_code: i64, message: String },
}

impl DecodeError {
    /// Backend-provided (or fallback) message of a remote failure.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            DecodeError::Remote { message, .. } => Some(message),
            DecodeError::Malformed(_) => None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireEnvelope {
    #[serde(rename = "statusCode")]
    status_code: i64,
    body: Value,
}

/// Discriminated view of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub status_code: i64,
    pub result: String,
    pub data: Option<Value>,
    pub error_message: Option<String>,
}

impl Envelope {
    /// Read the envelope from raw response bytes.
    ///
    /// Absent `statusCode` or `result` fields default to `0` and `""`; both
    /// land on the failure path. `body` may be an object or a string holding
    /// an encoded object.
    pub fn parse(raw: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireEnvelope = serde_json::from_slice(raw)
            .map_err(|e| DecodeError::Malformed(format!("envelope: {e}")))?;

        let body = match wire.body {
            Value::String(encoded) => serde_json::from_str(&encoded)
                .map_err(|e| DecodeError::Malformed(format!("encoded body: {e}")))?,
            other => other,
        };

        let mut body = match body {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(DecodeError::Malformed(format!(
                    "body is not an object: {other}"
                )))
            }
        };

        let result = match body.remove("result") {
            Some(Value::String(tag)) => tag,
            _ => String::new(),
        };
        let error_message = body
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        let data = body.remove("data");

        Ok(Envelope {
            status_code: wire.status_code,
            result,
            data,
            error_message,
        })
    }

    /// Whether both halves of the success discriminant hold.
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK && self.result == RESULT_SUCCESS
    }

    /// Resolve into the success payload or the reported failure.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, DecodeError> {
        if !self.is_success() {
            let message = match self.error_message {
                Some(message) if !message.is_empty() => message,
                _ => format!("unexpected status {}", self.status_code),
            };
            return Err(DecodeError::Remote {
                status_code: self.status_code,
                message,
            });
        }

        serde_json::from_value(self.data.unwrap_or(Value::Null))
            .map_err(|e| DecodeError::Malformed(format!("data: {e}")))
    }
}

/// Decode `raw` into the success payload `T`.
///
/// Operations that return no data use [`serde::de::IgnoredAny`] as `T`.
pub fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, DecodeError> {
    Envelope::parse(raw)?.into_result()
}
