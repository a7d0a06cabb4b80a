//! JSON bodies exchanged with the inference backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classification::domain::classification_result::ClassificationResult;
use crate::detection::domain::detection_box::DetectionBox;
use crate::transport::transport_error::TransportError;

/// Request body of `/detect` and `/classify`.
#[derive(Serialize)]
pub struct ImagePayload<'a> {
    pub image: &'a str,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    boxes: Vec<DetectionBox>,
}

#[derive(Deserialize)]
struct ClassesResponse {
    classes: Vec<String>,
}

/// `{"boxes": [...]}`; a missing `boxes` field is an empty list.
pub fn parse_detect_response(url: &str, body: &str) -> Result<Vec<DetectionBox>, TransportError> {
    let response: DetectResponse = decode(url, body)?;
    Ok(response.boxes)
}

pub fn parse_classify_response(
    url: &str,
    body: &str,
) -> Result<ClassificationResult, TransportError> {
    decode(url, body)
}

pub fn parse_classes_response(url: &str, body: &str) -> Result<Vec<String>, TransportError> {
    let response: ClassesResponse = decode(url, body)?;
    Ok(response.classes)
}

/// Parses `body`, first turning the backend's `{"success": false,
/// "message": ...}` failure shape into `TransportError::Server`.
fn decode<T: serde::de::DeserializeOwned>(url: &str, body: &str) -> Result<T, TransportError> {
    let value: Value = serde_json::from_str(body).map_err(|e| TransportError::Decode {
        url: url.to_string(),
        source: e,
    })?;

    if let Some(message) = server_failure(&value) {
        return Err(TransportError::Server { message });
    }

    serde_json::from_value(value).map_err(|e| TransportError::Decode {
        url: url.to_string(),
        source: e,
    })
}

fn server_failure(value: &Value) -> Option<String> {
    // Some backends wrap the failure in a one-element array.
    let object = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    if object.get("success")?.as_bool()? {
        return None;
    }
    let message = object
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Some(message.to_string())
}
