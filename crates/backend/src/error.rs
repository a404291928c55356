use geofile::GeofileError;
use link::LinkError;
use mission::SubmitError;
use serde_json::Value;
use telemetry::TelemetryError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("invalid backend url: {0}")]
    Url(String),
    #[error("request failed: {0}")]
    Transport(String),
    /// Non-2xx response; `detail` is the backend's own explanation when it gave one.
    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text suitable for a status line.
    pub fn detail(&self) -> String {
        match self {
            BackendError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Extracts FastAPI's `detail` from an error body.
///
/// `detail` is either a string or a list of validation errors; anything
/// else falls back to the raw body, then to the status reason.
pub fn detail_text(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("detail") {
            Some(Value::String(s)) => return s.clone(),
            Some(Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|i| i.get("msg").and_then(Value::as_str))
                    .collect();
                if !msgs.is_empty() {
                    return msgs.join("; ");
                }
            }
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

impl From<BackendError> for LinkError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Url(m) => LinkError::MalformedAddress(m),
            BackendError::Transport(m) => LinkError::Network(m),
            BackendError::Status { detail, .. } if looks_busy(&detail) => {
                LinkError::DeviceBusy(detail)
            }
            BackendError::Status { detail, .. } => LinkError::Rejected(detail),
            BackendError::Decode(m) => LinkError::Rejected(m),
        }
    }
}

fn looks_busy(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    ["busy", "in use", "permission denied", "access is denied"]
        .iter()
        .any(|needle| lower.contains(needle))
}

impl From<BackendError> for TelemetryError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Url(m) | BackendError::Transport(m) => TelemetryError::Transport(m),
            BackendError::Status { status, detail } => TelemetryError::Backend { status, detail },
            BackendError::Decode(m) => TelemetryError::Decode(m),
        }
    }
}

impl From<BackendError> for SubmitError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Status { detail, .. } => SubmitError::Rejected(detail),
            BackendError::Decode(m) => SubmitError::Rejected(m),
            BackendError::Url(m) | BackendError::Transport(m) => SubmitError::Transport(m),
        }
    }
}

impl From<BackendError> for GeofileError {
    fn from(e: BackendError) -> Self {
        GeofileError::Planner(e.detail())
    }
}
