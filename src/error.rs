use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::models::ResourceKind;

/// A field failed client-side checks; the request was never sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A non-2xx answer from the gateway.
///
/// `detail` is whatever human-readable text could be pulled out of the
/// response body; callers pick a fallback when there is none.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct RemoteError {
    pub status: u16,
    pub detail: Option<String>,
}

impl RemoteError {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
        }
    }

    /// Build from a JSON error body shaped `{"detail": ...}`.
    ///
    /// An array of field errors yields the first entry's `msg` (or a generic
    /// "Validation error" when that entry has none); a string detail is used
    /// as is; anything else leaves `detail` empty.
    pub fn from_body(status: u16, body: &Value) -> Self {
        let detail = match body.get("detail") {
            Some(Value::Array(entries)) => Some(
                entries
                    .first()
                    .and_then(|entry| entry.get("msg"))
                    .and_then(Value::as_str)
                    .filter(|msg| !msg.is_empty())
                    .unwrap_or("Validation error")
                    .to_string(),
            ),
            Some(Value::String(detail)) if !detail.is_empty() => Some(detail.clone()),
            _ => None,
        };
        Self { status, detail }
    }

    pub fn message(&self, fallback: &str) -> String {
        self.detail.clone().unwrap_or_else(|| fallback.to_string())
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} (status {})", detail, self.status),
            None => write!(f, "request failed with status {}", self.status),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid {}", .0)]
    Validation(#[from] ValidationError),
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("{} #{} not found", .kind.title(), .id)]
    NotFound { kind: ResourceKind, id: i64 },
}

impl SyncError {
    pub fn not_found(kind: ResourceKind, id: i64) -> Self {
        SyncError::NotFound { kind, id }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
