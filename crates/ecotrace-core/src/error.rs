//! Error types module
//!
//! Every failure the intake workflow can surface is a typed error here. HTTP
//! failures share one shape, [`ApiError`], so callers never dig through
//! response bodies themselves. The workflow-level errors ([`ScanError`],
//! [`ResolveError`], [`SubmitError`]) all implement [`UserFacing`], which is
//! what the controller renders as a dismissible message.

use std::fmt;

use serde::Serialize;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a busy camera
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// How an error should be presented to the person operating the client.
pub trait UserFacing {
    /// Message shown in the inline, dismissible notice.
    fn user_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Broad classification of a failed API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// 400 / 422
    Validation,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// Any 5xx
    Server,
    /// The request never produced a response (DNS, connect, timeout).
    Network,
    /// A 2xx response whose body did not match the expected shape.
    InvalidResponse,
}

impl ApiErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ApiErrorKind::Validation,
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::Forbidden,
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::Conflict,
            500..=599 => ApiErrorKind::Server,
            _ => ApiErrorKind::Validation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorKind::Validation => "validation",
            ApiErrorKind::Unauthorized => "unauthorized",
            ApiErrorKind::Forbidden => "forbidden",
            ApiErrorKind::NotFound => "not_found",
            ApiErrorKind::Conflict => "conflict",
            ApiErrorKind::Server => "server",
            ApiErrorKind::Network => "network",
            ApiErrorKind::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call to the remote API.
///
/// `detail` carries the server-provided `detail` message when the response
/// body had one; it is what gets shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("API request failed ({kind}{}): {}", status_suffix(.status), .detail.as_deref().unwrap_or("no detail"))]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
    pub detail: Option<String>,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(", status {}", s)).unwrap_or_default()
}

impl ApiError {
    /// Build from an HTTP status and the raw response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self {
            kind: ApiErrorKind::from_status(status),
            status: Some(status),
            detail: extract_detail(body),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            status: None,
            detail: Some(message.into()),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::InvalidResponse,
            status: None,
            detail: Some(message.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }

    /// Server detail if present, otherwise `fallback`.
    pub fn detail_or(&self, fallback: &str) -> String {
        match self.kind {
            // Transport-level messages are not server details.
            ApiErrorKind::Network | ApiErrorKind::InvalidResponse => fallback.to_string(),
            _ => self
                .detail
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        }
    }
}

/// Pull the `detail` field out of an error body.
///
/// The API answers with `{"detail": "..."}` for handled errors and with
/// `{"detail": [{"msg": "...", ...}]}` for request validation failures.
/// Non-JSON bodies yield `None`.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .map(str::to_string)
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Camera / stream acquisition failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    /// Permission denied, hardware busy, or the capture device is missing.
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The stream was running but a frame could not be read.
    #[error("Frame capture failed: {0}")]
    FrameCapture(String),
}

impl UserFacing for ScanError {
    fn user_message(&self) -> String {
        match self {
            ScanError::DeviceUnavailable(_) => "Camera failed to start".to_string(),
            ScanError::FrameCapture(_) => "Camera stopped unexpectedly".to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

/// Failure to turn a batch id into a [`crate::models::ResolvedBatch`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("Batch not found: {}", .detail.as_deref().unwrap_or("no detail"))]
    BatchNotFound { detail: Option<String> },

    #[error("Batch service unavailable: {}", .detail.as_deref().unwrap_or("no detail"))]
    ServiceUnavailable { detail: Option<String> },
}

impl From<ApiError> for ResolveError {
    fn from(err: ApiError) -> Self {
        let detail = match err.kind {
            ApiErrorKind::Network | ApiErrorKind::InvalidResponse => None,
            _ => err.detail,
        };
        if err.kind == ApiErrorKind::NotFound {
            ResolveError::BatchNotFound { detail }
        } else {
            ResolveError::ServiceUnavailable { detail }
        }
    }
}

impl UserFacing for ResolveError {
    fn user_message(&self) -> String {
        let detail = match self {
            ResolveError::BatchNotFound { detail } | ResolveError::ServiceUnavailable { detail } => {
                detail
            }
        };
        detail
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "Unable to load batch".to_string())
    }

    fn log_level(&self) -> LogLevel {
        match self {
            ResolveError::BatchNotFound { .. } => LogLevel::Debug,
            ResolveError::ServiceUnavailable { .. } => LogLevel::Warn,
        }
    }
}

/// Failure to create a transport record. Client-side checks come first; the
/// server's verdict is [`SubmitError::Rejected`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error("No batch has been resolved yet")]
    NoBatchResolved,

    #[error("No origin available for this batch")]
    NoOriginSelected,

    #[error("Origin '{0}' is not available for this batch")]
    UnknownOrigin(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Distance must be a non-negative number, got '{0}'")]
    InvalidDistance(String),

    #[error("Invalid transport: {0}")]
    Invalid(String),

    #[error("Transport rejected: {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected { detail: Option<String> },
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        let detail = match err.kind {
            ApiErrorKind::Network | ApiErrorKind::InvalidResponse => None,
            _ => err.detail,
        };
        SubmitError::Rejected { detail }
    }
}

impl From<validator::ValidationErrors> for SubmitError {
    fn from(err: validator::ValidationErrors) -> Self {
        SubmitError::Invalid(err.to_string())
    }
}

impl UserFacing for SubmitError {
    fn user_message(&self) -> String {
        match self {
            SubmitError::Rejected { detail } => detail
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "Failed to create transport".to_string()),
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            SubmitError::Rejected { .. } => LogLevel::Warn,
            _ => LogLevel::Debug,
        }
    }
}

/// The signed-in role may not open the requested route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Access denied, redirect to {redirect}")]
pub struct AccessDenied {
    pub redirect: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail":"Batch not found"}"#),
            Some("Batch not found".to_string())
        );
    }

    #[test]
    fn extract_detail_validation_list() {
        let body = r#"{"detail":[{"loc":["body","distance_km"],"msg":"value is not a valid float"},{"msg":"field required"}]}"#;
        assert_eq!(
            extract_detail(body),
            Some("value is not a valid float; field required".to_string())
        );
    }

    #[test]
    fn extract_detail_missing_or_not_json() {
        assert_eq!(extract_detail("<html>502</html>"), None);
        assert_eq!(extract_detail(r#"{"error":"x"}"#), None);
        assert_eq!(extract_detail(r#"{"detail":null}"#), None);
    }

    #[test]
    fn status_maps_to_kind() {
        assert_eq!(ApiErrorKind::from_status(404), ApiErrorKind::NotFound);
        assert_eq!(ApiErrorKind::from_status(422), ApiErrorKind::Validation);
        assert_eq!(ApiErrorKind::from_status(503), ApiErrorKind::Server);
        assert_eq!(ApiErrorKind::from_status(401), ApiErrorKind::Unauthorized);
    }

    #[test]
    fn resolve_error_from_api_error() {
        let not_found = ApiError::from_response(404, r#"{"detail":"Batch 5 not found"}"#);
        let err = ResolveError::from(not_found);
        assert_eq!(
            err,
            ResolveError::BatchNotFound {
                detail: Some("Batch 5 not found".to_string())
            }
        );
        assert_eq!(err.user_message(), "Batch 5 not found");

        let down = ResolveError::from(ApiError::network("connection refused"));
        assert_eq!(down, ResolveError::ServiceUnavailable { detail: None });
        assert_eq!(down.user_message(), "Unable to load batch");
    }

    #[test]
    fn submit_error_messages() {
        let rejected = SubmitError::from(ApiError::from_response(
            400,
            r#"{"detail":"Origin mismatch"}"#,
        ));
        assert_eq!(rejected.user_message(), "Origin mismatch");

        let generic = SubmitError::from(ApiError::from_response(500, "oops"));
        assert_eq!(generic.user_message(), "Failed to create transport");

        assert_eq!(
            SubmitError::MissingField("Destination").user_message(),
            "Destination is required"
        );
    }

    #[test]
    fn detail_or_ignores_transport_messages() {
        let err = ApiError::network("dns failure");
        assert_eq!(err.detail_or("Login failed"), "Login failed");
        let err = ApiError::from_response(401, r#"{"detail":"Invalid credentials"}"#);
        assert_eq!(err.detail_or("Login failed"), "Invalid credentials");
    }

    #[test]
    fn scan_error_message() {
        let err = ScanError::DeviceUnavailable("permission denied".to_string());
        assert_eq!(err.user_message(), "Camera failed to start");
        assert_eq!(err.log_level(), LogLevel::Warn);
    }
}
