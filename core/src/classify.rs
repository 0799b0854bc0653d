//! Status classification and user-facing messages.
//!
//! The executor is the only caller of these constructors; everything above
//! it receives an `ApiError` that has already been classified.

use std::time::Duration;

use serde_json::Value;

use crate::error::{ApiError, ErrorDetails, ErrorKind};
use crate::transport::TransportError;

/// Map an HTTP status to an error kind. First match wins. Only the 5xx
/// range counts as a server error; codes outside the HTTP range are
/// `Unknown`.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::Validation,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Business,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    }
}

pub fn default_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "check the submitted data",
        ErrorKind::NotFound => "the requested resource was not found",
        ErrorKind::Business => "the operation conflicts with a business rule",
        ErrorKind::Unauthorized => "session is invalid or expired",
        ErrorKind::Forbidden => "insufficient permissions for this action",
        ErrorKind::Server => "server error, retry later",
        ErrorKind::Network => "could not connect to the server",
        ErrorKind::Unknown => "an unexpected error occurred",
    }
}

/// Build the error for a non-2xx response. The body may be empty, JSON or
/// arbitrary text.
pub fn from_response(status: u16, body: &[u8]) -> ApiError {
    let kind = classify_status(status);
    let parsed = parse_body(body);

    let (code, refinement) = match &parsed {
        Some(ErrorDetails::Body(value)) => (
            string_field(value, &["code"]),
            string_field(value, &["message", "error", "detail"]),
        ),
        _ => (None, None),
    };

    let message = match refinement {
        Some(text) => format!("{}: {text} (HTTP {status})", default_message(kind)),
        None => format!("{} (HTTP {status})", default_message(kind)),
    };

    let mut err = ApiError::new(kind, message).with_status(status).with_code(code);
    err.details = parsed;
    err
}

pub fn timeout(after: Duration) -> ApiError {
    ApiError::new(
        ErrorKind::Network,
        format!("request timed out after {}s", after.as_secs_f64()),
    )
}

pub fn cancelled() -> ApiError {
    ApiError::new(ErrorKind::Network, "request was cancelled")
}

pub fn from_transport(err: &TransportError) -> ApiError {
    let message = match err {
        TransportError::Connect(_) => default_message(ErrorKind::Network).to_string(),
        TransportError::Other(_) => "request failed before a response was received".to_string(),
    };
    ApiError::new(ErrorKind::Network, message).with_details(ErrorDetails::Transport(err.to_string()))
}

/// A 2xx body that parsed as JSON but not as the type the caller asked for.
pub fn unexpected_body(status: u16, err: &serde_json::Error) -> ApiError {
    let message = format!("{} (unexpected response body)", default_message(ErrorKind::Unknown));
    ApiError::new(ErrorKind::Unknown, message)
        .with_status(status)
        .with_details(ErrorDetails::Transport(err.to_string()))
}

/// A request payload that could not be serialized to JSON.
pub fn serialization(err: &serde_json::Error) -> ApiError {
    let message = format!("{} (request could not be encoded)", default_message(ErrorKind::Unknown));
    ApiError::new(ErrorKind::Unknown, message).with_details(ErrorDetails::Transport(err.to_string()))
}

fn parse_body(body: &[u8]) -> Option<ErrorDetails> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Some(ErrorDetails::Body(value)),
        Err(_) => Some(ErrorDetails::Text(String::from_utf8_lossy(body).into_owned())),
    }
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| value.get(*name))
        .find_map(|v| v.as_str().filter(|s| !s.trim().is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_covers_every_status() {
        let cases = [
            (400, ErrorKind::Validation),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (409, ErrorKind::Business),
            (500, ErrorKind::Server),
            (502, ErrorKind::Server),
            (503, ErrorKind::Server),
            (599, ErrorKind::Server),
            (999, ErrorKind::Unknown),
            (418, ErrorKind::Unknown),
            (302, ErrorKind::Unknown),
        ];
        for (status, kind) in cases {
            assert_eq!(classify_status(status), kind, "status {status}");
        }
    }

    #[test]
    fn message_has_default_and_status() {
        let err = from_response(404, b"");
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.status, Some(404));
        assert_eq!(err.message, "the requested resource was not found (HTTP 404)");
        assert!(err.details.is_none());
    }

    #[test]
    fn server_message_and_code_refine_the_default() {
        let body = br#"{"code":"APPOINTMENT_OVERLAP","message":"groomer already booked"}"#;
        let err = from_response(409, body);
        assert_eq!(err.kind, ErrorKind::Business);
        assert_eq!(err.code.as_deref(), Some("APPOINTMENT_OVERLAP"));
        assert_eq!(
            err.message,
            "the operation conflicts with a business rule: groomer already booked (HTTP 409)"
        );
        assert!(matches!(err.details, Some(ErrorDetails::Body(_))));
    }

    #[test]
    fn error_field_is_used_when_message_is_absent() {
        let err = from_response(400, br#"{"error":"endAt must be after startAt"}"#);
        assert_eq!(
            err.message,
            "check the submitted data: endAt must be after startAt (HTTP 400)"
        );
        assert!(err.code.is_none());
    }

    #[test]
    fn non_json_body_is_kept_as_text() {
        let err = from_response(502, b"<html>Bad Gateway</html>");
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "server error, retry later (HTTP 502)");
        assert_eq!(
            err.details,
            Some(ErrorDetails::Text("<html>Bad Gateway</html>".to_string()))
        );
    }

    #[test]
    fn timeout_and_connect_are_distinguishable() {
        let t = timeout(Duration::from_secs(15));
        let c = from_transport(&TransportError::Connect("connection refused".into()));
        assert_eq!(t.kind, ErrorKind::Network);
        assert_eq!(c.kind, ErrorKind::Network);
        assert!(t.status.is_none() && c.status.is_none());
        assert!(t.message.contains("timed out"));
        assert!(c.message.contains("could not connect"));
        assert_ne!(t.message, c.message);
    }
}
