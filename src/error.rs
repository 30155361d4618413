//! Error types for typed fetch calls.
//!
//! Every failure a call can produce is reported as a [`TypedError`] value carrying a
//! closed [`ErrorKind`] plus the request context needed to debug it: status, URL,
//! method, echoed parameters, masked headers and retry bookkeeping. Nothing is ever
//! thrown past the public entry points.

use crate::validation::{format_issues, Issue};
use http::Method;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Boxed error returned by user callbacks (hooks, retry callbacks, body readers).
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// The closed set of failure kinds.
///
/// # Examples
///
/// ```
/// use typed_fetch::ErrorKind;
///
/// assert_eq!(ErrorKind::NetworkOrCorsError.as_str(), "network_or_cors_error");
/// assert!(ErrorKind::Aborted.is_never_retried());
/// assert!(!ErrorKind::RequestError.is_never_retried());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The call arguments were malformed (bad URL, conflicting body options, ...).
    InvalidOptions,
    /// The cancellation token fired before the transport finished.
    Aborted,
    /// The configured timeout elapsed before the transport finished.
    Timeout,
    /// The transport failed without producing a response.
    NetworkOrCorsError,
    /// The server answered with a status outside `[200, 300)`.
    RequestError,
    /// The body could not be read or is not valid JSON.
    InvalidJson,
    /// A response (or error response) schema rejected the parsed body.
    ResponseValidationError,
    /// The `response_is_valid` hook rejected the response.
    InvalidResponse,
    /// The `on_request` hook returned an error.
    OnRequestError,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidOptions => "invalid_options",
            ErrorKind::Aborted => "aborted",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkOrCorsError => "network_or_cors_error",
            ErrorKind::RequestError => "request_error",
            ErrorKind::InvalidJson => "invalid_json",
            ErrorKind::ResponseValidationError => "response_validation_error",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::OnRequestError => "on_request_error",
        }
    }

    /// Kinds that no retry policy can make eligible for a retry.
    pub fn is_never_retried(&self) -> bool {
        matches!(self, ErrorKind::InvalidOptions | ErrorKind::Aborted)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Masks a header value for display.
///
/// The first `min(4, ceil(len / 2))` characters are kept and the rest replaced by `*`.
///
/// ```
/// use typed_fetch::error::mask_header_value;
///
/// assert_eq!(mask_header_value("Bearer secret-token"), "Bear***************");
/// assert_eq!(mask_header_value("abc"), "ab*");
/// ```
pub fn mask_header_value(value: &str) -> String {
    let len = value.chars().count();
    let keep = len.div_ceil(2).min(4);
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i < keep { c } else { '*' })
        .collect()
}

/// Request headers echoed on an error.
///
/// The raw values are kept as-is; [`masked`](Self::masked) and serialization only ever
/// expose masked values, while [`unmasked`](Self::unmasked) is meant for trusted
/// diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    raw: BTreeMap<String, String>,
}

impl RequestHeaders {
    /// Wraps the given header map.
    pub fn new(raw: BTreeMap<String, String>) -> Self {
        Self { raw }
    }

    /// Header values with secrets masked.
    pub fn masked(&self) -> BTreeMap<String, String> {
        self.raw
            .iter()
            .map(|(k, v)| (k.clone(), mask_header_value(v)))
            .collect()
    }

    /// The original header values.
    pub fn unmasked(&self) -> &BTreeMap<String, String> {
        &self.raw
    }

    /// Returns `true` if no headers were sent.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl Serialize for RequestHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.masked().serialize(serializer)
    }
}

fn serialize_method<S: Serializer>(
    method: &Option<Method>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match method {
        Some(m) => s.serialize_some(m.as_str()),
        None => s.serialize_none(),
    }
}

fn serialize_cause<S: Serializer>(
    cause: &Option<Arc<dyn std::error::Error + Send + Sync>>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match cause {
        Some(c) => s.serialize_some(&c.to_string()),
        None => s.serialize_none(),
    }
}

/// The uniform failure payload of a typed fetch call.
///
/// # Examples
///
/// ```no_run
/// use typed_fetch::{typed_fetch, ErrorKind, FetchOptions};
///
/// # async fn example() {
/// let options = FetchOptions::new().host("https://api.example.com");
///
/// match typed_fetch("users/123", &options).await {
///     Ok(user) => println!("User: {user}"),
///     Err(e) if e.kind == ErrorKind::RequestError => {
///         eprintln!("HTTP {}: {:?}", e.status, e.response);
///     }
///     Err(e) => eprintln!("{} failed: {}", e.kind, e),
/// }
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct TypedError {
    /// What went wrong.
    #[serde(rename = "id")]
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// HTTP status, or `0` when no response was received.
    pub status: u16,
    /// The request URL (resolved when resolution succeeded).
    pub url: Option<String>,
    #[serde(serialize_with = "serialize_method")]
    pub method: Option<Method>,
    pub payload: Option<Value>,
    pub path_params: Option<Value>,
    pub json_path_params: Option<Value>,
    pub form_data: Option<Value>,
    pub headers: RequestHeaders,
    /// The error body after validation against the error response schema.
    pub err_response: Option<Value>,
    /// The parsed (or raw text) response body.
    pub response: Option<Value>,
    pub schema_issues: Option<Vec<Issue>>,
    #[serde(serialize_with = "serialize_cause")]
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    /// 1-indexed attempt that produced this error, `None` on the first attempt.
    pub retry_attempt: Option<u32>,
}

impl TypedError {
    /// Creates an error of the given kind with no request context attached.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: 0,
            url: None,
            method: None,
            payload: None,
            path_params: None,
            json_path_params: None,
            form_data: None,
            headers: RequestHeaders::default(),
            err_response: None,
            response: None,
            schema_issues: None,
            cause: None,
            retry_attempt: None,
        }
    }

    pub(crate) fn invalid_options(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOptions, message)
    }

    /// Builds a `response_validation_error` whose message renders every issue.
    pub(crate) fn from_issues(issues: Vec<Issue>) -> Self {
        let mut err = Self::new(ErrorKind::ResponseValidationError, format_issues(&issues));
        err.schema_issues = Some(issues);
        err
    }

    pub(crate) fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    pub(crate) fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.cause = Some(Arc::from(cause.into()));
        self
    }

    /// Returns `true` if this error carries an HTTP status.
    pub fn has_response_status(&self) -> bool {
        self.status != 0
    }

    /// The status string reported on the attempt-end log line.
    ///
    /// `request_error` reports the numeric status; any other kind reports
    /// `kind(status)` when a status exists, and the bare kind otherwise.
    pub fn log_status(&self) -> String {
        if !self.has_response_status() {
            return self.kind.to_string();
        }
        match self.kind {
            ErrorKind::RequestError => self.status.to_string(),
            kind => format!("{kind}({})", self.status),
        }
    }

    /// The original request headers, unmasked.
    pub fn unmasked_headers(&self) -> &BTreeMap<String, String> {
        self.headers.unmasked()
    }
}

/// A specialized `Result` type for typed fetch calls.
pub type Result<T> = std::result::Result<T, TypedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_at_most_four_chars() {
        assert_eq!(mask_header_value(""), "");
        assert_eq!(mask_header_value("a"), "a");
        assert_eq!(mask_header_value("ab"), "a*");
        assert_eq!(mask_header_value("abcde"), "abc**");
        assert_eq!(mask_header_value("abcdefghij"), "abcd******");
    }

    #[test]
    fn test_mask_counts_chars_not_bytes() {
        assert_eq!(mask_header_value("ééééé"), "ééé**");
    }

    #[test]
    fn test_unmasked_headers_survive_serialization() {
        let mut raw = BTreeMap::new();
        raw.insert("authorization".to_string(), "Bearer abcdef".to_string());
        let mut err = TypedError::new(ErrorKind::RequestError, "Not Found").with_status(404);
        err.headers = RequestHeaders::new(raw);

        for _ in 0..3 {
            let json = serde_json::to_value(&err).unwrap();
            assert_eq!(json["headers"]["authorization"], "Bear*********");
        }
        assert_eq!(err.unmasked_headers()["authorization"], "Bearer abcdef");
    }

    #[test]
    fn test_serialized_shape() {
        let err = TypedError::new(ErrorKind::InvalidJson, "bad json")
            .with_status(400)
            .with_cause(std::io::Error::other("eof"));
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["id"], "invalid_json");
        assert_eq!(json["status"], 400);
        assert_eq!(json["cause"], "eof");
        assert_eq!(json["retryAttempt"], Value::Null);
    }

    #[test]
    fn test_log_status() {
        let err = TypedError::new(ErrorKind::RequestError, "x").with_status(503);
        assert_eq!(err.log_status(), "503");

        let err = TypedError::new(ErrorKind::InvalidJson, "x").with_status(200);
        assert_eq!(err.log_status(), "invalid_json(200)");

        let err = TypedError::new(ErrorKind::Timeout, "x");
        assert!(!err.has_response_status());
        assert_eq!(err.log_status(), "timeout");
    }
}
