//! Per-call configuration.

use crate::body::FormDataInput;
use crate::error::HookError;
use crate::hooks::{Hooks, OnRequestContext, OnResponseContext};
use crate::logger::{LogOptions, Logger};
use crate::retry::RetryPolicy;
use crate::transport::{ResponseMeta, Transport};
use crate::url_builder::JsonParam;
use crate::validation::Schema;
use crate::{Result, TypedError, error::RequestHeaders};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Extracts an error message from a (validated) error response body.
pub type MessageExtractor = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Configuration of one logical call.
///
/// Options are read-only once the call starts; retries reuse the same value.
///
/// # Examples
///
/// ```
/// use typed_fetch::{FetchOptions, RetryPolicy};
/// use http::Method;
/// use std::time::Duration;
///
/// let options = FetchOptions::new()
///     .method(Method::POST)
///     .host("https://api.example.com")
///     .payload(&serde_json::json!({ "name": "Alice" }))
///     .path_param("dryRun", true)
///     .header("Authorization", "Bearer token")
///     .timeout(Duration::from_secs(5))
///     .retry(RetryPolicy::new(3).delay_ms(100));
/// ```
#[derive(Clone)]
pub struct FetchOptions {
    pub(crate) method: Method,
    pub(crate) host: Option<String>,
    pub(crate) payload: Option<std::result::Result<Value, String>>,
    pub(crate) path_params: Vec<(String, Option<Value>)>,
    pub(crate) json_path_params: Vec<(String, JsonParam)>,
    pub(crate) headers: Vec<(String, Option<String>)>,
    pub(crate) form_data: Option<FormDataInput>,
    pub(crate) disable_path_validation: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) signal: Option<CancellationToken>,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) logger: Option<Arc<dyn Logger>>,
    pub(crate) log_options: LogOptions,
    pub(crate) hooks: Hooks,
    pub(crate) response_schema: Option<Arc<dyn Schema>>,
    pub(crate) error_response_schema: Option<Arc<dyn Schema>>,
    pub(crate) message_from_request_error: Option<MessageExtractor>,
}

impl FetchOptions {
    /// Creates options for a `GET` call with nothing else configured.
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            host: None,
            payload: None,
            path_params: Vec::new(),
            json_path_params: Vec::new(),
            headers: Vec::new(),
            form_data: None,
            disable_path_validation: false,
            timeout: None,
            signal: None,
            retry: None,
            transport: None,
            logger: None,
            log_options: LogOptions::default(),
            hooks: Hooks::default(),
            response_schema: None,
            error_response_schema: None,
            message_from_request_error: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Base URL that relative paths are resolved against.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets a JSON body. A serialization failure fails the call with `invalid_options`.
    pub fn payload<T: Serialize + ?Sized>(mut self, payload: &T) -> Self {
        self.payload = Some(serde_json::to_value(payload).map_err(|e| e.to_string()));
        self
    }

    /// Adds a query parameter.
    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path_params.push((key.into(), Some(value.into())));
        self
    }

    /// Adds a query parameter that may be absent; `None` is skipped.
    pub fn optional_path_param(mut self, key: impl Into<String>, value: Option<Value>) -> Self {
        self.path_params.push((key.into(), value));
        self
    }

    /// Adds a query parameter whose value is the JSON encoding of `value`.
    pub fn json_path_param<T: Serialize + ?Sized>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Self {
        self.optional_json_path_param(key, Some(value))
    }

    /// Adds a JSON-encoded query parameter that may be absent; `None` is skipped.
    pub fn optional_json_path_param<T: Serialize + ?Sized>(
        mut self,
        key: impl Into<String>,
        value: Option<&T>,
    ) -> Self {
        let json = value
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| e.to_string());
        self.json_path_params.push((key.into(), json));
        self
    }

    /// Sets a header, replacing any previous value of the same name.
    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name.into(), Some(value.into()))
    }

    /// Marks a header as omitted, removing any previous value of the same name.
    pub fn omit_header(self, name: impl Into<String>) -> Self {
        self.set_header(name.into(), None)
    }

    fn set_header(mut self, name: String, value: Option<String>) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value));
        self
    }

    /// Sets a multipart body.
    pub fn form_data(mut self, form: impl Into<FormDataInput>) -> Self {
        self.form_data = Some(form.into());
        self
    }

    /// Skips the leading/trailing/double slash checks on the path.
    pub fn disable_path_validation(mut self) -> Self {
        self.disable_path_validation = true;
        self
    }

    /// Timeout of each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// External cancellation token.
    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.signal = Some(token);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Overrides the default transport for this call.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Overrides the default logger for this call.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn log_options(mut self, log_options: LogOptions) -> Self {
        self.log_options = log_options;
        self
    }

    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(OnRequestContext<'_>) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.on_request = Some(Arc::new(hook));
        self
    }

    pub fn response_is_valid<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResponseMeta) -> std::result::Result<bool, HookError> + Send + Sync + 'static,
    {
        self.hooks.response_is_valid = Some(Arc::new(hook));
        self
    }

    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(OnResponseContext<'_>) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.on_response = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TypedError) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    /// Validates successful response bodies.
    pub fn response_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.response_schema = Some(Arc::new(schema));
        self
    }

    /// Validates error response bodies.
    pub fn error_response_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.error_response_schema = Some(Arc::new(schema));
        self
    }

    /// Derives the `request_error` message from the error body.
    pub fn message_from_request_error<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.message_from_request_error = Some(Arc::new(extract));
        self
    }

    pub fn get_method(&self) -> &Method {
        &self.method
    }

    pub fn get_host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Builds the explicit request headers, dropping omitted ones.
    pub(crate) fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let Some(value) = value else { continue };
            let header_name = HeaderName::try_from(name.as_str()).map_err(|e| {
                TypedError::invalid_options(format!("Invalid header name '{name}': {e}"))
            })?;
            let header_value = HeaderValue::try_from(value.as_str()).map_err(|e| {
                TypedError::invalid_options(format!("Invalid value for header '{name}': {e}"))
            })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }

    pub(crate) fn echoed_headers(&self) -> RequestHeaders {
        RequestHeaders::new(
            self.headers
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value.clone()?)))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    pub(crate) fn echoed_payload(&self) -> Option<Value> {
        self.payload.as_ref()?.as_ref().ok().cloned()
    }

    pub(crate) fn echoed_path_params(&self) -> Option<Value> {
        if self.path_params.is_empty() {
            return None;
        }
        let params = self
            .path_params
            .iter()
            .filter_map(|(key, value)| Some((key.clone(), value.clone()?)))
            .collect();
        Some(Value::Object(params))
    }

    pub(crate) fn echoed_json_path_params(&self) -> Option<Value> {
        if self.json_path_params.is_empty() {
            return None;
        }
        let params = self
            .json_path_params
            .iter()
            .filter_map(|(key, json)| {
                let json = json.as_ref().ok()?.as_ref()?;
                let value = serde_json::from_str(json).unwrap_or(Value::Null);
                Some((key.clone(), value))
            })
            .collect();
        Some(Value::Object(params))
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("method", &self.method)
            .field("host", &self.host)
            .field("payload", &self.payload)
            .field("path_params", &self.path_params)
            .field("json_path_params", &self.json_path_params)
            .field("headers", &self.echoed_headers().masked())
            .field("form_data", &self.form_data)
            .field("disable_path_validation", &self.disable_path_validation)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("hooks", &self.hooks)
            .field("response_schema", &self.response_schema.is_some())
            .field("error_response_schema", &self.error_response_schema.is_some())
            .finish_non_exhaustive()
    }
}
