//! Lifecycle callbacks around each transport invocation.
//!
//! Only two hooks can change the outcome of an attempt: `on_request` fails the attempt
//! by returning an error, and `response_is_valid` rejects a response by returning
//! anything but `Ok(true)`. The others are observers; their errors are logged.

use crate::error::HookError;
use crate::transport::{ResponseMeta, TransportOptions};
use crate::{FetchOptions, TypedError};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Arguments of the `on_request` hook.
pub struct OnRequestContext<'a> {
    pub url: &'a Url,
    /// May be modified, e.g. to add or overwrite headers.
    pub transport_options: &'a mut TransportOptions,
    pub options: &'a FetchOptions,
    /// 0-indexed attempt number.
    pub retry_attempt: u32,
}

/// Arguments of the `on_response` hook.
pub struct OnResponseContext<'a> {
    /// The response head, if the transport exposes one.
    pub response: Option<&'a http::Response<()>>,
    pub transport_options: &'a TransportOptions,
    pub options: &'a FetchOptions,
    /// 0-indexed attempt number.
    pub retry_attempt: u32,
}

pub type OnRequest =
    Arc<dyn Fn(OnRequestContext<'_>) -> Result<(), HookError> + Send + Sync>;
pub type ResponseIsValid = Arc<dyn Fn(&ResponseMeta) -> Result<bool, HookError> + Send + Sync>;
pub type OnResponse =
    Arc<dyn Fn(OnResponseContext<'_>) -> Result<(), HookError> + Send + Sync>;
pub type OnError = Arc<dyn Fn(&TypedError) -> Result<(), HookError> + Send + Sync>;

/// The hook set of one call.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_request: Option<OnRequest>,
    pub response_is_valid: Option<ResponseIsValid>,
    pub on_response: Option<OnResponse>,
    pub on_error: Option<OnError>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_request", &self.on_request.is_some())
            .field("response_is_valid", &self.response_is_valid.is_some())
            .field("on_response", &self.on_response.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Logs the error of an observational callback.
pub(crate) fn log_observer_failure(hook: &'static str, result: Result<(), HookError>) {
    if let Err(e) = result {
        tracing::error!(hook, error = %e, "Hook callback failed");
    }
}
