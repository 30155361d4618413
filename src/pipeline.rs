//! The request pipeline: one logical call, possibly spanning several attempts.
//!
//! Each attempt resolves the URL, validates the options, encodes the body, runs the
//! hooks around the transport and decodes the response. Every failure goes through
//! [`Pipeline::finalize`] before the retry decision.

use crate::body;
use crate::config;
use crate::hooks::{log_observer_failure, OnRequestContext, OnResponseContext};
use crate::logger::{next_log_id, LogHandle, Logger};
use crate::retry::{RetryContext, RetryState};
use crate::signal;
use crate::transport::{Transport, TransportError, TransportFault, TransportOptions};
use crate::url_builder::{
    apply_json_path_params, apply_path_params, resolve_url, validate_path_shape, PathOrUrl,
};
use crate::validation::{deserialize_typed, validate};
use crate::{ErrorKind, FetchOptions, Result, TypedError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use url::Url;

/// How the response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseMode {
    Json,
    Text,
}

/// A successfully decoded body.
enum Decoded {
    Json(Value),
    Text(String),
}

impl Decoded {
    fn into_value(self) -> Value {
        match self {
            Decoded::Json(value) => value,
            Decoded::Text(text) => Value::String(text),
        }
    }

    fn into_text(self) -> String {
        match self {
            Decoded::Json(value) => value.to_string(),
            Decoded::Text(text) => text,
        }
    }
}

/// Performs a call and decodes the response body as JSON.
///
/// Without a response schema the parsed JSON is returned as-is; with one, the
/// validated (possibly transformed) value is returned.
///
/// # Examples
///
/// ```no_run
/// use typed_fetch::{typed_fetch, FetchOptions, RetryPolicy};
///
/// # async fn example() -> Result<(), typed_fetch::TypedError> {
/// let options = FetchOptions::new()
///     .host("https://jsonplaceholder.typicode.com")
///     .path_param("userId", 1)
///     .retry(RetryPolicy::new(3).delay_ms(100));
///
/// let posts = typed_fetch("posts", &options).await?;
/// println!("{} posts", posts.as_array().map_or(0, Vec::len));
/// # Ok(())
/// # }
/// ```
pub async fn typed_fetch(target: impl Into<PathOrUrl>, options: &FetchOptions) -> Result<Value> {
    Pipeline::new(target.into(), options, ResponseMode::Json)
        .run(|decoded| Ok(decoded.into_value()))
        .await
}

/// Performs a call and returns the raw response text.
///
/// Statuses outside `[200, 300)` fail with `request_error`. Response schemas require
/// JSON decoding, so configuring one fails the call with `invalid_options`.
pub async fn typed_fetch_text(
    target: impl Into<PathOrUrl>,
    options: &FetchOptions,
) -> Result<String> {
    Pipeline::new(target.into(), options, ResponseMode::Text)
        .run(|decoded| Ok(decoded.into_text()))
        .await
}

/// Performs a JSON call and deserializes the result into `T`.
///
/// The conversion runs after any configured response schema, as part of the attempt:
/// a value that does not fit `T` fails with `response_validation_error` and goes
/// through the retry policy and the `on_error` hook like any other failure.
///
/// # Examples
///
/// ```no_run
/// use serde::{Deserialize, Serialize};
/// use typed_fetch::{typed_fetch_as, FetchOptions};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), typed_fetch::TypedError> {
/// let options = FetchOptions::new().host("https://api.example.com");
/// let user: User = typed_fetch_as("users/1", &options).await?;
/// println!("User: {}", user.name);
/// # Ok(())
/// # }
/// ```
pub async fn typed_fetch_as<T>(target: impl Into<PathOrUrl>, options: &FetchOptions) -> Result<T>
where
    T: DeserializeOwned,
{
    Pipeline::new(target.into(), options, ResponseMode::Json)
        .run(|decoded| {
            let value = decoded.into_value();
            match deserialize_typed(&value) {
                Ok(typed) => Ok(typed),
                Err(issues) => Err(TypedError::from_issues(issues).with_response(value)),
            }
        })
        .await
}

struct Pipeline<'a> {
    target: PathOrUrl,
    options: &'a FetchOptions,
    mode: ResponseMode,
    transport: Arc<dyn Transport>,
    logger: Option<Arc<dyn Logger>>,
    started: Instant,
}

impl<'a> Pipeline<'a> {
    fn new(target: PathOrUrl, options: &'a FetchOptions, mode: ResponseMode) -> Self {
        let defaults = config::defaults();
        Self {
            target,
            options,
            mode,
            transport: options
                .transport
                .clone()
                .unwrap_or_else(|| defaults.transport.clone()),
            logger: options.logger.clone().or_else(|| defaults.logger.clone()),
            started: Instant::now(),
        }
    }

    /// Runs attempts until one succeeds or the retry policy gives up.
    ///
    /// `convert` turns the decoded body into the caller's value; its failures fail
    /// the attempt.
    async fn run<R>(&self, convert: impl Fn(Decoded) -> Result<R>) -> Result<R> {
        let max_retries = self.options.retry.as_ref().map_or(0, |r| r.max_retries);
        let mut state = RetryState::new(max_retries);

        loop {
            let error = match self.run_attempt(state, &convert).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let Some(policy) = &self.options.retry else {
                return Err(self.fail(error));
            };

            let ctx = RetryContext::new(&error, state.next_retry_attempt(), self.started);
            if !policy.should_retry(&ctx, state.remaining) {
                return Err(self.fail(error));
            }

            let delay = policy.delay.delay_for_attempt(ctx.retry_attempt);
            tracing::info!(
                kind = %error.kind,
                status = error.status,
                retry_attempt = ctx.retry_attempt,
                max_retries = state.original_max_retries,
                delay_ms = delay.as_millis() as u64,
                "Retrying request after delay"
            );
            tokio::time::sleep(delay).await;

            if let Some(on_retry) = &policy.on_retry {
                log_observer_failure("on_retry", on_retry(&ctx));
            }
            state = state.next();
        }
    }

    /// Hands the final error to the `on_error` hook.
    fn fail(&self, error: TypedError) -> TypedError {
        if let Some(on_error) = &self.options.hooks.on_error {
            log_observer_failure("on_error", on_error(&error));
        }
        error
    }

    async fn run_attempt<R>(
        &self,
        state: RetryState,
        convert: &impl Fn(Decoded) -> Result<R>,
    ) -> Result<R> {
        let mut url = match resolve_url(&self.target, self.options.host.as_deref()) {
            Ok(url) => url,
            Err(error) => return Err(self.finalize(error, state, None, None)),
        };

        let log = self.logger.as_ref().map(|logger| {
            logger.start(
                next_log_id(),
                &url,
                &self.options.method,
                SystemTime::now(),
                &self.options.log_options,
            )
        });

        tracing::debug!(
            method = %self.options.method,
            url = %url,
            attempt = state.attempt,
            "Executing HTTP request"
        );

        let result = self
            .execute(&mut url, state)
            .await
            .and_then(|(status, decoded)| convert(decoded).map_err(|e| e.with_status(status)));

        match result {
            Ok(value) => {
                if let Some(log) = log {
                    log.success();
                }
                Ok(value)
            }
            Err(error) => Err(self.finalize(error, state, Some(&url), log)),
        }
    }

    /// Attaches the request context to `error` and completes the attempt's log entry.
    fn finalize(
        &self,
        mut error: TypedError,
        state: RetryState,
        url: Option<&Url>,
        log: Option<Box<dyn LogHandle>>,
    ) -> TypedError {
        let options = self.options;
        error.url = Some(url.map_or_else(|| self.target.as_str().to_string(), Url::to_string));
        error.method = Some(options.method.clone());
        error.payload = options.echoed_payload();
        error.path_params = options.echoed_path_params();
        error.json_path_params = options.echoed_json_path_params();
        error.form_data = options.form_data.as_ref().map(body::FormDataInput::echo);
        error.headers = options.echoed_headers();
        error.retry_attempt = state.error_attempt();

        tracing::warn!(
            kind = %error.kind,
            status = error.status,
            attempt = state.attempt,
            method = %options.method,
            url = error.url.as_deref().unwrap_or_default(),
            error = %error,
            "Request failed"
        );

        if let Some(log) = log {
            log.error(&error.log_status());
        }
        error
    }

    async fn execute(&self, url: &mut Url, state: RetryState) -> Result<(u16, Decoded)> {
        let options = self.options;

        if !options.disable_path_validation {
            validate_path_shape(&self.target, url)?;
        }
        body::check_body_source(
            &options.method,
            options.payload.is_some(),
            options.form_data.is_some(),
        )?;
        if self.mode == ResponseMode::Text
            && (options.error_response_schema.is_some() || options.response_schema.is_some())
        {
            return Err(TypedError::invalid_options(
                "Response schemas cannot be used with raw text responses",
            ));
        }

        apply_path_params(url, &options.path_params);
        apply_json_path_params(url, &options.json_path_params)?;

        let mut headers = options.header_map()?;
        let body = body::encode(
            options.payload.as_ref(),
            options.form_data.as_ref(),
            &mut headers,
        )?;

        let (signal, _signal_guard) = match signal::compose(options.signal.as_ref(), options.timeout)
        {
            Some((signal, guard)) => (Some(signal), Some(guard)),
            None => (None, None),
        };

        let mut transport_options = TransportOptions {
            method: options.method.clone(),
            headers,
            body,
            signal,
        };

        if let Some(on_request) = &options.hooks.on_request {
            on_request(OnRequestContext {
                url: &*url,
                transport_options: &mut transport_options,
                options,
                retry_attempt: state.attempt,
            })
            .map_err(|e| {
                TypedError::new(ErrorKind::OnRequestError, format!("on_request hook failed: {e}"))
                    .with_cause(e)
            })?;
        }

        let mut response = self
            .transport
            .send(url.clone(), transport_options.clone())
            .await
            .map_err(classify_transport_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            TypedError::new(
                ErrorKind::InvalidJson,
                format!("Failed to read response body: {e}"),
            )
            .with_status(status)
            .with_cause(e)
        })?;

        if let Some(is_valid) = &options.hooks.response_is_valid {
            let verdict = is_valid(&response.meta);
            if !matches!(verdict, Ok(true)) {
                let mut error = TypedError::new(ErrorKind::InvalidResponse, "Invalid response")
                    .with_status(status)
                    .with_response(Value::String(text));
                if let Err(e) = verdict {
                    error = error.with_cause(e);
                }
                return Err(error);
            }
        }

        if let Some(on_response) = &options.hooks.on_response {
            let result = on_response(OnResponseContext {
                response: response.instance.as_ref(),
                transport_options: &transport_options,
                options,
                retry_attempt: state.attempt,
            });
            log_observer_failure("on_response", result);
        }

        let status_text = match response.meta.status_text.as_str() {
            "" => format!("Request failed with status {status}"),
            reason => reason.to_string(),
        };

        match self.mode {
            ResponseMode::Text if response.ok() => Ok((status, Decoded::Text(text))),
            ResponseMode::Text => Err(TypedError::new(ErrorKind::RequestError, status_text)
                .with_status(status)
                .with_response(Value::String(text))),
            ResponseMode::Json => self
                .decode_json(status, response.ok(), status_text, text)
                .map(|value| (status, Decoded::Json(value))),
        }
    }

    fn decode_json(&self, status: u16, ok: bool, status_text: String, text: String) -> Result<Value> {
        let options = self.options;

        let parsed: Value = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(
                    TypedError::new(ErrorKind::InvalidJson, format!("Invalid JSON response: {e}"))
                        .with_status(if ok { 400 } else { status })
                        .with_response(Value::String(text))
                        .with_cause(e),
                )
            }
        };

        if !ok {
            let err_response = match &options.error_response_schema {
                Some(schema) => match validate(schema.as_ref(), &parsed) {
                    Ok(value) => Some(value),
                    Err(issues) => {
                        return Err(TypedError::from_issues(issues)
                            .with_status(status)
                            .with_response(parsed))
                    }
                },
                None => None,
            };

            let message = options
                .message_from_request_error
                .as_ref()
                .and_then(|extract| extract(err_response.as_ref().unwrap_or(&parsed)))
                .unwrap_or(status_text);

            let mut error = TypedError::new(ErrorKind::RequestError, message)
                .with_status(status)
                .with_response(parsed);
            error.err_response = err_response;
            return Err(error);
        }

        let Some(schema) = &options.response_schema else {
            return Ok(parsed);
        };

        validate(schema.as_ref(), &parsed).map_err(|issues| {
            let mut error = TypedError::from_issues(issues).with_status(status);
            error.err_response = options
                .error_response_schema
                .as_ref()
                .and_then(|schema| validate(schema.as_ref(), &parsed).ok());
            error.with_response(parsed.clone())
        })
    }
}

fn classify_transport_error(error: TransportError) -> TypedError {
    let kind = match error.fault {
        TransportFault::Timeout => ErrorKind::Timeout,
        TransportFault::Aborted => ErrorKind::Aborted,
        TransportFault::Network => ErrorKind::NetworkOrCorsError,
    };
    TypedError::new(kind, error.source.to_string()).with_cause(error)
}
