//! The transport seam: the one place network I/O happens.
//!
//! The pipeline only ever talks to a [`Transport`]. [`ReqwestTransport`] is the
//! default; [`FnTransport`] adapts a closure, which is handy for overrides and tests.

use crate::body::RequestBody;
use crate::error::HookError;
use crate::signal::{AbortReason, AbortSignal};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::future::Future;
use url::Url;

/// Everything the transport needs to perform one request.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub signal: Option<AbortSignal>,
}

/// Response metadata, shared with the validity and response hooks.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    /// The final URL, after redirects.
    pub url: Url,
}

impl ResponseMeta {
    /// Returns `true` for statuses in `[200, 300)`.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }
}

/// A response whose body has not been read yet.
pub struct TransportResponse {
    pub meta: ResponseMeta,
    /// The underlying response head, when the transport exposes one.
    pub instance: Option<http::Response<()>>,
    body: BoxFuture<'static, Result<String, HookError>>,
}

impl TransportResponse {
    /// Creates a response whose body is produced by `body` when read.
    pub fn new<F>(meta: ResponseMeta, body: F) -> Self
    where
        F: Future<Output = Result<String, HookError>> + Send + 'static,
    {
        Self {
            meta,
            instance: None,
            body: body.boxed(),
        }
    }

    /// Creates a response with an already-known body.
    pub fn from_text(meta: ResponseMeta, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(meta, async move { Ok(text) })
    }

    pub fn with_instance(mut self, instance: http::Response<()>) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.meta.status
    }

    pub fn ok(&self) -> bool {
        self.meta.ok()
    }

    /// Reads the body, consuming the body reader.
    pub async fn text(&mut self) -> Result<String, HookError> {
        let body = std::mem::replace(
            &mut self.body,
            async { Err::<String, HookError>("body already read".into()) }.boxed(),
        );
        body.await
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("meta", &self.meta)
            .field("instance", &self.instance.is_some())
            .finish_non_exhaustive()
    }
}

/// How a transport call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    /// The request timed out.
    Timeout,
    /// The request was cancelled.
    Aborted,
    /// Anything else: connection refused, DNS failure, TLS error...
    Network,
}

/// A transport failure with no response.
#[derive(thiserror::Error, Debug)]
#[error("{fault:?}: {source}")]
pub struct TransportError {
    pub fault: TransportFault,
    #[source]
    pub source: HookError,
}

impl TransportError {
    pub fn new(fault: TransportFault, source: impl Into<HookError>) -> Self {
        Self {
            fault,
            source: source.into(),
        }
    }

    pub fn network(source: impl Into<HookError>) -> Self {
        Self::new(TransportFault::Network, source)
    }

    /// The fault matching the reason `signal` fired for.
    pub fn from_signal(signal: &AbortSignal) -> Self {
        match signal.reason() {
            Some(AbortReason::TimedOut) => {
                Self::new(TransportFault::Timeout, "The operation timed out")
            }
            _ => Self::new(TransportFault::Aborted, "The operation was aborted"),
        }
    }
}

/// Performs one HTTP request.
///
/// Implementations must stop promptly and return a fault built with
/// [`TransportError::from_signal`] once `options.signal` fires.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use typed_fetch::transport::{
///     ResponseMeta, Transport, TransportError, TransportOptions, TransportResponse,
/// };
/// use url::Url;
///
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl Transport for AlwaysOk {
///     async fn send(
///         &self,
///         url: Url,
///         _options: TransportOptions,
///     ) -> Result<TransportResponse, TransportError> {
///         let meta = ResponseMeta {
///             status: http::StatusCode::OK,
///             status_text: "OK".into(),
///             headers: http::HeaderMap::new(),
///             url,
///         };
///         Ok(TransportResponse::from_text(meta, "{}"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        url: Url,
        options: TransportOptions,
    ) -> Result<TransportResponse, TransportError>;
}

/// Adapts a closure returning a boxed future into a [`Transport`].
pub struct FnTransport<F>(pub F);

#[async_trait]
impl<F> Transport for FnTransport<F>
where
    F: Fn(Url, TransportOptions) -> BoxFuture<'static, Result<TransportResponse, TransportError>>
        + Send
        + Sync,
{
    async fn send(
        &self,
        url: Url,
        options: TransportOptions,
    ) -> Result<TransportResponse, TransportError> {
        (self.0)(url, options).await
    }
}

/// The default transport, backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an already configured client (proxies, TLS, pool settings...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn execute(
        &self,
        url: Url,
        options: TransportOptions,
    ) -> Result<reqwest::Response, TransportError> {
        let mut request = self
            .client
            .request(options.method, url)
            .headers(options.headers);

        request = match options.body {
            RequestBody::Empty => request,
            RequestBody::Json(json) => request.body(json),
            RequestBody::Multipart(form) => {
                request.multipart(form.into_multipart().map_err(TransportError::network)?)
            }
        };

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::new(TransportFault::Timeout, e)
            } else {
                TransportError::network(e)
            }
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        url: Url,
        options: TransportOptions,
    ) -> Result<TransportResponse, TransportError> {
        let signal = options.signal.clone();

        let response = match &signal {
            Some(signal) => {
                tokio::select! {
                    biased;
                    _ = signal.aborted() => return Err(TransportError::from_signal(signal)),
                    response = self.execute(url, options) => response?,
                }
            }
            None => self.execute(url, options).await?,
        };

        let status = response.status();
        let meta = ResponseMeta {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: response.headers().clone(),
            url: response.url().clone(),
        };

        let mut head = http::Response::new(());
        *head.status_mut() = status;
        *head.version_mut() = response.version();
        *head.headers_mut() = meta.headers.clone();

        let body = async move {
            let text = match &signal {
                Some(signal) => tokio::select! {
                    biased;
                    _ = signal.aborted() => {
                        return Err(Box::new(TransportError::from_signal(signal)) as HookError)
                    }
                    text = response.text() => text,
                },
                None => response.text().await,
            };
            text.map_err(HookError::from)
        };

        Ok(TransportResponse::new(meta, body).with_instance(head))
    }
}
