//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use typed_fetch::logger::{LogHandle, LogOptions, Logger};
use typed_fetch::transport::{
    ResponseMeta, Transport, TransportError, TransportFault, TransportOptions, TransportResponse,
};
use url::Url;

/// What the mock transport does for one call.
pub enum Reply {
    Json(u16, Value),
    Text(u16, String),
    Fault(TransportFault),
    /// Waits for the request's signal to fire.
    Hang,
}

type Handler = Box<dyn Fn(usize) -> Reply + Send + Sync>;

/// A transport scripted by call index (0-based).
pub struct MockTransport {
    handler: Handler,
    calls: AtomicUsize,
    requests: Mutex<Vec<(Url, TransportOptions)>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(usize) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answers `status` with the given JSON body.
    pub fn json(status: u16, body: Value) -> Arc<Self> {
        Self::new(move |_| Reply::Json(status, body.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(Url, TransportOptions)> {
        self.requests.lock().clone()
    }
}

fn meta(status: u16, url: Url) -> ResponseMeta {
    let status = StatusCode::from_u16(status).unwrap();
    ResponseMeta {
        status,
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers: HeaderMap::new(),
        url,
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        url: Url,
        options: TransportOptions,
    ) -> Result<TransportResponse, TransportError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((url.clone(), options.clone()));

        match (self.handler)(index) {
            Reply::Json(status, body) => {
                Ok(TransportResponse::from_text(meta(status, url), body.to_string()))
            }
            Reply::Text(status, body) => Ok(TransportResponse::from_text(meta(status, url), body)),
            Reply::Fault(fault) => Err(TransportError::new(fault, "mock transport fault")),
            Reply::Hang => match &options.signal {
                Some(signal) => {
                    signal.aborted().await;
                    Err(TransportError::from_signal(signal))
                }
                None => Err(TransportError::network("no signal to wait for")),
            },
        }
    }
}

/// A logger recording `start:<id>`, `success:<id>` and `error:<id>:<status>` events.
#[derive(Default)]
pub struct RecordingLogger {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

struct RecordingHandle {
    id: u64,
    events: Arc<Mutex<Vec<String>>>,
}

impl LogHandle for RecordingHandle {
    fn success(self: Box<Self>) {
        self.events.lock().push(format!("success:{}", self.id));
    }

    fn error(self: Box<Self>, status: &str) {
        self.events.lock().push(format!("error:{}:{}", self.id, status));
    }
}

impl Logger for RecordingLogger {
    fn start(
        &self,
        id: u64,
        _url: &Url,
        _method: &http::Method,
        _started_at: SystemTime,
        _options: &LogOptions,
    ) -> Box<dyn LogHandle> {
        self.events.lock().push(format!("start:{id}"));
        Box::new(RecordingHandle {
            id,
            events: self.events.clone(),
        })
    }
}
