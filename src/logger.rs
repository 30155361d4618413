//! Per-attempt request logging.
//!
//! A [`Logger`] is told when each attempt starts and hands back a [`LogHandle`] that
//! is completed exactly once, with either success or the failure status.

use http::Method;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};
use url::Url;

static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Returns the next process-wide log sequence id. Ids start at 1 and only increase.
pub fn next_log_id() -> u64 {
    LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1
}

/// Log level used by [`TracingLogger`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
}

/// Caller-supplied options forwarded to the logger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub level: LogLevel,
    /// Free-form label identifying the call site.
    pub label: Option<String>,
}

/// Completes the log entry of one attempt.
pub trait LogHandle: Send {
    fn success(self: Box<Self>);

    /// `status` is the HTTP status, `kind(status)` or the bare error kind.
    fn error(self: Box<Self>, status: &str);
}

/// Receives the start of every attempt.
pub trait Logger: Send + Sync {
    fn start(
        &self,
        id: u64,
        url: &Url,
        method: &Method,
        started_at: SystemTime,
        options: &LogOptions,
    ) -> Box<dyn LogHandle>;
}

/// A [`Logger`] writing start/end lines through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn start(
        &self,
        id: u64,
        url: &Url,
        method: &Method,
        _started_at: SystemTime,
        options: &LogOptions,
    ) -> Box<dyn LogHandle> {
        let handle = TracingLogHandle {
            id,
            url: url.to_string(),
            method: method.clone(),
            label: options.label.clone().unwrap_or_default(),
            level: options.level,
            started: Instant::now(),
        };

        match handle.level {
            LogLevel::Debug => tracing::debug!(
                id,
                label = %handle.label,
                method = %handle.method,
                url = %handle.url,
                "Request started"
            ),
            LogLevel::Info => tracing::info!(
                id,
                label = %handle.label,
                method = %handle.method,
                url = %handle.url,
                "Request started"
            ),
        }

        Box::new(handle)
    }
}

struct TracingLogHandle {
    id: u64,
    url: String,
    method: Method,
    label: String,
    level: LogLevel,
    started: Instant,
}

impl LogHandle for TracingLogHandle {
    fn success(self: Box<Self>) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match self.level {
            LogLevel::Debug => tracing::debug!(
                id = self.id,
                label = %self.label,
                method = %self.method,
                url = %self.url,
                elapsed_ms,
                "Request succeeded"
            ),
            LogLevel::Info => tracing::info!(
                id = self.id,
                label = %self.label,
                method = %self.method,
                url = %self.url,
                elapsed_ms,
                "Request succeeded"
            ),
        }
    }

    fn error(self: Box<Self>, status: &str) {
        tracing::warn!(
            id = self.id,
            label = %self.label,
            method = %self.method,
            url = %self.url,
            status,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_ids_increase() {
        let first = next_log_id();
        let second = next_log_id();
        assert!(second > first);
    }

    #[test]
    fn test_log_ids_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| next_log_id()).collect::<Vec<_>>()))
            .collect();
        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_tracing_logger_handles_complete() {
        let url = Url::parse("http://test.com/api").unwrap();
        let options = LogOptions {
            level: LogLevel::Debug,
            label: Some("users".into()),
        };
        TracingLogger
            .start(1, &url, &Method::GET, SystemTime::now(), &options)
            .success();
        TracingLogger
            .start(2, &url, &Method::POST, SystemTime::now(), &LogOptions::default())
            .error("500");
    }
}
