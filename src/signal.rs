//! Cancellation signals composed from an external token and a timeout.

use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The caller's cancellation token fired.
    Aborted,
    /// The configured timeout elapsed.
    TimedOut,
}

/// The effective cancellation signal of one attempt.
///
/// Whichever source fires first records its [`AbortReason`]; later sources are ignored.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<AbortReason>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal unless it already fired.
    pub fn abort(&self, reason: AbortReason) {
        if self.reason.set(reason).is_ok() {
            self.token.cancel();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason recorded by the first source to fire.
    pub fn reason(&self) -> Option<AbortReason> {
        self.reason.get().copied()
    }

    /// Completes once the signal fires.
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }
}

/// Keeps the watcher of a composed signal alive; dropping it stops the watcher.
#[derive(Debug)]
pub struct SignalGuard {
    _done: DropGuard,
}

/// Combines an external token and a timeout into one signal.
///
/// Returns `None` when neither is configured. Must be called within a Tokio runtime.
pub fn compose(
    external: Option<&CancellationToken>,
    timeout: Option<Duration>,
) -> Option<(AbortSignal, SignalGuard)> {
    if external.is_none() && timeout.is_none() {
        return None;
    }

    let signal = AbortSignal::new();
    if external.is_some_and(CancellationToken::is_cancelled) {
        signal.abort(AbortReason::Aborted);
    }

    let done = CancellationToken::new();
    let watcher_done = done.clone();
    let watcher_signal = signal.clone();
    let external = external.cloned();

    tokio::spawn(async move {
        let external_fired = async {
            match &external {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let timed_out = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = watcher_done.cancelled() => {}
            _ = external_fired => watcher_signal.abort(AbortReason::Aborted),
            _ = timed_out => watcher_signal.abort(AbortReason::TimedOut),
        }
    });

    Some((
        signal,
        SignalGuard {
            _done: done.drop_guard(),
        },
    ))
}
