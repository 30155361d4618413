//! Process-wide defaults for the transport and logger.
//!
//! Every call takes a snapshot of the defaults when it starts, so updating them never
//! affects calls already in flight.

use crate::logger::Logger;
use crate::transport::{ReqwestTransport, Transport};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// The defaults used when a call does not override them.
#[derive(Clone)]
pub struct Defaults {
    pub transport: Arc<dyn Transport>,
    pub logger: Option<Arc<dyn Logger>>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
            logger: None,
        }
    }
}

impl fmt::Debug for Defaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defaults")
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

/// A partial update of the [`Defaults`]; unset fields keep their current value.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use typed_fetch::config::{set_defaults, DefaultsUpdate};
/// use typed_fetch::logger::TracingLogger;
///
/// set_defaults(DefaultsUpdate::new().logger(Arc::new(TracingLogger)));
/// ```
#[derive(Default)]
pub struct DefaultsUpdate {
    transport: Option<Arc<dyn Transport>>,
    logger: Option<Option<Arc<dyn Logger>>>,
}

impl DefaultsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(Some(logger));
        self
    }

    /// Removes the default logger.
    pub fn no_logger(mut self) -> Self {
        self.logger = Some(None);
        self
    }
}

fn store() -> &'static RwLock<Arc<Defaults>> {
    static DEFAULTS: OnceLock<RwLock<Arc<Defaults>>> = OnceLock::new();
    DEFAULTS.get_or_init(|| RwLock::new(Arc::new(Defaults::default())))
}

/// Returns a snapshot of the current defaults.
pub fn defaults() -> Arc<Defaults> {
    store().read().clone()
}

/// Shallow-merges `update` into the defaults. The last writer wins.
pub fn set_defaults(update: DefaultsUpdate) {
    let mut current = store().write();
    let mut next = Defaults::clone(&current);
    if let Some(transport) = update.transport {
        next.transport = transport;
    }
    if let Some(logger) = update.logger {
        next.logger = logger;
    }
    *current = Arc::new(next);
    tracing::debug!(has_logger = current.logger.is_some(), "Updated fetch defaults");
}
