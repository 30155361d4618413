//! Retry policies, conditions and attempt bookkeeping.
//!
//! A [`RetryPolicy`] is supplied by the caller and never mutated. The pipeline threads
//! a separate [`RetryState`] through its attempt loop, which keeps the original retry
//! budget around so attempts can be numbered consistently.

use crate::error::HookError;
use crate::{ErrorKind, TypedError};
use rand::Rng;
use std::cell::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long to wait before a retry.
///
/// # Examples
///
/// ```
/// use typed_fetch::retry::RetryDelay;
/// use std::time::Duration;
///
/// // 100ms before every retry
/// let fixed = RetryDelay::Fixed(Duration::from_millis(100));
///
/// // 100ms, 200ms, 400ms... capped at 5s
/// let exponential = RetryDelay::ExponentialBackoff {
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(5),
///     jitter: false,
/// };
/// assert_eq!(exponential.delay_for_attempt(3), Duration::from_millis(400));
///
/// // Computed from the 1-indexed retry attempt
/// let custom = RetryDelay::custom(|attempt| Duration::from_millis(50 * attempt as u64));
/// assert_eq!(custom.delay_for_attempt(2), Duration::from_millis(100));
/// ```
#[derive(Clone)]
pub enum RetryDelay {
    /// The same delay before every retry.
    Fixed(Duration),

    /// `initial_delay * 2^(attempt - 1)`, capped at `max_delay`.
    ///
    /// Jitter scales each delay by a random factor between 50% and 100%.
    ExponentialBackoff {
        initial_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    },

    /// A function of the 1-indexed retry attempt.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryDelay {
    pub fn custom<F>(delay_fn: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        RetryDelay::Custom(Arc::new(delay_fn))
    }

    /// Returns the delay before the given retry attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::ExponentialBackoff {
                initial_delay,
                max_delay,
                jitter,
            } => {
                let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
                let delay = initial_delay.saturating_mul(multiplier).min(*max_delay);

                if *jitter {
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    delay.mul_f64(jitter_factor)
                } else {
                    delay
                }
            }
            RetryDelay::Custom(delay_fn) => delay_fn(attempt),
        }
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        RetryDelay::Fixed(Duration::ZERO)
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            RetryDelay::ExponentialBackoff {
                initial_delay,
                max_delay,
                jitter,
            } => f
                .debug_struct("ExponentialBackoff")
                .field("initial_delay", initial_delay)
                .field("max_delay", max_delay)
                .field("jitter", jitter)
                .finish(),
            RetryDelay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Information about a failed attempt, handed to retry conditions and callbacks.
pub struct RetryContext<'a> {
    /// The error of the attempt that just failed.
    pub error: &'a TypedError,
    /// The 1-indexed number of the retry about to happen.
    pub retry_attempt: u32,
    call_started: Instant,
    error_duration: OnceCell<Duration>,
}

impl<'a> RetryContext<'a> {
    pub fn new(error: &'a TypedError, retry_attempt: u32, call_started: Instant) -> Self {
        Self {
            error,
            retry_attempt,
            call_started,
            error_duration: OnceCell::new(),
        }
    }

    /// Time since the logical call started, read once and cached.
    pub fn error_duration(&self) -> Duration {
        *self
            .error_duration
            .get_or_init(|| self.call_started.elapsed())
    }
}

/// Decides whether an eligible error should actually be retried.
///
/// Implemented for every `Fn(&RetryContext) -> bool` closure.
///
/// # Examples
///
/// ```
/// use typed_fetch::retry::{RetryCondition, RetryContext};
///
/// struct RetryOn503;
///
/// impl RetryCondition for RetryOn503 {
///     fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
///         ctx.error.status == 503
///     }
/// }
/// ```
pub trait RetryCondition: Send + Sync {
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool;
}

impl<F> RetryCondition for F
where
    F: Fn(&RetryContext<'_>) -> bool + Send + Sync,
{
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        self(ctx)
    }
}

/// Callback run after the retry delay and before the next attempt.
pub type OnRetry = Arc<dyn Fn(&RetryContext<'_>) -> Result<(), HookError> + Send + Sync>;

/// Kinds retried when a policy does not name its own.
pub const DEFAULT_RETRY_ON: [ErrorKind; 2] = [ErrorKind::RequestError, ErrorKind::NetworkOrCorsError];

/// When and how to retry a failed call.
///
/// # Examples
///
/// ```
/// use typed_fetch::retry::{RetryDelay, RetryPolicy};
/// use typed_fetch::ErrorKind;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3)
///     .delay(RetryDelay::Fixed(Duration::from_millis(10)))
///     .retry_on([ErrorKind::Timeout, ErrorKind::NetworkOrCorsError])
///     .condition(|ctx: &typed_fetch::retry::RetryContext<'_>| ctx.error.status != 404);
/// assert_eq!(policy.max_retries, 3);
/// ```
#[derive(Clone, Default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: RetryDelay,
    /// Retryable kinds; [`DEFAULT_RETRY_ON`] when `None`.
    pub retry_on: Option<HashSet<ErrorKind>>,
    pub condition: Option<Arc<dyn RetryCondition>>,
    pub on_retry: Option<OnRetry>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn delay(mut self, delay: RetryDelay) -> Self {
        self.delay = delay;
        self
    }

    /// Shorthand for a fixed delay.
    pub fn delay_ms(self, millis: u64) -> Self {
        self.delay(RetryDelay::Fixed(Duration::from_millis(millis)))
    }

    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retry_on = Some(kinds.into_iter().collect());
        self
    }

    pub fn condition<C>(mut self, condition: C) -> Self
    where
        C: RetryCondition + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn on_retry<F>(mut self, on_retry: F) -> Self
    where
        F: Fn(&RetryContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }

    /// Returns `true` if `kind` is in the retryable set.
    ///
    /// `invalid_options` and `aborted` are never retryable, whatever the set says.
    pub fn retries_kind(&self, kind: ErrorKind) -> bool {
        if kind.is_never_retried() {
            return false;
        }
        match &self.retry_on {
            Some(kinds) => kinds.contains(&kind),
            None => DEFAULT_RETRY_ON.contains(&kind),
        }
    }

    /// Decides whether the failed attempt described by `ctx` should be retried.
    pub fn should_retry(&self, ctx: &RetryContext<'_>, remaining: u32) -> bool {
        remaining > 0
            && self.retries_kind(ctx.error.kind)
            && self
                .condition
                .as_ref()
                .map_or(true, |condition| condition.should_retry(ctx))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .field("retry_on", &self.retry_on)
            .field("condition", &self.condition.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

/// Attempt bookkeeping for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 0-indexed attempt currently running.
    pub attempt: u32,
    /// `max_retries` as supplied by the caller.
    pub original_max_retries: u32,
    /// Retries still available.
    pub remaining: u32,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            original_max_retries: max_retries,
            remaining: max_retries,
        }
    }

    /// The number recorded on errors: `None` on the first attempt.
    pub fn error_attempt(&self) -> Option<u32> {
        (self.attempt > 0).then_some(self.attempt)
    }

    /// The 1-indexed number of the retry that would follow this attempt.
    pub fn next_retry_attempt(&self) -> u32 {
        self.original_max_retries - self.remaining + 1
    }

    /// State for the next attempt.
    pub fn next(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            original_max_retries: self.original_max_retries,
            remaining: self.remaining.saturating_sub(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(kind: ErrorKind) -> TypedError {
        TypedError::new(kind, "failed")
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let delay = RetryDelay::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter: false,
        };

        assert_eq!(delay.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(delay.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(delay.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(delay.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(delay.delay_for_attempt(5), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let delay = RetryDelay::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: true,
        };
        for _ in 0..20 {
            let d = delay.delay_for_attempt(2);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_default_retryable_kinds() {
        let policy = RetryPolicy::new(1);
        assert!(policy.retries_kind(ErrorKind::RequestError));
        assert!(policy.retries_kind(ErrorKind::NetworkOrCorsError));
        assert!(!policy.retries_kind(ErrorKind::Timeout));
        assert!(!policy.retries_kind(ErrorKind::InvalidJson));
    }

    #[test]
    fn test_never_retried_kinds_ignore_configuration() {
        let policy = RetryPolicy::new(5).retry_on([
            ErrorKind::InvalidOptions,
            ErrorKind::Aborted,
            ErrorKind::Timeout,
        ]);
        assert!(!policy.retries_kind(ErrorKind::InvalidOptions));
        assert!(!policy.retries_kind(ErrorKind::Aborted));
        assert!(policy.retries_kind(ErrorKind::Timeout));
    }

    #[test]
    fn test_should_retry_respects_budget_and_condition() {
        let err = error(ErrorKind::RequestError);
        let ctx = RetryContext::new(&err, 1, Instant::now());

        let policy = RetryPolicy::new(2);
        assert!(policy.should_retry(&ctx, 2));
        assert!(!policy.should_retry(&ctx, 0));

        let policy = policy.condition(|ctx: &RetryContext<'_>| ctx.retry_attempt > 1);
        assert!(!policy.should_retry(&ctx, 2));
    }

    #[test]
    fn test_error_duration_is_cached() {
        let err = error(ErrorKind::RequestError);
        let ctx = RetryContext::new(&err, 1, Instant::now());
        let first = ctx.error_duration();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ctx.error_duration(), first);
    }

    #[test]
    fn test_retry_state_numbering() {
        let state = RetryState::new(3);
        assert_eq!(state.error_attempt(), None);
        assert_eq!(state.next_retry_attempt(), 1);

        let state = state.next().next();
        assert_eq!(state.attempt, 2);
        assert_eq!(state.remaining, 1);
        assert_eq!(state.original_max_retries, 3);
        assert_eq!(state.error_attempt(), Some(2));
        assert_eq!(state.next_retry_attempt(), 3);
    }
}
