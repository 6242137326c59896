// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use crate::retry::backoff::DelayBackoff;
use crate::retry::{DefaultEligibility, EligibilityStrategy};
use crate::{BackoffConfig, CallAttempt};

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The attempt's outcome is final.
    Stop,
    /// Send another attempt after waiting the given delay.
    RetryAfter(Duration),
}

impl RetryDecision {
    /// Returns the delay when the decision is to retry.
    #[must_use]
    pub fn delay(self) -> Option<Duration> {
        match self {
            Self::Stop => None,
            Self::RetryAfter(delay) => Some(delay),
        }
    }

    /// Returns a stable identifier used in telemetry.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::RetryAfter(_) => "retry",
        }
    }
}

impl Display for RetryDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides what happens after each completed attempt.
///
/// Decisions are computed fresh for every attempt and must not block.
/// Strategies do not log: the dispatcher emits a `stashwire.retry` event for
/// every decision, and counts failed attempts when metrics are enabled. See
/// [`telemetry`][crate::telemetry].
pub trait RetryStrategy: Debug + Send + Sync {
    /// Decides whether the call that produced `attempt` should be attempted again.
    fn decide(&self, attempt: &CallAttempt) -> RetryDecision;
}

/// Retries eligible failures until the attempt number exceeds a fixed maximum.
///
/// For an attempt with number `n`:
///
/// - `OK` stops;
/// - a code or method that is not eligible stops;
/// - `n` greater than the maximum stops;
/// - anything else retries after the backoff delay for `n`.
///
/// With a maximum of 3, a call that keeps failing with an eligible status is
/// attempted 4 times.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stashwire::retry::{FixedCountRetryStrategy, RetryDecision, RetryStrategy};
/// use stashwire::{CallAttempt, methods};
/// use stashwire_types::StatusCode;
///
/// let strategy = FixedCountRetryStrategy::new(3);
///
/// let attempt = CallAttempt::new(methods::GET, 1, StatusCode::Unavailable, Duration::ZERO);
/// assert_eq!(strategy.decide(&attempt), RetryDecision::RetryAfter(Duration::ZERO));
///
/// let attempt = CallAttempt::new(methods::GET, 4, StatusCode::Unavailable, Duration::ZERO);
/// assert_eq!(strategy.decide(&attempt), RetryDecision::Stop);
/// ```
#[derive(Debug, Clone)]
pub struct FixedCountRetryStrategy {
    max_attempts: u32,
    eligibility: Arc<dyn EligibilityStrategy>,
    backoff: DelayBackoff,
}

impl FixedCountRetryStrategy {
    /// Creates a strategy with the default eligibility and no delay between attempts.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            eligibility: Arc::new(DefaultEligibility::new()),
            backoff: DelayBackoff::from(&BackoffConfig::default()),
        }
    }

    /// Replaces the eligibility rules.
    #[must_use]
    pub fn eligibility(mut self, eligibility: impl EligibilityStrategy + 'static) -> Self {
        self.eligibility = Arc::new(eligibility);
        self
    }

    /// Replaces the delay schedule.
    #[must_use]
    pub fn backoff(mut self, backoff: &BackoffConfig) -> Self {
        self.backoff = DelayBackoff::from(backoff);
        self
    }

    /// The highest attempt number that may still be retried.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl RetryStrategy for FixedCountRetryStrategy {
    fn decide(&self, attempt: &CallAttempt) -> RetryDecision {
        if attempt.code().is_ok() {
            return RetryDecision::Stop;
        }

        if !self.eligibility.is_eligible(attempt.code(), attempt.method()) {
            return RetryDecision::Stop;
        }

        if attempt.number() > self.max_attempts {
            return RetryDecision::Stop;
        }

        RetryDecision::RetryAfter(self.backoff.delay(attempt.number()))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use stashwire_types::StatusCode;

    use super::*;
    use crate::Backoff;
    use crate::methods;

    static_assertions::assert_impl_all!(FixedCountRetryStrategy: Send, Sync, Clone);

    fn attempt(method: &'static str, number: u32, code: StatusCode) -> CallAttempt {
        CallAttempt::new(method, number, code, Duration::from_millis(3))
    }

    #[test]
    fn ok_stops() {
        let strategy = FixedCountRetryStrategy::new(3);

        assert_eq!(strategy.decide(&attempt(methods::GET, 1, StatusCode::Ok)), RetryDecision::Stop);
    }

    #[test]
    fn ineligible_stops() {
        let strategy = FixedCountRetryStrategy::new(3);

        assert_eq!(strategy.decide(&attempt(methods::GET, 1, StatusCode::NotFound)), RetryDecision::Stop);
        assert_eq!(
            strategy.decide(&attempt(methods::INCREMENT, 1, StatusCode::Unavailable)),
            RetryDecision::Stop
        );
        assert_eq!(
            strategy.decide(&attempt(methods::GET, 1, StatusCode::DeadlineExceeded)),
            RetryDecision::Stop
        );
    }

    #[test]
    fn stops_only_once_number_exceeds_max() {
        let strategy = FixedCountRetryStrategy::new(3);

        for number in 1..=3 {
            assert_eq!(
                strategy.decide(&attempt(methods::SET, number, StatusCode::Internal)),
                RetryDecision::RetryAfter(Duration::ZERO),
                "attempt {number}"
            );
        }

        for number in [4, 5, 100, u32::MAX] {
            assert_eq!(
                strategy.decide(&attempt(methods::SET, number, StatusCode::Internal)),
                RetryDecision::Stop,
                "attempt {number}"
            );
        }
    }

    #[test]
    fn zero_max_never_retries() {
        let strategy = FixedCountRetryStrategy::new(0);

        assert_eq!(strategy.decide(&attempt(methods::GET, 1, StatusCode::Unavailable)), RetryDecision::Stop);
    }

    #[test]
    fn delay_follows_backoff() {
        let strategy = FixedCountRetryStrategy::new(5).backoff(&BackoffConfig {
            kind: Backoff::Linear,
            base_delay_ms: 10,
            max_delay_ms: None,
            use_jitter: false,
        });

        assert_eq!(
            strategy.decide(&attempt(methods::GET, 2, StatusCode::Unavailable)),
            RetryDecision::RetryAfter(Duration::from_millis(20))
        );
    }

    #[test]
    fn custom_eligibility() {
        let strategy = FixedCountRetryStrategy::new(3).eligibility(DefaultEligibility::with_sets([StatusCode::Aborted], ["/svc/Op"]));

        assert_eq!(
            strategy.decide(&attempt("/svc/Op", 1, StatusCode::Aborted)),
            RetryDecision::RetryAfter(Duration::ZERO)
        );
        assert_eq!(strategy.decide(&attempt(methods::GET, 1, StatusCode::Unavailable)), RetryDecision::Stop);
    }

    #[test]
    fn decision_accessors() {
        assert_eq!(RetryDecision::Stop.delay(), None);
        assert_eq!(RetryDecision::RetryAfter(Duration::from_secs(1)).delay(), Some(Duration::from_secs(1)));
        assert_eq!(RetryDecision::Stop.to_string(), "stop");
        assert_eq!(RetryDecision::RetryAfter(Duration::ZERO).to_string(), "retry");
    }
}
