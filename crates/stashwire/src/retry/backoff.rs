// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::fmt::Debug;
use std::time::Duration;

use crate::BackoffConfig;

/// The factor used to determine the range of jitter applied to delays.
const JITTER_FACTOR: f64 = 0.5;

/// Shape of the delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Backoff {
    /// Every retry waits the base delay.
    #[default]
    Constant,
    /// Retry `n` waits `n` times the base delay.
    Linear,
    /// Retry `n` waits the base delay doubled `n - 1` times.
    Exponential,
}

/// Computes the delay that precedes the retry of a given attempt.
///
/// The schedule only depends on the attempt number, so a single instance is
/// shared by every call of a dispatcher.
#[derive(Debug, Clone)]
pub(crate) struct DelayBackoff {
    kind: Backoff,
    base_delay: Duration,
    max_delay: Option<Duration>,
    use_jitter: bool,
    rnd: Rnd,
}

impl From<&BackoffConfig> for DelayBackoff {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            kind: config.kind,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: config.max_delay_ms.map(Duration::from_millis),
            use_jitter: config.use_jitter,
            rnd: Rnd::default(),
        }
    }
}

impl DelayBackoff {
    /// Delay before retrying after the failed attempt `attempt` (1-based).
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        // zero base delay => always zero
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let attempt = attempt.max(1);
        let delay = match self.kind {
            Backoff::Constant => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => duration_mul_pow2(self.base_delay, attempt - 1),
        };

        let delay = if self.use_jitter { apply_jitter(delay, &self.rnd) } else { delay };

        self.max_delay.map_or(delay, |m| min(delay, m))
    }

    #[cfg(test)]
    pub(crate) fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }
}

fn duration_mul_pow2(base: Duration, exponent: u32) -> Duration {
    2_u32
        .checked_pow(exponent)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}

/// Adds a symmetric, uniform jitter around the given delay.
///
/// With `JITTER_FACTOR = 0.5`, the result lies in `[0.75*delay, 1.25*delay]`.
fn apply_jitter(delay: Duration, rnd: &Rnd) -> Duration {
    let ms = delay.as_secs_f64() * 1000.0;
    let offset = (ms * JITTER_FACTOR) / 2.0;
    let random_delay = (ms * JITTER_FACTOR).mul_add(rnd.next_f64(), -offset);

    secs_to_duration_saturating((ms + random_delay) / 1000.0)
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Non-cryptographic source of randomness for jitter.
#[derive(Clone, Default)]
pub(crate) enum Rnd {
    #[default]
    Real,

    #[cfg(test)]
    Fixed(f64),
}

impl Debug for Rnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "Real"),
            #[cfg(test)]
            Self::Fixed(_) => write!(f, "Fixed"),
        }
    }
}

impl Rnd {
    fn next_f64(&self) -> f64 {
        match self {
            Self::Real => fastrand::f64(),
            #[cfg(test)]
            Self::Fixed(value) => *value,
        }
    }
}
