// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

use stashwire_types::Status;
use tick::{Clock, FutureExt};

use crate::IncomingReply;

// Request timeouts too large to add to the current instant are clamped to this.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Bounds every attempt by a deadline.
///
/// When the caller set a deadline on the request, every attempt shares it.
/// Otherwise each attempt gets a fresh deadline of `now + request_timeout`
/// computed when the attempt is sent. An attempt that outlives its deadline
/// ends with `DEADLINE_EXCEEDED`.
#[derive(Debug, Clone)]
pub struct DeadlineEnforcer {
    clock: Clock,
    request_timeout: Duration,
}

impl DeadlineEnforcer {
    /// Creates an enforcer that measures time with `clock`.
    #[must_use]
    pub fn new(clock: &Clock, request_timeout: Duration) -> Self {
        Self {
            clock: clock.clone(),
            request_timeout,
        }
    }

    /// The timeout applied when the caller did not set a deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Computes the deadline of an attempt about to be sent.
    #[must_use]
    pub fn deadline_for(&self, caller_deadline: Option<Instant>) -> Instant {
        if let Some(deadline) = caller_deadline {
            return deadline;
        }

        let now = self.clock.instant();
        now.checked_add(self.request_timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }

    /// Awaits `reply` until `deadline`, converting expiry into a `DEADLINE_EXCEEDED` reply.
    ///
    /// Dropping the transport future on expiry cancels the in-flight attempt.
    pub async fn enforce(&self, deadline: Instant, reply: impl Future<Output = IncomingReply>) -> IncomingReply {
        let remaining = deadline.saturating_duration_since(self.clock.instant());

        match reply.timeout(&self.clock, remaining).await {
            Ok(reply) => reply,
            Err(_) => IncomingReply::from_status(Status::deadline_exceeded(format!(
                "attempt did not complete within {}ms",
                remaining.as_millis()
            ))),
        }
    }
}
