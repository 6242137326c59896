// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retry eligibility and retry decisions.
//!
//! After each attempt the [`Dispatcher`][crate::Dispatcher] builds a
//! [`CallAttempt`][crate::CallAttempt] and asks its [`RetryStrategy`] what
//! to do next. The default strategy is [`FixedCountRetryStrategy`], which
//! consults an [`EligibilityStrategy`] to tell transient failures of
//! idempotent methods apart from everything else.
//!
//! # Defaults
//!
//! | Parameter | Default Value | Configured By |
//! |-----------|---------------|---------------|
//! | Max attempts | `3` (4 attempts in total) | [`ClientConfig::with_max_attempts`][crate::ClientConfig::with_max_attempts] |
//! | Retryable codes | `UNAVAILABLE`, `INTERNAL`, `FAILED_PRECONDITION` | [`DefaultEligibility::with_sets`] |
//! | Retryable methods | [`methods::IDEMPOTENT`][crate::methods::IDEMPOTENT] | [`DefaultEligibility::with_sets`] |
//! | Delay | none | [`ClientConfig::with_backoff`][crate::ClientConfig::with_backoff] |
//!
//! `DEADLINE_EXCEEDED` is not retryable by default: an attempt that timed out
//! ends the call.

mod backoff;
mod eligibility;
mod strategy;

pub use backoff::Backoff;
pub use eligibility::{DefaultEligibility, EligibilityStrategy, RETRYABLE_CODES};
pub use strategy::{FixedCountRetryStrategy, RetryDecision, RetryStrategy};
