// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashSet;
use std::fmt::Debug;

use stashwire_types::StatusCode;

use crate::methods;

/// Decides whether a failed attempt may be repeated.
///
/// Implementations must be pure: the same code and method always yield the
/// same answer.
pub trait EligibilityStrategy: Debug + Send + Sync {
    /// Returns `true` when an attempt of `method` that ended with `code` may be retried.
    fn is_eligible(&self, code: StatusCode, method: &str) -> bool;
}

/// Eligibility based on a set of transient status codes and a set of idempotent methods.
///
/// A call is eligible only when both its status code and its method are in
/// the respective set. Methods outside the set are never eligible.
///
/// # Examples
///
/// ```
/// use stashwire::methods;
/// use stashwire::retry::{DefaultEligibility, EligibilityStrategy};
/// use stashwire_types::StatusCode;
///
/// let eligibility = DefaultEligibility::new();
///
/// assert!(eligibility.is_eligible(StatusCode::Unavailable, methods::GET));
/// assert!(!eligibility.is_eligible(StatusCode::Unavailable, methods::INCREMENT));
/// assert!(!eligibility.is_eligible(StatusCode::DeadlineExceeded, methods::GET));
/// ```
#[derive(Debug, Clone)]
pub struct DefaultEligibility {
    codes: HashSet<StatusCode>,
    methods: HashSet<String>,
}

/// Status codes treated as transient by [`DefaultEligibility::new`].
pub const RETRYABLE_CODES: &[StatusCode] = &[StatusCode::Unavailable, StatusCode::Internal, StatusCode::FailedPrecondition];

impl DefaultEligibility {
    /// Creates the default eligibility: [`RETRYABLE_CODES`] and [`methods::IDEMPOTENT`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_sets(RETRYABLE_CODES.iter().copied(), methods::IDEMPOTENT.iter().copied())
    }

    /// Creates an eligibility from custom sets.
    #[must_use]
    pub fn with_sets<C, M>(codes: C, methods: M) -> Self
    where
        C: IntoIterator<Item = StatusCode>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            codes: codes.into_iter().collect(),
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a method to the retryable set.
    #[must_use]
    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        self.methods.insert(method.into());
        self
    }

    /// Adds a status code to the retryable set.
    #[must_use]
    pub fn allow_code(mut self, code: StatusCode) -> Self {
        self.codes.insert(code);
        self
    }
}

impl Default for DefaultEligibility {
    fn default() -> Self {
        Self::new()
    }
}

impl EligibilityStrategy for DefaultEligibility {
    fn is_eligible(&self, code: StatusCode, method: &str) -> bool {
        self.codes.contains(&code) && self.methods.contains(method)
    }
}
