// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use bytes::Bytes;

use crate::CacheError;

/// Outcome of a cache operation.
///
/// Lookups resolve to [`CacheResponse::Hit`] or [`CacheResponse::Miss`],
/// writes resolve to [`CacheResponse::Success`], and any failure resolves to
/// [`CacheResponse::Error`].
#[derive(Debug)]
pub enum CacheResponse {
    /// The key was found.
    Hit(Bytes),
    /// The key was not found.
    Miss,
    /// A write completed.
    Success,
    /// The operation failed.
    Error(CacheError),
}

impl CacheResponse {
    /// Builds the response of a lookup. `None` means the key was absent.
    #[must_use]
    pub fn from_lookup(result: Result<Option<Bytes>, CacheError>) -> Self {
        match result {
            Ok(Some(value)) => Self::Hit(value),
            Ok(None) => Self::Miss,
            Err(error) => Self::Error(error),
        }
    }

    /// Builds the response of a write.
    #[must_use]
    pub fn from_write<T>(result: Result<T, CacheError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(error) => Self::Error(error),
        }
    }

    /// Returns `true` for [`CacheResponse::Hit`].
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Returns `true` for [`CacheResponse::Miss`].
    #[must_use]
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Returns the value of a hit.
    #[must_use]
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            Self::Hit(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the error of a failed operation.
    #[must_use]
    pub fn error(&self) -> Option<&CacheError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Converts the response into a `Result`, turning [`CacheResponse::Error`] into `Err`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped [`CacheError`] when the operation failed.
    pub fn into_result(self) -> Result<Self, CacheError> {
        match self {
            Self::Error(error) => Err(error),
            other => Ok(other),
        }
    }
}
