// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Domain errors surfaced by the cache client.

use std::fmt::{Display, Formatter};

use recoverable::{Recovery, RecoveryInfo};

use crate::{Metadata, StatusCode};

/// Closed classification of failures surfaced to callers.
///
/// Every terminal failure of a remote call is expressed as exactly one of
/// these kinds. See [`map_status`][crate::map_status] for how status codes
/// are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request was malformed or failed a precondition.
    InvalidArgument,
    /// The requested cache or resource does not exist.
    NotFound,
    /// The resource being created already exists.
    AlreadyExists,
    /// The credential is not allowed to perform the operation.
    PermissionDenied,
    /// The credential was rejected.
    Authentication,
    /// A request rate, size or quota limit was exceeded.
    LimitExceeded,
    /// The call was cancelled.
    Cancelled,
    /// The call did not complete before its deadline.
    Timeout,
    /// The server could not be reached or refused the call.
    ServerUnavailable,
    /// The server failed while handling the call.
    InternalServer,
    /// The server does not support the request.
    BadRequest,
    /// The server reported an error it could not classify.
    UnknownService,
    /// The status could not be classified at all.
    Unknown,
    /// The failure originated in the client before a status was received.
    Client,
}

impl ErrorKind {
    /// Returns a stable `snake_case` identifier for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::Authentication => "authentication",
            Self::LimitExceeded => "limit_exceeded",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::ServerUnavailable => "server_unavailable",
            Self::InternalServer => "internal_server",
            Self::BadRequest => "bad_request",
            Self::UnknownService => "unknown_service",
            Self::Unknown => "unknown",
            Self::Client => "client",
        }
    }

    /// Returns a human readable description of this kind.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::InvalidArgument => "Invalid argument passed to the cache service",
            Self::NotFound => "The requested resource was not found",
            Self::AlreadyExists => "A resource with the same name already exists",
            Self::PermissionDenied => "Insufficient permissions to perform the operation",
            Self::Authentication => "Invalid authentication credentials",
            Self::LimitExceeded => "Request rate, bandwidth or object size exceeded the limits",
            Self::Cancelled => "The request was cancelled",
            Self::Timeout => "The request did not complete before its deadline",
            Self::ServerUnavailable => "The cache service was unavailable",
            Self::InternalServer => "The cache service failed with an internal error",
            Self::BadRequest => "The request was invalid or is not supported",
            Self::UnknownService => "The cache service returned an unknown error",
            Self::Unknown => "Unknown error",
            Self::Client => "The request failed inside the client",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed cache call.
///
/// Carries the classified [`ErrorKind`], the status code that produced it (if
/// any), the server provided details and the response metadata. Errors are
/// built once and never mutated.
///
/// # Examples
///
/// ```
/// use stashwire_types::{ErrorKind, Metadata, StatusCode, map_status};
///
/// let error = map_status(Some(StatusCode::Unavailable), "connection reset", Metadata::new());
///
/// assert_eq!(error.kind(), ErrorKind::ServerUnavailable);
/// assert_eq!(error.code(), Some(StatusCode::Unavailable));
/// assert_eq!(error.details(), "connection reset");
/// ```
#[ohno::error]
#[display("{kind}: {details}")]
pub struct CacheError {
    kind: ErrorKind,
    code: Option<StatusCode>,
    details: String,
    metadata: Metadata,
}

impl CacheError {
    /// Creates an error from its parts.
    #[must_use]
    pub fn from_parts(kind: ErrorKind, code: Option<StatusCode>, details: impl Into<String>, metadata: Metadata) -> Self {
        Self::new(kind, code, details, metadata)
    }

    /// Creates an error from its parts with an underlying cause.
    #[must_use]
    pub fn from_parts_caused_by(
        kind: ErrorKind,
        code: Option<StatusCode>,
        details: impl Into<String>,
        metadata: Metadata,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::caused_by(kind, code, details, metadata, cause)
    }

    /// Creates an [`ErrorKind::Client`] error for a failure that happened inside the client.
    #[must_use]
    pub fn client(details: impl Into<String>, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Client, None, details, Metadata::new(), cause)
    }

    /// The classified kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The status code that produced this error, if one was received.
    #[must_use]
    pub fn code(&self) -> Option<StatusCode> {
        self.code
    }

    /// Details reported by the server or the failing component.
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Response metadata delivered alongside the failed status.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// A human readable message combining the kind description with the details.
    #[must_use]
    pub fn message(&self) -> String {
        if self.details.is_empty() {
            self.kind.description().to_string()
        } else {
            format!("{}: {}", self.kind.description(), self.details)
        }
    }
}

impl Recovery for CacheError {
    fn recovery(&self) -> RecoveryInfo {
        match self.kind {
            ErrorKind::ServerUnavailable => RecoveryInfo::unavailable(),
            ErrorKind::InternalServer | ErrorKind::Timeout | ErrorKind::LimitExceeded => RecoveryInfo::retry(),
            ErrorKind::Unknown | ErrorKind::UnknownService => RecoveryInfo::unknown(),
            _ => RecoveryInfo::never(),
        }
    }
}
