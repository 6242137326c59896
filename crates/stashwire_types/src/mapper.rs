// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{CacheError, ErrorKind, Metadata, StatusCode};

/// Classifies a status code into an [`ErrorKind`].
///
/// The mapping is total. An absent code and [`StatusCode::Ok`] both map to
/// [`ErrorKind::Unknown`] because neither describes a failure.
#[must_use]
pub fn error_kind(code: Option<StatusCode>) -> ErrorKind {
    let Some(code) = code else {
        return ErrorKind::Unknown;
    };

    match code {
        StatusCode::PermissionDenied => ErrorKind::PermissionDenied,
        StatusCode::DataLoss | StatusCode::Internal | StatusCode::Aborted => ErrorKind::InternalServer,
        StatusCode::Unknown => ErrorKind::UnknownService,
        StatusCode::Unavailable => ErrorKind::ServerUnavailable,
        StatusCode::NotFound => ErrorKind::NotFound,
        StatusCode::OutOfRange | StatusCode::Unimplemented => ErrorKind::BadRequest,
        StatusCode::FailedPrecondition | StatusCode::InvalidArgument => ErrorKind::InvalidArgument,
        StatusCode::Cancelled => ErrorKind::Cancelled,
        StatusCode::DeadlineExceeded => ErrorKind::Timeout,
        StatusCode::Unauthenticated => ErrorKind::Authentication,
        StatusCode::ResourceExhausted => ErrorKind::LimitExceeded,
        StatusCode::AlreadyExists => ErrorKind::AlreadyExists,
        StatusCode::Ok => ErrorKind::Unknown,
    }
}

/// Converts a transport status into a [`CacheError`].
///
/// The original code, message and metadata are preserved on the error.
#[must_use]
pub fn map_status(code: Option<StatusCode>, message: impl Into<String>, metadata: Metadata) -> CacheError {
    CacheError::from_parts(error_kind(code), code, message, metadata)
}

/// Converts a transport status into a [`CacheError`] that keeps `cause` as its source.
#[must_use]
pub fn map_status_caused_by(
    code: Option<StatusCode>,
    message: impl Into<String>,
    metadata: Metadata,
    cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> CacheError {
    CacheError::from_parts_caused_by(error_kind(code), code, message, metadata, cause)
}

/// Converts a raw numeric status into a [`CacheError`].
///
/// Values outside the known set are classified as [`ErrorKind::Unknown`].
#[must_use]
pub fn map_raw_status(code: i32, message: impl Into<String>, metadata: Metadata) -> CacheError {
    map_status(StatusCode::from_i32(code), message, metadata)
}
