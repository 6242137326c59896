// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};

use crate::{Metadata, StatusCode};

/// Final status of a remote call as reported by the transport.
///
/// The code is optional because a transport can complete a call without
/// delivering a recognizable status. Such a status is treated as unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: Option<StatusCode>,
    message: String,
    metadata: Metadata,
}

impl Status {
    /// Creates a status with the given code and message and no trailing metadata.
    #[must_use]
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            metadata: Metadata::new(),
        }
    }

    /// Creates a status from a raw transport code.
    ///
    /// Values outside the known set produce a status without a code.
    #[must_use]
    pub fn from_raw(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::from_i32(code),
            message: message.into(),
            metadata: Metadata::new(),
        }
    }

    /// Creates a successful status.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::Ok, "")
    }

    /// Creates an `UNAVAILABLE` status.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    /// Creates a `DEADLINE_EXCEEDED` status.
    #[must_use]
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(StatusCode::DeadlineExceeded, message)
    }

    /// Creates an `INTERNAL` status.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    /// Attaches trailing metadata to this status.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The status code, if the transport reported a recognizable one.
    #[must_use]
    pub fn code(&self) -> Option<StatusCode> {
        self.code
    }

    /// The status message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Trailing metadata delivered with the status.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns `true` when the code is [`StatusCode::Ok`].
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code.is_some_and(StatusCode::is_ok)
    }

    /// Splits the status into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Option<StatusCode>, String, Metadata) {
        (self.code, self.message, self.metadata)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code}")?,
            None => f.write_str("<unrecognized>")?,
        }

        if self.message.is_empty() {
            Ok(())
        } else {
            write!(f, ": {}", self.message)
        }
    }
}
