// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use bytes::Bytes;
use stashwire_types::{Metadata, Status, StatusCode};

/// A logical call submitted to the [`Dispatcher`][crate::Dispatcher].
///
/// The body is opaque: marshaling of individual cache verbs happens before
/// the call reaches the dispatcher.
///
/// # Examples
///
/// ```
/// use stashwire::CallRequest;
/// use stashwire::methods;
///
/// let request = CallRequest::new(methods::GET, "my-cache", &b"key"[..]);
///
/// assert_eq!(request.method(), "/cache_client.Scs/Get");
/// assert_eq!(request.cache_name(), "my-cache");
/// ```
#[derive(Debug, Clone)]
pub struct CallRequest {
    method: Cow<'static, str>,
    cache_name: String,
    body: Bytes,
    metadata: Metadata,
    deadline: Option<Instant>,
}

impl CallRequest {
    /// Creates a call of `method` against the cache `cache_name`.
    pub fn new(method: impl Into<Cow<'static, str>>, cache_name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            cache_name: cache_name.into(),
            body: body.into(),
            metadata: Metadata::new(),
            deadline: None,
        }
    }

    /// Adds caller provided metadata. Injected headers are added on top of it.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets an absolute deadline shared by every attempt of this call.
    ///
    /// Without it each attempt gets its own deadline derived from the
    /// configured request timeout.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The method path.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The target cache.
    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// The request payload.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The caller provided metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The caller provided deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn into_parts(self) -> (CallInfo, Bytes, Metadata, Option<Instant>) {
        let info = CallInfo {
            method: self.method,
            cache_name: self.cache_name,
        };

        (info, self.body, self.metadata, self.deadline)
    }
}

/// Identity of a logical call, handed to middlewares when the call starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    method: Cow<'static, str>,
    cache_name: String,
}

impl CallInfo {
    /// Creates call info for a method and cache.
    pub fn new(method: impl Into<Cow<'static, str>>, cache_name: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            cache_name: cache_name.into(),
        }
    }

    /// The method path.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The target cache.
    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub(crate) fn method_cow(&self) -> Cow<'static, str> {
        self.method.clone()
    }
}

/// A single attempt handed to a [`Channel`][crate::Channel].
#[derive(Debug, Clone)]
pub struct OutgoingCall {
    method: Cow<'static, str>,
    metadata: Metadata,
    body: Bytes,
    deadline: Instant,
    attempt: u32,
}

impl OutgoingCall {
    /// Creates an attempt. Mostly useful for testing channels.
    pub fn new(method: impl Into<Cow<'static, str>>, metadata: Metadata, body: impl Into<Bytes>, deadline: Instant) -> Self {
        Self {
            method: method.into(),
            metadata,
            body: body.into(),
            deadline,
            attempt: 1,
        }
    }

    pub(crate) fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// The method path.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Metadata to send, including injected headers.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Payload to send.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Instant after which the attempt is abandoned.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The 1-based attempt number within the logical call.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// What a [`Channel`][crate::Channel] received for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingReply {
    metadata: Metadata,
    body: Option<Bytes>,
    status: Status,
}

impl IncomingReply {
    /// A successful reply carrying `body`.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            metadata: Metadata::new(),
            body: Some(body.into()),
            status: Status::ok(),
        }
    }

    /// A reply that ended with `status` and no body.
    #[must_use]
    pub fn from_status(status: Status) -> Self {
        Self {
            metadata: Metadata::new(),
            body: None,
            status,
        }
    }

    /// Attaches response header metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Response header metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Response payload, absent when the call failed before one was produced.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Final status.
    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub(crate) fn into_parts(self) -> (Metadata, Option<Bytes>, Status) {
        (self.metadata, self.body, self.status)
    }
}

/// Successful outcome of a logical call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReply {
    metadata: Metadata,
    body: Bytes,
    attempts: u32,
}

impl CallReply {
    pub(crate) fn new(metadata: Metadata, body: Option<Bytes>, attempts: u32) -> Self {
        Self {
            metadata,
            body: body.unwrap_or_default(),
            attempts,
        }
    }

    /// Response header metadata after incoming hooks ran.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Response payload after incoming hooks ran. Empty when none was received.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Number of attempts the call took.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Consumes the reply and returns the payload.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Record of one completed transport attempt, the input of retry decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAttempt {
    method: Cow<'static, str>,
    number: u32,
    code: StatusCode,
    elapsed: Duration,
}

impl CallAttempt {
    /// Creates an attempt record. `number` is 1-based.
    pub fn new(method: impl Into<Cow<'static, str>>, number: u32, code: StatusCode, elapsed: Duration) -> Self {
        Self {
            method: method.into(),
            number,
            code,
            elapsed,
        }
    }

    /// The method path.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The 1-based attempt number.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The status code the attempt ended with.
    #[must_use]
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// Time between sending the attempt and receiving its status.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
