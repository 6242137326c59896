// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Extension points that observe or rewrite every logical call.
//!
//! A [`Middleware`] is registered once on the
//! [`DispatcherBuilder`][crate::DispatcherBuilder]. For every logical call it
//! creates a fresh [`CallHandler`], which lives until the call settles and
//! spans all of the call's attempts.
//!
//! # Ordering
//!
//! With middlewares registered as `A, B`:
//!
//! - outgoing stages run `A` then `B`, metadata first and then the body;
//! - incoming stages run `B` then `A`, metadata first, then the body, then the status.
//!
//! Each stage receives the value produced by the previous handler. A stage
//! that fails aborts the call: the remaining stages do not run, the call is
//! not retried and the caller receives a [`CacheError`][stashwire_types::CacheError]
//! of kind [`Client`][stashwire_types::ErrorKind::Client].
//!
//! # Examples
//!
//! ```
//! use bytes::Bytes;
//! use futures_util::future::BoxFuture;
//! use stashwire::CallInfo;
//! use stashwire::middleware::{CallHandler, HookError, Middleware};
//! use stashwire_types::Metadata;
//!
//! #[derive(Debug)]
//! struct TenantTag(&'static str);
//!
//! struct TenantTagHandler(&'static str);
//!
//! impl Middleware for TenantTag {
//!     fn on_new_call(&self, _call: &CallInfo) -> Box<dyn CallHandler> {
//!         Box::new(TenantTagHandler(self.0))
//!     }
//! }
//!
//! impl CallHandler for TenantTagHandler {
//!     fn on_outgoing_metadata(&mut self, mut metadata: Metadata) -> BoxFuture<'_, Result<Metadata, HookError>> {
//!         metadata.set("tenant", self.0);
//!         Box::pin(async move { Ok(metadata) })
//!     }
//! }
//! ```

mod logging;
mod metrics;
mod pipeline;

use std::fmt::Debug;

use bytes::Bytes;
use futures_util::future::BoxFuture;
pub use logging::RequestLogging;
pub use metrics::{CallMetrics, CallRecord};
pub(crate) use pipeline::HookPipeline;
use stashwire_types::{Metadata, Status};

use crate::CallInfo;

/// Creates a [`CallHandler`] for every logical call.
pub trait Middleware: Debug + Send + Sync {
    /// Called once when a logical call starts, before any attempt is sent.
    fn on_new_call(&self, call: &CallInfo) -> Box<dyn CallHandler>;
}

/// Per-call hooks. Every hook defaults to passing its value through.
pub trait CallHandler: Send {
    /// Rewrites the outgoing metadata, after headers were injected.
    fn on_outgoing_metadata(&mut self, metadata: Metadata) -> BoxFuture<'_, Result<Metadata, HookError>> {
        Box::pin(std::future::ready(Ok(metadata)))
    }

    /// Rewrites the outgoing payload.
    fn on_outgoing_body(&mut self, body: Bytes) -> BoxFuture<'_, Result<Bytes, HookError>> {
        Box::pin(std::future::ready(Ok(body)))
    }

    /// Rewrites the response metadata of the final attempt.
    fn on_incoming_metadata(&mut self, metadata: Metadata) -> BoxFuture<'_, Result<Metadata, HookError>> {
        Box::pin(std::future::ready(Ok(metadata)))
    }

    /// Rewrites the response payload of the final attempt. Not called when no payload was received.
    fn on_incoming_body(&mut self, body: Bytes) -> BoxFuture<'_, Result<Bytes, HookError>> {
        Box::pin(std::future::ready(Ok(body)))
    }

    /// Rewrites the final status of the call.
    fn on_incoming_status(&mut self, status: Status) -> BoxFuture<'_, Result<Status, HookError>> {
        Box::pin(std::future::ready(Ok(status)))
    }
}

/// A middleware hook rejected the call.
#[ohno::error]
#[display("middleware hook failed: {reason}")]
pub struct HookError {
    reason: String,
}

impl HookError {
    /// Creates an error with a reason.
    #[must_use]
    pub fn from_message(reason: impl Into<String>) -> Self {
        Self::new(reason)
    }

    /// Creates an error with a reason and the underlying cause.
    #[must_use]
    pub fn from_cause(reason: impl Into<String>, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(reason, cause)
    }

    /// Why the hook rejected the call.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
