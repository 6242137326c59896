// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use stashwire_types::{Status, StatusCode};
use tick::{Clock, Stopwatch};

use super::{CallHandler, HookError, Middleware};
use crate::CallInfo;

/// Measurements of one logical call, delivered by [`CallMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CallRecord {
    /// The method path.
    pub method: Cow<'static, str>,
    /// The target cache.
    pub cache_name: String,
    /// Size of the request payload after outgoing hooks ran, in bytes.
    pub request_size: usize,
    /// Size of the response payload, in bytes. Zero when none was received.
    pub response_size: usize,
    /// Final status code, if recognizable.
    pub code: Option<StatusCode>,
    /// Time from the start of the call until its final status, retries included.
    pub duration: Duration,
}

type RecordFn = dyn Fn(&CallRecord) + Send + Sync;

/// Measures every logical call and hands the result to a callback.
///
/// Register it after the middlewares that rewrite payloads to observe the
/// sizes actually sent over the wire.
///
/// # Examples
///
/// ```
/// use tick::Clock;
/// use stashwire::middleware::CallMetrics;
///
/// # fn example(clock: &Clock) {
/// let metrics = CallMetrics::new(clock, |record| {
///     println!("{} took {:?}", record.method, record.duration);
/// });
/// # let _metrics = metrics;
/// # }
/// ```
#[derive(Clone)]
pub struct CallMetrics {
    clock: Clock,
    on_record: Arc<RecordFn>,
}

impl std::fmt::Debug for CallMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallMetrics").finish_non_exhaustive()
    }
}

impl CallMetrics {
    /// Creates the middleware. `on_record` is invoked once per settled call.
    pub fn new(clock: &Clock, on_record: impl Fn(&CallRecord) + Send + Sync + 'static) -> Self {
        Self {
            clock: clock.clone(),
            on_record: Arc::new(on_record),
        }
    }
}

impl Middleware for CallMetrics {
    fn on_new_call(&self, call: &CallInfo) -> Box<dyn CallHandler> {
        Box::new(MetricsHandler {
            stopwatch: self.clock.stopwatch(),
            on_record: Arc::clone(&self.on_record),
            record: CallRecord {
                method: call.method_cow(),
                cache_name: call.cache_name().to_string(),
                request_size: 0,
                response_size: 0,
                code: None,
                duration: Duration::ZERO,
            },
        })
    }
}

struct MetricsHandler {
    stopwatch: Stopwatch,
    on_record: Arc<RecordFn>,
    record: CallRecord,
}

impl CallHandler for MetricsHandler {
    fn on_outgoing_body(&mut self, body: Bytes) -> BoxFuture<'_, Result<Bytes, HookError>> {
        self.record.request_size = body.len();
        Box::pin(std::future::ready(Ok(body)))
    }

    fn on_incoming_body(&mut self, body: Bytes) -> BoxFuture<'_, Result<Bytes, HookError>> {
        self.record.response_size = body.len();
        Box::pin(std::future::ready(Ok(body)))
    }

    fn on_incoming_status(&mut self, status: Status) -> BoxFuture<'_, Result<Status, HookError>> {
        self.record.code = status.code();
        self.record.duration = self.stopwatch.elapsed();
        (self.on_record)(&self.record);
        Box::pin(std::future::ready(Ok(status)))
    }
}
