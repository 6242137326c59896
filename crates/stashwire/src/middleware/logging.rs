// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use futures_util::future::BoxFuture;
use stashwire_types::Status;
use tick::{Clock, Stopwatch};

use super::{CallHandler, HookError, Middleware};
use crate::CallInfo;

/// Emits a `stashwire.call` event when each logical call settles.
///
/// Successful calls are logged at `DEBUG`, failed calls at `WARN`. The event
/// carries the method, the cache name, the final status and the call duration.
#[derive(Debug, Clone)]
pub struct RequestLogging {
    clock: Clock,
}

impl RequestLogging {
    /// Creates the middleware. Durations are measured with `clock`.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self { clock: clock.clone() }
    }
}

impl Middleware for RequestLogging {
    fn on_new_call(&self, call: &CallInfo) -> Box<dyn CallHandler> {
        Box::new(LoggingHandler {
            method: call.method_cow(),
            cache_name: call.cache_name().to_string(),
            stopwatch: self.clock.stopwatch(),
        })
    }
}

struct LoggingHandler {
    method: Cow<'static, str>,
    cache_name: String,
    stopwatch: Stopwatch,
}

impl CallHandler for LoggingHandler {
    fn on_incoming_status(&mut self, status: Status) -> BoxFuture<'_, Result<Status, HookError>> {
        let elapsed = self.stopwatch.elapsed();
        let code = status.code().map_or("<unrecognized>", |c| c.as_str());

        if status.is_ok() {
            tracing::event!(
                name: "stashwire.call",
                tracing::Level::DEBUG,
                cache.method = %self.method,
                cache.name = %self.cache_name,
                cache.status = code,
                cache.call.duration = elapsed.as_secs_f32(),
            );
        } else {
            tracing::event!(
                name: "stashwire.call",
                tracing::Level::WARN,
                cache.method = %self.method,
                cache.name = %self.cache_name,
                cache.status = code,
                cache.status.message = status.message(),
                cache.call.duration = elapsed.as_secs_f32(),
            );
        }

        Box::pin(std::future::ready(Ok(status)))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use tick::ClockControl;
    use tracing_test::traced_test;

    use super::*;

    #[test]
    #[traced_test]
    fn failed_call_is_logged() {
        let clock = ClockControl::new().to_clock();
        let middleware = RequestLogging::new(&clock);
        let mut handler = middleware.on_new_call(&CallInfo::new("/cache_client.Scs/Get", "orders"));

        let status = block_on(handler.on_incoming_status(Status::unavailable("connection reset"))).unwrap();

        assert_eq!(status, Status::unavailable("connection reset"));
        assert!(logs_contain("cache.method"));
        assert!(logs_contain("/cache_client.Scs/Get"));
        assert!(logs_contain("orders"));
        assert!(logs_contain("UNAVAILABLE"));
        assert!(logs_contain("connection reset"));
    }

    #[test]
    #[traced_test]
    fn successful_call_is_logged() {
        let clock = ClockControl::new().to_clock();
        let mut handler = RequestLogging::new(&clock).on_new_call(&CallInfo::new("/cache_client.Scs/Set", "orders"));

        block_on(handler.on_incoming_status(Status::ok())).unwrap();

        assert!(logs_contain("/cache_client.Scs/Set"));
        assert!(logs_contain("cache.status=\"OK\""));
    }
}
