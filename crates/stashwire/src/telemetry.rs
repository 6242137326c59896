// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Telemetry emitted by the dispatcher.
//!
//! # Logs
//!
//! | Event | Level | When |
//! |---|---|---|
//! | `stashwire.retry` | `WARN` | An attempt failed and will be retried |
//! | `stashwire.retry` | `DEBUG` | An attempt's outcome is final |
//! | `stashwire.connection.refresh` | `INFO` | An idle connection was replaced |
//! | `stashwire.connection.refresh_failed` | `WARN` | An idle connection could not be replaced |
//! | `stashwire.call` | `DEBUG`/`WARN` | A call settled, when [`RequestLogging`][crate::middleware::RequestLogging] is registered |
//!
//! # Metrics
//!
//! With the `metrics` feature and
//! [`DispatcherBuilder::enable_metrics`][crate::DispatcherBuilder::enable_metrics]:
//!
//! - `stashwire.retry` (counter): one per failed attempt, with the method,
//!   the status and the decision as attributes.
//! - `stashwire.call.duration` (histogram, seconds): one per logical call,
//!   with the method and the final status as attributes.

use std::time::Duration;

use stashwire_types::StatusCode;

use crate::CallAttempt;
use crate::retry::RetryDecision;

/// Attribute carrying the method path.
pub const METHOD: &str = "cache.method";
/// Attribute carrying the status code name.
pub const STATUS: &str = "cache.status";
/// Attribute carrying the retry decision, `retry` or `stop`.
pub const RETRY_DECISION: &str = "cache.retry.decision";

#[derive(Debug, Clone, Default)]
pub(crate) struct Telemetry {
    #[cfg(feature = "metrics")]
    retry_counter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg(feature = "metrics")]
    call_duration: Option<opentelemetry::metrics::Histogram<f64>>,
}

impl Telemetry {
    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(meter_provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        let meter = metrics::create_meter(meter_provider);

        Self {
            retry_counter: Some(metrics::create_retry_counter(&meter)),
            call_duration: Some(metrics::create_call_duration_histogram(&meter)),
        }
    }

    /// Reports the decision taken after an attempt. Only failed attempts are counted.
    pub(crate) fn report_attempt(&self, attempt: &CallAttempt, decision: RetryDecision) {
        match decision {
            RetryDecision::RetryAfter(delay) => tracing::event!(
                name: "stashwire.retry",
                tracing::Level::WARN,
                cache.method = attempt.method(),
                cache.status = attempt.code().as_str(),
                cache.retry.decision = decision.as_str(),
                cache.attempt.number = attempt.number(),
                cache.attempt.elapsed = attempt.elapsed().as_secs_f32(),
                cache.retry.delay = delay.as_secs_f32(),
            ),
            RetryDecision::Stop => tracing::event!(
                name: "stashwire.retry",
                tracing::Level::DEBUG,
                cache.method = attempt.method(),
                cache.status = attempt.code().as_str(),
                cache.retry.decision = decision.as_str(),
                cache.attempt.number = attempt.number(),
                cache.attempt.elapsed = attempt.elapsed().as_secs_f32(),
            ),
        }

        #[cfg(feature = "metrics")]
        if let Some(counter) = &self.retry_counter
            && !attempt.code().is_ok()
        {
            counter.add(
                1,
                &[
                    opentelemetry::KeyValue::new(METHOD, attempt.method().to_string()),
                    opentelemetry::KeyValue::new(STATUS, attempt.code().as_str()),
                    opentelemetry::KeyValue::new(RETRY_DECISION, decision.as_str()),
                ],
            );
        }
    }

    /// Reports the duration of a settled logical call.
    #[cfg_attr(
        not(feature = "metrics"),
        expect(unused_variables, clippy::unused_self, reason = "only recorded as a metric")
    )]
    pub(crate) fn report_call(&self, method: &str, code: Option<StatusCode>, duration: Duration) {
        #[cfg(feature = "metrics")]
        if let Some(histogram) = &self.call_duration {
            histogram.record(
                duration.as_secs_f64(),
                &[
                    opentelemetry::KeyValue::new(METHOD, method.to_string()),
                    opentelemetry::KeyValue::new(STATUS, code.map_or("<unrecognized>", StatusCode::as_str)),
                ],
            );
        }
    }
}

#[cfg(feature = "metrics")]
mod metrics {
    use opentelemetry::InstrumentationScope;
    use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};

    const METER_NAME: &str = "stashwire";
    const VERSION: &str = "v0.1.0";
    const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

    pub(super) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
        meter_provider.meter_with_scope(
            InstrumentationScope::builder(METER_NAME)
                .with_version(VERSION)
                .with_schema_url(SCHEMA_URL)
                .build(),
        )
    }

    pub(super) fn create_retry_counter(meter: &Meter) -> Counter<u64> {
        meter
            .u64_counter("stashwire.retry")
            .with_description("Emitted for every failed attempt with the retry decision taken.")
            .with_unit("u64")
            .build()
    }

    pub(super) fn create_call_duration_histogram(meter: &Meter) -> Histogram<f64> {
        meter
            .f64_histogram("stashwire.call.duration")
            .with_description("Duration of logical calls, retries included.")
            .with_unit("s")
            .build()
    }

}
