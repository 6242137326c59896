// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use layered::Service;
use stashwire_types::{CacheError, Status, StatusCode, map_status, map_status_caused_by};
use tick::Clock;

use crate::headers::{Credential, HeaderInjector};
use crate::middleware::{HookPipeline, Middleware};
use crate::retry::{FixedCountRetryStrategy, RetryDecision, RetryStrategy};
use crate::telemetry::Telemetry;
use crate::{
    CallAttempt, CallReply, CallRequest, ChannelFactory, ChannelPool, ClientConfig, ConfigError, ConnectError, DeadlineEnforcer,
    IncomingReply, OutgoingCall,
};

/// Builds a [`Dispatcher`].
///
/// # Examples
///
/// ```
/// use stashwire::{ChannelFactory, ClientConfig, Dispatcher, DispatcherBuilder};
/// use tick::Clock;
///
/// fn build<F: ChannelFactory>(factory: F) -> Dispatcher<F> {
///     DispatcherBuilder::new(factory, "token", &Clock::new_tokio())
///         .config(ClientConfig::default().with_pool_size(2).with_max_attempts(5))
///         .build()
///         .expect("connections can be opened")
/// }
/// ```
pub struct DispatcherBuilder<F: ChannelFactory> {
    factory: Arc<F>,
    clock: Clock,
    config: ClientConfig,
    injector: HeaderInjector,
    middlewares: Vec<Arc<dyn Middleware>>,
    retry_strategy: Option<Arc<dyn RetryStrategy>>,
    telemetry: Telemetry,
}

impl<F: ChannelFactory> Debug for DispatcherBuilder<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("config", &self.config)
            .field("injector", &self.injector)
            .field("middlewares", &self.middlewares)
            .field("retry_strategy", &self.retry_strategy)
            .finish_non_exhaustive()
    }
}

impl<F: ChannelFactory> DispatcherBuilder<F> {
    /// Starts a builder that opens connections through `factory` and authenticates with `credential`.
    pub fn new(factory: F, credential: impl Into<Credential>, clock: &Clock) -> Self {
        Self {
            factory: Arc::new(factory),
            clock: clock.clone(),
            config: ClientConfig::default(),
            injector: HeaderInjector::new(credential),
            middlewares: Vec::new(),
            retry_strategy: None,
            telemetry: Telemetry::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a middleware. Outgoing hooks run in registration order, incoming hooks in reverse.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Replaces the retry strategy.
    ///
    /// Without one, a [`FixedCountRetryStrategy`] built from the configured
    /// maximum attempts and backoff is used.
    #[must_use]
    pub fn retry_strategy(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.retry_strategy = Some(Arc::new(strategy));
        self
    }

    /// Overrides the `agent` header sent with the first attempt.
    #[must_use]
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.injector = self.injector.with_agent(agent);
        self
    }

    /// Overrides the `runtime-version` header sent with the first attempt.
    #[must_use]
    pub fn runtime_version(mut self, runtime_version: impl Into<String>) -> Self {
        self.injector = self.injector.with_runtime_version(runtime_version);
        self
    }

    /// Emits retry and call duration metrics through `meter_provider`.
    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn enable_metrics(mut self, meter_provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.telemetry = Telemetry::with_metrics(meter_provider);
        self
    }

    /// Validates the configuration and opens every pooled connection.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the configuration is invalid or a
    /// connection cannot be opened.
    pub fn build(self) -> Result<Dispatcher<F>, BuildError> {
        self.config.validate().map_err(BuildError::config)?;

        let pool_size = NonZero::new(self.config.pool_size())
            .ok_or_else(|| BuildError::config(ConfigError::new("pool size must be at least 1")))?;

        let pool = ChannelPool::connect(
            pool_size,
            self.factory,
            &self.clock,
            self.config.max_idle(),
            self.config.max_session_memory_mb(),
        )
        .map_err(BuildError::connect)?;

        let retry_strategy = self.retry_strategy.unwrap_or_else(|| {
            Arc::new(FixedCountRetryStrategy::new(self.config.max_attempts()).backoff(self.config.backoff()))
        });

        Ok(Dispatcher {
            pool,
            injector: self.injector,
            deadline: DeadlineEnforcer::new(&self.clock, self.config.request_timeout()),
            middlewares: self.middlewares,
            retry_strategy,
            clock: self.clock,
            active: AtomicUsize::new(0),
            telemetry: self.telemetry,
        })
    }
}

/// Executes logical calls against a pool of connections.
///
/// Each call runs the outgoing middleware hooks once, then sends attempts
/// until the retry strategy stops, then runs the incoming hooks once over the
/// final attempt's reply. Attempts pick connections round-robin, so
/// consecutive attempts of one call may use different connections.
///
/// A non-`OK` final status is returned as a [`CacheError`]; failures of the
/// hooks themselves are returned as [`ErrorKind::Client`][stashwire_types::ErrorKind::Client]
/// errors and are never retried.
pub struct Dispatcher<F: ChannelFactory> {
    pool: ChannelPool<F>,
    injector: HeaderInjector,
    deadline: DeadlineEnforcer,
    middlewares: Vec<Arc<dyn Middleware>>,
    retry_strategy: Arc<dyn RetryStrategy>,
    clock: Clock,
    active: AtomicUsize,
    telemetry: Telemetry,
}

impl<F: ChannelFactory> Debug for Dispatcher<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.pool)
            .field("injector", &self.injector)
            .field("deadline", &self.deadline)
            .field("middlewares", &self.middlewares)
            .field("retry_strategy", &self.retry_strategy)
            .field("active", &self.active_requests())
            .finish_non_exhaustive()
    }
}

impl<F: ChannelFactory> Dispatcher<F> {
    /// Starts a [`DispatcherBuilder`].
    pub fn builder(factory: F, credential: impl Into<Credential>, clock: &Clock) -> DispatcherBuilder<F> {
        DispatcherBuilder::new(factory, credential, clock)
    }

    /// Number of logical calls currently in flight.
    #[must_use]
    pub fn active_requests(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Number of pooled connections.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    async fn dispatch(&self, request: CallRequest) -> Result<CallReply, CacheError> {
        let _active = ActiveGuard::enter(&self.active);
        let stopwatch = self.clock.stopwatch();

        let (info, body, mut metadata, caller_deadline) = request.into_parts();
        let mut hooks = HookPipeline::start(&self.middlewares, &info);

        self.injector.attach(&mut metadata, info.cache_name());
        let (metadata, body) = hooks
            .outgoing(metadata, body)
            .await
            .map_err(|error| CacheError::client("outgoing middleware hook failed", error))?;

        let mut number: u32 = 1;
        let (reply, connect_error) = loop {
            let attempt_watch = self.clock.stopwatch();

            let (reply, connect_error) = match self.pool.next_connection().get_handle() {
                Ok(channel) => {
                    let deadline = self.deadline.deadline_for(caller_deadline);
                    let mut attempt_metadata = metadata.clone();
                    self.injector.attach_identification(&mut attempt_metadata);
                    let call = OutgoingCall::new(info.method_cow(), attempt_metadata, body.clone(), deadline).with_attempt(number);
                    (self.deadline.enforce(deadline, channel.execute(call)).await, None)
                }
                Err(error) => (unavailable(&error), Some(error)),
            };

            let code = reply.status().code().unwrap_or(StatusCode::Unknown);
            let attempt = CallAttempt::new(info.method_cow(), number, code, attempt_watch.elapsed());
            let decision = self.retry_strategy.decide(&attempt);
            self.telemetry.report_attempt(&attempt, decision);

            match decision {
                RetryDecision::Stop => break (reply, connect_error),
                RetryDecision::RetryAfter(delay) => {
                    self.clock.delay(delay).await;
                    number = number.saturating_add(1);
                }
            }
        };

        let (reply_metadata, reply_body, status) = reply.into_parts();
        let (reply_metadata, reply_body, status) = hooks
            .incoming(reply_metadata, reply_body, status)
            .await
            .map_err(|error| CacheError::client("incoming middleware hook failed", error))?;

        self.telemetry.report_call(info.method(), status.code(), stopwatch.elapsed());

        if status.is_ok() {
            return Ok(CallReply::new(reply_metadata, reply_body, number));
        }

        let (code, message, status_metadata) = status.into_parts();
        Err(match connect_error {
            Some(cause) => map_status_caused_by(code, message, status_metadata, cause),
            None => map_status(code, message, status_metadata),
        })
    }
}

impl<F: ChannelFactory> Service<CallRequest> for Dispatcher<F> {
    type Out = Result<CallReply, CacheError>;

    async fn execute(&self, request: CallRequest) -> Self::Out {
        self.dispatch(request).await
    }
}

fn unavailable(error: &ConnectError) -> IncomingReply {
    IncomingReply::from_status(Status::unavailable(error.to_string()))
}

/// Counts a call as active until dropped, including when the call future is dropped mid-flight.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self(active)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A [`Dispatcher`] could not be built.
#[ohno::error]
#[display("failed to build the dispatcher: {reason}")]
pub struct BuildError {
    reason: String,
}

impl BuildError {
    fn config(error: ConfigError) -> Self {
        Self::caused_by("invalid configuration", error)
    }

    fn connect(error: ConnectError) -> Self {
        Self::caused_by("a pooled connection could not be opened", error)
    }

    /// A short description of the failure.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use stashwire_types::{ErrorKind, Metadata};
    use tick::ClockControl;
    use tracing_test::traced_test;

    use super::*;
    use crate::headers::{AGENT, AUTHORIZATION, CACHE};
    use crate::methods;
    use crate::testing::{FakeFactory, Scripted};

    static_assertions::assert_impl_all!(Dispatcher<FakeFactory>: Send, Sync, Debug);
    static_assertions::assert_impl_all!(BuildError: Send, Sync, std::error::Error);

    fn dispatcher(factory: &FakeFactory, clock: &Clock, config: ClientConfig) -> Dispatcher<FakeFactory> {
        DispatcherBuilder::new(factory.clone(), "token", clock).config(config).build().unwrap()
    }

    #[tokio::test]
    async fn successful_call_returns_body() {
        let clock = ClockControl::new().to_clock();
        let factory = FakeFactory::new();
        factory.reply(IncomingReply::ok(&b"value"[..]));
        let dispatcher = dispatcher(&factory, &clock, ClientConfig::default());

        let reply = dispatcher
            .execute(CallRequest::new(methods::GET, "orders", &b"key"[..]))
            .await
            .unwrap();

        assert_eq!(reply.body(), &Bytes::from_static(b"value"));
        assert_eq!(reply.attempts(), 1);

        let sent = factory.sent();
        assert_eq!(sent.len(), 1);
        let call = &sent[0].1;
        assert_eq!(call.metadata().get(AUTHORIZATION), Some("token"));
        assert_eq!(call.metadata().get(CACHE), Some("orders"));
        assert!(call.metadata().contains_key(AGENT));
        assert_eq!(call.body(), &Bytes::from_static(b"key"));
        assert_eq!(call.attempt(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn retries_idempotent_unavailable_until_exhausted() {
        let clock = ClockControl::new().to_clock();
        let factory = FakeFactory::new();
        for _ in 0..4 {
            factory.reply(IncomingReply::from_status(Status::unavailable("down")));
        }
        let dispatcher = dispatcher(&factory, &clock, ClientConfig::default().with_max_attempts(3));

        let error = dispatcher
            .execute(CallRequest::new(methods::GET, "orders", Bytes::new()))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ServerUnavailable);
        assert_eq!(error.code(), Some(StatusCode::Unavailable));
        let attempts: Vec<_> = factory.sent().iter().map(|(_, call)| call.attempt()).collect();
        assert_eq!(attempts, [1, 2, 3, 4]);
        assert!(logs_contain("cache.retry.decision=\"retry\""));
        assert!(logs_contain("cache.retry.decision=\"stop\""));
    }

    #[tokio::test]
    async fn retry_recovers_and_reports_attempts() {
        let clock = ClockControl::new().to_clock();
        let factory = FakeFactory::new();
        factory
            .reply(IncomingReply::from_status(Status::internal("boom")))
            .reply(IncomingReply::ok(&b"v"[..]));
        let dispatcher = dispatcher(&factory, &clock, ClientConfig::default());

        let reply = dispatcher
            .execute(CallRequest::new(methods::GET, "orders", Bytes::new()))
            .await
            .unwrap();

        assert_eq!(reply.attempts(), 2);
        assert_eq!(reply.body(), &Bytes::from_static(b"v"));
    }

    #[tokio::test]
    async fn non_idempotent_method_is_not_retried() {
        let clock = ClockControl::new().to_clock();
        let factory = FakeFactory::new();
        factory.reply(IncomingReply::from_status(Status::unavailable("down")));
        let dispatcher = dispatcher(&factory, &clock, ClientConfig::default());

        let error = dispatcher
            .execute(CallRequest::new(methods::INCREMENT, "orders", Bytes::new()))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ServerUnavailable);
        assert_eq!(factory.sent().len(), 1);
    }

    #[tokio::test]
    async fn stalled_attempt_times_out() {
        let clock = ClockControl::new().auto_advance_timers(true).to_clock();
        let factory = FakeFactory::new();
        factory.push(Scripted::Stall);
        let config = ClientConfig::default()
            .with_request_timeout(Duration::from_millis(50))
            .with_max_attempts(0);
        let dispatcher = dispatcher(&factory, &clock, config);

        let error = dispatcher
            .execute(CallRequest::new(methods::GET, "orders", Bytes::new()))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert_eq!(error.code(), Some(StatusCode::DeadlineExceeded));
        assert_eq!(dispatcher.active_requests(), 0);
    }

    #[tokio::test]
    async fn connect_failure_during_refresh_is_unavailable() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let factory = FakeFactory::new();
        let dispatcher = dispatcher(
            &factory,
            &clock,
            ClientConfig::default().with_max_idle(Duration::from_secs(1)).with_max_attempts(0),
        );

        control.advance(Duration::from_secs(2));
        factory.fail_next(1);

        let error = dispatcher
            .execute(CallRequest::new(methods::GET, "orders", Bytes::new()))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ServerUnavailable);
        assert!(std::error::Error::source(&error).is_some());
        assert!(factory.sent().is_empty());
    }

    #[tokio::test]
    async fn identification_waits_for_a_connection() {
        let control = ClockControl::new().auto_advance_timers(true);
        let clock = control.to_clock();
        let factory = FakeFactory::new();
        let dispatcher = dispatcher(&factory, &clock, ClientConfig::default().with_max_idle(Duration::from_secs(1)));

        control.advance(Duration::from_secs(2));
        factory.fail_next(1);

        let reply = dispatcher
            .execute(CallRequest::new(methods::GET, "orders", Bytes::new()))
            .await
            .unwrap();

        assert_eq!(reply.attempts(), 2);
        let sent = factory.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.attempt(), 2);
        assert!(sent[0].1.metadata().contains_key(AGENT));
    }

    #[tokio::test]
    async fn unrecognized_status_is_unknown_and_not_retried() {
        let clock = ClockControl::new().to_clock();
        let factory = FakeFactory::new();
        factory.reply(IncomingReply::from_status(Status::from_raw(99, "odd").with_metadata(
            [("x-trace", "abc")].into_iter().collect::<Metadata>(),
        )));
        let dispatcher = dispatcher(&factory, &clock, ClientConfig::default());

        let error = dispatcher
            .execute(CallRequest::new(methods::GET, "orders", Bytes::new()))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Unknown);
        assert_eq!(error.code(), None);
        assert_eq!(error.metadata().get("x-trace"), Some("abc"));
        assert_eq!(factory.sent().len(), 1);
    }

    #[derive(Debug)]
    struct RetryOnce;

    impl RetryStrategy for RetryOnce {
        fn decide(&self, attempt: &CallAttempt) -> RetryDecision {
            if attempt.number() == 1 {
                RetryDecision::RetryAfter(Duration::ZERO)
            } else {
                RetryDecision::Stop
            }
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn custom_strategy_decisions_are_logged() {
        let clock = ClockControl::new().auto_advance_timers(true).to_clock();
        let factory = FakeFactory::new();
        factory.reply(IncomingReply::from_status(Status::new(StatusCode::NotFound, "missing")));
        let dispatcher = DispatcherBuilder::new(factory.clone(), "t", &clock)
            .retry_strategy(RetryOnce)
            .build()
            .unwrap();

        let reply = dispatcher
            .execute(CallRequest::new(methods::INCREMENT, "orders", Bytes::new()))
            .await
            .unwrap();

        assert_eq!(reply.attempts(), 2);
        assert!(logs_contain("cache.retry.decision=\"retry\""));
        assert!(logs_contain("NOT_FOUND"));
        assert!(logs_contain("cache.retry.decision=\"stop\""));
        assert!(logs_contain("cache.attempt.number=2"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let clock = ClockControl::new().to_clock();

        let error = DispatcherBuilder::new(FakeFactory::new(), "t", &clock)
            .config(ClientConfig::default().with_pool_size(0))
            .build()
            .unwrap_err();

        assert_eq!(error.reason(), "invalid configuration");
    }

    #[test]
    fn connect_failure_fails_build() {
        let clock = ClockControl::new().to_clock();
        let factory = FakeFactory::new();
        factory.fail_next(1);

        let error = DispatcherBuilder::new(factory, "t", &clock).build().unwrap_err();

        assert_eq!(error.reason(), "a pooled connection could not be opened");
    }

    #[test]
    fn builder_options() {
        let clock = ClockControl::new().to_clock();
        let dispatcher = Dispatcher::builder(FakeFactory::new(), "t", &clock)
            .config(ClientConfig::default().with_pool_size(3))
            .agent("custom")
            .runtime_version("rust:custom")
            .retry_strategy(FixedCountRetryStrategy::new(1))
            .build()
            .unwrap();

        assert_eq!(dispatcher.pool_size(), 3);
        assert_eq!(dispatcher.active_requests(), 0);
        let debug = format!("{dispatcher:?}");
        assert!(debug.contains("custom"), "{debug}");
        assert!(!debug.contains("\"t\""), "{debug}");
    }

    #[cfg(feature = "metrics")]
    #[tokio::test]
    async fn metrics_are_recorded() {
        use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};

        let exporter = InMemoryMetricExporter::default();
        let meter_provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();
        let clock = ClockControl::new().to_clock();
        let factory = FakeFactory::new();
        factory.reply(IncomingReply::from_status(Status::unavailable("down")));

        let dispatcher = DispatcherBuilder::new(factory, "t", &clock)
            .enable_metrics(&meter_provider)
            .build()
            .unwrap();
        dispatcher
            .execute(CallRequest::new(methods::GET, "orders", Bytes::new()))
            .await
            .unwrap();

        meter_provider.force_flush().unwrap();
        let metrics = format!("{:?}", exporter.get_finished_metrics().unwrap());

        assert!(metrics.contains("stashwire.retry"), "{metrics}");
        assert!(metrics.contains("stashwire.call.duration"), "{metrics}");
    }
}
