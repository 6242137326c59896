// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Resilient call dispatch for the stashwire cache client.
//!
//! A [`Dispatcher`] takes logical calls ([`CallRequest`]) and turns them into
//! one or more attempts against a pool of transport connections. Around every
//! call it:
//!
//! - attaches the standard headers ([`headers`]);
//! - runs registered [`middleware`] hooks, outgoing in registration order and
//!   incoming in reverse;
//! - bounds every attempt by a deadline ([`DeadlineEnforcer`]);
//! - retries eligible failures of idempotent methods ([`retry`]);
//! - replaces connections that sat idle for too long ([`IdleRefreshingChannel`]);
//! - spreads attempts over its connections round-robin ([`ChannelPool`]);
//! - converts a failed final status into a [`CacheError`][stashwire_types::CacheError].
//!
//! The transport itself is abstracted by [`ChannelFactory`] and [`Channel`]:
//! any client able to send a request and report a status can plug in.
//!
//! # Quick Start
//!
//! ```
//! use bytes::Bytes;
//! use layered::Service;
//! use stashwire::{Channel, ClientConfig, ConnectOptions, ConnectError, DispatcherBuilder, IncomingReply, OutgoingCall, methods};
//! use tick::Clock;
//!
//! struct Echo;
//!
//! impl Service<OutgoingCall> for Echo {
//!     type Out = IncomingReply;
//!
//!     async fn execute(&self, call: OutgoingCall) -> IncomingReply {
//!         IncomingReply::ok(call.body().clone())
//!     }
//! }
//!
//! impl Channel for Echo {
//!     fn close(&self) {}
//! }
//!
//! # futures::executor::block_on(async {
//! let dispatcher = DispatcherBuilder::new(|_: &ConnectOptions| Ok::<_, ConnectError>(Echo), "token", &Clock::new_frozen())
//!     .config(ClientConfig::default().with_pool_size(2))
//!     .build()?;
//!
//! let reply = dispatcher.execute(stashwire::CallRequest::new(methods::GET, "orders", &b"key"[..])).await?;
//! assert_eq!(reply.body(), &Bytes::from_static(b"key"));
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```
//!
//! # Features
//!
//! - `serde`: `Serialize`/`Deserialize` for [`ClientConfig`] and [`BackoffConfig`].
//! - `metrics`: OpenTelemetry metrics, see [`telemetry`].
//! - `tonic`: conversions from `tonic` statuses in `stashwire_types`.

mod call;
mod config;
mod connection;
mod deadline;
mod dispatcher;
pub mod headers;
pub mod methods;
pub mod middleware;
mod pool;
pub mod retry;
pub mod telemetry;
mod transport;

#[cfg(test)]
mod testing;

pub use call::{CallAttempt, CallInfo, CallReply, CallRequest, IncomingReply, OutgoingCall};
pub use config::{BackoffConfig, ClientConfig, ConfigError};
pub use connection::IdleRefreshingChannel;
pub use deadline::DeadlineEnforcer;
pub use dispatcher::{BuildError, Dispatcher, DispatcherBuilder};
pub use pool::ChannelPool;
pub use retry::Backoff;
pub use transport::{Channel, ChannelFactory, ConnectError, ConnectOptions};
