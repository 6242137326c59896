// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tick::Clock;

use crate::{Channel, ChannelFactory, ConnectError, ConnectOptions};

/// A connection that is transparently replaced after sitting idle too long.
///
/// Staleness is evaluated lazily in [`get_handle`][Self::get_handle]: a
/// connection whose last use is more than `max_idle` ago is replaced by a
/// freshly opened one and the old one is closed. When opening the
/// replacement fails, the error is returned and the stale connection is kept,
/// so the next acquisition tries again.
///
/// Dropping the wrapper closes the connection it currently holds.
pub struct IdleRefreshingChannel<F: ChannelFactory> {
    factory: Arc<F>,
    options: ConnectOptions,
    clock: Clock,
    max_idle: Duration,
    slot: Mutex<Slot<F::Channel>>,
}

struct Slot<C> {
    channel: Arc<C>,
    last_access: Instant,
}

impl<F: ChannelFactory> Debug for IdleRefreshingChannel<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleRefreshingChannel")
            .field("options", &self.options)
            .field("max_idle", &self.max_idle)
            .finish_non_exhaustive()
    }
}

impl<F: ChannelFactory> IdleRefreshingChannel<F> {
    /// Opens the initial connection.
    ///
    /// # Errors
    ///
    /// Returns the factory's [`ConnectError`] when the connection cannot be opened.
    pub fn connect(factory: Arc<F>, options: ConnectOptions, clock: &Clock, max_idle: Duration) -> Result<Self, ConnectError> {
        let channel = factory.connect(&options)?;

        Ok(Self {
            factory,
            options,
            max_idle,
            slot: Mutex::new(Slot {
                channel: Arc::new(channel),
                last_access: clock.instant(),
            }),
            clock: clock.clone(),
        })
    }

    /// Returns the current connection, replacing it first when it has been idle too long.
    ///
    /// # Errors
    ///
    /// Returns the factory's [`ConnectError`] when a stale connection could not be replaced.
    pub fn get_handle(&self) -> Result<Arc<F::Channel>, ConnectError> {
        let now = self.clock.instant();
        let mut slot = self.slot.lock();
        let idle = now.saturating_duration_since(slot.last_access);

        if idle > self.max_idle {
            let replacement = match self.factory.connect(&self.options) {
                Ok(channel) => Arc::new(channel),
                Err(error) => {
                    tracing::event!(
                        name: "stashwire.connection.refresh_failed",
                        tracing::Level::WARN,
                        connection.slot = self.options.slot,
                        connection.idle = idle.as_secs_f32(),
                        error = %error,
                    );
                    return Err(error);
                }
            };

            let stale = std::mem::replace(&mut slot.channel, replacement);
            stale.close();

            tracing::event!(
                name: "stashwire.connection.refresh",
                tracing::Level::INFO,
                connection.slot = self.options.slot,
                connection.idle = idle.as_secs_f32(),
            );
        }

        slot.last_access = now;
        Ok(Arc::clone(&slot.channel))
    }

    /// The slot options this connection is opened with.
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }
}

impl<F: ChannelFactory> Drop for IdleRefreshingChannel<F> {
    fn drop(&mut self) {
        self.slot.get_mut().channel.close();
    }
}
