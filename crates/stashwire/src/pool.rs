// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tick::Clock;

use crate::{ChannelFactory, ConnectError, ConnectOptions, IdleRefreshingChannel};

/// A fixed set of connections handed out in round-robin order.
///
/// All connections are opened eagerly. The pool never grows or shrinks and
/// its cursor always holds a valid index. Dropping the pool closes every
/// connection once.
pub struct ChannelPool<F: ChannelFactory> {
    connections: Vec<IdleRefreshingChannel<F>>,
    cursor: AtomicUsize,
}

impl<F: ChannelFactory> Debug for ChannelPool<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPool")
            .field("size", &self.connections.len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

impl<F: ChannelFactory> ChannelPool<F> {
    /// Opens `size` connections through `factory`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConnectError`] encountered. Connections opened
    /// before the failure are closed.
    pub fn connect(
        size: NonZero<usize>,
        factory: Arc<F>,
        clock: &Clock,
        max_idle: Duration,
        max_session_memory_mb: Option<u32>,
    ) -> Result<Self, ConnectError> {
        let connections = (0..size.get())
            .map(|slot| {
                IdleRefreshingChannel::connect(
                    Arc::clone(&factory),
                    ConnectOptions::new(slot, max_session_memory_mb),
                    clock,
                    max_idle,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            connections,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Returns the connection under the cursor and advances the cursor.
    pub fn next_connection(&self) -> &IdleRefreshingChannel<F> {
        let len = self.connections.len();
        let index = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| Some((current + 1) % len))
            .unwrap_or_else(|current| current);

        &self.connections[index]
    }

    /// The number of connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Always `false`: a pool holds at least one connection.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use tick::ClockControl;

    use super::*;
    use crate::testing::FakeFactory;

    fn pool(size: usize, factory: &Arc<FakeFactory>) -> ChannelPool<FakeFactory> {
        let clock = ClockControl::new().to_clock();
        ChannelPool::connect(NonZero::new(size).unwrap(), Arc::clone(factory), &clock, Duration::from_secs(60), Some(64)).unwrap()
    }

    #[test]
    fn round_robin_order() {
        let factory = Arc::new(FakeFactory::new());
        let pool = pool(3, &factory);

        let slots: Vec<_> = (0..7).map(|_| pool.next_connection().options().slot).collect();

        assert_eq!(slots, [0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(pool.len(), 3);
        assert!(!pool.is_empty());
    }

    #[test]
    fn single_connection_pool() {
        let factory = Arc::new(FakeFactory::new());
        let pool = pool(1, &factory);

        for _ in 0..5 {
            assert_eq!(pool.next_connection().options().slot, 0);
        }
    }

    #[test]
    fn opens_every_connection_eagerly() {
        let factory = Arc::new(FakeFactory::new());
        let pool = pool(4, &factory);

        assert_eq!(factory.connects(), 4);
        assert_eq!(pool.next_connection().options().max_session_memory_mb, Some(64));
    }

    #[test]
    fn connect_failure_is_returned() {
        let factory = Arc::new(FakeFactory::new());
        factory.fail_next(1);
        let clock = ClockControl::new().to_clock();

        let result = ChannelPool::connect(NonZero::new(2).unwrap(), factory, &clock, Duration::from_secs(1), None);

        assert!(result.is_err());
    }

    #[test]
    fn partial_connect_closes_opened_connections() {
        let factory = Arc::new(FakeFactory::new());
        factory.fail_at(2);
        let clock = ClockControl::new().to_clock();

        let result = ChannelPool::connect(NonZero::new(3).unwrap(), Arc::clone(&factory), &clock, Duration::from_secs(1), None);

        assert!(result.is_err());
        assert_eq!(factory.connects(), 3);
        assert_eq!(factory.closed(), [0, 1]);
    }

    #[test]
    fn drop_closes_every_connection_once() {
        let factory = Arc::new(FakeFactory::new());
        let pool = pool(3, &factory);
        pool.next_connection().get_handle().unwrap();
        assert!(factory.closed().is_empty());

        drop(pool);

        assert_eq!(factory.closed(), [0, 1, 2]);
    }

    #[test]
    fn concurrent_selection_stays_balanced() {
        let factory = Arc::new(FakeFactory::new());
        let pool = Arc::new(pool(4, &factory));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || (0..100).map(|_| pool.next_connection().options().slot).collect::<Vec<_>>())
            })
            .collect();

        let mut counts = [0_usize; 4];
        for handle in handles {
            for slot in handle.join().unwrap() {
                counts[slot] += 1;
            }
        }

        assert_eq!(counts, [100; 4]);
        assert!(format!("{pool:?}").contains("size: 4"));
    }
}
