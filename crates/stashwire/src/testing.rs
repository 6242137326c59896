// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use layered::Service;
use parking_lot::Mutex;

use crate::{Channel, ChannelFactory, ConnectError, ConnectOptions, IncomingReply, OutgoingCall};

/// What a fake channel does with the next attempt.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Reply(IncomingReply),
    Stall,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<VecDeque<Scripted>>,
    sent: Mutex<Vec<(usize, OutgoingCall)>>,
    connects: AtomicUsize,
    fail_next: AtomicUsize,
    fail_at: Mutex<Vec<usize>>,
    closed: Mutex<Vec<usize>>,
}

/// Opens [`FakeChannel`]s that answer from a shared script.
///
/// Once the script is exhausted every attempt succeeds with an empty body.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeFactory {
    shared: Arc<Shared>,
}

impl FakeFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, step: Scripted) -> &Self {
        self.shared.script.lock().push_back(step);
        self
    }

    pub(crate) fn reply(&self, reply: IncomingReply) -> &Self {
        self.push(Scripted::Reply(reply))
    }

    pub(crate) fn fail_next(&self, count: usize) {
        self.shared.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fails the connect attempt with the given zero-based index.
    pub(crate) fn fail_at(&self, attempt: usize) {
        self.shared.fail_at.lock().push(attempt);
    }

    /// Ids of closed channels, in closing order.
    pub(crate) fn closed(&self) -> Vec<usize> {
        self.shared.closed.lock().clone()
    }

    /// Number of connect attempts, failed ones included.
    pub(crate) fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Attempts received so far, tagged with the id of the channel that sent them.
    pub(crate) fn sent(&self) -> Vec<(usize, OutgoingCall)> {
        self.shared.sent.lock().clone()
    }
}

impl ChannelFactory for FakeFactory {
    type Channel = FakeChannel;

    fn connect(&self, _options: &ConnectOptions) -> Result<FakeChannel, ConnectError> {
        let id = self.shared.connects.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
            || self.shared.fail_at.lock().contains(&id);
        if should_fail {
            return Err(ConnectError::from_message("scripted connect failure"));
        }

        Ok(FakeChannel {
            id,
            shared: Arc::clone(&self.shared),
            closed: AtomicUsize::new(0),
        })
    }
}

#[derive(Debug)]
pub(crate) struct FakeChannel {
    id: usize,
    shared: Arc<Shared>,
    closed: AtomicUsize,
}

impl FakeChannel {
    pub(crate) fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Service<OutgoingCall> for FakeChannel {
    type Out = IncomingReply;

    async fn execute(&self, call: OutgoingCall) -> IncomingReply {
        self.shared.sent.lock().push((self.id, call));
        let step = self.shared.script.lock().pop_front();

        match step {
            Some(Scripted::Reply(reply)) => reply,
            Some(Scripted::Stall) => std::future::pending().await,
            None => IncomingReply::ok(bytes::Bytes::new()),
        }
    }
}

impl Channel for FakeChannel {
    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.shared.closed.lock().push(self.id);
    }
}
