// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Abstraction over the RPC transport.

use layered::Service;

use crate::{IncomingReply, OutgoingCall};

/// An open connection to the cache service.
///
/// Sending an attempt is [`Service::execute`]. The returned future resolves
/// once with the reply headers, the optional body and the final status.
/// Transport failures are reported as a reply with a non-`OK` status rather
/// than as a separate error path.
pub trait Channel: Service<OutgoingCall, Out = IncomingReply> {
    /// Releases the connection.
    ///
    /// Called exactly once, when the connection is replaced or its owner is dropped.
    fn close(&self);
}

/// Opens new [`Channel`]s.
///
/// Closures with the signature `Fn(&ConnectOptions) -> Result<C, ConnectError>`
/// implement this trait.
///
/// # Examples
///
/// ```
/// use layered::Service;
/// use stashwire::{Channel, ChannelFactory, ConnectError, ConnectOptions, IncomingReply, OutgoingCall};
/// use stashwire_types::Status;
///
/// struct Offline;
///
/// impl Service<OutgoingCall> for Offline {
///     type Out = IncomingReply;
///
///     async fn execute(&self, _call: OutgoingCall) -> IncomingReply {
///         IncomingReply::from_status(Status::unavailable("offline"))
///     }
/// }
///
/// impl Channel for Offline {
///     fn close(&self) {}
/// }
///
/// let factory = |_: &ConnectOptions| Ok::<_, ConnectError>(Offline);
/// let channel = factory.connect(&ConnectOptions::default()).unwrap();
/// # channel.close();
/// ```
pub trait ChannelFactory: Send + Sync {
    /// The channel type this factory opens.
    type Channel: Channel;

    /// Opens a new channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when the connection cannot be established.
    fn connect(&self, options: &ConnectOptions) -> Result<Self::Channel, ConnectError>;
}

impl<F, C> ChannelFactory for F
where
    F: Fn(&ConnectOptions) -> Result<C, ConnectError> + Send + Sync,
    C: Channel,
{
    type Channel = C;

    fn connect(&self, options: &ConnectOptions) -> Result<C, ConnectError> {
        self(options)
    }
}

/// Parameters passed to a [`ChannelFactory`] for each new connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConnectOptions {
    /// Memory hint for the connection's session, in megabytes.
    pub max_session_memory_mb: Option<u32>,
    /// Index of the pool slot the connection is opened for.
    pub slot: usize,
}

impl ConnectOptions {
    /// Creates options for the given pool slot.
    #[must_use]
    pub fn new(slot: usize, max_session_memory_mb: Option<u32>) -> Self {
        Self {
            max_session_memory_mb,
            slot,
        }
    }
}

/// A connection could not be opened.
#[ohno::error]
#[display("failed to open a connection: {reason}")]
pub struct ConnectError {
    reason: String,
}

impl ConnectError {
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

    /// Why the connection could not be opened.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
