// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Standard headers attached to outgoing calls.
//!
//! Every call carries the credential and the target cache name. The client
//! identification pair is carried by the first attempt a dispatcher hands to
//! a connection.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

use stashwire_types::Metadata;

/// Metadata name of the credential header.
pub const AUTHORIZATION: &str = "authorization";
/// Metadata name of the target cache header.
pub const CACHE: &str = "cache";
/// Metadata name of the client identification header.
pub const AGENT: &str = "agent";
/// Metadata name of the runtime identification header.
pub const RUNTIME_VERSION: &str = "runtime-version";

/// Default value of the [`AGENT`] header.
pub const DEFAULT_AGENT: &str = concat!("stashwire-rust:", env!("CARGO_PKG_VERSION"));
/// Default value of the [`RUNTIME_VERSION`] header.
pub const DEFAULT_RUNTIME_VERSION: &str = concat!("rust:", env!("CARGO_PKG_RUST_VERSION"));

/// Authentication token sent with every call.
///
/// The token is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps an authentication token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Attaches the standard headers to outgoing calls.
///
/// [`AUTHORIZATION`] and [`CACHE`] are attached to every call by
/// [`attach`][Self::attach]. [`AGENT`] and [`RUNTIME_VERSION`] are attached by
/// [`attach_identification`][Self::attach_identification] to the first attempt
/// only, which the dispatcher calls right before handing an attempt to a
/// connection. Each dispatcher owns its own injector.
///
/// # Examples
///
/// ```
/// use stashwire::headers::{AGENT, CACHE, HeaderInjector};
/// use stashwire_types::Metadata;
///
/// let injector = HeaderInjector::new("token");
///
/// let mut first = Metadata::new();
/// injector.attach(&mut first, "orders");
/// assert_eq!(first.get(CACHE), Some("orders"));
/// assert!(!first.contains_key(AGENT));
///
/// assert!(injector.attach_identification(&mut first));
/// assert!(first.contains_key(AGENT));
///
/// let mut second = Metadata::new();
/// injector.attach(&mut second, "orders");
/// assert!(!injector.attach_identification(&mut second));
/// assert!(!second.contains_key(AGENT));
/// ```
pub struct HeaderInjector {
    credential: Credential,
    agent: String,
    runtime_version: String,
    first_call_sent: AtomicBool,
}

impl Debug for HeaderInjector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderInjector")
            .field("credential", &self.credential)
            .field("agent", &self.agent)
            .field("runtime_version", &self.runtime_version)
            .field("first_call_sent", &self.first_call_sent.load(Ordering::Relaxed))
            .finish()
    }
}

impl HeaderInjector {
    /// Creates an injector with the default agent and runtime identification.
    pub fn new(credential: impl Into<Credential>) -> Self {
        Self {
            credential: credential.into(),
            agent: DEFAULT_AGENT.to_string(),
            runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
            first_call_sent: AtomicBool::new(false),
        }
    }

    /// Overrides the [`AGENT`] header value.
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// Overrides the [`RUNTIME_VERSION`] header value.
    #[must_use]
    pub fn with_runtime_version(mut self, runtime_version: impl Into<String>) -> Self {
        self.runtime_version = runtime_version.into();
        self
    }

    /// Attaches the headers of one logical call for `cache_name`.
    ///
    /// Existing entries with the same names are replaced.
    pub fn attach(&self, metadata: &mut Metadata, cache_name: &str) {
        metadata.set(AUTHORIZATION, self.credential.expose());
        metadata.set(CACHE, cache_name);
    }

    /// Attaches [`AGENT`] and [`RUNTIME_VERSION`] if no attempt carried them yet.
    ///
    /// Returns `true` when the headers were attached. Call this only when the
    /// metadata is about to be sent.
    pub fn attach_identification(&self, metadata: &mut Metadata) -> bool {
        // The flag flips exactly once, so only one caller ever observes `false`.
        if self.first_call_sent.swap(true, Ordering::AcqRel) {
            return false;
        }

        metadata.set(AGENT, self.agent.as_str());
        metadata.set(RUNTIME_VERSION, self.runtime_version.as_str());
        true
    }

    /// Returns `true` once the identification headers were sent.
    #[must_use]
    pub fn first_call_sent(&self) -> bool {
        self.first_call_sent.load(Ordering::Acquire)
    }
}
