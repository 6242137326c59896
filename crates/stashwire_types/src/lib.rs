// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Wire vocabulary of the stashwire cache client.
//!
//! This crate holds the types every layer of the client agrees on:
//!
//! - [`StatusCode`] and [`Status`]: the status taxonomy reported by the transport.
//! - [`Metadata`]: the ordered, case-insensitive multimap carried by calls.
//! - [`CacheError`] and [`ErrorKind`]: the closed set of failures surfaced to callers.
//! - [`map_status`]: the total mapping from a status to a [`CacheError`].
//! - [`CacheResponse`]: the hit, miss, success or error outcome of a cache operation.
//!
//! # Error Mapping
//!
//! ```
//! use stashwire_types::{ErrorKind, Metadata, StatusCode, map_raw_status, map_status};
//!
//! let error = map_status(Some(StatusCode::FailedPrecondition), "bad ttl", Metadata::new());
//! assert_eq!(error.kind(), ErrorKind::InvalidArgument);
//!
//! // Codes outside the known set are never lost, they classify as unknown.
//! let error = map_raw_status(999, "", Metadata::new());
//! assert_eq!(error.kind(), ErrorKind::Unknown);
//! assert_eq!(error.code(), None);
//! ```
//!
//! # Features
//!
//! - `tonic`: conversions from `tonic::Code` and `tonic::Status`.

mod code;
mod error;
mod mapper;
mod metadata;
mod response;
mod status;

#[cfg(feature = "tonic")]
mod tonic_interop;

pub use code::StatusCode;
pub use error::{CacheError, ErrorKind};
pub use mapper::{error_kind, map_raw_status, map_status, map_status_caused_by};
pub use metadata::Metadata;
pub use response::CacheResponse;
pub use status::Status;
