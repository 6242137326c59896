// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Method paths of the cache service.
//!
//! A method path identifies the remote procedure a call targets, e.g.
//! `/cache_client.Scs/Get`. Only the paths the retry eligibility rules need
//! to tell apart are listed here.

/// Looks up a single key.
pub const GET: &str = "/cache_client.Scs/Get";
/// Stores a single key.
pub const SET: &str = "/cache_client.Scs/Set";
/// Removes a single key.
pub const DELETE: &str = "/cache_client.Scs/Delete";
/// Stores a key only when it is absent.
pub const SET_IF_NOT_EXISTS: &str = "/cache_client.Scs/SetIfNotExists";
/// Adds to a numeric value.
pub const INCREMENT: &str = "/cache_client.Scs/Increment";

/// Looks up fields of a dictionary.
pub const DICTIONARY_GET: &str = "/cache_client.Scs/DictionaryGet";
/// Fetches a whole dictionary.
pub const DICTIONARY_FETCH: &str = "/cache_client.Scs/DictionaryFetch";
/// Stores fields of a dictionary.
pub const DICTIONARY_SET: &str = "/cache_client.Scs/DictionarySet";
/// Adds to a numeric dictionary field.
pub const DICTIONARY_INCREMENT: &str = "/cache_client.Scs/DictionaryIncrement";
/// Removes fields of a dictionary.
pub const DICTIONARY_DELETE: &str = "/cache_client.Scs/DictionaryDelete";

/// Fetches a whole set.
pub const SET_FETCH: &str = "/cache_client.Scs/SetFetch";
/// Adds elements to a set.
pub const SET_UNION: &str = "/cache_client.Scs/SetUnion";
/// Removes elements from a set.
pub const SET_DIFFERENCE: &str = "/cache_client.Scs/SetDifference";

/// Appends to the back of a list.
pub const LIST_PUSH_BACK: &str = "/cache_client.Scs/ListPushBack";
/// Prepends to the front of a list.
pub const LIST_PUSH_FRONT: &str = "/cache_client.Scs/ListPushFront";
/// Removes from the back of a list.
pub const LIST_POP_BACK: &str = "/cache_client.Scs/ListPopBack";
/// Removes from the front of a list.
pub const LIST_POP_FRONT: &str = "/cache_client.Scs/ListPopFront";
/// Appends several values to the back of a list.
pub const LIST_CONCATENATE_BACK: &str = "/cache_client.Scs/ListConcatenateBack";
/// Prepends several values to the front of a list.
pub const LIST_CONCATENATE_FRONT: &str = "/cache_client.Scs/ListConcatenateFront";
/// Fetches a whole list.
pub const LIST_FETCH: &str = "/cache_client.Scs/ListFetch";
/// Returns the length of a list.
pub const LIST_LENGTH: &str = "/cache_client.Scs/ListLength";
/// Removes all occurrences of a value from a list.
pub const LIST_REMOVE: &str = "/cache_client.Scs/ListRemove";

/// Methods that can be repeated without changing the outcome.
///
/// Counter increments, conditional writes and list mutations other than
/// removal are not listed. A repeat after a lost response applies them twice.
pub const IDEMPOTENT: &[&str] = &[
    GET,
    SET,
    DELETE,
    DICTIONARY_GET,
    DICTIONARY_FETCH,
    DICTIONARY_SET,
    DICTIONARY_DELETE,
    SET_FETCH,
    SET_UNION,
    SET_DIFFERENCE,
    LIST_FETCH,
    LIST_LENGTH,
    LIST_REMOVE,
];

/// Returns the short method name of a path, e.g. `Get` for `/cache_client.Scs/Get`.
#[must_use]
pub fn short_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
