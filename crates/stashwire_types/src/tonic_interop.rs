// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tonic::metadata::KeyAndValueRef;

use crate::{CacheError, Metadata, Status, StatusCode, map_status};

impl From<tonic::Code> for Status {
    fn from(code: tonic::Code) -> Self {
        Self::from_raw(i32::from(code), "")
    }
}

impl From<&tonic::Status> for Status {
    fn from(status: &tonic::Status) -> Self {
        Self::from_raw(i32::from(status.code()), status.message()).with_metadata(ascii_metadata(status.metadata()))
    }
}

impl From<tonic::Status> for CacheError {
    fn from(status: tonic::Status) -> Self {
        map_status(
            StatusCode::from_i32(i32::from(status.code())),
            status.message(),
            ascii_metadata(status.metadata()),
        )
    }
}

// Binary entries and values that are not valid text are skipped.
fn ascii_metadata(map: &tonic::metadata::MetadataMap) -> Metadata {
    map.iter()
        .filter_map(|entry| match entry {
            KeyAndValueRef::Ascii(key, value) => value.to_str().ok().map(|v| (key.as_str().to_string(), v.to_string())),
            KeyAndValueRef::Binary(..) => None,
        })
        .collect()
}
