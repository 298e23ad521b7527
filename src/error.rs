// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for key construction, range planning and scan execution.
//!
//! Planning errors ([`KeyError`], [`RangeError`]) are raised before any request is sent.
//! [`ScanError`] is what iterators yield; it is `Clone` so that the error that closed an
//! iterator can be returned again on every later poll.

use std::io;
use std::sync::Arc;

/// Errors building a logical or physical key.
#[derive(Clone, PartialEq, Eq, thiserror::Error, Debug)]
pub enum KeyError {
    /// A primary-key field has no value and partial keys are not allowed.
    #[error("MissingPrimaryKeyField: table {table} requires a value for field '{field}'")]
    MissingPrimaryKeyField { table: String, field: String },

    /// A field is set although an earlier key field is missing.
    #[error("InconsistentPartialKey: field '{field}' is set after missing field '{missing}'")]
    InconsistentPartialKey { missing: String, field: String },

    #[error("UnknownField: '{field}' is not a key field of {owner}")]
    UnknownField { owner: String, field: String },

    #[error("FieldTypeMismatch: field '{field}' expects {expected}, got {actual}")]
    FieldTypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("InvalidToken: can not decode {field_type} from {token:?}")]
    InvalidToken { field_type: String, token: Vec<u8> },

    #[error("InvalidStoreKey: {0}")]
    InvalidStoreKey(String),
}

/// Errors planning the byte bounds of an index scan.
#[derive(Clone, PartialEq, Eq, thiserror::Error, Debug)]
pub enum RangeError {
    /// An exclusive bound has no successor: the range is provably empty.
    ///
    /// Callers should treat this as "no results" rather than as a fault.
    #[error("EmptyRangeAfterIncrement: exclusive bound on '{field}' has no successor")]
    EmptyRangeAfterIncrement { field: String },

    #[error("InvalidFieldRangeField: {0}")]
    InvalidFieldRangeField(String),

    #[error("UnsupportedUntypedFieldType: can not synthesize a bound for a {value_kind} value of '{field}'")]
    UnsupportedUntypedFieldType { field: String, value_kind: String },

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Errors surfaced by scan iterators and `multi_get`.
#[derive(Clone, thiserror::Error, Debug)]
pub enum ScanError {
    #[error("RoutingError: {0}")]
    Routing(String),

    /// Passthrough of a failure from the network client. Not retried.
    #[error("RemoteReadFailure: {0}")]
    RemoteRead(#[source] Arc<io::Error>),

    #[error("InvalidContinuationToken: {0}")]
    InvalidContinuationToken(String),

    #[error("scan iterator is closed")]
    Closed,

    /// The spawner refused to run the task of an asynchronous read.
    #[error("SpawnError: {0}")]
    Spawn(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Range(#[from] RangeError),
}

impl From<io::Error> for ScanError {
    fn from(e: io::Error) -> Self {
        ScanError::RemoteRead(Arc::new(e))
    }
}

impl ScanError {
    pub fn is_remote(&self) -> bool {
        matches!(self, ScanError::RemoteRead(_))
    }
}
