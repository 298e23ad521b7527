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

//! Defines the `Marked` enum for representing stored values and tombstones.
//!
//! A scan reads raw entries from the key-value engine. A deleted row is kept as a
//! tombstone so that it can take part in cross-region conflict resolution; scans only
//! filter them out.

use serde::Deserialize;
use serde::Serialize;

/// A versioned value that can be either a normal value or a tombstone.
///
/// # Sequence Numbers
///
/// `internal_seq` is the version assigned by the store when the entry was written. A
/// tombstone has one too: it is the version of the delete.
///
/// # Examples
///
/// ```
/// use table_scan::Marked;
///
/// let normal = Marked::new_normal(1, vec![1, 2, 3]);
/// let tombstone = Marked::<Vec<u8>>::new_tombstone(2);
///
/// assert!(!normal.is_tombstone());
/// assert!(tombstone.is_tombstone());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Marked<T = Vec<u8>> {
    /// A deleted row.
    TombStone { internal_seq: u64 },

    /// A live row.
    Normal { internal_seq: u64, value: T },
}

impl<T> Marked<T> {
    pub fn new_normal(internal_seq: u64, value: T) -> Self {
        Marked::Normal {
            internal_seq,
            value,
        }
    }

    pub fn new_tombstone(internal_seq: u64) -> Self {
        Marked::TombStone { internal_seq }
    }

    pub fn internal_seq(&self) -> u64 {
        match self {
            Marked::TombStone { internal_seq } => *internal_seq,
            Marked::Normal { internal_seq, .. } => *internal_seq,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Marked::TombStone { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Marked::TombStone { .. } => None,
            Marked::Normal { value, .. } => Some(value),
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Marked::TombStone { .. } => None,
            Marked::Normal { value, .. } => Some(value),
        }
    }

    /// Transform the value, keeping the sequence number and the tombstone state.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Marked<U> {
        match self {
            Marked::TombStone { internal_seq } => Marked::TombStone { internal_seq },
            Marked::Normal {
                internal_seq,
                value,
            } => Marked::Normal {
                internal_seq,
                value: f(value),
            },
        }
    }

    /// Return the one written last. A tombstone wins over a normal value of the same
    /// sequence number.
    pub fn max(a: Self, b: Self) -> Self {
        if (b.internal_seq(), b.is_tombstone()) > (a.internal_seq(), a.is_tombstone()) {
            b
        } else {
            a
        }
    }
}
