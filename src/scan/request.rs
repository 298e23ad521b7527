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

//! The request and result types exchanged with a read executor.

use std::sync::Arc;
use std::time::Duration;

use crate::error::RangeError;
use crate::index::Direction;
use crate::index::FieldRange;
use crate::index::IndexDef;
use crate::index::IndexKey;
use crate::index::IndexRange;
use crate::key::StoreKey;
use crate::marked::Marked;
use crate::scan::options::Consistency;
use crate::scan::topology::PartitionId;

/// Scan the entries of a secondary index within planned bounds, instead of the rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexScan {
    index: Arc<IndexDef>,
    range: IndexRange,
}

impl IndexScan {
    pub fn new(index: &Arc<IndexDef>, range: IndexRange) -> Self {
        Self {
            index: index.clone(),
            range,
        }
    }

    /// Plan the bounds of scanning `key`, optionally restricted by `range`.
    pub fn plan(
        key: &IndexKey,
        range: Option<&FieldRange>,
        direction: Direction,
    ) -> Result<Self, RangeError> {
        let planned = IndexRange::plan(key, range, direction)?;
        Ok(Self::new(key.index(), planned))
    }

    pub fn index(&self) -> &Arc<IndexDef> {
        &self.index
    }

    pub fn range(&self) -> &IndexRange {
        &self.range
    }
}

/// One bounded read of one partition.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub partition: PartitionId,

    /// Only rows whose key starts with this key are returned.
    pub parent_key: StoreKey,

    pub index: Option<IndexScan>,

    /// Continue after this position, exclusive, in iteration order.
    ///
    /// It is the [`ScanRecord::resume_key`] of the last record received and opaque to
    /// the scan engine.
    pub resume_key: Option<Vec<u8>>,

    pub direction: Direction,

    /// Max number of records to return.
    pub batch_size: usize,

    /// Stop after reading this many KB. `0` means unlimited.
    pub max_read_kb: u32,

    /// Values are not needed; the executor may return empty values.
    pub keys_only: bool,

    pub consistency: Consistency,
    pub timeout: Duration,
}

/// A raw entry returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub key: StoreKey,
    pub value: Marked<Vec<u8>>,

    /// The executor's position of this record, to resume after it.
    pub resume_key: Vec<u8>,
}

impl ScanRecord {
    pub fn version(&self) -> u64 {
        self.value.internal_seq()
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_tombstone()
    }
}

/// The outcome of one [`ReadRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadResult {
    pub records: Vec<ScanRecord>,

    /// The partition has more records after the last one returned.
    pub more: bool,

    pub read_kb: u32,
    pub write_kb: u32,
}

impl ReadResult {
    /// Where the next request to the same partition continues.
    pub fn resume_key(&self) -> Option<&[u8]> {
        self.records.last().map(|r| r.resume_key.as_slice())
    }
}
