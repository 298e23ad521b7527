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

use std::ops::RangeInclusive;

use serde::Deserialize;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::key::StoreKey;

/// Partitions are numbered from 1.
pub type PartitionId = u32;

/// The fixed partitioning of the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    partitions: u32,
}

impl Topology {
    /// # Panics
    ///
    /// Panics if `partitions` is 0.
    pub fn new(partitions: u32) -> Self {
        assert!(partitions > 0, "a topology needs at least one partition");
        Self { partitions }
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn partition_ids(&self) -> RangeInclusive<PartitionId> {
        1..=self.partitions
    }

    pub fn contains(&self, partition: PartitionId) -> bool {
        self.partition_ids().contains(&partition)
    }

    /// The partition owning every key with the major path of `key`.
    pub fn partition_of(&self, key: &StoreKey) -> PartitionId {
        let h = xxh3_64(&key.major_bytes());
        (h % u64::from(self.partitions)) as PartitionId + 1
    }
}
