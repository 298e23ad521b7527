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

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::index::Direction;

/// Read consistency required from the store. Passed through to the executor unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consistency {
    /// Read from the partition's leader.
    Absolute,

    /// Any replica will do.
    #[default]
    NoneRequired,

    /// A replica no more than `lag` behind the leader.
    Time { lag: Duration },
}

/// Per-scan options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub direction: Direction,

    /// Max number of records per read request, and per `multi_get` batch.
    pub batch_size: usize,

    /// Max read cost in KB per read request. `0` means unlimited.
    pub max_read_kb: u32,

    pub consistency: Consistency,

    /// Timeout of a single read request.
    pub timeout: Duration,

    /// Return tombstones instead of dropping them.
    pub include_tombstones: bool,

    /// Max in-flight requests of a parallel scan.
    pub max_concurrent_requests: usize,

    /// Fail instead of scanning all partitions when the key does not route to one.
    pub single_partition_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Forward,
            batch_size: 100,
            max_read_kb: 0,
            consistency: Consistency::default(),
            timeout: Duration::from_secs(5),
            include_tombstones: false,
            max_concurrent_requests: 4,
            single_partition_only: false,
        }
    }
}

impl ScanOptions {
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the batch size. A size of 0 is treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_read_kb(mut self, max_read_kb: u32) -> Self {
        self.max_read_kb = max_read_kb;
        self
    }

    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tombstones(mut self, include: bool) -> Self {
        self.include_tombstones = include;
        self
    }

    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n.max(1);
        self
    }

    pub fn with_single_partition_only(mut self, single: bool) -> Self {
        self.single_partition_only = single;
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let o = ScanOptions::default();
        assert_eq!(o.batch_size, 100);
        assert_eq!(o.max_read_kb, 0);
        assert_eq!(o.max_concurrent_requests, 4);
        assert!(!o.include_tombstones);
        assert!(!o.single_partition_only);
    }

    #[test]
    fn test_serde_fills_missing_fields() -> anyhow::Result<()> {
        let o: ScanOptions = serde_json::from_str(
            r#"{"batch_size": 2, "consistency": {"Time": {"lag": {"secs": 1, "nanos": 0}}}}"#,
        )?;

        assert_eq!(
            o,
            ScanOptions::default()
                .with_batch_size(2)
                .with_consistency(Consistency::Time {
                    lag: Duration::from_secs(1)
                })
        );

        let s = serde_json::to_string(&o)?;
        let back: ScanOptions = serde_json::from_str(&s)?;
        assert_eq!(back, o);
        Ok(())
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let o = ScanOptions::default()
            .with_batch_size(0)
            .with_max_concurrent_requests(0);
        assert_eq!(o.batch_size, 1);
        assert_eq!(o.max_concurrent_requests, 1);
    }
}
