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

//! The paging state machine shared by every scan surface.
//!
//! A [`Cursor`] holds the mutable state of one scan. It never performs I/O itself: the
//! iterator that owns it asks for the next [`ReadRequest`], executes it in its own way and
//! feeds the outcome back with [`Cursor::apply`] or [`Cursor::fail`].
//!
//! ```text
//! Initializing --major-complete--> SinglePartition(p) --!more--> Exhausted
//!      |
//!      +--otherwise--> AllPartitions(1) --!more--> AllPartitions(2) ... --> Exhausted
//!
//! any state --fail/close--> Closed(error?)
//! ```

use std::collections::VecDeque;

use log::debug;
use log::warn;

use crate::error::ScanError;
use crate::scan::config::ScanConfig;
use crate::scan::request::ReadRequest;
use crate::scan::request::ReadResult;
use crate::scan::request::ScanRecord;
use crate::scan::token::ContinuationToken;
use crate::scan::topology::PartitionId;

#[derive(Debug, Clone)]
pub(crate) enum ScanState {
    Initializing,
    SinglePartition { partition: PartitionId },
    AllPartitions { partition: PartitionId },
    Exhausted,
    /// Closed by the caller, or by the error that made the scan fail.
    Closed(Option<ScanError>),
}

#[derive(Debug)]
pub(crate) struct Cursor {
    state: ScanState,

    /// Position in the current partition to continue after.
    resume_key: Option<Vec<u8>>,

    buffer: VecDeque<ScanRecord>,

    read_kb: u64,
    write_kb: u64,
}

impl Cursor {
    pub(crate) fn new() -> Self {
        Self {
            state: ScanState::Initializing,
            resume_key: None,
            buffer: VecDeque::new(),
            read_kb: 0,
            write_kb: 0,
        }
    }

    /// A cursor that continues where `token` was produced.
    pub(crate) fn resume_from(
        config: &ScanConfig,
        token: &ContinuationToken,
    ) -> Result<Self, ScanError> {
        let p = token.partition;

        let state = match config.single_partition() {
            Some(routed) if routed == p => ScanState::SinglePartition { partition: p },
            Some(routed) => {
                return Err(ScanError::InvalidContinuationToken(format!(
                    "token is for partition {}, but the key routes to partition {}",
                    p, routed
                )));
            }
            None if config.topology().contains(p) => ScanState::AllPartitions { partition: p },
            None => {
                return Err(ScanError::InvalidContinuationToken(format!(
                    "partition {} is not in 1..={}",
                    p,
                    config.topology().partitions()
                )));
            }
        };

        debug!("Cursor::resume_from: {:?}", token);

        Ok(Self {
            state,
            resume_key: token.resume_key.clone(),
            ..Self::new()
        })
    }

    fn route(&mut self, config: &ScanConfig) {
        if !matches!(self.state, ScanState::Initializing) {
            return;
        }

        self.state = match config.single_partition() {
            Some(partition) => ScanState::SinglePartition { partition },
            None => ScanState::AllPartitions { partition: 1 },
        };

        debug!(
            "Cursor::route: table={} key={} state={:?}",
            config.table(),
            config.target_key().key,
            self.state
        );
    }

    pub(crate) fn partition(&self) -> Option<PartitionId> {
        match self.state {
            ScanState::SinglePartition { partition } => Some(partition),
            ScanState::AllPartitions { partition } => Some(partition),
            _ => None,
        }
    }

    /// The request that fetches the next batch, or `None` if there is nothing more to
    /// read.
    pub(crate) fn next_request(
        &mut self,
        config: &ScanConfig,
        keys_only: bool,
    ) -> Option<ReadRequest> {
        self.route(config);
        let partition = self.partition()?;
        Some(config.request(partition, self.resume_key.clone(), keys_only))
    }

    /// Buffer the records of a completed request and advance.
    pub(crate) fn apply(&mut self, config: &ScanConfig, result: ReadResult) {
        let Some(partition) = self.partition() else {
            warn!(
                "Cursor::apply: discard result of {} records in state {:?}",
                result.records.len(),
                self.state
            );
            return;
        };

        self.read_kb += u64::from(result.read_kb);
        self.write_kb += u64::from(result.write_kb);

        let resume_key = result.resume_key().map(|k| k.to_vec());
        let include_tombstones = config.options().include_tombstones;

        self.buffer.extend(
            result
                .records
                .into_iter()
                .filter(|r| include_tombstones || !r.is_tombstone()),
        );

        if result.more && resume_key.is_some() {
            self.resume_key = resume_key;
            return;
        }

        if result.more {
            warn!(
                "Cursor::apply: partition {} reports more records but returned none; moving on",
                partition
            );
        }

        self.finish_partition(config);
    }

    fn finish_partition(&mut self, config: &ScanConfig) {
        self.resume_key = None;

        let last = config.topology().partitions();
        self.state = match self.state {
            ScanState::AllPartitions { partition } if partition < last => {
                ScanState::AllPartitions {
                    partition: partition + 1,
                }
            }
            _ => ScanState::Exhausted,
        };

        debug!("Cursor::finish_partition: next state {:?}", self.state);
    }

    pub(crate) fn fail(&mut self, error: ScanError) {
        debug!("Cursor::fail: {}", error);
        self.buffer.clear();
        self.state = ScanState::Closed(Some(error));
    }

    /// Close the cursor. An error that closed it before is kept.
    ///
    /// Returns `false` if it was already closed.
    pub(crate) fn close(&mut self) -> bool {
        if matches!(self.state, ScanState::Closed(_)) {
            return false;
        }
        self.buffer.clear();
        self.state = ScanState::Closed(None);
        true
    }

    pub(crate) fn pop(&mut self) -> Option<ScanRecord> {
        self.buffer.pop_front()
    }

    pub(crate) fn error(&self) -> Option<&ScanError> {
        match &self.state {
            ScanState::Closed(e) => e.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.state, ScanState::Closed(_))
    }

    /// Nothing is buffered and nothing is left to read.
    pub(crate) fn is_exhausted(&self) -> bool {
        matches!(self.state, ScanState::Exhausted) && self.buffer.is_empty()
    }

    /// Whether the cursor is at the start of a partition of an all-partition scan, or
    /// anywhere in a single-partition scan.
    pub(crate) fn at_token_boundary(&self) -> bool {
        match self.state {
            ScanState::AllPartitions { .. } => self.resume_key.is_none(),
            _ => true,
        }
    }

    pub(crate) fn read_kb(&self) -> u64 {
        self.read_kb
    }

    pub(crate) fn write_kb(&self) -> u64 {
        self.write_kb
    }

    /// Where a later call continues, or `None` if the scan is complete.
    ///
    /// Only meaningful when nothing is buffered.
    pub(crate) fn continuation(&self) -> Option<ContinuationToken> {
        let partition = self.partition()?;
        Some(ContinuationToken {
            partition,
            resume_key: self.resume_key.clone(),
        })
    }
}
