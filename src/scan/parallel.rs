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

//! Parallel scan of all partitions, merged into one ordered stream.
//!
//! Every partition is paged by its own stream, resuming mid-partition with the resume
//! key of the last record received. At most `max_concurrent_requests` reads are in
//! flight at a time. The partition streams are merged by a caller-supplied total order.
//! The merged stream is closed by the first error of any partition.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::future;
use futures_util::stream;
use futures_util::StreamExt;
use log::debug;
use log::warn;
use stream_more::KMerge;
use tokio::sync::Semaphore;

use crate::error::ScanError;
use crate::scan::config::ScanConfig;
use crate::scan::converter::ResultConverter;
use crate::scan::executor::AsyncReadExecutor;
use crate::scan::request::ScanRecord;
use crate::scan::topology::PartitionId;
use crate::util;
use crate::ScanResultStream;

type ScanResult<T> = Result<T, ScanError>;

/// A total order over scan results.
pub type OrderFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Scan every partition the key may be in, concurrently, and merge the results by
/// `order`.
///
/// Within a partition results arrive in store-key order, so `order` must agree with
/// store-key order for the merged stream to be sorted. The first error, from whichever
/// partition, is yielded to the caller as the last item of the stream.
pub fn parallel_scan<C>(
    config: Arc<ScanConfig>,
    executor: Arc<dyn AsyncReadExecutor>,
    converter: Arc<C>,
    order: OrderFn<C::Output>,
) -> ScanResultStream<C::Output>
where
    C: ResultConverter + 'static,
{
    let partitions: Vec<PartitionId> = match config.single_partition() {
        Some(p) => vec![p],
        None => config.topology().partition_ids().collect(),
    };

    let limit = config.options().max_concurrent_requests.max(1);
    let semaphore = Arc::new(Semaphore::new(limit));

    debug!(
        "parallel_scan: table={} partitions={:?} max_concurrent_requests={}",
        config.table(),
        partitions,
        limit
    );

    let first_before = move |a: &ScanResult<C::Output>, b: &ScanResult<C::Output>| {
        util::by_order(order.as_ref(), a, b)
    };
    let mut kmerge = KMerge::by(first_before);

    for partition in partitions {
        let scan = PartitionScan {
            config: config.clone(),
            executor: executor.clone(),
            converter: converter.clone(),
            semaphore: semaphore.clone(),
            partition,
            resume_key: None,
            done: false,
            buffer: VecDeque::new(),
        };
        kmerge = kmerge.merge(scan.into_stream());
    }

    // Stop after the first error: partitions still running must not yield more results.
    kmerge
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            if let Err(e) = &item {
                debug!("parallel_scan: closed by error: {}", e);
                *failed = true;
            }
            future::ready(Some(item))
        })
        .boxed()
}

struct PartitionScan<C> {
    config: Arc<ScanConfig>,
    executor: Arc<dyn AsyncReadExecutor>,
    converter: Arc<C>,
    semaphore: Arc<Semaphore>,
    partition: PartitionId,
    resume_key: Option<Vec<u8>>,

    /// The partition has no more records to read.
    done: bool,

    buffer: VecDeque<ScanRecord>,
}

impl<C> PartitionScan<C>
where C: ResultConverter + 'static
{
    fn into_stream(self) -> ScanResultStream<C::Output> {
        stream::unfold(self, |mut s| async move {
            let item = s.next_item().await?;
            Some((item, s))
        })
        .boxed()
    }

    async fn next_item(&mut self) -> Option<Result<C::Output, ScanError>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                match self.converter.convert(&self.config, record) {
                    Ok(Some(item)) => return Some(Ok(item)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.stop();
                        return Some(Err(e));
                    }
                }
            }

            if self.done {
                return None;
            }

            if let Err(e) = self.fetch().await {
                self.stop();
                return Some(Err(e));
            }
        }
    }

    async fn fetch(&mut self) -> Result<(), ScanError> {
        let request = self.config.request(
            self.partition,
            self.resume_key.clone(),
            self.converter.keys_only(),
        );

        let result = {
            let _permit = self.semaphore.acquire().await.map_err(|_| ScanError::Closed)?;
            self.executor.execute_read(request).await?
        };

        let resume_key = result.resume_key().map(|k| k.to_vec());
        match (result.more, resume_key) {
            (true, Some(k)) => self.resume_key = Some(k),
            (more, _) => {
                if more {
                    warn!(
                        "parallel_scan: partition {} reports more records but returned none",
                        self.partition
                    );
                }
                self.done = true;
            }
        }

        let include_tombstones = self.config.options().include_tombstones;
        self.buffer.extend(
            result
                .records
                .into_iter()
                .filter(|r| include_tombstones || !r.is_tombstone()),
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.done = true;
        self.buffer.clear();
    }
}
