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

//! Paged reads with continuation tokens.

use log::debug;

use crate::error::ScanError;
use crate::scan::config::ScanConfig;
use crate::scan::converter::ResultConverter;
use crate::scan::cursor::Cursor;
use crate::scan::executor::ReadExecutor;
use crate::scan::token::ContinuationToken;

/// One page of a `multi_get`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGetBatch<T> {
    pub items: Vec<T>,

    /// Pass to the next call to continue. `None`: the scan is complete.
    pub continuation: Option<Vec<u8>>,

    pub read_kb: u64,
}

/// Read one page of the scan described by `config`, starting at `continuation`.
///
/// A page ends when the batch size or the read budget of the options is used up. For a
/// key that routes to one partition the page ends right there and the token resumes
/// mid-partition. Otherwise partitions are visited in increasing order, a partition is
/// always read to its end, and the token points at the start of the next partition;
/// such a page may hold more than `batch_size` items.
pub fn multi_get<C>(
    config: &ScanConfig,
    executor: &dyn ReadExecutor,
    converter: &C,
    continuation: Option<&[u8]>,
) -> Result<MultiGetBatch<C::Output>, ScanError>
where
    C: ResultConverter,
{
    let mut cursor = match continuation {
        Some(bytes) => Cursor::resume_from(config, &ContinuationToken::decode(bytes)?)?,
        None => Cursor::new(),
    };

    let options = config.options();
    let batch_size = options.batch_size.max(1);
    let max_read_kb = u64::from(options.max_read_kb);

    let mut items = Vec::new();

    loop {
        while let Some(record) = cursor.pop() {
            if let Some(item) = converter.convert(config, record)? {
                items.push(item);
            }
        }

        if cursor.is_exhausted() {
            break;
        }

        let budget_used =
            items.len() >= batch_size || (max_read_kb > 0 && cursor.read_kb() >= max_read_kb);
        if budget_used && cursor.at_token_boundary() {
            break;
        }

        let Some(mut request) = cursor.next_request(config, converter.keys_only()) else {
            break;
        };

        if config.single_partition().is_some() {
            request.batch_size = batch_size - items.len();
        }

        let result = executor.execute_read(&request)?;
        cursor.apply(config, result);
    }

    let continuation = cursor.continuation().map(|t| t.encode());

    debug!(
        "multi_get: table={} items={} read_kb={} continuation={:?}",
        config.table(),
        items.len(),
        cursor.read_kb(),
        cursor.continuation()
    );

    Ok(MultiGetBatch {
        items,
        continuation,
        read_kb: cursor.read_kb(),
    })
}
