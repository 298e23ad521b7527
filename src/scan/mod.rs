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

//! Partitioned scans of a table hierarchy or a secondary index.
//!
//! A [`ScanConfig`] plans the keys and the routing of a scan. The scan is then driven by
//! one of:
//!
//! - [`TableScanIterator`]: blocking, one request at a time;
//! - [`AsyncTableIterator`]: non-blocking, pushes completion to a listener;
//! - [`parallel_scan`]: all partitions concurrently, merged into one ordered stream;
//! - [`multi_get`]: one page at a time, resumed with a continuation token.
//!
//! Reads are served by a [`ReadExecutor`] or [`AsyncReadExecutor`]. Records are turned into
//! results by a [`ResultConverter`].

pub mod blocking;
pub mod config;
pub mod converter;
pub(crate) mod cursor;
pub mod executor;
pub mod multi_get;
pub mod options;
pub mod parallel;
pub mod push;
pub mod request;
pub mod token;
pub mod topology;


pub use blocking::CloseHandle;
pub use blocking::TableScanIterator;
pub use config::ScanConfig;
pub use config::TargetTables;
pub use converter::KeyConverter;
pub use converter::KeyValue;
pub use converter::KeyValueConverter;
pub use converter::ResultConverter;
pub use converter::Row;
pub use converter::RowConverter;
pub use executor::AsyncReadExecutor;
pub use executor::ReadExecutor;
pub use multi_get::multi_get;
pub use multi_get::MultiGetBatch;
pub use options::Consistency;
pub use options::ScanOptions;
pub use parallel::parallel_scan;
pub use parallel::OrderFn;
pub use push::AsyncTableIterator;
pub use push::Listener;
pub use push::Next;
pub use request::IndexScan;
pub use request::ReadRequest;
pub use request::ReadResult;
pub use request::ScanRecord;
pub use token::ContinuationToken;
pub use topology::PartitionId;
pub use topology::Topology;
