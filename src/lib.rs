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

//! # Table Scan
//!
//! Key-space planning and partitioned scan execution for a table store built on a sorted,
//! partitioned key-value engine.
//!
//! Rows of a table hierarchy are stored under [`StoreKey`]s built from their primary
//! keys. The major path of a store key decides its partition; the minor path orders rows
//! within it. A scan takes a possibly partial primary key or index key, plans the key
//! range it covers, routes to one partition or to all of them, and pages through the
//! results.
//!
//! ## Core Components
//!
//! - [`key`]: primary keys and their store keys
//! - [`index`]: index keys, field ranges and the byte bounds of index scans
//! - [`scan`]: routing, the read executor interfaces and the scan drivers
//! - [`Marked`]: a stored value or a tombstone, with its version
//!
//! ## Usage Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use table_scan::field::FieldDef;
//! use table_scan::field::FieldType;
//! use table_scan::impls::mem_store::MemStore;
//! use table_scan::key::PrimaryKey;
//! use table_scan::scan::KeyValueConverter;
//! use table_scan::scan::ScanConfig;
//! use table_scan::scan::ScanOptions;
//! use table_scan::scan::TableScanIterator;
//! use table_scan::scan::TargetTables;
//! use table_scan::scan::Topology;
//! use table_scan::table::Table;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let uid = FieldDef::new("uid", FieldType::Long);
//!     let users = Table::new_top_level(1, "users", vec![uid], 1);
//!     let topology = Topology::new(4);
//!
//!     let mut store = MemStore::new(topology);
//!     for uid in 0..10i64 {
//!         store.put(&PrimaryKey::new(&users).with("uid", uid)?, vec![])?;
//!     }
//!
//!     // An empty key scans every partition.
//!     let config = ScanConfig::new(
//!         &PrimaryKey::new(&users),
//!         TargetTables::new(&users),
//!         topology,
//!         ScanOptions::default().with_batch_size(3),
//!     )?;
//!
//!     let it = TableScanIterator::new(Arc::new(config), Arc::new(store), KeyValueConverter);
//!     let rows = it.collect::<Result<Vec<_>, _>>()?;
//!     assert_eq!(rows.len(), 10);
//!
//!     Ok(())
//! }
//! ```

use futures_util::stream::BoxStream;

pub mod error;
pub mod field;
pub mod impls;
pub mod index;
pub mod key;
pub mod marked;
pub mod scan;
pub mod table;
pub mod util;

pub use crate::error::KeyError;
pub use crate::error::RangeError;
pub use crate::error::ScanError;
pub use crate::key::PrimaryKey;
pub use crate::key::StoreKey;
pub use crate::marked::Marked;

/// A boxed stream of scan results.
///
/// The stream is 'static so that it can outlive the scan that created it.
pub type ScanResultStream<T> = BoxStream<'static, Result<T, ScanError>>;
