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

//! Turn raw scan records into the items a scan yields.
//!
//! Three converters share one scan engine: [`RowConverter`] decodes full rows,
//! [`KeyConverter`] decodes primary keys without fetching values, and
//! [`KeyValueConverter`] passes raw entries through.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::ScanError;
use crate::key::PrimaryKey;
use crate::key::StoreKey;
use crate::marked::Marked;
use crate::scan::config::ScanConfig;
use crate::scan::request::ScanRecord;
use crate::table::Table;
use crate::table::TableLookup;

pub trait ResultConverter: Send + Sync {
    type Output: Send + Unpin + 'static;

    /// The converter does not read values: requests may skip fetching them.
    fn keys_only(&self) -> bool {
        false
    }

    /// Convert one record. `Ok(None)` drops it.
    fn convert(
        &self,
        config: &ScanConfig,
        record: ScanRecord,
    ) -> Result<Option<Self::Output>, ScanError>;
}

impl<T> ResultConverter for Arc<T>
where T: ResultConverter + ?Sized
{
    type Output = T::Output;

    fn keys_only(&self) -> bool {
        (**self).keys_only()
    }

    fn convert(
        &self,
        config: &ScanConfig,
        record: ScanRecord,
    ) -> Result<Option<Self::Output>, ScanError> {
        (**self).convert(config, record)
    }
}

/// A decoded row, tagged with the table that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub table: Arc<Table>,
    pub primary_key: PrimaryKey,
    pub store_key: StoreKey,

    /// Empty for a tombstone.
    pub value: Vec<u8>,
    pub version: u64,
    pub tombstone: bool,
}

impl Row {
    /// Primary-key order across tables of a hierarchy: an ancestor row sorts before the
    /// rows of its descendants.
    pub fn by_store_key(a: &Row, b: &Row) -> Ordering {
        a.store_key.cmp(&b.store_key)
    }
}

/// A raw entry of the key-value engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: StoreKey,
    pub value: Marked<Vec<u8>>,
}

impl KeyValue {
    pub fn by_key(a: &KeyValue, b: &KeyValue) -> Ordering {
        a.key.cmp(&b.key)
    }
}

/// Decode a record's table and primary key, dropping records the scan does not own.
fn decode_owned(
    lookup: &dyn TableLookup,
    config: &ScanConfig,
    key: &StoreKey,
) -> Result<Option<PrimaryKey>, ScanError> {
    let pk = PrimaryKey::from_store_key(key, lookup)?;
    if !config.owns(pk.table(), key) {
        return Ok(None);
    }
    Ok(Some(pk))
}

/// Decodes full rows.
#[derive(Clone)]
pub struct RowConverter {
    lookup: Arc<dyn TableLookup>,
}

impl RowConverter {
    pub fn new(lookup: Arc<dyn TableLookup>) -> Self {
        Self { lookup }
    }
}

impl ResultConverter for RowConverter {
    type Output = Row;

    fn convert(&self, config: &ScanConfig, record: ScanRecord) -> Result<Option<Row>, ScanError> {
        let Some(pk) = decode_owned(self.lookup.as_ref(), config, &record.key)? else {
            return Ok(None);
        };

        let version = record.version();
        let tombstone = record.is_tombstone();

        Ok(Some(Row {
            table: pk.table().clone(),
            primary_key: pk,
            store_key: record.key,
            value: record.value.into_value().unwrap_or_default(),
            version,
            tombstone,
        }))
    }
}

/// Decodes primary keys only.
#[derive(Clone)]
pub struct KeyConverter {
    lookup: Arc<dyn TableLookup>,
}

impl KeyConverter {
    pub fn new(lookup: Arc<dyn TableLookup>) -> Self {
        Self { lookup }
    }
}

impl ResultConverter for KeyConverter {
    type Output = PrimaryKey;

    fn keys_only(&self) -> bool {
        true
    }

    fn convert(
        &self,
        config: &ScanConfig,
        record: ScanRecord,
    ) -> Result<Option<PrimaryKey>, ScanError> {
        decode_owned(self.lookup.as_ref(), config, &record.key)
    }
}

/// Passes raw entries through, without table decoding or ownership checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueConverter;

impl ResultConverter for KeyValueConverter {
    type Output = KeyValue;

    fn convert(
        &self,
        _config: &ScanConfig,
        record: ScanRecord,
    ) -> Result<Option<KeyValue>, ScanError> {
        Ok(Some(KeyValue {
            key: record.key,
            value: record.value,
        }))
    }
}
