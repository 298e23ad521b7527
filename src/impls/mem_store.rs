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

//! An in-memory, partitioned store that serves scan requests.
//!
//! [`MemStore`] keeps the rows and index entries of every partition in [`BTreeMap`]s and
//! answers [`ReadRequest`]s the way a storage node would. It is primarily intended for
//! testing and demonstration purposes.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io;
use std::ops::Bound;
use std::sync::Mutex;
use std::sync::PoisonError;

use log::debug;

use crate::error::KeyError;
use crate::index::Direction;
use crate::index::IndexKey;
use crate::key::build_key;
use crate::key::PrimaryKey;
use crate::key::StoreKey;
use crate::marked::Marked;
use crate::scan::executor::AsyncReadExecutor;
use crate::scan::executor::ReadExecutor;
use crate::scan::request::IndexScan;
use crate::scan::request::ReadRequest;
use crate::scan::request::ReadResult;
use crate::scan::request::ScanRecord;
use crate::scan::topology::PartitionId;
use crate::scan::topology::Topology;

#[derive(Debug, Clone, Default)]
struct Partition {
    rows: BTreeMap<StoreKey, Marked>,

    /// Index name to entries. An entry is the serialized index key followed by the
    /// bytes of the primary store key.
    indexes: BTreeMap<String, BTreeMap<Vec<u8>, StoreKey>>,
}

/// A partitioned key-value store in memory.
///
/// Every write gets the next sequence number, which becomes the version of the row.
///
/// # Examples
///
/// ```
/// use table_scan::field::FieldDef;
/// use table_scan::field::FieldType;
/// use table_scan::impls::mem_store::MemStore;
/// use table_scan::key::PrimaryKey;
/// use table_scan::scan::Topology;
/// use table_scan::table::Table;
///
/// let uid = FieldDef::new("uid", FieldType::Long);
/// let users = Table::new_top_level(1, "users", vec![uid], 1);
/// let mut store = MemStore::new(Topology::new(4));
///
/// let key = PrimaryKey::new(&users).with("uid", 5i64).unwrap();
/// store.put(&key, b"alice".to_vec()).unwrap();
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug)]
pub struct MemStore {
    topology: Topology,
    seq: u64,
    partitions: BTreeMap<PartitionId, Partition>,

    /// Partitions whose reads fail.
    failing: BTreeSet<PartitionId>,

    /// Every request received, in arrival order.
    requests: Mutex<Vec<ReadRequest>>,
}

impl MemStore {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            seq: 0,
            partitions: BTreeMap::new(),
            failing: BTreeSet::new(),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// The sequence number of the last write.
    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    /// Number of rows, tombstones included.
    pub fn len(&self) -> usize {
        self.partitions.values().map(|p| p.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a row and return its store key.
    pub fn put(&mut self, key: &PrimaryKey, value: Vec<u8>) -> Result<StoreKey, KeyError> {
        let store_key = build_key(key, false)?.key;
        self.seq += 1;
        let marked = Marked::new_normal(self.seq, value);
        self.put_marked(store_key.clone(), marked);
        Ok(store_key)
    }

    /// Replace a row with a tombstone.
    pub fn delete(&mut self, key: &PrimaryKey) -> Result<StoreKey, KeyError> {
        let store_key = build_key(key, false)?.key;
        self.seq += 1;
        let marked = Marked::new_tombstone(self.seq);
        self.put_marked(store_key.clone(), marked);
        Ok(store_key)
    }

    /// Store an entry as is, for example one replicated from another region.
    ///
    /// The entry with the greater version is kept.
    pub fn put_marked(&mut self, key: StoreKey, marked: Marked) {
        let partition = self.topology.partition_of(&key);
        self.seq = self.seq.max(marked.internal_seq());

        let rows = &mut self.partitions.entry(partition).or_default().rows;
        let kept = match rows.remove(&key) {
            Some(prev) => Marked::max(prev, marked),
            None => marked,
        };

        debug!(
            "MemStore::put_marked: partition={} key={} seq={} tombstone={}",
            partition,
            key,
            kept.internal_seq(),
            kept.is_tombstone()
        );
        rows.insert(key, kept);
    }

    /// Add an entry of `index_key` that refers to the row `row_key`.
    ///
    /// The entry is stored in the partition of the row.
    pub fn put_index_entry(
        &mut self,
        index_key: &IndexKey,
        row_key: &StoreKey,
    ) -> Result<(), KeyError> {
        let mut entry = index_key.serialize()?;
        entry.extend_from_slice(&row_key.to_bytes());

        let partition = self.topology.partition_of(row_key);
        self.partitions
            .entry(partition)
            .or_default()
            .indexes
            .entry(index_key.index().name().to_string())
            .or_default()
            .insert(entry, row_key.clone());
        Ok(())
    }

    /// Make every read of `partition` fail.
    pub fn fail_partition(&mut self, partition: PartitionId) {
        self.failing.insert(partition);
    }

    pub fn requests(&self) -> Vec<ReadRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The partition of every request received, in arrival order.
    pub fn requested_partitions(&self) -> Vec<PartitionId> {
        self.requests().iter().map(|r| r.partition).collect()
    }

    fn read(&self, request: &ReadRequest) -> Result<ReadResult, io::Error> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if !self.topology.contains(request.partition) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no such partition: {}", request.partition),
            ));
        }

        if self.failing.contains(&request.partition) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("partition {} is unavailable", request.partition),
            ));
        }

        let empty = Partition::default();
        let partition = self.partitions.get(&request.partition).unwrap_or(&empty);

        let result = match &request.index {
            None => {
                let candidates = rows_of(partition, request)?;
                collect(request, candidates)
            }
            Some(index) => {
                let candidates = index_entries_of(partition, index, request)?;
                collect(request, candidates)
            }
        };

        debug!(
            "MemStore::read: partition={} records={} more={} read_kb={}",
            request.partition,
            result.records.len(),
            result.more,
            result.read_kb
        );

        Ok(result)
    }
}

type Candidates<'a> = Box<dyn Iterator<Item = ScanRecord> + 'a>;

fn invalid_resume_key(e: impl ToString) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
}

/// Rows under the parent key, in request order, after the resume key.
fn rows_of<'a>(
    partition: &'a Partition,
    request: &'a ReadRequest,
) -> Result<Candidates<'a>, io::Error> {
    let parent = &request.parent_key;

    let resume = match &request.resume_key {
        Some(bytes) => Some(StoreKey::from_bytes(bytes).map_err(invalid_resume_key)?),
        None => None,
    };

    let to_record = |(k, v): (&StoreKey, &Marked)| ScanRecord {
        key: k.clone(),
        value: v.clone(),
        resume_key: k.to_bytes(),
    };

    let it: Candidates<'a> = match request.direction {
        Direction::Forward | Direction::Unordered => {
            let start = match resume {
                Some(k) => Bound::Excluded(k),
                None => Bound::Included(parent.clone()),
            };
            Box::new(
                partition
                    .rows
                    .range((start, Bound::Unbounded))
                    .take_while(move |(k, _)| k.starts_with(parent))
                    .map(to_record),
            )
        }
        Direction::Reverse => {
            let end = match resume {
                Some(k) => Bound::Excluded(k),
                None => Bound::Unbounded,
            };
            Box::new(
                partition
                    .rows
                    .range((Bound::Unbounded, end))
                    .rev()
                    .skip_while(move |(k, _)| !k.starts_with(parent) && *k > parent)
                    .take_while(move |(k, _)| k.starts_with(parent))
                    .map(to_record),
            )
        }
    };

    Ok(it)
}

/// Entries of the index range, in request order, after the resume key.
fn index_entries_of<'a>(
    partition: &'a Partition,
    index: &'a IndexScan,
    request: &'a ReadRequest,
) -> Result<Candidates<'a>, io::Error> {
    let Some(entries) = partition.indexes.get(index.index().name()) else {
        return Ok(Box::new(std::iter::empty()));
    };

    let range = index.range();
    let parent = &request.parent_key;

    let to_record = move |(entry, row_key): (&Vec<u8>, &StoreKey)| {
        let value = partition.rows.get(row_key)?;
        Some(ScanRecord {
            key: row_key.clone(),
            value: value.clone(),
            resume_key: entry.clone(),
        })
    };

    let it: Candidates<'a> = match request.direction {
        Direction::Forward | Direction::Unordered => {
            let start = match &request.resume_key {
                Some(k) => Bound::Excluded(k.clone()),
                None => Bound::Included(range.start_key().to_vec()),
            };
            Box::new(
                entries
                    .range((start, Bound::Unbounded))
                    .take_while(move |(e, _)| range.in_range(e, Direction::Forward))
                    .filter(move |(_, k)| k.starts_with(parent))
                    .filter_map(to_record),
            )
        }
        Direction::Reverse => {
            let end = match (&request.resume_key, range.reverse_seek_key()) {
                (Some(k), _) => Bound::Excluded(k.clone()),
                (None, Some(k)) => Bound::Excluded(k),
                (None, None) => Bound::Unbounded,
            };
            Box::new(
                entries
                    .range((Bound::Unbounded, end))
                    .rev()
                    .take_while(move |(e, _)| range.in_range(e, Direction::Reverse))
                    .filter(move |(_, k)| k.starts_with(parent))
                    .filter_map(to_record),
            )
        }
    };

    Ok(it)
}

/// Read cost of a record, in KB, rounded up.
fn cost_kb(record: &ScanRecord, keys_only: bool) -> u32 {
    let mut bytes = record.resume_key.len();
    if !keys_only {
        bytes += record.value.value().map(|v| v.len()).unwrap_or(0);
    }
    bytes.div_ceil(1024).max(1) as u32
}

/// Take records until the batch size or the read budget of the request is used up.
fn collect(request: &ReadRequest, candidates: Candidates<'_>) -> ReadResult {
    let batch_size = request.batch_size.max(1);
    let mut candidates = candidates.peekable();
    let mut result = ReadResult::default();

    while let Some(mut record) = candidates.next() {
        result.read_kb += cost_kb(&record, request.keys_only);

        if request.keys_only {
            record.value = record.value.map(|_| vec![]);
        }
        result.records.push(record);

        let budget_used = result.records.len() >= batch_size
            || (request.max_read_kb > 0 && result.read_kb >= request.max_read_kb);
        if budget_used {
            break;
        }
    }

    result.more = candidates.peek().is_some();
    result
}

impl ReadExecutor for MemStore {
    fn execute_read(&self, request: &ReadRequest) -> Result<ReadResult, io::Error> {
        self.read(request)
    }
}

#[async_trait::async_trait]
impl AsyncReadExecutor for MemStore {
    async fn execute_read(&self, request: ReadRequest) -> Result<ReadResult, io::Error> {
        self.read(&request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::field::FieldDef;
    use crate::field::FieldType;
    use crate::scan::options::Consistency;
    use crate::table::Table;

    fn table() -> Arc<Table> {
        Table::new_top_level(
            1,
            "t",
            vec![
                FieldDef::new("a", FieldType::Long),
                FieldDef::new("b", FieldType::Long),
            ],
            1,
        )
    }

    fn key(a: i64, b: i64) -> PrimaryKey {
        PrimaryKey::new(&table())
            .with("a", a)
            .and_then(|k| k.with("b", b))
            .unwrap()
    }

    fn request(store: &MemStore, parent: &StoreKey) -> ReadRequest {
        ReadRequest {
            partition: store.topology().partition_of(parent),
            parent_key: parent.clone(),
            index: None,
            resume_key: None,
            direction: Direction::Forward,
            batch_size: 10,
            max_read_kb: 0,
            keys_only: false,
            consistency: Consistency::Absolute,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_put_marked_keeps_latest() -> anyhow::Result<()> {
        let mut store = MemStore::new(Topology::new(2));
        let k = store.put(&key(1, 1), b"v1".to_vec())?;

        store.put_marked(k.clone(), Marked::new_normal(10, b"v10".to_vec()));
        store.put_marked(k.clone(), Marked::new_normal(5, b"v5".to_vec()));
        assert_eq!(store.last_seq(), 10);

        let parent = build_key(&key(1, 1), false)?.key;
        let r = store.read(&request(&store, &parent))?;
        assert_eq!(r.records.len(), 1);
        assert_eq!(r.records[0].value, Marked::new_normal(10, b"v10".to_vec()));

        // A tombstone wins at the same version.
        store.put_marked(k, Marked::new_tombstone(10));
        let r = store.read(&request(&store, &parent))?;
        assert!(r.records[0].is_tombstone());
        Ok(())
    }

    #[test]
    fn test_read_budget_and_more() -> anyhow::Result<()> {
        let mut store = MemStore::new(Topology::new(2));
        for b in 0..5 {
            store.put(&key(1, b), vec![b'x'; 1500])?;
        }
        store.put(&key(2, 0), vec![])?;

        let parent = build_key(&PrimaryKey::new(&table()).with("a", 1i64)?, true)?.key;

        let mut req = request(&store, &parent);
        let r = store.read(&req)?;
        assert_eq!(r.records.len(), 5);
        assert!(!r.more);
        assert_eq!(r.read_kb, 10);

        req.max_read_kb = 3;
        let r = store.read(&req)?;
        assert_eq!(r.records.len(), 2);
        assert!(r.more);

        req.resume_key = r.resume_key().map(|k| k.to_vec());
        req.max_read_kb = 0;
        req.keys_only = true;
        let r = store.read(&req)?;
        assert_eq!(r.records.len(), 3);
        assert_eq!(r.read_kb, 3);
        assert!(r.records.iter().all(|r| r.value.value() == Some(&vec![])));
        Ok(())
    }

    #[test]
    fn test_reverse_read_stays_under_parent() -> anyhow::Result<()> {
        let mut store = MemStore::new(Topology::new(1));
        for a in 0..3 {
            for b in 0..3 {
                store.put(&key(a, b), vec![])?;
            }
        }

        let parent = build_key(&PrimaryKey::new(&table()).with("a", 1i64)?, true)?.key;
        let mut req = request(&store, &parent);
        req.direction = Direction::Reverse;
        req.batch_size = 2;

        let r = store.read(&req)?;
        let expect = |b: i64| build_key(&key(1, b), false).map(|k| k.key);
        assert_eq!(
            r.records.iter().map(|r| r.key.clone()).collect::<Vec<_>>(),
            vec![expect(2)?, expect(1)?]
        );
        assert!(r.more);

        req.resume_key = r.resume_key().map(|k| k.to_vec());
        let r = store.read(&req)?;
        assert_eq!(
            r.records.iter().map(|r| r.key.clone()).collect::<Vec<_>>(),
            vec![expect(0)?]
        );
        assert!(!r.more);
        Ok(())
    }

    #[test]
    fn test_failing_partition_and_bad_resume_key() -> anyhow::Result<()> {
        let mut store = MemStore::new(Topology::new(1));
        let parent = build_key(&key(1, 1), false)?.key;

        let mut req = request(&store, &parent);
        req.resume_key = Some(vec![0xF9]);
        let err = store.read(&req).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        store.fail_partition(1);
        let err = store.read(&request(&store, &parent)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);

        assert_eq!(store.requested_partitions(), vec![1, 1]);
        Ok(())
    }
}
