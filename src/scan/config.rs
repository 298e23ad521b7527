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

//! Immutable per-scan configuration.

use std::sync::Arc;

use log::debug;

use crate::error::ScanError;
use crate::index::FieldRange;
use crate::index::IndexKey;
use crate::key::build_key;
use crate::key::BuiltKey;
use crate::key::PrimaryKey;
use crate::key::StoreKey;
use crate::scan::options::ScanOptions;
use crate::scan::request::IndexScan;
use crate::scan::request::ReadRequest;
use crate::scan::topology::PartitionId;
use crate::scan::topology::Topology;
use crate::table::Table;

/// The tables whose rows a scan returns: the target table, and optionally some of its
/// ancestors and descendants.
#[derive(Debug, Clone)]
pub struct TargetTables {
    target: Arc<Table>,
    /// Root-first.
    ancestors: Vec<Arc<Table>>,
    descendants: Vec<Arc<Table>>,
}

impl TargetTables {
    pub fn new(target: &Arc<Table>) -> Self {
        Self {
            target: target.clone(),
            ancestors: vec![],
            descendants: vec![],
        }
    }

    /// Include every ancestor of the target.
    pub fn with_all_ancestors(mut self) -> Self {
        let mut chain = Table::hierarchy(&self.target);
        chain.pop();
        self.ancestors = chain;
        self
    }

    /// # Panics
    ///
    /// Panics if a table is not an ancestor of the target.
    pub fn with_ancestors(mut self, tables: impl IntoIterator<Item = Arc<Table>>) -> Self {
        for t in tables {
            assert!(
                t.is_ancestor_of(&self.target),
                "{} is not an ancestor of {}",
                t,
                self.target
            );
            self.ancestors.push(t);
        }
        self.ancestors.sort_by_key(|t| t.depth());
        self.ancestors.dedup_by_key(|t| t.id());
        self
    }

    /// # Panics
    ///
    /// Panics if a table is not a descendant of the target.
    pub fn with_descendants(mut self, tables: impl IntoIterator<Item = Arc<Table>>) -> Self {
        for t in tables {
            assert!(
                self.target.is_ancestor_of(&t),
                "{} is not a descendant of {}",
                t,
                self.target
            );
            self.descendants.push(t);
        }
        self
    }

    pub fn target(&self) -> &Arc<Table> {
        &self.target
    }

    pub fn ancestors(&self) -> &[Arc<Table>] {
        &self.ancestors
    }

    pub fn descendants(&self) -> &[Arc<Table>] {
        &self.descendants
    }

    /// The table whose key space the scan starts from.
    pub fn top_most(&self) -> &Arc<Table> {
        self.ancestors.first().unwrap_or(&self.target)
    }

    pub fn is_ancestor(&self, table: &Table) -> bool {
        self.ancestors.iter().any(|t| t.id() == table.id())
    }

    pub fn includes(&self, table: &Table) -> bool {
        table.id() == self.target.id()
            || self.is_ancestor(table)
            || self.descendants.iter().any(|t| t.id() == table.id())
    }
}

/// Everything about a scan that does not change while it runs.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    key: PrimaryKey,

    /// The store key of `key`.
    target_key: BuiltKey,

    /// The key whose prefix is scanned: `target_key`, or the key of the top-most
    /// requested ancestor.
    scan_key: StoreKey,

    targets: TargetTables,
    index: Option<IndexScan>,
    options: ScanOptions,
    topology: Topology,

    /// Set if the key routes to exactly one partition.
    partition: Option<PartitionId>,
}

impl ScanConfig {
    /// Build the keys of a scan and decide its routing.
    ///
    /// Fails with [`ScanError::Routing`] if the options demand a single-partition scan but
    /// the shard key is not fully specified.
    ///
    /// # Panics
    ///
    /// Panics if `targets` is not built for the table of `key`.
    pub fn new(
        key: &PrimaryKey,
        targets: TargetTables,
        topology: Topology,
        options: ScanOptions,
    ) -> Result<Self, ScanError> {
        assert_eq!(
            targets.target().id(),
            key.table().id(),
            "target tables are not built for the table of the key"
        );

        let target_key = build_key(key, true)?;

        if options.single_partition_only && !target_key.major_complete {
            return Err(ScanError::Routing(format!(
                "key {} of {} does not specify the complete shard key",
                target_key.key,
                key.table()
            )));
        }

        let scan_key = if targets.ancestors().is_empty() {
            target_key.key.clone()
        } else {
            build_key(&key.project_to(targets.top_most()), true)?.key
        };

        let partition = if target_key.major_complete {
            Some(topology.partition_of(&target_key.key))
        } else {
            None
        };

        debug!(
            "ScanConfig::new: table={} target_key={} scan_key={} partition={:?}",
            key.table(),
            target_key.key,
            scan_key,
            partition
        );

        Ok(Self {
            key: key.clone(),
            target_key,
            scan_key,
            targets,
            index: None,
            options,
            topology,
            partition,
        })
    }

    /// Scan a secondary index instead of the rows.
    pub fn with_index(mut self, index: IndexScan) -> Self {
        self.index = Some(index);
        self
    }

    /// Plan an index scan of `key`, iterating in the direction of the options.
    pub fn with_index_range(
        self,
        key: &IndexKey,
        range: Option<&FieldRange>,
    ) -> Result<Self, ScanError> {
        let index = IndexScan::plan(key, range, self.options.direction)?;
        Ok(self.with_index(index))
    }

    pub fn table(&self) -> &Arc<Table> {
        self.key.table()
    }

    pub fn key(&self) -> &PrimaryKey {
        &self.key
    }

    pub fn target_key(&self) -> &BuiltKey {
        &self.target_key
    }

    pub fn scan_key(&self) -> &StoreKey {
        &self.scan_key
    }

    pub fn targets(&self) -> &TargetTables {
        &self.targets
    }

    pub fn index(&self) -> Option<&IndexScan> {
        self.index.as_ref()
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The only partition to read, if the key routes to one.
    pub fn single_partition(&self) -> Option<PartitionId> {
        self.partition
    }

    /// Check that a row of `table` with key `key` belongs to the result of this scan.
    ///
    /// Rows of the target and descendant tables must lie under the target key. Rows of
    /// ancestor tables must be on the path to it.
    pub fn owns(&self, table: &Table, key: &StoreKey) -> bool {
        if !self.targets.includes(table) {
            return false;
        }

        let target = &self.target_key.key;
        if self.targets.is_ancestor(table) {
            target.starts_with(key) || key.starts_with(target)
        } else {
            key.starts_with(target)
        }
    }

    pub(crate) fn request(
        &self,
        partition: PartitionId,
        resume_key: Option<Vec<u8>>,
        keys_only: bool,
    ) -> ReadRequest {
        ReadRequest {
            partition,
            parent_key: self.scan_key.clone(),
            index: self.index.clone(),
            resume_key,
            direction: self.options.direction,
            batch_size: self.options.batch_size.max(1),
            max_read_kb: self.options.max_read_kb,
            keys_only,
            consistency: self.options.consistency,
            timeout: self.options.timeout,
        }
    }
}
