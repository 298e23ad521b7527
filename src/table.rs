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

//! Table metadata as seen by key construction and scans.
//!
//! A table's primary key is its parent's primary key followed by the table's own key
//! fields. The shard key is a leading subset of the top-level table's primary key and is
//! shared by every table of the hierarchy.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::field::codec::Token;
use crate::field::FieldDef;

/// Resolves a table by its numeric id.
///
/// Used to interpret rows of ancestor and descendant tables returned by a scan.
pub trait TableLookup: Send + Sync {
    fn table_by_id(&self, id: u64) -> Option<Arc<Table>>;
}

impl<T> TableLookup for &T
where T: TableLookup + ?Sized
{
    fn table_by_id(&self, id: u64) -> Option<Arc<Table>> {
        (**self).table_by_id(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    id: u64,
    name: String,
    /// The full primary key, ancestors' fields first.
    key_fields: Vec<FieldDef>,
    shard_key_len: usize,
    parent: Option<Arc<Table>>,
}

impl Table {
    /// Create a top-level table whose first `shard_key_len` key fields form the shard key.
    ///
    /// # Panics
    ///
    /// Panics if the shard key is empty or longer than the primary key.
    pub fn new_top_level(
        id: u64,
        name: impl ToString,
        key_fields: Vec<FieldDef>,
        shard_key_len: usize,
    ) -> Arc<Self> {
        assert!(
            shard_key_len >= 1 && shard_key_len <= key_fields.len(),
            "shard key length {} out of range 1..={}",
            shard_key_len,
            key_fields.len()
        );

        Arc::new(Self {
            id,
            name: name.to_string(),
            key_fields,
            shard_key_len,
            parent: None,
        })
    }

    /// Create a child table that adds `own_key_fields` to its parent's primary key.
    pub fn new_child(
        parent: &Arc<Table>,
        id: u64,
        name: impl ToString,
        own_key_fields: Vec<FieldDef>,
    ) -> Arc<Self> {
        let mut key_fields = parent.key_fields.clone();
        key_fields.extend(own_key_fields);

        Arc::new(Self {
            id,
            name: format!("{}.{}", parent.name, name.to_string()),
            key_fields,
            shard_key_len: parent.shard_key_len,
            parent: Some(parent.clone()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The token that introduces this table's own key fields in a store key.
    ///
    /// Fixed width, so sibling tables sort by numeric id.
    pub fn id_token(&self) -> Token {
        format!("{:016x}", self.id).into_bytes()
    }

    pub(crate) fn parse_id_token(token: &[u8]) -> Option<u64> {
        if token.len() != 16 || !token.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return None;
        }
        let s = std::str::from_utf8(token).ok()?;
        u64::from_str_radix(s, 16).ok()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_fields(&self) -> &[FieldDef] {
        &self.key_fields
    }

    /// The key fields this table adds to its parent's primary key.
    pub fn own_key_fields(&self) -> &[FieldDef] {
        let inherited = self.parent.as_ref().map(|p| p.key_fields.len()).unwrap_or(0);
        &self.key_fields[inherited..]
    }

    pub fn shard_key_len(&self) -> usize {
        self.shard_key_len
    }

    pub fn parent(&self) -> Option<&Arc<Table>> {
        self.parent.as_ref()
    }

    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.key_fields.iter().position(|f| f.name == name)
    }

    /// Number of levels above this table.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut p = self.parent.as_ref();
        while let Some(t) = p {
            depth += 1;
            p = t.parent.as_ref();
        }
        depth
    }

    /// The chain of tables from the top-level table down to and including `this`.
    pub fn hierarchy(this: &Arc<Table>) -> Vec<Arc<Table>> {
        let mut chain = vec![this.clone()];
        let mut p = this.parent.as_ref();
        while let Some(t) = p {
            chain.push(t.clone());
            p = t.parent.as_ref();
        }
        chain.reverse();
        chain
    }

    pub fn is_ancestor_of(&self, other: &Table) -> bool {
        let mut p = other.parent.as_ref();
        while let Some(t) = p {
            if t.id == self.id {
                return true;
            }
            p = t.parent.as_ref();
        }
        false
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(id={})", self.name, self.id)
    }
}

/// A registry of the tables of one or more hierarchies.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    by_id: BTreeMap<u64, Arc<Table>>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, table: &Arc<Table>) -> Self {
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: &Arc<Table>) {
        self.by_id.insert(table.id(), table.clone());
    }

    /// All registered tables that have `table` as an ancestor, parents before children.
    pub fn descendants_of(&self, table: &Table) -> Vec<Arc<Table>> {
        let mut found = self
            .by_id
            .values()
            .filter(|t| table.is_ancestor_of(t))
            .cloned()
            .collect::<Vec<_>>();
        found.sort_by_key(|t| (t.depth(), t.id()));
        found
    }
}

impl TableLookup for Tables {
    fn table_by_id(&self, id: u64) -> Option<Arc<Table>> {
        self.by_id.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;

    fn f(name: &str) -> FieldDef {
        FieldDef::new(name, FieldType::Long)
    }

    #[test]
    fn test_child_inherits_parent_key() {
        let users = Table::new_top_level(1, "users", vec![f("uid")], 1);
        let orders = Table::new_child(&users, 2, "orders", vec![f("oid")]);
        let items = Table::new_child(&orders, 3, "items", vec![f("iid")]);

        assert_eq!(items.name(), "users.orders.items");
        assert_eq!(
            items.key_fields().iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["uid", "oid", "iid"]
        );
        assert_eq!(items.own_key_fields(), &[f("iid")][..]);
        assert_eq!(items.shard_key_len(), 1);
        assert_eq!(items.depth(), 2);

        let ids = Table::hierarchy(&items).iter().map(|t| t.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);

        assert!(users.is_ancestor_of(&items));
        assert!(orders.is_ancestor_of(&items));
        assert!(!items.is_ancestor_of(&users));
        assert!(!items.is_ancestor_of(&items));
    }

    #[test]
    fn test_registry() {
        let users = Table::new_top_level(1, "users", vec![f("uid")], 1);
        let orders = Table::new_child(&users, 2, "orders", vec![f("oid")]);
        let items = Table::new_child(&orders, 3, "items", vec![f("iid")]);
        let other = Table::new_top_level(9, "other", vec![f("x")], 1);

        let tables = Tables::new()
            .with(&items)
            .with(&other)
            .with(&users)
            .with(&orders);

        assert_eq!(tables.table_by_id(2).map(|t| t.id()), Some(2));
        assert!(tables.table_by_id(7).is_none());

        let desc = tables.descendants_of(&users);
        assert_eq!(desc.iter().map(|t| t.id()).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_id_token() {
        let t = Table::new_top_level(255, "t", vec![f("k")], 1);
        assert_eq!(t.id_token(), b"00000000000000ff".to_vec());
        assert_eq!(Table::parse_id_token(b"00000000000000ff"), Some(255));
        assert_eq!(Table::parse_id_token(b"ff"), None);
        assert_eq!(Table::parse_id_token(b"00000000000000FF"), None);
        assert_eq!(Table::parse_id_token(b"xyz"), None);

        let two = Table::new_top_level(2, "two", vec![f("k")], 1);
        let sixteen = Table::new_top_level(16, "sixteen", vec![f("k")], 1);
        assert!(two.id_token() < sixteen.id_token());
    }

    #[test]
    #[should_panic(expected = "shard key length 2 out of range")]
    fn test_shard_key_longer_than_primary_key() {
        Table::new_top_level(1, "t", vec![f("k")], 2);
    }
}
