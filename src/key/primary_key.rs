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

use std::sync::Arc;

use crate::error::KeyError;
use crate::field::codec::decode_field;
use crate::field::FieldValue;
use crate::key::StoreKey;
use crate::table::Table;
use crate::table::TableLookup;

/// A possibly partial assignment of values to a table's primary-key fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    table: Arc<Table>,
    values: Vec<Option<FieldValue>>,
}

impl PrimaryKey {
    pub fn new(table: &Arc<Table>) -> Self {
        Self {
            table: table.clone(),
            values: vec![None; table.key_fields().len()],
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn values(&self) -> &[Option<FieldValue>] {
        &self.values
    }

    /// Set a key field by name.
    pub fn put(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), KeyError> {
        let pos = self
            .table
            .field_position(field)
            .ok_or_else(|| KeyError::UnknownField {
                owner: self.table.name().to_string(),
                field: field.to_string(),
            })?;
        self.values[pos] = Some(value.into());
        Ok(())
    }

    /// Builder form of [`put`](Self::put).
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Result<Self, KeyError> {
        self.put(field, value)?;
        Ok(self)
    }

    /// Set a key field by position.
    pub fn put_at(&mut self, pos: usize, value: FieldValue) -> Result<(), KeyError> {
        let slot = self
            .values
            .get_mut(pos)
            .ok_or_else(|| KeyError::UnknownField {
                owner: self.table.name().to_string(),
                field: format!("#{}", pos),
            })?;
        *slot = Some(value);
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        let pos = self.table.field_position(field)?;
        self.values[pos].as_ref()
    }

    /// Number of leading fields that have a value.
    pub fn specified_len(&self) -> usize {
        self.values.iter().take_while(|v| v.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|v| v.is_some())
    }

    /// The leading values of this key as a key of `ancestor`.
    ///
    /// # Panics
    ///
    /// Panics if `ancestor` is not this key's table or one of its ancestors.
    pub fn project_to(&self, ancestor: &Arc<Table>) -> PrimaryKey {
        assert!(
            ancestor.id() == self.table.id() || ancestor.is_ancestor_of(&self.table),
            "{} is not an ancestor of {}",
            ancestor,
            self.table
        );

        let n = ancestor.key_fields().len();
        PrimaryKey {
            table: ancestor.clone(),
            values: self.values[..n].to_vec(),
        }
    }

    /// Decode the complete store key of a record into the primary key of its table.
    ///
    /// The owning table is discovered by following the table-id tokens of the key.
    pub fn from_store_key(key: &StoreKey, lookup: &dyn TableLookup) -> Result<Self, KeyError> {
        let invalid = |msg: String| KeyError::InvalidStoreKey(format!("{}: {}", key, msg));

        let mut tokens = key.tokens();

        let first = tokens.next().ok_or_else(|| invalid("empty key".to_string()))?;
        let mut table =
            lookup_table(first, lookup).ok_or_else(|| invalid("unknown table".to_string()))?;
        if table.parent().is_some() {
            return Err(invalid(format!("{} is not a top-level table", table)));
        }

        let mut values = Vec::with_capacity(table.key_fields().len());

        loop {
            for field in table.own_key_fields() {
                let token = tokens
                    .next()
                    .ok_or_else(|| invalid(format!("missing value of '{}'", field.name)))?;
                values.push(Some(decode_field(&field.field_type, token)?));
            }

            let Some(id_token) = tokens.next() else {
                break;
            };

            let child = lookup_table(id_token, lookup)
                .ok_or_else(|| invalid("unknown child table".to_string()))?;
            if child.parent().map(|p| p.id()) != Some(table.id()) {
                return Err(invalid(format!("{} is not a child of {}", child, table)));
            }
            table = child;
        }

        Ok(PrimaryKey { table, values })
    }
}

fn lookup_table(token: &[u8], lookup: &dyn TableLookup) -> Option<Arc<Table>> {
    let id = Table::parse_id_token(token)?;
    lookup.table_by_id(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDef;
    use crate::field::FieldType;
    use crate::key::builder::build_key;
    use crate::table::Tables;

    fn users_orders() -> (Arc<Table>, Arc<Table>) {
        let users = Table::new_top_level(
            1,
            "users",
            vec![FieldDef::new("uid", FieldType::Long)],
            1,
        );
        let orders = Table::new_child(&users, 2, "orders", vec![FieldDef::new(
            "oid",
            FieldType::String,
        )]);
        (users, orders)
    }

    #[test]
    fn test_put_and_get() -> anyhow::Result<()> {
        let (_users, orders) = users_orders();

        let mut k = PrimaryKey::new(&orders);
        k.put("uid", 5i64)?;
        assert_eq!(k.get("uid"), Some(&FieldValue::Long(5)));
        assert_eq!(k.get("oid"), None);
        assert_eq!(k.specified_len(), 1);
        assert!(!k.is_complete());

        let err = k.put("nope", 1i64).unwrap_err();
        assert_eq!(err, KeyError::UnknownField {
            owner: "users.orders".to_string(),
            field: "nope".to_string(),
        });

        k.put_at(1, FieldValue::String("a".to_string()))?;
        assert!(k.is_complete());
        assert!(k.put_at(2, FieldValue::Long(1)).is_err());
        Ok(())
    }

    #[test]
    fn test_project_to_ancestor() -> anyhow::Result<()> {
        let (users, orders) = users_orders();

        let k = PrimaryKey::new(&orders).with("uid", 5i64)?.with("oid", "x")?;
        let p = k.project_to(&users);

        assert_eq!(p.table().id(), 1);
        assert_eq!(p.values(), &[Some(FieldValue::Long(5))][..]);
        Ok(())
    }

    #[test]
    fn test_decode_store_key() -> anyhow::Result<()> {
        let (users, orders) = users_orders();
        let tables = Tables::new().with(&users).with(&orders);

        let k = PrimaryKey::new(&orders).with("uid", -3i64)?.with("oid", "o-1")?;
        let built = build_key(&k, false)?;

        let decoded = PrimaryKey::from_store_key(&built.key, &tables)?;
        assert_eq!(decoded, k);

        let parent = PrimaryKey::new(&users).with("uid", 9i64)?;
        let built = build_key(&parent, false)?;
        let decoded = PrimaryKey::from_store_key(&built.key, &tables)?;
        assert_eq!(decoded, parent);
        Ok(())
    }

    #[test]
    fn test_decode_rejects_unknown_or_truncated() -> anyhow::Result<()> {
        let (users, orders) = users_orders();
        let tables = Tables::new().with(&users);

        let k = PrimaryKey::new(&orders).with("uid", 1i64)?.with("oid", "a")?;
        let built = build_key(&k, false)?;

        // orders is not registered
        assert!(PrimaryKey::from_store_key(&built.key, &tables).is_err());

        let truncated = StoreKey::new(vec![users.id_token()], vec![]);
        assert!(PrimaryKey::from_store_key(&truncated, &tables).is_err());
        Ok(())
    }
}
