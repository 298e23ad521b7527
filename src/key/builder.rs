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

//! Builds the physical [`StoreKey`] of a logical [`PrimaryKey`].
//!
//! The table hierarchy is walked top-down. Every level contributes its table-id token and
//! then its own key fields. Tokens go to the major path until the last shard-key field has
//! been appended, and to the minor path after that:
//!
//! ```text
//! users(uid) shard(uid), orders(oid) child of users:
//!
//!   major: [users.id, uid]
//!   minor: [orders.id, oid]
//! ```

use log::debug;

use crate::error::KeyError;
use crate::field::codec::encode_field;
use crate::field::FieldDef;
use crate::field::FieldValue;
use crate::key::PrimaryKey;
use crate::key::StoreKey;
use crate::table::Table;

/// Synthesizes values for identity and generated-UUID key fields.
pub trait KeyGenerator {
    fn generate(&mut self, table: &Table, field: &FieldDef) -> Result<FieldValue, KeyError>;
}

/// The store key built from a logical key, and how much of it is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltKey {
    pub key: StoreKey,

    /// Every primary-key field has a value: the key denotes a single record.
    pub key_complete: bool,

    /// Every shard-key field has a value: the key routes to exactly one partition.
    pub major_complete: bool,
}

/// Build the store key of `key`.
///
/// With `allow_partial`, tokens are appended up to the first field without a value. A
/// field with a value after that gap is rejected with
/// [`KeyError::InconsistentPartialKey`].
pub fn build_key(key: &PrimaryKey, allow_partial: bool) -> Result<BuiltKey, KeyError> {
    let (built, _generated) = build(key, allow_partial, None)?;
    Ok(built)
}

/// Like [`build_key`], but missing identity and generated-UUID fields are filled in by
/// `generator`. Generated values are written back to `key`.
pub fn build_key_with_generator(
    key: &mut PrimaryKey,
    allow_partial: bool,
    generator: &mut dyn KeyGenerator,
) -> Result<BuiltKey, KeyError> {
    let (built, generated) = build(key, allow_partial, Some(generator))?;
    for (pos, value) in generated {
        key.put_at(pos, value)?;
    }
    Ok(built)
}

fn build(
    key: &PrimaryKey,
    allow_partial: bool,
    mut generator: Option<&mut dyn KeyGenerator>,
) -> Result<(BuiltKey, Vec<(usize, FieldValue)>), KeyError> {
    let table = key.table();
    let shard_key_len = table.shard_key_len();

    let mut store_key = StoreKey::default();
    let mut generated = Vec::new();

    // Position in the full primary key, across all levels.
    let mut pos = 0;
    let mut in_major = true;
    let mut first_missing: Option<(usize, String)> = None;

    for level in Table::hierarchy(table) {
        if first_missing.is_none() {
            let id_token = level.id_token();
            if in_major {
                store_key.push_major(id_token);
            } else {
                store_key.push_minor(id_token);
            }
        }

        for field in level.own_key_fields() {
            let mut value = key.values()[pos].clone();

            if value.is_none() && field.generated.is_some() && first_missing.is_none() {
                if let Some(g) = generator.as_deref_mut() {
                    let v = g.generate(&level, field)?;
                    generated.push((pos, v.clone()));
                    value = Some(v);
                }
            }

            match value {
                Some(v) => {
                    if let Some((_, missing)) = &first_missing {
                        return Err(KeyError::InconsistentPartialKey {
                            missing: missing.clone(),
                            field: field.name.clone(),
                        });
                    }

                    let token = encode_field(&field.name, &field.field_type, &v)?;
                    if in_major {
                        store_key.push_major(token);
                    } else {
                        store_key.push_minor(token);
                    }

                    if pos + 1 == shard_key_len {
                        in_major = false;
                    }
                }
                None => {
                    if !allow_partial {
                        return Err(KeyError::MissingPrimaryKeyField {
                            table: table.name().to_string(),
                            field: field.name.clone(),
                        });
                    }
                    if first_missing.is_none() {
                        first_missing = Some((pos, field.name.clone()));
                    }
                }
            }

            pos += 1;
        }
    }

    let specified = first_missing.as_ref().map(|(p, _)| *p).unwrap_or(pos);
    let built = BuiltKey {
        key: store_key,
        key_complete: first_missing.is_none(),
        major_complete: specified >= shard_key_len,
    };

    debug!(
        "build_key: table={} key={} complete={} major_complete={}",
        table, built.key, built.key_complete, built.major_complete
    );

    Ok((built, generated))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::field::codec::Token;
    use crate::field::FieldType;
    use crate::field::Generated;

    fn tok(t: &FieldType, v: impl Into<FieldValue>) -> Token {
        encode_field("f", t, &v.into()).unwrap()
    }

    /// `Orders(shard: custId, key: custId, orderId)`
    fn orders() -> Arc<Table> {
        Table::new_top_level(
            7,
            "orders",
            vec![
                FieldDef::new("custId", FieldType::Long),
                FieldDef::new("orderId", FieldType::Long),
            ],
            1,
        )
    }

    #[test]
    fn test_complete_key_is_deterministic() -> anyhow::Result<()> {
        let t = orders();
        let k = PrimaryKey::new(&t).with("custId", 5i64)?.with("orderId", 10i64)?;

        let a = build_key(&k, false)?;
        let b = build_key(&k.clone(), false)?;

        assert_eq!(a, b);
        assert!(a.key_complete);
        assert!(a.major_complete);
        assert_eq!(
            a.key,
            StoreKey::new(vec![t.id_token(), tok(&FieldType::Long, 5i64)], vec![tok(
                &FieldType::Long,
                10i64
            )])
        );
        Ok(())
    }

    #[test]
    fn test_partial_shard_key_is_major_complete() -> anyhow::Result<()> {
        let t = orders();
        let k = PrimaryKey::new(&t).with("custId", 5i64)?;

        let built = build_key(&k, true)?;
        assert!(built.major_complete);
        assert!(!built.key_complete);
        assert_eq!(
            built.key,
            StoreKey::new(vec![t.id_token(), tok(&FieldType::Long, 5i64)], vec![])
        );

        let err = build_key(&k, false).unwrap_err();
        assert_eq!(err, KeyError::MissingPrimaryKeyField {
            table: "orders".to_string(),
            field: "orderId".to_string(),
        });
        Ok(())
    }

    #[test]
    fn test_empty_key_is_not_major_complete() -> anyhow::Result<()> {
        let t = orders();
        let built = build_key(&PrimaryKey::new(&t), true)?;

        assert!(!built.major_complete);
        assert!(!built.key_complete);
        assert_eq!(built.key, StoreKey::new(vec![t.id_token()], vec![]));
        Ok(())
    }

    #[test]
    fn test_field_after_gap_is_inconsistent() -> anyhow::Result<()> {
        let t = orders();
        let k = PrimaryKey::new(&t).with("orderId", 1i64)?;

        let err = build_key(&k, true).unwrap_err();
        assert_eq!(err, KeyError::InconsistentPartialKey {
            missing: "custId".to_string(),
            field: "orderId".to_string(),
        });
        Ok(())
    }

    #[test]
    fn test_hierarchy_layout() -> anyhow::Result<()> {
        let users = Table::new_top_level(
            1,
            "users",
            vec![
                FieldDef::new("region", FieldType::String),
                FieldDef::new("uid", FieldType::Integer),
            ],
            1,
        );
        let addrs = Table::new_child(&users, 2, "addrs", vec![FieldDef::new(
            "aid",
            FieldType::Integer,
        )]);

        let k = PrimaryKey::new(&addrs)
            .with("region", "eu")?
            .with("uid", 3i32)?
            .with("aid", 4i32)?;
        let built = build_key(&k, false)?;

        assert_eq!(built.key.major(), &[users.id_token(), b"eu".to_vec()][..]);
        assert_eq!(built.key.minor(), &[
            tok(&FieldType::Integer, 3i32),
            addrs.id_token(),
            tok(&FieldType::Integer, 4i32)
        ][..]);

        // A gap in the parent's key stops the child's table id too.
        let k = PrimaryKey::new(&addrs).with("region", "eu")?;
        let built = build_key(&k, true)?;
        assert_eq!(built.key, StoreKey::new(vec![users.id_token(), b"eu".to_vec()], vec![]));
        assert!(built.major_complete);
        Ok(())
    }

    #[test]
    fn test_sibling_tables_sort_by_id() -> anyhow::Result<()> {
        let long = |name: &str| FieldDef::new(name, FieldType::Long);
        let users = Table::new_top_level(1, "users", vec![long("uid")], 1);
        let small = Table::new_child(&users, 2, "small", vec![long("a")]);
        let large = Table::new_child(&users, 16, "large", vec![long("a")]);

        let key_of = |t: &Arc<Table>| -> anyhow::Result<StoreKey> {
            let k = PrimaryKey::new(t).with("uid", 1i64)?.with("a", 0i64)?;
            Ok(build_key(&k, false)?.key)
        };

        assert!(key_of(&small)? < key_of(&large)?);
        assert!(small.id_token() < large.id_token());
        Ok(())
    }

    struct Counter(i64);

    impl KeyGenerator for Counter {
        fn generate(&mut self, _table: &Table, field: &FieldDef) -> Result<FieldValue, KeyError> {
            assert_eq!(field.generated, Some(Generated::Identity));
            self.0 += 1;
            Ok(FieldValue::Long(self.0))
        }
    }

    #[test]
    fn test_generator_fills_identity_field() -> anyhow::Result<()> {
        let t = Table::new_top_level(
            3,
            "events",
            vec![
                FieldDef::new("source", FieldType::String),
                FieldDef::new("seq", FieldType::Long).with_generated(Generated::Identity),
            ],
            1,
        );

        let mut k = PrimaryKey::new(&t).with("source", "s")?;
        let mut g = Counter(100);

        let built = build_key_with_generator(&mut k, false, &mut g)?;
        assert!(built.key_complete);
        assert_eq!(k.get("seq"), Some(&FieldValue::Long(101)));
        assert_eq!(built.key.minor(), &[tok(&FieldType::Long, 101i64)][..]);

        // A supplied value is not replaced.
        let mut k = PrimaryKey::new(&t).with("source", "s")?.with("seq", 7i64)?;
        build_key_with_generator(&mut k, false, &mut g)?;
        assert_eq!(k.get("seq"), Some(&FieldValue::Long(7)));
        assert_eq!(g.0, 101);
        Ok(())
    }
}
