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

use pretty_assertions::assert_eq;

use crate::error::KeyError;
use crate::error::RangeError;
use crate::field::codec::encode_field;
use crate::field::codec::successor;
use crate::field::codec::Token;
use crate::field::FieldDef;
use crate::field::FieldType;
use crate::field::FieldValue;
use crate::index::serialize_tokens;
use crate::index::Direction;
use crate::index::FieldRange;
use crate::index::IndexDef;
use crate::index::IndexKey;
use crate::index::IndexRange;

fn status_amount() -> Arc<IndexDef> {
    IndexDef::new("status_amount", vec![
        FieldDef::new("status", FieldType::String),
        FieldDef::new("amount", FieldType::Long),
    ])
}

fn tok(t: &FieldType, v: impl Into<FieldValue>) -> Token {
    encode_field("f", t, &v.into()).unwrap()
}

/// Serialized index entry `(status, amount)` followed by some primary-key bytes.
fn entry(status: &str, amount: i64) -> Vec<u8> {
    let mut e = serialize_tokens(&[
        tok(&FieldType::String, status),
        tok(&FieldType::Long, amount),
    ]);
    e.extend_from_slice(b"\x02pk\x00");
    e
}

fn open_key() -> anyhow::Result<IndexKey> {
    Ok(IndexKey::new(&status_amount()).with("status", "OPEN")?)
}

#[test]
fn test_half_open_range() -> anyhow::Result<()> {
    let r = FieldRange::new("amount")
        .with_start(100i64, true)
        .with_end(200i64, false);
    let planned = IndexRange::plan(&open_key()?, Some(&r), Direction::Forward)?;

    let s = tok(&FieldType::String, "OPEN");
    assert_eq!(planned.prefix_key(), serialize_tokens(&[s.clone()]).as_slice());
    assert_eq!(
        planned.start_key(),
        serialize_tokens(&[s.clone(), tok(&FieldType::Long, 100i64)]).as_slice()
    );
    assert_eq!(
        planned.end_key(),
        Some(serialize_tokens(&[s, tok(&FieldType::Long, 200i64)]).as_slice())
    );
    assert!(!planned.exact_match());
    Ok(())
}

#[test]
fn test_exclusive_start_inclusive_end_take_successors() -> anyhow::Result<()> {
    let r = FieldRange::new("amount")
        .with_start(100i64, false)
        .with_end(200i64, true);
    let planned = IndexRange::plan(&open_key()?, Some(&r), Direction::Forward)?;

    let s = tok(&FieldType::String, "OPEN");
    let after = |v: i64| successor(&FieldType::Long, &tok(&FieldType::Long, v)).unwrap();

    assert_eq!(
        planned.start_key(),
        serialize_tokens(&[s.clone(), after(100)]).as_slice()
    );
    assert_eq!(
        planned.end_key(),
        Some(serialize_tokens(&[s, after(200)]).as_slice())
    );
    Ok(())
}

#[test]
fn test_inclusive_range_accepts_exactly_its_values() -> anyhow::Result<()> {
    let r = FieldRange::new("amount")
        .with_start(100i64, true)
        .with_end(200i64, true);
    let planned = IndexRange::plan(&open_key()?, Some(&r), Direction::Forward)?;

    let start = entry("OPEN", 100);
    let end = entry("OPEN", 200);
    assert!(planned.start_key() <= start.as_slice());
    assert!(start < end);
    assert!(end.as_slice() < planned.end_key().unwrap());

    for amount in [-1, 0, 99, 100, 101, 150, 199, 200, 201, 1000, i64::MIN, i64::MAX] {
        let e = entry("OPEN", amount);
        let expected = (100..=200).contains(&amount);
        assert_eq!(planned.contains(&e), expected, "amount={}", amount);

        // Forward iteration starts at start_key and only checks the end.
        if amount >= 100 {
            assert_eq!(planned.in_range(&e, Direction::Forward), expected);
        }
        // Reverse iteration starts at the end and only checks the start.
        if amount <= 200 {
            assert_eq!(planned.in_range(&e, Direction::Reverse), expected);
        }
    }

    assert!(!planned.contains(&entry("CLOSED", 150)));
    assert!(!planned.contains(&entry("OPENED", 150)));
    Ok(())
}

#[test]
fn test_exclusive_lower_bound_at_max_is_empty() -> anyhow::Result<()> {
    let r = FieldRange::new("amount").with_start(i64::MAX, false);
    let err = IndexRange::plan(&open_key()?, Some(&r), Direction::Forward).unwrap_err();

    assert_eq!(err, RangeError::EmptyRangeAfterIncrement {
        field: "amount".to_string(),
    });
    Ok(())
}

#[test]
fn test_inclusive_upper_bound_at_max_is_unbounded() -> anyhow::Result<()> {
    let r = FieldRange::new("amount").with_end(i64::MAX, true);
    let planned = IndexRange::plan(&open_key()?, Some(&r), Direction::Forward)?;

    assert_eq!(planned.end_key(), None);
    assert!(planned.contains(&entry("OPEN", i64::MAX)));
    assert!(!planned.contains(&entry("OPENX", 0)));
    Ok(())
}

#[test]
fn test_no_range_and_exact_match() -> anyhow::Result<()> {
    let idx = status_amount();

    let planned = IndexRange::plan(&open_key()?, None, Direction::Forward)?;
    assert!(!planned.exact_match());
    assert_eq!(planned.start_key(), planned.prefix_key());
    assert!(planned.contains(&entry("OPEN", 5)));

    let full = IndexKey::new(&idx).with("status", "OPEN")?.with("amount", 5i64)?;
    let planned = IndexRange::plan(&full, None, Direction::Reverse)?;
    assert!(planned.exact_match());
    assert_eq!(planned.direction(), Direction::Reverse);
    assert!(planned.in_range(&entry("OPEN", 5), Direction::Reverse));
    assert!(!planned.in_range(&entry("OPEN", 6), Direction::Forward));

    let r = FieldRange::new("amount").with_start(1i64, true);
    let err = IndexRange::plan(&full, Some(&r), Direction::Forward).unwrap_err();
    assert!(matches!(err, RangeError::InvalidFieldRangeField(_)));
    Ok(())
}

#[test]
fn test_range_must_follow_prefix() -> anyhow::Result<()> {
    let idx = status_amount();

    let r = FieldRange::new("status").with_start("A", true);
    let err = IndexRange::plan(&open_key()?, Some(&r), Direction::Forward).unwrap_err();
    assert!(matches!(err, RangeError::InvalidFieldRangeField(_)));

    // Range on the first field of an empty key is fine.
    let planned = IndexRange::plan(&IndexKey::new(&idx), Some(&r), Direction::Forward)?;
    assert!(planned.prefix_key().is_empty());

    let gap = IndexKey::new(&idx).with("amount", 3i64)?;
    let err = IndexRange::plan(&gap, None, Direction::Forward).unwrap_err();
    assert!(matches!(
        err,
        RangeError::Key(KeyError::InconsistentPartialKey { .. })
    ));
    Ok(())
}

#[test]
fn test_prefix_scan() -> anyhow::Result<()> {
    let idx = IndexDef::new("by_name", vec![FieldDef::new("name", FieldType::String)]);
    let name = |s: &str| serialize_tokens(&[tok(&FieldType::String, s)]);

    let r = FieldRange::new("name").with_prefix("ab");
    let planned = IndexRange::plan(&IndexKey::new(&idx), Some(&r), Direction::Forward)?;

    assert_eq!(planned.prefix_key(), b"ab");
    assert_eq!(planned.end_key(), None);

    assert!(planned.contains(&name("ab")));
    assert!(planned.contains(&name("abc")));
    assert!(!planned.contains(&name("a")));
    assert!(!planned.contains(&name("ac")));
    Ok(())
}

#[test]
fn test_reverse_seek_key() -> anyhow::Result<()> {
    let planned = IndexRange::plan(&open_key()?, None, Direction::Reverse)?;
    assert_eq!(planned.reverse_seek_key(), Some(b"OPEN\x01".to_vec()));

    let idx = status_amount();
    let planned = IndexRange::plan(&IndexKey::new(&idx), None, Direction::Reverse)?;
    assert_eq!(planned.reverse_seek_key(), None);
    Ok(())
}

mod untyped {
    use pretty_assertions::assert_eq;

    use super::*;

    fn doc_index() -> Arc<IndexDef> {
        IndexDef::new("by_doc", vec![FieldDef::new("doc.x", FieldType::Json)])
    }

    fn json(v: FieldValue) -> Vec<u8> {
        serialize_tokens(&[encode_field("doc.x", &FieldType::Json, &v).unwrap()])
    }

    #[test]
    fn test_lower_only_stays_in_numbers() -> anyhow::Result<()> {
        let r = FieldRange::new("doc.x").with_start(10i64, true);
        let planned = IndexRange::plan(&IndexKey::new(&doc_index()), Some(&r), Direction::Forward)?;

        assert!(planned.contains(&json(FieldValue::Double(10.0))));
        assert!(planned.contains(&json(FieldValue::Double(1e300))));
        assert!(!planned.contains(&json(FieldValue::Double(9.5))));
        assert!(!planned.contains(&json(FieldValue::String("".to_string()))));
        assert!(!planned.contains(&json(FieldValue::Boolean(false))));
        Ok(())
    }

    #[test]
    fn test_exclusive_lower_bound_above_exact_doubles() -> anyhow::Result<()> {
        let two_53 = 1i64 << 53;
        let r = FieldRange::new("doc.x").with_start(two_53, false);
        let planned = IndexRange::plan(&IndexKey::new(&doc_index()), Some(&r), Direction::Forward)?;

        assert!(!planned.contains(&json(FieldValue::Long(two_53))));
        assert!(!planned.contains(&json(FieldValue::Double(two_53 as f64))));
        assert!(planned.contains(&json(FieldValue::Long(two_53 + 1))));
        assert!(planned.contains(&json(FieldValue::Long(two_53 + 2))));
        assert!(planned.contains(&json(FieldValue::Long(i64::MAX))));
        Ok(())
    }

    #[test]
    fn test_upper_only_stays_in_strings() -> anyhow::Result<()> {
        let r = FieldRange::new("doc.x").with_end("m", false);
        let planned = IndexRange::plan(&IndexKey::new(&doc_index()), Some(&r), Direction::Forward)?;

        assert!(planned.contains(&json(FieldValue::String("".to_string()))));
        assert!(planned.contains(&json(FieldValue::String("abc".to_string()))));
        assert!(!planned.contains(&json(FieldValue::String("m".to_string()))));
        assert!(!planned.contains(&json(FieldValue::Double(1.0))));
        assert!(!planned.contains(&json(FieldValue::Boolean(true))));
        Ok(())
    }

    #[test]
    fn test_inclusive_true_covers_booleans_only() -> anyhow::Result<()> {
        let r = FieldRange::new("doc.x")
            .with_start(false, true)
            .with_end(true, true);
        let planned = IndexRange::plan(&IndexKey::new(&doc_index()), Some(&r), Direction::Forward)?;

        assert!(planned.contains(&json(FieldValue::Boolean(false))));
        assert!(planned.contains(&json(FieldValue::Boolean(true))));
        assert!(!planned.contains(&json(FieldValue::Empty)));
        assert!(!planned.contains(&json(FieldValue::Null)));
        Ok(())
    }

    #[test]
    fn test_unsupported_bound_kind() {
        let r = FieldRange::new("doc.x").with_start(FieldValue::Null, true);
        let err =
            IndexRange::plan(&IndexKey::new(&doc_index()), Some(&r), Direction::Forward).unwrap_err();

        assert_eq!(err, RangeError::UnsupportedUntypedFieldType {
            field: "doc.x".to_string(),
            value_kind: "NULL".to_string(),
        });
    }
}
