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

//! Order-preserving key tokens.
//!
//! Every field value becomes one token. Tokens of one type compare, as unsigned bytes,
//! in the natural order of the values. No token contains `0x00`, which is used as the
//! component delimiter of serialized keys.
//!
//! Token formats:
//!
//! | type                         | token                                         |
//! |------------------------------|-----------------------------------------------|
//! | Integer, Long, Timestamp     | sign-flipped value, fixed-width lowercase hex |
//! | Float, Double                | total-order bits, fixed-width lowercase hex   |
//! | Boolean                      | `'0'` or `'1'`                                |
//! | Enum                         | ordinal, 4 hex digits                         |
//! | Uuid                         | 128 bit value, 32 hex digits                  |
//! | String                       | UTF-8, `00 -> 01 01`, `01 -> 01 02`           |
//! | Json                         | type-class tag byte + typed token             |
//!
//! Untyped numbers share one representation: the nearest double as a `Double` token,
//! followed by 4 hex digits holding the biased distance from that double to the exact
//! value. The distance is only non-zero for longs a double cannot represent, so every
//! `i64` keeps its own token and still sorts among the doubles.

use crate::error::KeyError;
use crate::field::FieldType;
use crate::field::FieldValue;

/// One encoded key component.
pub type Token = Vec<u8>;

const ESCAPE: u8 = 0x01;

/// Type-class tags of untyped (JSON) tokens.
///
/// The order of the tags is the cross-type order of an untyped index and is part of the
/// on-disk format.
pub(crate) const TAG_NUMBER: u8 = 0x20;
pub(crate) const TAG_STRING: u8 = 0x30;
pub(crate) const TAG_BOOLEAN: u8 = 0x40;
pub(crate) const TAG_EMPTY: u8 = 0x50;
pub(crate) const TAG_JSON_NULL: u8 = 0x60;
pub(crate) const TAG_NULL: u8 = 0x70;

/// Encode `value` as a token of the declared type `field_type`.
///
/// `field` is only used in error messages.
pub fn encode_field(
    field: &str,
    field_type: &FieldType,
    value: &FieldValue,
) -> Result<Token, KeyError> {
    let mismatch = || KeyError::FieldTypeMismatch {
        field: field.to_string(),
        expected: field_type.to_string(),
        actual: value.kind().to_string(),
    };

    let token = match (field_type, value) {
        (FieldType::Boolean, FieldValue::Boolean(b)) => encode_bool(*b),
        (FieldType::Integer, FieldValue::Integer(v)) => encode_i32(*v),
        (FieldType::Long, FieldValue::Long(v)) => encode_i64(*v),
        (FieldType::Long, FieldValue::Integer(v)) => encode_i64(i64::from(*v)),
        (FieldType::Float, FieldValue::Float(v)) => encode_f32(*v),
        (FieldType::Double, FieldValue::Double(v)) => encode_f64(*v),
        (FieldType::Double, FieldValue::Float(v)) => encode_f64(f64::from(*v)),
        (FieldType::String, FieldValue::String(s)) => encode_string(s),
        (FieldType::Enum { symbols }, FieldValue::Enum(ordinal)) => {
            if usize::from(*ordinal) >= symbols.len() {
                return Err(mismatch());
            }
            format!("{:04x}", ordinal).into_bytes()
        }
        (FieldType::Timestamp, FieldValue::Timestamp(v)) => encode_i64(*v),
        (FieldType::Uuid, FieldValue::Uuid(v)) => format!("{:032x}", v).into_bytes(),
        (FieldType::Json, v) => encode_untyped(v).ok_or_else(mismatch)?,
        _ => return Err(mismatch()),
    };

    Ok(token)
}

/// Decode a token produced by [`encode_field`] for the same type.
///
/// Values stored under an untyped field decode to their canonical kind: numbers a double
/// represents exactly become `Double`, the remaining longs stay `Long`.
pub fn decode_field(field_type: &FieldType, token: &[u8]) -> Result<FieldValue, KeyError> {
    let invalid = || KeyError::InvalidToken {
        field_type: field_type.to_string(),
        token: token.to_vec(),
    };

    let value = match field_type {
        FieldType::Boolean => FieldValue::Boolean(decode_bool(token).ok_or_else(invalid)?),
        FieldType::Integer => {
            let bits = parse_hex(token, 8).ok_or_else(invalid)? as u32;
            FieldValue::Integer((bits ^ (1u32 << 31)) as i32)
        }
        FieldType::Long => FieldValue::Long(decode_i64(token).ok_or_else(invalid)?),
        FieldType::Timestamp => FieldValue::Timestamp(decode_i64(token).ok_or_else(invalid)?),
        FieldType::Float => {
            let bits = parse_hex(token, 8).ok_or_else(invalid)? as u32;
            FieldValue::Float(f32::from_bits(unorder_f32(bits)))
        }
        FieldType::Double => FieldValue::Double(decode_f64(token).ok_or_else(invalid)?),
        FieldType::String => FieldValue::String(decode_string(token).ok_or_else(invalid)?),
        FieldType::Enum { symbols } => {
            let ordinal = parse_hex(token, 4).ok_or_else(invalid)? as u16;
            if usize::from(ordinal) >= symbols.len() {
                return Err(invalid());
            }
            FieldValue::Enum(ordinal)
        }
        FieldType::Uuid => FieldValue::Uuid(parse_hex(token, 32).ok_or_else(invalid)?),
        FieldType::Json => decode_untyped(token).ok_or_else(invalid)?,
    };

    Ok(value)
}

/// The smallest token of `field_type` that is greater than `token`.
///
/// Returns `None` if `token` is already the greatest value of the type.
pub fn successor(field_type: &FieldType, token: &[u8]) -> Option<Token> {
    match field_type {
        FieldType::Boolean => match token {
            b"0" => Some(b"1".to_vec()),
            _ => None,
        },
        FieldType::Integer => hex_increment(token, 8, u128::from(u32::MAX)),
        FieldType::Long | FieldType::Timestamp => hex_increment(token, 16, u128::from(u64::MAX)),
        FieldType::Float => hex_increment(token, 8, u128::from(order_f32(f32::INFINITY.to_bits()))),
        FieldType::Double => {
            hex_increment(token, 16, u128::from(order_f64(f64::INFINITY.to_bits())))
        }
        FieldType::Enum { symbols } => {
            let last = symbols.len().checked_sub(1)?;
            hex_increment(token, 4, last as u128)
        }
        FieldType::Uuid => hex_increment(token, 32, u128::MAX),
        // The next string is the current one followed by the smallest character.
        FieldType::String => {
            let mut next = token.to_vec();
            next.extend_from_slice(&[ESCAPE, 0x01]);
            Some(next)
        }
        FieldType::Json => {
            let (tag, rest) = token.split_first()?;
            let inner = match *tag {
                TAG_NUMBER => number_successor(rest)?,
                TAG_STRING => successor(&FieldType::String, rest)?,
                TAG_BOOLEAN => successor(&FieldType::Boolean, rest)?,
                _ => return None,
            };
            let mut next = vec![*tag];
            next.extend_from_slice(&inner);
            Some(next)
        }
    }
}

/// The type-class tag an untyped index stores `value` under.
pub(crate) fn untyped_tag(value: &FieldValue) -> Option<u8> {
    let tag = match value {
        v if v.is_numeric() => TAG_NUMBER,
        FieldValue::String(_) => TAG_STRING,
        FieldValue::Boolean(_) => TAG_BOOLEAN,
        FieldValue::Empty => TAG_EMPTY,
        FieldValue::JsonNull => TAG_JSON_NULL,
        FieldValue::Null => TAG_NULL,
        _ => return None,
    };
    Some(tag)
}

fn encode_untyped(value: &FieldValue) -> Option<Token> {
    let tag = untyped_tag(value)?;
    let mut token = vec![tag];

    let body = match value {
        FieldValue::Integer(v) => encode_number(f64::from(*v), 0),
        FieldValue::Long(v) => {
            let nearest = *v as f64;
            // |v - nearest| is at most half an ulp of 2^63, far inside an i16
            encode_number(nearest, (i128::from(*v) - nearest as i128) as i16)
        }
        FieldValue::Float(v) => encode_number(f64::from(*v), 0),
        FieldValue::Double(v) => encode_number(*v, 0),
        FieldValue::String(s) => encode_string(s),
        FieldValue::Boolean(b) => encode_bool(*b),
        _ => vec![],
    };
    token.extend_from_slice(&body);
    Some(token)
}

fn decode_untyped(token: &[u8]) -> Option<FieldValue> {
    let (tag, rest) = token.split_first()?;
    let value = match *tag {
        TAG_NUMBER => decode_number(rest)?,
        TAG_STRING => FieldValue::String(decode_string(rest)?),
        TAG_BOOLEAN => FieldValue::Boolean(decode_bool(rest)?),
        TAG_EMPTY if rest.is_empty() => FieldValue::Empty,
        TAG_JSON_NULL if rest.is_empty() => FieldValue::JsonNull,
        TAG_NULL if rest.is_empty() => FieldValue::Null,
        _ => return None,
    };
    Some(value)
}

const NUMBER_OFFSET_BIAS: i32 = 0x8000;

fn encode_number(nearest: f64, offset: i16) -> Token {
    let mut token = encode_f64(nearest);
    let biased = (i32::from(offset) + NUMBER_OFFSET_BIAS) as u16;
    token.extend_from_slice(format!("{:04x}", biased).as_bytes());
    token
}

fn decode_number(token: &[u8]) -> Option<FieldValue> {
    if token.len() != 20 {
        return None;
    }
    let nearest = decode_f64(&token[..16])?;
    let offset = parse_hex(&token[16..], 4)? as i32 - NUMBER_OFFSET_BIAS;
    if offset == 0 {
        return Some(FieldValue::Double(nearest));
    }

    if !nearest.is_finite() || nearest.fract() != 0.0 {
        return None;
    }
    let exact = nearest as i128 + i128::from(offset);
    let v = i64::try_from(exact).ok()?;
    // Only the offset `encode_number` would have produced for `v` is accepted
    if v as f64 != nearest {
        return None;
    }
    Some(FieldValue::Long(v))
}

fn number_successor(token: &[u8]) -> Option<Token> {
    if token.len() != 20 {
        return None;
    }
    let (nearest, offset) = token.split_at(16);
    if let Some(next) = hex_increment(offset, 4, 0xFFFF) {
        let mut token = nearest.to_vec();
        token.extend_from_slice(&next);
        return Some(token);
    }
    let mut token = successor(&FieldType::Double, nearest)?;
    token.extend_from_slice(b"0000");
    Some(token)
}

fn encode_bool(b: bool) -> Token {
    if b {
        b"1".to_vec()
    } else {
        b"0".to_vec()
    }
}

fn decode_bool(token: &[u8]) -> Option<bool> {
    match token {
        b"0" => Some(false),
        b"1" => Some(true),
        _ => None,
    }
}

fn encode_i32(v: i32) -> Token {
    // Flip the sign bit so that negative values sort first
    format!("{:08x}", (v as u32) ^ (1u32 << 31)).into_bytes()
}

fn encode_i64(v: i64) -> Token {
    format!("{:016x}", (v as u64) ^ (1u64 << 63)).into_bytes()
}

fn decode_i64(token: &[u8]) -> Option<i64> {
    let bits = parse_hex(token, 16)? as u64;
    Some((bits ^ (1u64 << 63)) as i64)
}

fn encode_f32(v: f32) -> Token {
    format!("{:08x}", order_f32(v.to_bits())).into_bytes()
}

fn encode_f64(v: f64) -> Token {
    format!("{:016x}", order_f64(v.to_bits())).into_bytes()
}

fn decode_f64(token: &[u8]) -> Option<f64> {
    let bits = parse_hex(token, 16)? as u64;
    Some(f64::from_bits(unorder_f64(bits)))
}

/// Negative floats have all bits flipped, positive ones only the sign bit.
fn order_f32(bits: u32) -> u32 {
    if bits & (1u32 << 31) != 0 {
        !bits
    } else {
        bits | (1u32 << 31)
    }
}

fn unorder_f32(bits: u32) -> u32 {
    if bits & (1u32 << 31) != 0 {
        bits & !(1u32 << 31)
    } else {
        !bits
    }
}

fn order_f64(bits: u64) -> u64 {
    if bits & (1u64 << 63) != 0 {
        !bits
    } else {
        bits | (1u64 << 63)
    }
}

fn unorder_f64(bits: u64) -> u64 {
    if bits & (1u64 << 63) != 0 {
        bits & !(1u64 << 63)
    } else {
        !bits
    }
}

fn encode_string(s: &str) -> Token {
    let mut token = Vec::with_capacity(s.len());
    for &b in s.as_bytes() {
        match b {
            0x00 => token.extend_from_slice(&[ESCAPE, 0x01]),
            ESCAPE => token.extend_from_slice(&[ESCAPE, 0x02]),
            b => token.push(b),
        }
    }
    token
}

fn decode_string(token: &[u8]) -> Option<String> {
    let mut bytes = Vec::with_capacity(token.len());
    let mut it = token.iter();
    while let Some(&b) = it.next() {
        match b {
            0x00 => return None,
            ESCAPE => match it.next()? {
                0x01 => bytes.push(0x00),
                0x02 => bytes.push(ESCAPE),
                _ => return None,
            },
            b => bytes.push(b),
        }
    }
    String::from_utf8(bytes).ok()
}

fn parse_hex(token: &[u8], width: usize) -> Option<u128> {
    if token.len() != width {
        return None;
    }
    if !token.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    let s = std::str::from_utf8(token).ok()?;
    u128::from_str_radix(s, 16).ok()
}

fn hex_increment(token: &[u8], width: usize, max: u128) -> Option<Token> {
    let v = parse_hex(token, width)?;
    if v >= max {
        return None;
    }
    Some(format!("{:0width$x}", v + 1, width = width).into_bytes())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn enc(t: &FieldType, v: impl Into<FieldValue>) -> Token {
        encode_field("f", t, &v.into()).unwrap()
    }

    fn colors() -> FieldType {
        FieldType::Enum {
            symbols: vec!["RED".to_string(), "GREEN".to_string(), "BLUE".to_string()],
        }
    }

    #[test]
    fn test_round_trip_scalars() {
        let cases = vec![
            (FieldType::Boolean, FieldValue::Boolean(true)),
            (FieldType::Integer, FieldValue::Integer(-42)),
            (FieldType::Long, FieldValue::Long(i64::MIN)),
            (FieldType::Float, FieldValue::Float(-1.5)),
            (FieldType::Double, FieldValue::Double(3.25)),
            (FieldType::String, FieldValue::String("a\u{0}b\u{1}c".to_string())),
            (colors(), FieldValue::Enum(2)),
            (FieldType::Timestamp, FieldValue::Timestamp(1_700_000_000_000_000)),
            (FieldType::Uuid, FieldValue::Uuid(0x1234_5678_9abc_def0_u128 << 64)),
            (FieldType::Json, FieldValue::Double(-7.0)),
            (FieldType::Json, FieldValue::String("x".to_string())),
            (FieldType::Json, FieldValue::Boolean(false)),
            (FieldType::Json, FieldValue::Empty),
            (FieldType::Json, FieldValue::JsonNull),
            (FieldType::Json, FieldValue::Null),
        ];

        for (t, v) in cases {
            let token = encode_field("f", &t, &v).unwrap();
            assert!(!token.contains(&0x00), "{:?} produced a delimiter byte", v);
            assert_eq!(decode_field(&t, &token).unwrap(), v);
        }
    }

    #[test]
    fn test_order_preserved() {
        let ints = [i32::MIN, -100, -1, 0, 1, 99, i32::MAX];
        for w in ints.windows(2) {
            assert!(enc(&FieldType::Integer, w[0]) < enc(&FieldType::Integer, w[1]));
        }

        let longs = [i64::MIN, -5, 0, 7, i64::MAX];
        for w in longs.windows(2) {
            assert!(enc(&FieldType::Long, w[0]) < enc(&FieldType::Long, w[1]));
        }

        let doubles = [f64::NEG_INFINITY, -2.5, -0.0, 0.0, 1e-9, 2.0, f64::INFINITY];
        for w in doubles.windows(2) {
            assert!(enc(&FieldType::Double, w[0]) <= enc(&FieldType::Double, w[1]));
        }

        let strings = ["", "\u{0}", "\u{1}", "a", "a\u{0}", "ab", "b"];
        for w in strings.windows(2) {
            assert!(enc(&FieldType::String, w[0]) < enc(&FieldType::String, w[1]));
        }

        assert!(enc(&FieldType::Boolean, false) < enc(&FieldType::Boolean, true));
    }

    #[test]
    fn test_untyped_cross_type_order() {
        let json = FieldType::Json;
        let num = enc(&json, 1_000_000i64);
        let s = enc(&json, "");
        let b = enc(&json, false);
        let empty = encode_field("f", &json, &FieldValue::Empty).unwrap();
        let null = encode_field("f", &json, &FieldValue::Null).unwrap();

        assert!(num < s);
        assert!(s < b);
        assert!(b < empty);
        assert!(empty < null);

        // Integers and doubles share the canonical numeric representation.
        assert_eq!(enc(&json, 3i32), enc(&json, 3.0));
        assert_eq!(enc(&json, 3i64), enc(&json, 3.0));
    }

    #[test]
    fn test_untyped_longs_beyond_double_precision() {
        let json = FieldType::Json;
        let two_53 = 1i64 << 53;

        // 2^53 + 1 has no double of its own but keeps a distinct token.
        assert_ne!(enc(&json, two_53), enc(&json, two_53 + 1));
        assert!(enc(&json, two_53) < enc(&json, two_53 + 1));
        assert!(enc(&json, two_53 + 1) < enc(&json, two_53 + 2));
        assert_eq!(enc(&json, two_53 + 2), enc(&json, (two_53 + 2) as f64));
        assert!(enc(&json, 9.0e15) < enc(&json, two_53 + 1));
        assert!(enc(&json, two_53 + 1) < enc(&json, 9.1e15));

        for v in [two_53 + 1, -(two_53 + 1), i64::MAX, i64::MAX - 1, i64::MIN + 1] {
            let token = enc(&json, v);
            assert_eq!(decode_field(&json, &token).unwrap(), FieldValue::Long(v));
        }
        assert_eq!(
            decode_field(&json, &enc(&json, two_53)).unwrap(),
            FieldValue::Double(two_53 as f64)
        );

        let mut longs = vec![i64::MIN, -(two_53 + 1), -1, 0, two_53, two_53 + 1, i64::MAX];
        longs.sort();
        for w in longs.windows(2) {
            assert!(enc(&json, w[0]) < enc(&json, w[1]), "{} < {}", w[0], w[1]);
        }
    }

    #[test]
    fn test_untyped_number_successor() {
        let json = FieldType::Json;
        let two_53 = 1i64 << 53;

        assert_eq!(successor(&json, &enc(&json, two_53)), Some(enc(&json, two_53 + 1)));

        let next = successor(&json, &enc(&json, 1.0)).unwrap();
        assert!(enc(&json, 1.0) < next);
        assert!(next < enc(&json, f64::from_bits(1.0f64.to_bits() + 1)));
    }

    #[test]
    fn test_successor() {
        let t = FieldType::Integer;
        assert_eq!(successor(&t, &enc(&t, 41i32)), Some(enc(&t, 42i32)));
        assert_eq!(successor(&t, &enc(&t, -1i32)), Some(enc(&t, 0i32)));
        assert_eq!(successor(&t, &enc(&t, i32::MAX)), None);

        let t = FieldType::Long;
        assert_eq!(successor(&t, &enc(&t, i64::MAX)), None);

        let t = FieldType::Boolean;
        assert_eq!(successor(&t, &enc(&t, false)), Some(enc(&t, true)));
        assert_eq!(successor(&t, &enc(&t, true)), None);

        let t = colors();
        assert_eq!(
            successor(&t, &encode_field("f", &t, &FieldValue::Enum(1)).unwrap()),
            Some(encode_field("f", &t, &FieldValue::Enum(2)).unwrap())
        );
        assert_eq!(
            successor(&t, &encode_field("f", &t, &FieldValue::Enum(2)).unwrap()),
            None
        );

        let t = FieldType::Double;
        assert_eq!(successor(&t, &enc(&t, f64::INFINITY)), None);
        let next = successor(&t, &enc(&t, 1.0)).unwrap();
        assert_eq!(
            decode_field(&t, &next).unwrap(),
            FieldValue::Double(f64::from_bits(1.0f64.to_bits() + 1))
        );
    }

    #[test]
    fn test_string_successor_is_tight() {
        let t = FieldType::String;
        let next = successor(&t, &enc(&t, "ab")).unwrap();

        assert!(enc(&t, "ab") < next);
        assert_eq!(next, enc(&t, "ab\u{0}"));
        assert!(next < enc(&t, "ab\u{1}"));
        assert!(next < enc(&t, "ac"));
    }

    #[test]
    fn test_type_mismatch() {
        let got = encode_field("age", &FieldType::Integer, &FieldValue::String("x".into()));
        assert_eq!(
            got,
            Err(KeyError::FieldTypeMismatch {
                field: "age".to_string(),
                expected: "INTEGER".to_string(),
                actual: "STRING".to_string(),
            })
        );

        let got = encode_field("c", &colors(), &FieldValue::Enum(3));
        assert!(got.is_err());

        let got = encode_field("j", &FieldType::Json, &FieldValue::Uuid(1));
        assert!(got.is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_field(&FieldType::Integer, b"zz").is_err());
        assert!(decode_field(&FieldType::Integer, b"0000000G").is_err());
        assert!(decode_field(&FieldType::String, &[b'a', ESCAPE]).is_err());
        assert!(decode_field(&FieldType::Json, &[0x99]).is_err());

        // A non-zero offset on a double that is not an integer.
        let mut token = enc(&FieldType::Json, 1.5);
        let len = token.len();
        token[len - 4..].copy_from_slice(b"8001");
        assert!(decode_field(&FieldType::Json, &token).is_err());
    }
}
