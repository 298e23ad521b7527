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

//! Byte bounds of an index scan.
//!
//! All bounds are serialized index keys and compare as unsigned bytes. The start bound is
//! inclusive and the end bound exclusive: an inclusive end is turned into an exclusive one
//! by taking the successor of its token.

#[cfg(test)]
#[path = "index_range_test.rs"]
mod index_range_test;

use log::debug;

use crate::error::RangeError;
use crate::field::codec::encode_field;
use crate::field::codec::successor;
use crate::field::codec::Token;
use crate::field::FieldType;
use crate::field::FieldValue;
use crate::index::untyped;
use crate::index::Direction;
use crate::index::FieldRange;
use crate::index::IndexKey;
use crate::index::DELIMITER;

/// The physical bounds of one index scan. Computed once per scan, then immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRange {
    /// Serialized index-key fields, not including the range field.
    prefix_key: Vec<u8>,

    /// Inclusive start.
    start_key: Vec<u8>,

    /// Exclusive end. `None`: bounded only by `prefix_key`.
    end_key: Option<Vec<u8>>,

    /// Every index field is specified.
    exact_match: bool,

    direction: Direction,
}

impl IndexRange {
    /// Plan the bounds of scanning the entries under `key`, optionally restricted by
    /// `range` on the first field `key` leaves unspecified.
    pub fn plan(
        key: &IndexKey,
        range: Option<&FieldRange>,
        direction: Direction,
    ) -> Result<Self, RangeError> {
        let tokens = key.tokens()?;
        let prefix_key = super::serialize_tokens(&tokens);
        let index = key.index();

        if key.is_complete() {
            if let Some(r) = range {
                return Err(RangeError::InvalidFieldRangeField(format!(
                    "range on '{}' can not be combined with a complete key of index {}",
                    r.field(),
                    index.name()
                )));
            }

            return Ok(Self {
                start_key: prefix_key.clone(),
                prefix_key,
                end_key: None,
                exact_match: true,
                direction,
            });
        }

        let Some(range) = range else {
            return Ok(Self {
                start_key: prefix_key.clone(),
                prefix_key,
                end_key: None,
                exact_match: false,
                direction,
            });
        };

        let field = &index.fields()[tokens.len()];
        if range.field() != field.name {
            return Err(RangeError::InvalidFieldRangeField(format!(
                "'{}' is not the field following the key prefix of index {}, expect '{}'",
                range.field(),
                index.name(),
                field.name
            )));
        }

        let name = field.name.as_str();
        let field_type = &field.field_type;

        let planned = match (range.start(), range.end()) {
            (None, None) => {
                return Err(RangeError::InvalidFieldRangeField(format!(
                    "range on '{}' has neither start nor end",
                    name
                )));
            }
            (Some(start), Some(end)) if range.is_prefix() => {
                if start != end {
                    return Err(RangeError::InvalidFieldRangeField(format!(
                        "prefix range on '{}' requires start == end",
                        name
                    )));
                }
                Self::plan_prefix(prefix_key, name, field_type, start, direction)?
            }
            (start, end) => {
                let start_key = lower_bound(&prefix_key, name, field_type, range, start, end)?;
                let end_key = upper_bound(&prefix_key, name, field_type, range, start, end)?;
                Self {
                    prefix_key,
                    start_key,
                    end_key,
                    exact_match: false,
                    direction,
                }
            }
        };

        debug!("IndexRange::plan: index={} range={:?}", index.name(), planned);
        Ok(planned)
    }

    /// A prefix scan matches every value whose serialized token starts with the token of
    /// `value`: the serialized start without its trailing delimiter becomes the prefix.
    fn plan_prefix(
        prefix_key: Vec<u8>,
        name: &str,
        field_type: &FieldType,
        value: &FieldValue,
        direction: Direction,
    ) -> Result<Self, RangeError> {
        let token = encode_field(name, field_type, value)?;

        let mut start = append_token(&prefix_key, &token);
        start.pop();

        Ok(Self {
            prefix_key: start.clone(),
            start_key: start,
            end_key: None,
            exact_match: false,
            direction,
        })
    }

    pub fn prefix_key(&self) -> &[u8] {
        &self.prefix_key
    }

    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    pub fn end_key(&self) -> Option<&[u8]> {
        self.end_key.as_deref()
    }

    pub fn exact_match(&self) -> bool {
        self.exact_match
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Check whether a candidate entry met during iteration in `direction` is still
    /// inside the range.
    ///
    /// Iteration is assumed to start at the bound opposite to the one checked here: a
    /// forward scan starts at `start_key` and only checks the end; a reverse scan starts
    /// at the end and checks the start.
    pub fn in_range(&self, key: &[u8], direction: Direction) -> bool {
        if !self.matches_prefix(key) {
            return false;
        }

        match direction {
            Direction::Forward | Direction::Unordered => match &self.end_key {
                Some(end) => key < end.as_slice(),
                None => true,
            },
            Direction::Reverse => key >= self.start_key.as_slice(),
        }
    }

    /// Check both bounds and the prefix.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.in_range(key, Direction::Forward) && key >= self.start_key.as_slice()
    }

    /// The exclusive upper edge a reverse scan starts from.
    ///
    /// `None` if the range is unbounded above.
    pub fn reverse_seek_key(&self) -> Option<Vec<u8>> {
        if let Some(end) = &self.end_key {
            return Some(end.clone());
        }

        // The smallest key greater than everything starting with the prefix.
        let mut upper = self.prefix_key.clone();
        while let Some(last) = upper.pop() {
            if last < 0xFF {
                upper.push(last + 1);
                return Some(upper);
            }
        }
        None
    }

    /// Compare only as many bytes as both sides have.
    fn matches_prefix(&self, key: &[u8]) -> bool {
        let n = key.len().min(self.prefix_key.len());
        key[..n] == self.prefix_key[..n]
    }
}

fn append_token(prefix: &[u8], token: &Token) -> Vec<u8> {
    let mut buf = Vec::with_capacity(prefix.len() + token.len() + 1);
    buf.extend_from_slice(prefix);
    buf.extend_from_slice(token);
    buf.push(DELIMITER);
    buf
}

fn append_class_edge(prefix: &[u8], tag: u8) -> Vec<u8> {
    let mut buf = prefix.to_vec();
    buf.push(tag);
    buf
}

fn lower_bound(
    prefix_key: &[u8],
    name: &str,
    field_type: &FieldType,
    range: &FieldRange,
    start: Option<&FieldValue>,
    end: Option<&FieldValue>,
) -> Result<Vec<u8>, RangeError> {
    match (start, end) {
        (Some(v), _) => {
            let mut token = encode_field(name, field_type, v)?;
            if !range.start_inclusive() {
                token = successor(field_type, &token).ok_or_else(|| {
                    RangeError::EmptyRangeAfterIncrement {
                        field: name.to_string(),
                    }
                })?;
            }
            Ok(append_token(prefix_key, &token))
        }
        (None, Some(v)) if field_type.is_imprecise() => Ok(append_class_edge(
            prefix_key,
            untyped::class_start(name, v)?,
        )),
        (None, _) => Ok(prefix_key.to_vec()),
    }
}

fn upper_bound(
    prefix_key: &[u8],
    name: &str,
    field_type: &FieldType,
    range: &FieldRange,
    start: Option<&FieldValue>,
    end: Option<&FieldValue>,
) -> Result<Option<Vec<u8>>, RangeError> {
    match (start, end) {
        (_, Some(v)) => {
            let token = encode_field(name, field_type, v)?;
            if !range.end_inclusive() {
                return Ok(Some(append_token(prefix_key, &token)));
            }

            match successor(field_type, &token) {
                Some(next) => Ok(Some(append_token(prefix_key, &next))),
                // The greatest value of its class: end before the next class.
                None if field_type.is_imprecise() => Ok(token
                    .first()
                    .map(|tag| append_class_edge(prefix_key, untyped::next_class(*tag)))),
                None => Ok(None),
            }
        }
        (Some(v), None) if field_type.is_imprecise() => Ok(Some(append_class_edge(
            prefix_key,
            untyped::class_end(name, v)?,
        ))),
        (_, None) => Ok(None),
    }
}
