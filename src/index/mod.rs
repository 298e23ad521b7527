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

//! Secondary index keys and the byte bounds of index scans.
//!
//! An index key is the serialized form of the leading index fields: every field token
//! followed by the `0x00` delimiter. Index entries sort by these bytes, so a partial
//! index key is a byte prefix of every entry it matches.

pub mod field_range;
pub mod index_range;
mod untyped;

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

pub use self::field_range::Direction;
pub use self::field_range::FieldRange;
pub use self::index_range::IndexRange;
use crate::error::KeyError;
use crate::field::codec::encode_field;
use crate::field::codec::Token;
use crate::field::FieldDef;
use crate::field::FieldValue;

pub(crate) const DELIMITER: u8 = 0x00;

/// Serialize tokens as an index key: each token followed by the delimiter.
pub fn serialize_tokens<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> Vec<u8> {
    let mut buf = Vec::new();
    for t in tokens {
        buf.extend_from_slice(t);
        buf.push(DELIMITER);
    }
    buf
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    name: String,
    fields: Vec<FieldDef>,
}

impl IndexDef {
    pub fn new(name: impl ToString, fields: Vec<FieldDef>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A possibly partial assignment of values to the leading fields of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexKey {
    index: Arc<IndexDef>,
    values: Vec<Option<FieldValue>>,
}

impl IndexKey {
    pub fn new(index: &Arc<IndexDef>) -> Self {
        Self {
            index: index.clone(),
            values: vec![None; index.fields.len()],
        }
    }

    pub fn index(&self) -> &Arc<IndexDef> {
        &self.index
    }

    pub fn put(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), KeyError> {
        let pos = self
            .index
            .field_position(field)
            .ok_or_else(|| KeyError::UnknownField {
                owner: format!("index {}", self.index.name),
                field: field.to_string(),
            })?;
        self.values[pos] = Some(value.into());
        Ok(())
    }

    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Result<Self, KeyError> {
        self.put(field, value)?;
        Ok(self)
    }

    pub fn put_at(&mut self, pos: usize, value: FieldValue) -> Result<(), KeyError> {
        let slot = self
            .values
            .get_mut(pos)
            .ok_or_else(|| KeyError::UnknownField {
                owner: format!("index {}", self.index.name),
                field: format!("#{}", pos),
            })?;
        *slot = Some(value);
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        let pos = self.index.field_position(field)?;
        self.values[pos].as_ref()
    }

    /// Number of leading fields that have a value.
    pub fn specified_len(&self) -> usize {
        self.values.iter().take_while(|v| v.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|v| v.is_some())
    }

    /// Encode the leading specified fields.
    ///
    /// A field with a value after an unspecified one is rejected with
    /// [`KeyError::InconsistentPartialKey`].
    pub fn tokens(&self) -> Result<Vec<Token>, KeyError> {
        let n = self.specified_len();

        if let Some(extra) = self.values[n..].iter().position(|v| v.is_some()) {
            return Err(KeyError::InconsistentPartialKey {
                missing: self.index.fields[n].name.clone(),
                field: self.index.fields[n + extra].name.clone(),
            });
        }

        self.index.fields[..n]
            .iter()
            .zip(self.values.iter().flatten())
            .map(|(f, v)| encode_field(&f.name, &f.field_type, v))
            .collect()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, KeyError> {
        Ok(serialize_tokens(&self.tokens()?))
    }
}
