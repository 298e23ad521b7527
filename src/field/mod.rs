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

//! Declared field types and the values that can be placed in a key.
//!
//! Only the subset of the type system needed to build keys lives here: a closed set of
//! key-capable types and their values. How a type turns into bytes is in [`codec`].

pub mod codec;

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The declared type of a key or index field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    String,
    Enum { symbols: Vec<String> },
    /// Microseconds since the epoch.
    Timestamp,
    Uuid,
    /// Untyped (JSON) field: values of any scalar kind may be stored under it.
    Json,
}

impl FieldType {
    /// An imprecise type does not fix the kind of the values stored under it.
    pub fn is_imprecise(&self) -> bool {
        matches!(self, FieldType::Json)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => write!(f, "BOOLEAN"),
            FieldType::Integer => write!(f, "INTEGER"),
            FieldType::Long => write!(f, "LONG"),
            FieldType::Float => write!(f, "FLOAT"),
            FieldType::Double => write!(f, "DOUBLE"),
            FieldType::String => write!(f, "STRING"),
            FieldType::Enum { symbols } => write!(f, "ENUM({})", symbols.join(",")),
            FieldType::Timestamp => write!(f, "TIMESTAMP"),
            FieldType::Uuid => write!(f, "UUID"),
            FieldType::Json => write!(f, "JSON"),
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Ordinal of the symbol in the declared enum.
    Enum(u16),
    Timestamp(i64),
    Uuid(u128),
    /// The EMPTY marker of untyped indexes: the path does not exist in the document.
    Empty,
    JsonNull,
    Null,
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Boolean(_) => "BOOLEAN",
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::Long(_) => "LONG",
            FieldValue::Float(_) => "FLOAT",
            FieldValue::Double(_) => "DOUBLE",
            FieldValue::String(_) => "STRING",
            FieldValue::Enum(_) => "ENUM",
            FieldValue::Timestamp(_) => "TIMESTAMP",
            FieldValue::Uuid(_) => "UUID",
            FieldValue::Empty => "EMPTY",
            FieldValue::JsonNull => "JSON_NULL",
            FieldValue::Null => "NULL",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldValue::Integer(_)
                | FieldValue::Long(_)
                | FieldValue::Float(_)
                | FieldValue::Double(_)
        )
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Long(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// How a key field gets a value when the caller does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Generated {
    Identity,
    Uuid,
}

/// A named, typed field of a primary key or an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub generated: Option<Generated>,
}

impl FieldDef {
    pub fn new(name: impl ToString, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            generated: None,
        }
    }

    pub fn with_generated(mut self, generated: Generated) -> Self {
        self.generated = Some(generated);
        self
    }
}
