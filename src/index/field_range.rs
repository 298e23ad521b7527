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

use serde::Deserialize;
use serde::Serialize;

use crate::field::FieldValue;

/// Iteration order of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
    /// No order is required; executed like [`Direction::Forward`] within a partition.
    Unordered,
}

/// A predicate on the index field that immediately follows the specified index-key
/// prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    field: String,
    start: Option<FieldValue>,
    start_inclusive: bool,
    end: Option<FieldValue>,
    end_inclusive: bool,
    /// Match every value that has `start` as a byte prefix. `start == end`.
    prefix: bool,
}

impl FieldRange {
    pub fn new(field: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            start: None,
            start_inclusive: true,
            end: None,
            end_inclusive: true,
            prefix: false,
        }
    }

    pub fn with_start(mut self, value: impl Into<FieldValue>, inclusive: bool) -> Self {
        self.start = Some(value.into());
        self.start_inclusive = inclusive;
        self
    }

    pub fn with_end(mut self, value: impl Into<FieldValue>, inclusive: bool) -> Self {
        self.end = Some(value.into());
        self.end_inclusive = inclusive;
        self
    }

    /// Match all keys whose encoded value starts with the encoded `value`.
    pub fn with_prefix(mut self, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        self.start = Some(value.clone());
        self.end = Some(value);
        self.start_inclusive = true;
        self.end_inclusive = true;
        self.prefix = true;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn start(&self) -> Option<&FieldValue> {
        self.start.as_ref()
    }

    pub fn start_inclusive(&self) -> bool {
        self.start_inclusive
    }

    pub fn end(&self) -> Option<&FieldValue> {
        self.end.as_ref()
    }

    pub fn end_inclusive(&self) -> bool {
        self.end_inclusive
    }

    pub fn is_prefix(&self) -> bool {
        self.prefix
    }
}
