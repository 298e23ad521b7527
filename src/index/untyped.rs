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

//! Bound synthesis for untyped (JSON) index fields.
//!
//! Values of every kind share one untyped index, ordered first by their type-class tag:
//! number < string < boolean < EMPTY < JSON null < NULL. A one-sided range must not run
//! into the neighbouring classes, so the missing side is replaced by the edge of the
//! bound value's own class.

use crate::error::RangeError;
use crate::field::codec::untyped_tag;
use crate::field::codec::TAG_BOOLEAN;
use crate::field::codec::TAG_EMPTY;
use crate::field::codec::TAG_JSON_NULL;
use crate::field::codec::TAG_NULL;
use crate::field::codec::TAG_NUMBER;
use crate::field::codec::TAG_STRING;
use crate::field::FieldValue;

/// Class tag of a value that may bound a range of an untyped field.
fn bound_class(field: &str, value: &FieldValue) -> Result<u8, RangeError> {
    match untyped_tag(value) {
        Some(tag @ (TAG_NUMBER | TAG_STRING | TAG_BOOLEAN)) => Ok(tag),
        _ => Err(RangeError::UnsupportedUntypedFieldType {
            field: field.to_string(),
            value_kind: value.kind().to_string(),
        }),
    }
}

/// The first tag after the class `tag`.
pub(super) fn next_class(tag: u8) -> u8 {
    match tag {
        TAG_NUMBER => TAG_STRING,
        TAG_STRING => TAG_BOOLEAN,
        TAG_BOOLEAN => TAG_EMPTY,
        TAG_EMPTY => TAG_JSON_NULL,
        TAG_JSON_NULL => TAG_NULL,
        _ => TAG_NULL + 1,
    }
}

/// Inclusive lower edge of the class of `value`, for a range with only an upper bound.
pub(super) fn class_start(field: &str, value: &FieldValue) -> Result<u8, RangeError> {
    bound_class(field, value)
}

/// Exclusive upper edge of the class of `value`, for a range with only a lower bound.
pub(super) fn class_end(field: &str, value: &FieldValue) -> Result<u8, RangeError> {
    Ok(next_class(bound_class(field, value)?))
}
