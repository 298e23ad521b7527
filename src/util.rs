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

//! Utility functions shared by the key and scan layers.

use std::cmp::Ordering;

/// Values below this fit in the single leading byte of a packed integer.
const PACKED_SINGLE_MAX: u64 = 0xF7;

/// Append `v` as a packed integer.
///
/// Values up to `0xF7` take one byte. Larger values take a length byte `0xF7 + n`
/// followed by the `n` significant big-endian bytes.
pub fn write_packed_u64(buf: &mut Vec<u8>, v: u64) {
    if v <= PACKED_SINGLE_MAX {
        buf.push(v as u8);
        return;
    }

    let bytes = v.to_be_bytes();
    let skip = (v.leading_zeros() / 8) as usize;
    let n = bytes.len() - skip;

    buf.push(PACKED_SINGLE_MAX as u8 + n as u8);
    buf.extend_from_slice(&bytes[skip..]);
}

/// Read a packed integer from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` if the input is
/// truncated or not in canonical form.
pub fn read_packed_u64(bytes: &[u8]) -> Option<(u64, usize)> {
    let first = *bytes.first()?;
    if u64::from(first) <= PACKED_SINGLE_MAX {
        return Some((u64::from(first), 1));
    }

    let n = (first - PACKED_SINGLE_MAX as u8) as usize;
    let body = bytes.get(1..1 + n)?;

    let mut v = 0u64;
    for b in body {
        v = (v << 8) | u64::from(*b);
    }

    // Reject non-canonical forms so that every value has exactly one encoding.
    if v <= PACKED_SINGLE_MAX || body[0] == 0 {
        return None;
    }

    Some((v, 1 + n))
}

/// Comparator for merging result streams by a caller-supplied total order.
///
/// Returns `true` if `r1` should be yielded before `r2`. Errors are yielded as soon as
/// they are seen; it is the caller's responsibility to handle them.
pub fn by_order<T, E>(
    order: &(dyn Fn(&T, &T) -> Ordering + Send + Sync),
    r1: &Result<T, E>,
    r2: &Result<T, E>,
) -> bool {
    match (r1, r2) {
        (Ok(a), Ok(b)) => order(a, b) != Ordering::Greater,
        _ => true,
    }
}
