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

//! Continuation tokens of `multi_get`.
//!
//! Wire format: `[packed partition id][resume key]`. An empty resume key means "from the
//! start of the partition". Callers treat the bytes as opaque, and a token is only valid
//! for the table, predicate and options that produced it.

use crate::error::ScanError;
use crate::scan::topology::PartitionId;
use crate::util::read_packed_u64;
use crate::util::write_packed_u64;

/// Upper bound of an accepted token, in bytes.
const MAX_TOKEN_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub partition: PartitionId,
    pub resume_key: Option<Vec<u8>>,
}

impl ContinuationToken {
    /// Resume at the start of `partition`.
    pub fn at_partition(partition: PartitionId) -> Self {
        Self {
            partition,
            resume_key: None,
        }
    }

    /// Resume in `partition` after `resume_key`.
    pub fn after(partition: PartitionId, resume_key: Vec<u8>) -> Self {
        Self {
            partition,
            resume_key: Some(resume_key),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_packed_u64(&mut buf, u64::from(self.partition));
        if let Some(k) = &self.resume_key {
            buf.extend_from_slice(k);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ScanError> {
        let invalid = |msg: &str| ScanError::InvalidContinuationToken(msg.to_string());

        if bytes.len() > MAX_TOKEN_LEN {
            return Err(ScanError::InvalidContinuationToken(format!(
                "token of {} bytes exceeds max {}",
                bytes.len(),
                MAX_TOKEN_LEN
            )));
        }

        let (partition, used) = read_packed_u64(bytes).ok_or_else(|| invalid("bad partition id"))?;
        let partition =
            PartitionId::try_from(partition).map_err(|_| invalid("partition id out of range"))?;

        let rest = &bytes[used..];
        let resume_key = if rest.is_empty() {
            None
        } else {
            Some(rest.to_vec())
        };

        Ok(Self {
            partition,
            resume_key,
        })
    }

    /// Lowercase hex form, for callers that carry the token as text.
    pub fn to_hex(&self) -> String {
        self.encode().iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn from_hex(s: &str) -> Result<Self, ScanError> {
        let s = s.trim();
        if s.len() % 2 != 0 {
            return Err(ScanError::InvalidContinuationToken(
                "odd number of hex characters".to_string(),
            ));
        }

        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| {
                s.get(i..i + 2)
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| {
                        ScanError::InvalidContinuationToken(format!(
                            "invalid hex character at position {}",
                            i + 1
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::decode(&bytes)
    }
}
