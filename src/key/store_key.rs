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

use std::fmt;

use crate::error::KeyError;
use crate::field::codec::Token;
use crate::util::read_packed_u64;
use crate::util::write_packed_u64;

const DELIMITER: u8 = 0x00;

/// The physical key of the underlying key-value engine.
///
/// The major path determines the owning partition; the minor path orders records within
/// it. Keys order token by token, major path first.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    major: Vec<Token>,
    minor: Vec<Token>,
}

impl StoreKey {
    pub fn new(major: Vec<Token>, minor: Vec<Token>) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> &[Token] {
        &self.major
    }

    pub fn minor(&self) -> &[Token] {
        &self.minor
    }

    pub(crate) fn push_major(&mut self, token: Token) {
        self.major.push(token);
    }

    pub(crate) fn push_minor(&mut self, token: Token) {
        self.minor.push(token);
    }

    pub fn is_empty(&self) -> bool {
        self.major.is_empty() && self.minor.is_empty()
    }

    /// All tokens, major path first.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.major.iter().chain(self.minor.iter())
    }

    /// Returns `true` if the tokens of `prefix` are a leading sequence of the tokens of
    /// `self`.
    ///
    /// The major/minor boundary is not compared: a partial key built for a scan may end
    /// before the boundary is reached.
    pub fn starts_with(&self, prefix: &StoreKey) -> bool {
        let mut mine = self.tokens();
        prefix.tokens().all(|t| mine.next() == Some(t))
    }

    /// The bytes hashed to find the partition of this key.
    pub fn major_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for t in &self.major {
            buf.extend_from_slice(t);
            buf.push(DELIMITER);
        }
        buf
    }

    /// Self-delimiting byte form: `[packed major count][token 0x00]*`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_packed_u64(&mut buf, self.major.len() as u64);
        for t in self.tokens() {
            buf.extend_from_slice(t);
            buf.push(DELIMITER);
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let (n_major, used) = read_packed_u64(bytes)
            .ok_or_else(|| KeyError::InvalidStoreKey("bad major path length".to_string()))?;

        let mut rest = &bytes[used..];
        let mut tokens = Vec::new();
        while !rest.is_empty() {
            let end = rest.iter().position(|b| *b == DELIMITER).ok_or_else(|| {
                KeyError::InvalidStoreKey("unterminated key component".to_string())
            })?;
            tokens.push(rest[..end].to_vec());
            rest = &rest[end + 1..];
        }

        let n_major = n_major as usize;
        if n_major > tokens.len() {
            return Err(KeyError::InvalidStoreKey(format!(
                "major path length {} exceeds component count {}",
                n_major,
                tokens.len()
            )));
        }

        let minor = tokens.split_off(n_major);
        Ok(Self {
            major: tokens,
            minor,
        })
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |tokens: &[Token]| {
            tokens
                .iter()
                .map(|t| String::from_utf8_lossy(t).into_owned())
                .collect::<Vec<_>>()
                .join("/")
        };
        write!(f, "/{}/-/{}", show(&self.major), show(&self.minor))
    }
}
