// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Shared types for the segment and secondary-index read paths.
//!
//! Holds the attribute type tags that appear on disk, the collation registry
//! the host installs string hash functions into, and the format version
//! constants embedded in file headers.

use std::sync::OnceLock;

pub mod logging;

/// Segment (attribute file) format version.
pub const LIB_VERSION: u32 = 2;

/// Secondary-index file format version.
pub const STORAGE_VERSION: u32 = 1;

/// Seed for string hashing (FNV-1a 64 offset basis).
pub const HASH_SEED: u64 = 0xCBF2_9CE4_8422_2325;

/// Row id reserved as "no row requested yet".
pub const INVALID_ROW_ID: u32 = u32::MAX;

/// Attribute types as stored in column and index headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrType {
    Uint32,
    Timestamp,
    Int64,
    Float,
    String,
    Uint32Set,
    Int64Set,
}

impl AttrType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(AttrType::Uint32),
            1 => Some(AttrType::Timestamp),
            2 => Some(AttrType::Int64),
            3 => Some(AttrType::Float),
            4 => Some(AttrType::String),
            5 => Some(AttrType::Uint32Set),
            6 => Some(AttrType::Int64Set),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            AttrType::Uint32 => 0,
            AttrType::Timestamp => 1,
            AttrType::Int64 => 2,
            AttrType::Float => 3,
            AttrType::String => 4,
            AttrType::Uint32Set => 5,
            AttrType::Int64Set => 6,
        }
    }

    /// Whether stored values occupy 8 bytes (use the 64-bit codec).
    pub fn is_wide(self) -> bool {
        matches!(self, AttrType::Int64 | AttrType::Int64Set | AttrType::String)
    }

    pub fn is_set(self) -> bool {
        matches!(self, AttrType::Uint32Set | AttrType::Int64Set)
    }

    /// Label used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            AttrType::Uint32 => "UINT32",
            AttrType::Timestamp => "TIMESTAMP",
            AttrType::Int64 => "INT64",
            AttrType::Float => "FLOAT",
            AttrType::String => "STRING",
            AttrType::Uint32Set => "UINT32SET",
            AttrType::Int64Set => "INT64SET",
        }
    }
}

/// Collations a string column can declare for its hash sidecar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collation {
    Binary,
    LibcCi,
    LibcCs,
    Utf8GeneralCi,
}

pub const COLLATION_TOTAL: usize = 4;

impl Collation {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Collation::Binary),
            1 => Some(Collation::LibcCi),
            2 => Some(Collation::LibcCs),
            3 => Some(Collation::Utf8GeneralCi),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Collation::Binary => 0,
            Collation::LibcCi => 1,
            Collation::LibcCs => 2,
            Collation::Utf8GeneralCi => 3,
        }
    }
}

/// Host-supplied string hash: data + seed to 64-bit hash.
pub type StrHashFn = fn(&[u8], u64) -> u64;

static COLLATIONS: OnceLock<[StrHashFn; COLLATION_TOTAL]> = OnceLock::new();

/// Install the per-collation hash functions, once per process. Later calls
/// are ignored; `hash_fn` falls back to FNV-1a 64 until this runs.
pub fn install_collations(table: [StrHashFn; COLLATION_TOTAL]) {
    let _ = COLLATIONS.set(table);
}

/// Hash function for a collation (host-installed, or the FNV-1a default).
pub fn hash_fn(collation: Collation) -> StrHashFn {
    match COLLATIONS.get() {
        Some(table) => table[collation.as_u32() as usize],
        None => fnv1a64,
    }
}

/// Default string hash; `HASH_SEED` makes this plain FNV-1a 64.
pub fn fnv1a64(data: &[u8], seed: u64) -> u64 {
    const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut hash = seed;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a64_known_vectors() {
        // Standard FNV-1a 64 vectors; HASH_SEED is the standard offset basis.
        assert_eq!(fnv1a64(b"", HASH_SEED), 0xCBF2_9CE4_8422_2325);
        assert_eq!(fnv1a64(b"a", HASH_SEED), 0xAF63_DC4C_8601_EC8C);
    }

    #[test]
    fn test_attr_type_roundtrip() {
        for v in 0..7 {
            let t = AttrType::from_u32(v).unwrap();
            assert_eq!(t.as_u32(), v);
        }
        assert!(AttrType::from_u32(7).is_none());
    }

    #[test]
    fn test_default_hash_fn_matches_fnv() {
        let f = hash_fn(Collation::Binary);
        assert_eq!(f(b"abc", HASH_SEED), fnv1a64(b"abc", HASH_SEED));
    }
}
