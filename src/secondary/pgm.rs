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
//! Piecewise-linear approximate position oracle over sorted keys.
//!
//! The read path loads the model as an opaque blob of a known length and
//! only uses `search`: for any key present in the indexed sequence, its
//! position is guaranteed to fall inside the returned `[lo, hi]` interval.
//! Keys from different attribute domains are first mapped into one monotone
//! u64 space by `order_key`.
//!
//! Current limitations:
//! - `build` requires strictly increasing keys (the secondary index stores
//!   each distinct value once).

use crate::common::AttrType;

/// Approximate position interval: the answer, if present, lies in
/// `[lo, hi]`; `pos` is the model's best guess.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApproxPos {
    pub lo: u64,
    pub pos: u64,
    pub hi: u64,
}

/// Map a raw stored key into the monotone u64 ordering of its domain.
/// String keys are 64-bit hashes compared as signed integers, matching the
/// value-block sort order.
pub fn order_key(attr_type: AttrType, raw: u64) -> u64 {
    const SIGN64: u64 = 1 << 63;
    match attr_type {
        AttrType::Uint32 | AttrType::Timestamp | AttrType::Uint32Set => raw as u32 as u64,
        AttrType::Int64 | AttrType::Int64Set | AttrType::String => raw ^ SIGN64,
        AttrType::Float => {
            let bits = raw as u32;
            if bits & 0x8000_0000 != 0 {
                (!bits) as u64
            } else {
                (bits | 0x8000_0000) as u64
            }
        }
    }
}

#[derive(Clone, Debug)]
struct PgmSegment {
    first_key: u64,
    slope: f64,
    intercept: u64,
}

/// Loaded PGM model: epsilon-bounded linear segments over the key space.
#[derive(Clone, Debug)]
pub struct PgmIndex {
    epsilon: u64,
    n_keys: u64,
    segments: Vec<PgmSegment>,
}

fn read_varint(blob: &[u8], pos: &mut usize) -> Result<u64, String> {
    let mut out = 0_u64;
    for i in 0..10 {
        let b = *blob
            .get(*pos)
            .ok_or_else(|| "truncated PGM blob: varint past end".to_string())?;
        *pos += 1;
        out |= ((b & 0x7F) as u64) << (7 * i);
        if b & 0x80 == 0 {
            return Ok(out);
        }
    }
    Err("invalid PGM blob: varint too long".to_string())
}

fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let b = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(b);
            break;
        }
        out.push(b | 0x80);
    }
}

impl PgmIndex {
    pub fn n_keys(&self) -> u64 {
        self.n_keys
    }

    pub fn epsilon(&self) -> u64 {
        self.epsilon
    }

    /// Parse a blob; the whole slice must be consumed.
    pub fn load(blob: &[u8]) -> Result<Self, String> {
        let mut pos = 0_usize;
        let epsilon = read_varint(blob, &mut pos)?;
        let n_keys = read_varint(blob, &mut pos)?;
        let n_segments = read_varint(blob, &mut pos)? as usize;
        if n_keys > 0 && n_segments == 0 {
            return Err(format!(
                "invalid PGM blob: n_keys={}, n_segments=0",
                n_keys
            ));
        }

        let mut segments = Vec::with_capacity(n_segments);
        let mut key = 0_u64;
        for _ in 0..n_segments {
            key = key.wrapping_add(read_varint(blob, &mut pos)?);
            if pos + 8 > blob.len() {
                return Err("truncated PGM blob: segment slope past end".to_string());
            }
            let mut slope_bytes = [0_u8; 8];
            slope_bytes.copy_from_slice(&blob[pos..pos + 8]);
            pos += 8;
            let slope = f64::from_bits(u64::from_le_bytes(slope_bytes));
            let intercept = read_varint(blob, &mut pos)?;
            segments.push(PgmSegment {
                first_key: key,
                slope,
                intercept,
            });
        }
        if pos != blob.len() {
            return Err(format!(
                "PGM blob not fully consumed: consumed={}, blob_len={}",
                pos,
                blob.len()
            ));
        }
        Ok(PgmIndex {
            epsilon,
            n_keys,
            segments,
        })
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        write_varint(out, self.epsilon);
        write_varint(out, self.n_keys);
        write_varint(out, self.segments.len() as u64);
        let mut prev_key = 0_u64;
        for seg in &self.segments {
            write_varint(out, seg.first_key.wrapping_sub(prev_key));
            prev_key = seg.first_key;
            out.extend_from_slice(&seg.slope.to_bits().to_le_bytes());
            write_varint(out, seg.intercept);
        }
    }

    /// Fit segments over strictly increasing keys with the shrinking-cone
    /// method; every indexed key lands within `epsilon` of its prediction.
    pub fn build(keys: &[u64], epsilon: u64) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut first = 0_usize;
        let mut slope_min = f64::NEG_INFINITY;
        let mut slope_max = f64::INFINITY;
        let eps = epsilon as f64;

        for i in 1..keys.len() {
            if keys[i] <= keys[i - 1] {
                return Err(format!(
                    "PGM keys not strictly increasing: index={}",
                    i
                ));
            }
            let dx = (keys[i] - keys[first]) as f64;
            let dy = (i - first) as f64;
            let lo = (dy - eps) / dx;
            let hi = (dy + eps) / dx;
            let new_min = slope_min.max(lo);
            let new_max = slope_max.min(hi);
            if new_min > new_max {
                segments.push(PgmSegment {
                    first_key: keys[first],
                    slope: close_slope(slope_min, slope_max),
                    intercept: first as u64,
                });
                first = i;
                slope_min = f64::NEG_INFINITY;
                slope_max = f64::INFINITY;
            } else {
                slope_min = new_min;
                slope_max = new_max;
            }
        }
        if !keys.is_empty() {
            segments.push(PgmSegment {
                first_key: keys[first],
                slope: close_slope(slope_min, slope_max),
                intercept: first as u64,
            });
        }

        Ok(PgmIndex {
            epsilon,
            n_keys: keys.len() as u64,
            segments,
        })
    }

    /// Approximate position of `key` in the indexed sequence.
    pub fn search(&self, key: u64) -> ApproxPos {
        if self.n_keys == 0 || self.segments.is_empty() {
            return ApproxPos { lo: 0, pos: 0, hi: 0 };
        }

        let seg_id = self
            .segments
            .partition_point(|s| s.first_key <= key)
            .saturating_sub(1);
        let seg = &self.segments[seg_id];

        let dx = (key as i128 - seg.first_key as i128) as f64;
        let predicted = seg.intercept as f64 + seg.slope * dx;
        let last = self.n_keys - 1;
        let pos = if predicted.is_finite() && predicted > 0.0 {
            (predicted.round() as u64).min(last)
        } else {
            0
        };

        // one extra slot on each side absorbs rounding
        let margin = self.epsilon + 1;
        ApproxPos {
            lo: pos.saturating_sub(margin),
            pos,
            hi: (pos + margin).min(last),
        }
    }
}

fn close_slope(slope_min: f64, slope_max: f64) -> f64 {
    if slope_min.is_finite() && slope_max.is_finite() {
        (slope_min + slope_max) / 2.0
    } else if slope_max.is_finite() {
        slope_max
    } else if slope_min.is_finite() {
        slope_min
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_contains_all(pgm: &PgmIndex, keys: &[u64]) {
        for (i, &k) in keys.iter().enumerate() {
            let approx = pgm.search(k);
            assert!(
                approx.lo <= i as u64 && i as u64 <= approx.hi,
                "key {} at {} outside [{}, {}]",
                k,
                i,
                approx.lo,
                approx.hi
            );
            assert!(approx.hi < keys.len() as u64);
        }
    }

    #[test]
    fn test_search_contains_linear_keys() {
        let keys: Vec<u64> = (0..10_000).map(|i| i * 3 + 7).collect();
        let pgm = PgmIndex::build(&keys, 4).unwrap();
        assert_contains_all(&pgm, &keys);
    }

    #[test]
    fn test_search_contains_random_keys() {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut keys: Vec<u64> = (0..5_000).map(|_| rng.gen::<u64>() >> 16).collect();
        keys.sort_unstable();
        keys.dedup();
        let pgm = PgmIndex::build(&keys, 16).unwrap();
        assert_contains_all(&pgm, &keys);
    }

    #[test]
    fn test_blob_roundtrip() {
        let keys: Vec<u64> = (0..1000).map(|i| i * i).collect();
        let pgm = PgmIndex::build(&keys, 8).unwrap();
        let mut blob = Vec::new();
        pgm.save(&mut blob);
        let loaded = PgmIndex::load(&blob).unwrap();
        assert_eq!(loaded.n_keys(), keys.len() as u64);
        assert_contains_all(&loaded, &keys);
    }

    #[test]
    fn test_load_rejects_trailing_bytes() {
        let pgm = PgmIndex::build(&[1, 2, 3], 2).unwrap();
        let mut blob = Vec::new();
        pgm.save(&mut blob);
        blob.push(0);
        assert!(PgmIndex::load(&blob).unwrap_err().contains("not fully consumed"));
    }

    #[test]
    fn test_build_rejects_unsorted_keys() {
        assert!(PgmIndex::build(&[5, 5], 2).is_err());
        assert!(PgmIndex::build(&[5, 4], 2).is_err());
    }

    #[test]
    fn test_empty_and_single_key() {
        let empty = PgmIndex::build(&[], 4).unwrap();
        assert_eq!(empty.search(42), ApproxPos { lo: 0, pos: 0, hi: 0 });

        let one = PgmIndex::build(&[99], 4).unwrap();
        let approx = one.search(99);
        assert_eq!(approx.pos, 0);
        assert!(approx.lo == 0 && approx.hi == 0);
    }

    #[test]
    fn test_order_key_preserves_domain_order() {
        use crate::common::AttrType;

        let i64_keys = [i64::MIN, -5, 0, 3, i64::MAX];
        for w in i64_keys.windows(2) {
            assert!(
                order_key(AttrType::Int64, w[0] as u64) < order_key(AttrType::Int64, w[1] as u64)
            );
        }

        let floats = [-10.5_f32, -0.25, 0.0, 1.5, 1000.0];
        for w in floats.windows(2) {
            assert!(
                order_key(AttrType::Float, w[0].to_bits() as u64)
                    < order_key(AttrType::Float, w[1].to_bits() as u64)
            );
        }
    }
}
