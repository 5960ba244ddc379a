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
//! Pluggable integer array codecs and fixed-width bit packing.
//!
//! Column headers record codec names; `create_int_codec` resolves them. One
//! family ships: `fastbinpack128` / `fastbinpack128v64`, which packs values
//! in chunks of 128 at the chunk's maximum bit width. Delta coding is the
//! caller's job: subtract before encode, `inverse_deltas*` after decode.
//!
//! Current limitations:
//! - Codec streams are sequences of u32 words; payload byte sizes must be
//!   multiples of 4.
//! - Decoders validate full consumption of their input and reject unknown
//!   widths, but do not attempt recovery of partially damaged streams.

use std::sync::Arc;

use super::constants::SUBBLOCK_SIZE;
use super::reader::FileReader;

/// Restartable, stateless integer array codec.
pub trait IntCodec {
    fn encode32(&self, values: &[u32], out: &mut Vec<u32>);
    fn encode64(&self, values: &[u64], out: &mut Vec<u32>);
    fn decode32(&self, words: &[u32], out: &mut Vec<u32>) -> Result<(), String>;
    fn decode64(&self, words: &[u32], out: &mut Vec<u64>) -> Result<(), String>;
}

pub const CODEC32_NAME: &str = "fastbinpack128";
pub const CODEC64_NAME: &str = "fastbinpack128v64";

/// Resolve codec names recorded in a column or index header.
pub fn create_int_codec(
    name32: &str,
    name64: &str,
) -> Result<Arc<dyn IntCodec + Send + Sync>, String> {
    if name32 != CODEC32_NAME {
        return Err(format!("unknown 32-bit integer codec: codec={}", name32));
    }
    if name64 != CODEC64_NAME {
        return Err(format!("unknown 64-bit integer codec: codec={}", name64));
    }
    Ok(Arc::new(FastBinPack128))
}

/// Chunked binary packing: `[n_values][per chunk: bits, packed words]`.
struct FastBinPack128;

const CODEC_CHUNK: usize = SUBBLOCK_SIZE;

fn bit_width32(v: u32) -> usize {
    (32 - v.leading_zeros()) as usize
}

fn bit_width64(v: u64) -> usize {
    (64 - v.leading_zeros()) as usize
}

fn packed_words(n_values: usize, bits: usize) -> usize {
    (n_values * bits + 31) / 32
}

fn pack_into32(values: &[u32], bits: usize, out: &mut [u32]) {
    for (i, &v) in values.iter().enumerate() {
        let start = i * bits;
        let word = start / 32;
        let off = start % 32;
        let lo = (v as u64) << off;
        out[word] |= lo as u32;
        if off + bits > 32 {
            out[word + 1] |= (lo >> 32) as u32;
        }
    }
}

fn pack_into64(values: &[u64], bits: usize, out: &mut [u32]) {
    for (i, &v) in values.iter().enumerate() {
        let mut start = i * bits;
        let mut rest = (v as u128) << (start % 32);
        let mut rest_bits = bits + start % 32;
        start /= 32;
        while rest_bits > 0 {
            out[start] |= rest as u32;
            rest >>= 32;
            rest_bits = rest_bits.saturating_sub(32);
            start += 1;
        }
    }
}

fn unpack_from32(words: &[u32], n_values: usize, bits: usize, out: &mut Vec<u32>) {
    if bits == 0 {
        out.resize(out.len() + n_values, 0);
        return;
    }
    let mask = if bits == 32 {
        u32::MAX as u64
    } else {
        (1_u64 << bits) - 1
    };
    for i in 0..n_values {
        let start = i * bits;
        let word = start / 32;
        let off = start % 32;
        let mut raw = (words[word] as u64) >> off;
        if off + bits > 32 {
            raw |= (words[word + 1] as u64) << (32 - off);
        }
        out.push((raw & mask) as u32);
    }
}

fn unpack_from64(words: &[u32], n_values: usize, bits: usize, out: &mut Vec<u64>) {
    if bits == 0 {
        out.resize(out.len() + n_values, 0);
        return;
    }
    let mask = if bits == 64 {
        u64::MAX as u128
    } else {
        (1_u128 << bits) - 1
    };
    for i in 0..n_values {
        let start = i * bits;
        let mut word = start / 32;
        let off = start % 32;
        let mut raw = (words[word] as u128) >> off;
        let mut got = 32 - off;
        while got < bits {
            word += 1;
            raw |= (words[word] as u128) << got;
            got += 32;
        }
        out.push((raw & mask) as u64);
    }
}

impl IntCodec for FastBinPack128 {
    fn encode32(&self, values: &[u32], out: &mut Vec<u32>) {
        out.push(values.len() as u32);
        for chunk in values.chunks(CODEC_CHUNK) {
            let bits = chunk.iter().map(|&v| bit_width32(v)).max().unwrap_or(0);
            out.push(bits as u32);
            let base = out.len();
            out.resize(base + packed_words(chunk.len(), bits), 0);
            pack_into32(chunk, bits, &mut out[base..]);
        }
    }

    fn encode64(&self, values: &[u64], out: &mut Vec<u32>) {
        out.push(values.len() as u32);
        for chunk in values.chunks(CODEC_CHUNK) {
            let bits = chunk.iter().map(|&v| bit_width64(v)).max().unwrap_or(0);
            out.push(bits as u32);
            let base = out.len();
            out.resize(base + packed_words(chunk.len(), bits), 0);
            pack_into64(chunk, bits, &mut out[base..]);
        }
    }

    fn decode32(&self, words: &[u32], out: &mut Vec<u32>) -> Result<(), String> {
        out.clear();
        if words.is_empty() {
            return Err("truncated codec stream: missing value count".to_string());
        }
        let n_values = words[0] as usize;
        if n_values > words.len().saturating_sub(1) * CODEC_CHUNK {
            return Err(format!(
                "invalid codec value count: n_values={}, stream_words={}",
                n_values,
                words.len()
            ));
        }
        out.reserve(n_values);
        let mut idx = 1_usize;
        let mut remaining = n_values;
        while remaining > 0 {
            let chunk = remaining.min(CODEC_CHUNK);
            if idx >= words.len() {
                return Err(format!(
                    "truncated codec stream: missing chunk width, n_values={}, decoded={}",
                    n_values,
                    out.len()
                ));
            }
            let bits = words[idx] as usize;
            idx += 1;
            if bits > 32 {
                return Err(format!(
                    "invalid codec chunk width: bits={}, max=32",
                    bits
                ));
            }
            let n_words = packed_words(chunk, bits);
            if idx + n_words > words.len() {
                return Err(format!(
                    "truncated codec stream: chunk_words={}, available_words={}",
                    n_words,
                    words.len() - idx
                ));
            }
            unpack_from32(&words[idx..idx + n_words], chunk, bits, out);
            idx += n_words;
            remaining -= chunk;
        }
        if idx != words.len() {
            return Err(format!(
                "codec stream not fully consumed: consumed_words={}, total_words={}",
                idx,
                words.len()
            ));
        }
        Ok(())
    }

    fn decode64(&self, words: &[u32], out: &mut Vec<u64>) -> Result<(), String> {
        out.clear();
        if words.is_empty() {
            return Err("truncated codec stream: missing value count".to_string());
        }
        let n_values = words[0] as usize;
        if n_values > words.len().saturating_sub(1) * CODEC_CHUNK {
            return Err(format!(
                "invalid codec value count: n_values={}, stream_words={}",
                n_values,
                words.len()
            ));
        }
        out.reserve(n_values);
        let mut idx = 1_usize;
        let mut remaining = n_values;
        while remaining > 0 {
            let chunk = remaining.min(CODEC_CHUNK);
            if idx >= words.len() {
                return Err(format!(
                    "truncated codec stream: missing chunk width, n_values={}, decoded={}",
                    n_values,
                    out.len()
                ));
            }
            let bits = words[idx] as usize;
            idx += 1;
            if bits > 64 {
                return Err(format!(
                    "invalid codec chunk width: bits={}, max=64",
                    bits
                ));
            }
            let n_words = packed_words(chunk, bits);
            if idx + n_words > words.len() {
                return Err(format!(
                    "truncated codec stream: chunk_words={}, available_words={}",
                    n_words,
                    words.len() - idx
                ));
            }
            unpack_from64(&words[idx..idx + n_words], chunk, bits, out);
            idx += n_words;
            remaining -= chunk;
        }
        if idx != words.len() {
            return Err(format!(
                "codec stream not fully consumed: consumed_words={}, total_words={}",
                idx,
                words.len()
            ));
        }
        Ok(())
    }
}

/// Pack exactly 128 values at a fixed width into `bits * 4` words.
/// Writer-side counterpart of `bit_unpack_128`.
pub fn bit_pack_128(values: &[u32], out: &mut [u32], bits: usize) {
    debug_assert_eq!(values.len(), SUBBLOCK_SIZE);
    debug_assert_eq!(out.len(), bits * 4);
    out.fill(0);
    pack_into32(values, bits, out);
}

/// Unpack exactly 128 fixed-width values from `bits * 4` words.
pub fn bit_unpack_128(packed: &[u32], out: &mut [u32], bits: usize) {
    debug_assert_eq!(packed.len(), bits * 4);
    debug_assert_eq!(out.len(), SUBBLOCK_SIZE);
    if bits == 0 {
        out.fill(0);
        return;
    }
    let mask = if bits == 32 {
        u32::MAX as u64
    } else {
        (1_u64 << bits) - 1
    };
    for (i, slot) in out.iter_mut().enumerate() {
        let start = i * bits;
        let word = start / 32;
        let off = start % 32;
        let mut raw = (packed[word] as u64) >> off;
        if off + bits > 32 {
            raw |= (packed[word + 1] as u64) << (32 - off);
        }
        *slot = (raw & mask) as u32;
    }
}

/// In-place inverse prefix sum (first element is stored raw).
pub fn inverse_deltas32(values: &mut [u32]) {
    let mut acc = 0_u32;
    for v in values.iter_mut() {
        acc = acc.wrapping_add(*v);
        *v = acc;
    }
}

pub fn inverse_deltas64(values: &mut [u64]) {
    let mut acc = 0_u64;
    for v in values.iter_mut() {
        acc = acc.wrapping_add(*v);
        *v = acc;
    }
}

/// In-place delta coding, the writer-side inverse of `inverse_deltas*`.
pub fn compute_deltas32(values: &mut [u32]) {
    for i in (1..values.len()).rev() {
        values[i] = values[i].wrapping_sub(values[i - 1]);
    }
}

pub fn compute_deltas64(values: &mut [u64]) {
    for i in (1..values.len()).rev() {
        values[i] = values[i].wrapping_sub(values[i - 1]);
    }
}

/// Read a `varint n_words` + words codec stream into `scratch`.
pub fn read_encoded_words(reader: &mut FileReader, scratch: &mut Vec<u32>) -> Result<(), String> {
    let n_words = reader.unpack_u32()? as usize;
    reader.read_words(n_words, scratch)
}

/// Decode a length-prefixed u32 vector, optionally inverse-delta coded.
pub fn decode_u32_vector(
    reader: &mut FileReader,
    codec: &dyn IntCodec,
    scratch: &mut Vec<u32>,
    delta: bool,
    out: &mut Vec<u32>,
) -> Result<(), String> {
    read_encoded_words(reader, scratch)?;
    codec.decode32(scratch, out)?;
    if delta {
        inverse_deltas32(out);
    }
    Ok(())
}

/// Decode a length-prefixed u64 vector, optionally inverse-delta coded.
pub fn decode_u64_vector(
    reader: &mut FileReader,
    codec: &dyn IntCodec,
    scratch: &mut Vec<u32>,
    delta: bool,
    out: &mut Vec<u64>,
) -> Result<(), String> {
    read_encoded_words(reader, scratch)?;
    codec.decode64(scratch, out)?;
    if delta {
        inverse_deltas64(out);
    }
    Ok(())
}

/// Stored integer width of a column: u32 or u64.
pub(crate) trait IntValue:
    Copy + Default + Ord + std::fmt::Display + Send + Sync + 'static
{
    fn from_u64(v: u64) -> Self;
    fn to_u64(self) -> u64;
    fn decode_words(codec: &dyn IntCodec, words: &[u32], out: &mut Vec<Self>)
        -> Result<(), String>;
    fn inverse_deltas(values: &mut [Self]);
}

impl IntValue for u32 {
    fn from_u64(v: u64) -> Self {
        v as u32
    }

    fn to_u64(self) -> u64 {
        self as u64
    }

    fn decode_words(
        codec: &dyn IntCodec,
        words: &[u32],
        out: &mut Vec<Self>,
    ) -> Result<(), String> {
        codec.decode32(words, out)
    }

    fn inverse_deltas(values: &mut [Self]) {
        inverse_deltas32(values);
    }
}

impl IntValue for u64 {
    fn from_u64(v: u64) -> Self {
        v
    }

    fn to_u64(self) -> u64 {
        self
    }

    fn decode_words(
        codec: &dyn IntCodec,
        words: &[u32],
        out: &mut Vec<Self>,
    ) -> Result<(), String> {
        codec.decode64(words, out)
    }

    fn inverse_deltas(values: &mut [Self]) {
        inverse_deltas64(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn codec() -> Arc<dyn IntCodec + Send + Sync> {
        create_int_codec(CODEC32_NAME, CODEC64_NAME).unwrap()
    }

    #[test]
    fn test_unknown_codec_rejected() {
        assert!(create_int_codec("simdfastpfor128", CODEC64_NAME).is_err());
        assert!(create_int_codec(CODEC32_NAME, "varint").is_err());
    }

    #[test]
    fn test_encode32_roundtrip_lengths() {
        let c = codec();
        for len in [0_usize, 1, 2, 127, 128, 129, 300, 1000] {
            let values: Vec<u32> = (0..len as u32).map(|i| i.wrapping_mul(2654435761)).collect();
            let mut words = Vec::new();
            c.encode32(&values, &mut words);
            let mut decoded = Vec::new();
            c.decode32(&words, &mut decoded).unwrap();
            assert_eq!(decoded, values, "len={}", len);
        }
    }

    #[test]
    fn test_encode32_extreme_values() {
        let c = codec();
        let values = vec![0, 1, u32::MAX, 0, u32::MAX - 1, 7];
        let mut words = Vec::new();
        c.encode32(&values, &mut words);
        let mut decoded = Vec::new();
        c.decode32(&words, &mut decoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_encode64_roundtrip_random() {
        let c = codec();
        let mut rng = StdRng::seed_from_u64(42);
        for len in [1_usize, 128, 129, 500] {
            let values: Vec<u64> = (0..len)
                .map(|_| {
                    let shift = rng.gen_range(0..64);
                    rng.gen::<u64>() >> shift
                })
                .collect();
            let mut words = Vec::new();
            c.encode64(&values, &mut words);
            let mut decoded = Vec::new();
            c.decode64(&words, &mut decoded).unwrap();
            assert_eq!(decoded, values, "len={}", len);
        }
    }

    #[test]
    fn test_encode64_extreme_values() {
        let c = codec();
        let values = vec![u64::MAX, 0, 1, u64::MAX - 5];
        let mut words = Vec::new();
        c.encode64(&values, &mut words);
        let mut decoded = Vec::new();
        c.decode64(&words, &mut decoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_all_zero_chunks_take_no_words() {
        let c = codec();
        let values = vec![0_u32; 256];
        let mut words = Vec::new();
        c.encode32(&values, &mut words);
        // count + two chunk headers, no payload words
        assert_eq!(words.len(), 3);
        let mut decoded = Vec::new();
        c.decode32(&words, &mut decoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let c = codec();
        let values: Vec<u32> = (0..128).map(|i| i * 3 + 1).collect();
        let mut words = Vec::new();
        c.encode32(&values, &mut words);
        let mut decoded = Vec::new();
        let err = c.decode32(&words[..words.len() - 1], &mut decoded).unwrap_err();
        assert!(err.contains("truncated codec stream"));
        let err = c.decode32(&[], &mut decoded).unwrap_err();
        assert!(err.contains("missing value count"));
    }

    #[test]
    fn test_decode_rejects_trailing_garbage() {
        let c = codec();
        let mut words = Vec::new();
        c.encode32(&[5, 6, 7], &mut words);
        words.push(0xFFFF);
        let mut decoded = Vec::new();
        let err = c.decode32(&words, &mut decoded).unwrap_err();
        assert!(err.contains("not fully consumed"));
    }

    #[test]
    fn test_bit_pack_128_roundtrip() {
        let mut rng = StdRng::seed_from_u64(7);
        for bits in [0_usize, 1, 2, 5, 8, 13, 31, 32] {
            let values: Vec<u32> = (0..128)
                .map(|_| {
                    if bits == 0 {
                        0
                    } else if bits == 32 {
                        rng.gen()
                    } else {
                        rng.gen_range(0..(1_u32 << bits))
                    }
                })
                .collect();
            let mut packed = vec![0_u32; bits * 4];
            bit_pack_128(&values, &mut packed, bits);
            let mut unpacked = vec![0_u32; 128];
            bit_unpack_128(&packed, &mut unpacked, bits);
            assert_eq!(unpacked, values, "bits={}", bits);
        }
    }

    #[test]
    fn test_delta_helpers_roundtrip() {
        let original: Vec<u64> = vec![3, 3, 10, 10, 11, 400, u64::MAX];
        let mut v = original.clone();
        compute_deltas64(&mut v);
        inverse_deltas64(&mut v);
        assert_eq!(v, original);

        let original32: Vec<u32> = vec![5, 4, 3, 100, 0];
        let mut v32 = original32.clone();
        compute_deltas32(&mut v32);
        inverse_deltas32(&mut v32);
        assert_eq!(v32, original32);
    }
}
