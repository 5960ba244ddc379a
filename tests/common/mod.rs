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
//! Fixture writers for integration tests: emit segment and secondary-index
//! files in the exact on-disk layout the library reads.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use stratacol::common::{fnv1a64, AttrType, HASH_SEED, LIB_VERSION, STORAGE_VERSION};
use stratacol::secondary::pgm::{order_key, PgmIndex};
use stratacol::store::codec::{
    bit_pack_128, compute_deltas32, compute_deltas64, create_int_codec, IntCodec, CODEC32_NAME,
    CODEC64_NAME,
};

pub const SUBBLOCK: usize = 128;

/// Little-endian byte sink with the varint convention of the read path.
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        ByteWriter { bytes: Vec::new() }
    }

    pub fn pos(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn pack_u64(&mut self, mut v: u64) {
        loop {
            let b = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.bytes.push(b);
                break;
            }
            self.bytes.push(b | 0x80);
        }
    }

    pub fn pack_u32(&mut self, v: u32) {
        self.pack_u64(v as u64);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.pack_u64(s.len() as u64);
        self.bytes.extend_from_slice(s.as_bytes());
    }

    pub fn write_words(&mut self, words: &[u32]) {
        for &w in words {
            self.write_u32(w);
        }
    }

    /// `varint n_words` + words: the length-prefixed codec stream form.
    pub fn write_encoded(&mut self, words: &[u32]) {
        self.pack_u64(words.len() as u64);
        self.write_words(words);
    }

    pub fn patch_u64(&mut self, offset: usize, v: u64) {
        self.bytes[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
    }
}

pub fn encoded_u32(codec: &dyn IntCodec, values: &[u32], delta: bool) -> Vec<u32> {
    let mut v = values.to_vec();
    if delta {
        compute_deltas32(&mut v);
    }
    let mut words = Vec::new();
    codec.encode32(&v, &mut words);
    words
}

pub fn encoded_u64(codec: &dyn IntCodec, values: &[u64], delta: bool) -> Vec<u32> {
    let mut v = values.to_vec();
    if delta {
        compute_deltas64(&mut v);
    }
    let mut words = Vec::new();
    codec.encode64(&v, &mut words);
    words
}

pub fn hash_of(value: &[u8]) -> u64 {
    if value.is_empty() {
        0
    } else {
        fnv1a64(value, HASH_SEED)
    }
}

// ---------------------------------------------------------------------------
// segment writer
// ---------------------------------------------------------------------------

pub enum ColumnData {
    Int {
        name: String,
        attr_type: AttrType,
        values: Vec<u64>,
        /// Override the writer's packing choice (integer tag).
        force_packing: Option<u32>,
    },
    Str {
        name: String,
        attr_type: AttrType,
        values: Vec<Vec<u8>>,
        with_hashes: bool,
        /// Override the writer's packing choice (string tag).
        force_packing: Option<u32>,
    },
}

impl ColumnData {
    pub fn uint32(name: &str, values: &[u32]) -> Self {
        ColumnData::Int {
            name: name.to_string(),
            attr_type: AttrType::Uint32,
            values: values.iter().map(|&v| v as u64).collect(),
            force_packing: None,
        }
    }

    pub fn uint32_packed(name: &str, values: &[u32], packing: u32) -> Self {
        ColumnData::Int {
            name: name.to_string(),
            attr_type: AttrType::Uint32,
            values: values.iter().map(|&v| v as u64).collect(),
            force_packing: Some(packing),
        }
    }

    pub fn int64(name: &str, values: &[i64]) -> Self {
        ColumnData::Int {
            name: name.to_string(),
            attr_type: AttrType::Int64,
            values: values.iter().map(|&v| v as u64).collect(),
            force_packing: None,
        }
    }

    pub fn float(name: &str, values: &[f32]) -> Self {
        ColumnData::Int {
            name: name.to_string(),
            attr_type: AttrType::Float,
            values: values.iter().map(|&v| v.to_bits() as u64).collect(),
            force_packing: None,
        }
    }

    pub fn strings(name: &str, values: &[&str], with_hashes: bool) -> Self {
        ColumnData::Str {
            name: name.to_string(),
            attr_type: AttrType::String,
            values: values.iter().map(|s| s.as_bytes().to_vec()).collect(),
            with_hashes,
            force_packing: None,
        }
    }

    fn n_rows(&self) -> usize {
        match self {
            ColumnData::Int { values, .. } => values.len(),
            ColumnData::Str { values, .. } => values.len(),
        }
    }
}

fn write_hash_area(w: &mut ByteWriter, values: &[Vec<u8>]) {
    let n = values.len();
    assert!(n <= 255);
    let n_empty = values.iter().filter(|v| v.is_empty()).count();
    // the 128-slot null-map only exists at subblock granularity
    let need_map = n <= SUBBLOCK && n_empty * 8 > 2 * (n / 8);
    if !need_map {
        w.write_u8(n as u8);
        for v in values {
            w.write_u64(hash_of(v));
        }
        return;
    }

    w.write_u8((n - n_empty) as u8);
    let mut bits = [0_u32; SUBBLOCK];
    for (i, v) in values.iter().enumerate() {
        bits[i] = (!v.is_empty()) as u32;
    }
    let mut packed = vec![0_u32; 4];
    bit_pack_128(&bits, &mut packed, 1);
    w.write_words(&packed);
    for v in values {
        if !v.is_empty() {
            w.write_u64(hash_of(v));
        }
    }
}

fn write_packed_indices(w: &mut ByteWriter, indices: &[u32], bits: usize) {
    for chunk in indices.chunks(SUBBLOCK) {
        let mut full = [0_u32; SUBBLOCK];
        full[..chunk.len()].copy_from_slice(chunk);
        let mut packed = vec![0_u32; bits * 4];
        bit_pack_128(&full, &mut packed, bits);
        w.write_words(&packed);
    }
}

fn ceil_log2(count: usize) -> usize {
    if count <= 1 {
        0
    } else {
        (usize::BITS - (count - 1).leading_zeros()) as usize
    }
}

fn write_int_block(
    w: &mut ByteWriter,
    values: &[u64],
    wide: bool,
    force_packing: Option<u32>,
    codec: &dyn IntCodec,
) {
    let mut distinct: Vec<u64> = values.to_vec();
    distinct.sort_unstable();
    distinct.dedup();

    let forced = |tag: u32| force_packing.map_or(false, |p| p == tag);
    if distinct.len() == 1 && !forced(1) && !forced(2) && !forced(3) {
        w.pack_u32(0); // CONST
        w.pack_u64(distinct[0]);
        return;
    }

    if (distinct.len() <= 255 && !forced(2) && !forced(3)) || forced(1) {
        w.pack_u32(1); // TABLE
        w.write_u8(distinct.len() as u8);
        let mut prev = 0_u64;
        for &v in &distinct {
            w.pack_u64(v.wrapping_sub(prev));
            prev = v;
        }
        let indices: Vec<u32> = values
            .iter()
            .map(|v| distinct.binary_search(v).unwrap() as u32)
            .collect();
        write_packed_indices(w, &indices, ceil_log2(distinct.len()));
        return;
    }

    let monotone = if forced(3) {
        false
    } else {
        values.windows(2).all(|p| p[0] <= p[1])
    };
    w.pack_u32(if monotone { 2 } else { 3 }); // DELTA_PFOR / GENERIC_PFOR

    let mut payloads: Vec<Vec<u32>> = Vec::new();
    let mut cumulative: Vec<u32> = Vec::new();
    let mut total = 0_u32;
    for chunk in values.chunks(SUBBLOCK) {
        let words = if wide {
            encoded_u64(codec, chunk, monotone)
        } else {
            let narrow: Vec<u32> = chunk.iter().map(|&v| v as u32).collect();
            encoded_u32(codec, &narrow, monotone)
        };
        total += (words.len() * 4) as u32;
        cumulative.push(total);
        payloads.push(words);
    }
    w.write_encoded(&encoded_u32(codec, &cumulative, true));
    for p in &payloads {
        w.write_words(p);
    }
}

fn choose_str_packing(values: &[Vec<u8>]) -> u32 {
    let mut uniques: Vec<&Vec<u8>> = values.iter().collect();
    uniques.sort();
    uniques.dedup();
    if uniques.len() == 1 {
        return 0; // CONST
    }
    if uniques.len() < 256 {
        return 2; // TABLE
    }
    if values.iter().all(|v| v.len() == values[0].len()) {
        return 1; // CONSTLEN
    }
    3 // GENERIC
}

fn write_str_block(
    w: &mut ByteWriter,
    values: &[Vec<u8>],
    with_hashes: bool,
    force_packing: Option<u32>,
    codec: &dyn IntCodec,
) {
    let packing = force_packing.unwrap_or_else(|| choose_str_packing(values));
    w.pack_u32(packing);
    match packing {
        0 => {
            // CONST
            if with_hashes {
                write_hash_area(w, &values[..1]);
            }
            w.pack_u64(values[0].len() as u64);
            w.write_bytes(&values[0]);
        }
        1 => {
            // CONSTLEN: raw hash area, no count byte
            let len = values[0].len();
            w.pack_u64(len as u64);
            if with_hashes {
                for v in values {
                    w.write_u64(hash_of(v));
                }
            }
            for v in values {
                assert_eq!(v.len(), len);
                w.write_bytes(v);
            }
        }
        2 => {
            // TABLE
            let mut uniques: Vec<Vec<u8>> = values.to_vec();
            uniques.sort();
            uniques.dedup();
            assert!(uniques.len() < 256);
            w.write_u8(uniques.len() as u8);
            if with_hashes {
                write_hash_area(w, &uniques);
            }
            let mut cum = Vec::with_capacity(uniques.len());
            let mut total = 0_u32;
            for u in &uniques {
                total += u.len() as u32;
                cum.push(total);
            }
            w.write_encoded(&encoded_u32(codec, &cum, true));
            for u in &uniques {
                w.write_bytes(u);
            }
            let indices: Vec<u32> = values
                .iter()
                .map(|v| uniques.binary_search(v).unwrap() as u32)
                .collect();
            write_packed_indices(w, &indices, ceil_log2(uniques.len()));
        }
        3 => {
            // GENERIC
            let mut body = ByteWriter::new();
            let mut offsets = Vec::new();
            for chunk in values.chunks(SUBBLOCK) {
                offsets.push(body.pos());
                if with_hashes {
                    write_hash_area(&mut body, chunk);
                }
                let mut cum = Vec::with_capacity(chunk.len());
                let mut total = 0_u64;
                for v in chunk {
                    total += v.len() as u64;
                    cum.push(total);
                }
                body.write_encoded(&encoded_u64(codec, &cum, true));
                for v in chunk {
                    body.write_bytes(v);
                }
            }
            w.write_encoded(&encoded_u64(codec, &offsets, true));
            w.write_bytes(body.bytes());
        }
        other => panic!("unknown string packing {}", other),
    }
}

/// Write a segment file with the given columns, `block_size` rows per block.
pub fn write_segment(path: &Path, block_size: u32, columns: &[ColumnData]) {
    assert!(block_size > 0 && block_size % SUBBLOCK as u32 == 0);
    let codec = create_int_codec(CODEC32_NAME, CODEC64_NAME).unwrap();

    let mut w = ByteWriter::new();
    w.write_u32(LIB_VERSION);
    w.write_u64(0); // meta_off, patched below

    // blocks, column by column; offsets recorded for the meta
    let mut column_offsets: Vec<Vec<u64>> = Vec::new();
    let mut column_row_counts: Vec<Vec<u32>> = Vec::new();
    for col in columns {
        let mut offsets = Vec::new();
        let mut row_counts = Vec::new();
        match col {
            ColumnData::Int {
                values,
                attr_type,
                force_packing,
                ..
            } => {
                for block in values.chunks(block_size as usize) {
                    offsets.push(w.pos());
                    row_counts.push(block.len() as u32);
                    write_int_block(
                        &mut w,
                        block,
                        attr_type.is_wide(),
                        *force_packing,
                        codec.as_ref(),
                    );
                }
            }
            ColumnData::Str {
                values,
                with_hashes,
                force_packing,
                ..
            } => {
                for block in values.chunks(block_size as usize) {
                    offsets.push(w.pos());
                    row_counts.push(block.len() as u32);
                    write_str_block(&mut w, block, *with_hashes, *force_packing, codec.as_ref());
                }
            }
        }
        offsets.push(w.pos()); // end offset
        column_offsets.push(offsets);
        column_row_counts.push(row_counts);
    }

    let meta_off = w.pos();
    w.pack_u64(columns.len() as u64);
    for (i, col) in columns.iter().enumerate() {
        let (name, attr_type, flags) = match col {
            ColumnData::Int { name, attr_type, .. } => (name.as_str(), *attr_type, 0_u8),
            ColumnData::Str {
                name,
                attr_type,
                with_hashes,
                ..
            } => (name.as_str(), *attr_type, *with_hashes as u8),
        };
        w.write_string(name);
        w.pack_u32(attr_type.as_u32());
        w.write_u8(flags);
        w.pack_u32(block_size);
        w.pack_u32(SUBBLOCK as u32);
        w.write_string(CODEC32_NAME);
        w.write_string(CODEC64_NAME);
        w.pack_u64(column_row_counts[i].len() as u64);
        let mut prev = 0_u64;
        for &off in &column_offsets[i] {
            w.pack_u64(off - prev);
            prev = off;
        }
        for &rows in &column_row_counts[i] {
            w.pack_u32(rows);
        }
    }
    w.patch_u64(4, meta_off);

    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(w.bytes()).unwrap();
}

// ---------------------------------------------------------------------------
// secondary-index writer
// ---------------------------------------------------------------------------

pub struct IndexColumnData {
    pub name: String,
    pub attr_type: AttrType,
    /// Raw stored key per row (u32 zero-extended, i64 two's complement,
    /// f32 bits, or 64-bit string hash).
    pub rows: Vec<u64>,
}

impl IndexColumnData {
    pub fn uint32(name: &str, values: &[u32]) -> Self {
        IndexColumnData {
            name: name.to_string(),
            attr_type: AttrType::Uint32,
            rows: values.iter().map(|&v| v as u64).collect(),
        }
    }

    pub fn int64(name: &str, values: &[i64]) -> Self {
        IndexColumnData {
            name: name.to_string(),
            attr_type: AttrType::Int64,
            rows: values.iter().map(|&v| v as u64).collect(),
        }
    }

    pub fn float(name: &str, values: &[f32]) -> Self {
        IndexColumnData {
            name: name.to_string(),
            attr_type: AttrType::Float,
            rows: values.iter().map(|&v| v.to_bits() as u64).collect(),
        }
    }

    pub fn strings(name: &str, values: &[&str]) -> Self {
        IndexColumnData {
            name: name.to_string(),
            attr_type: AttrType::String,
            rows: values.iter().map(|s| hash_of(s.as_bytes())).collect(),
        }
    }
}

fn write_posting_run(w: &mut ByteWriter, rows: &[u32], codec: &dyn IntCodec) {
    let min = rows[0];
    let max = *rows.last().unwrap();
    w.pack_u32(min);
    w.pack_u32(max - min);
    w.write_encoded(&encoded_u32(codec, rows, true));
}

/// One value's posting payload; returns (packing tag, row_start value).
fn write_posting(
    payloads: &mut ByteWriter,
    rows: &[u32],
    rows_per_run: usize,
    codec: &dyn IntCodec,
) -> (u32, u32) {
    if rows.len() == 1 {
        return (0, rows[0]); // ROW
    }
    let offset = payloads.pos() as u32;
    if rows.len() <= rows_per_run {
        write_posting_run(payloads, rows, codec);
        return (1, offset); // ROW_BLOCK
    }

    // ROW_BLOCKS_LIST
    let runs: Vec<&[u32]> = rows.chunks(rows_per_run).collect();
    payloads.pack_u32(runs.len() as u32);
    let mut minmax = Vec::with_capacity(runs.len() * 2);
    for run in &runs {
        minmax.push(run[0]);
        minmax.push(*run.last().unwrap());
    }
    payloads.write_encoded(&encoded_u32(codec, &minmax, true));

    let mut run_bodies = ByteWriter::new();
    let mut cumulative = Vec::with_capacity(runs.len());
    for run in &runs {
        write_posting_run(&mut run_bodies, run, codec);
        cumulative.push(run_bodies.pos() as u32);
    }
    payloads.write_encoded(&encoded_u32(codec, &cumulative, true));
    payloads.write_bytes(run_bodies.bytes());
    (2, offset)
}

/// Write a secondary-index file over the given columns.
pub fn write_secondary_index(
    path: &Path,
    columns: &[IndexColumnData],
    values_per_block: u32,
    epsilon: u64,
    rows_per_run: usize,
) {
    assert!(values_per_block > 0);
    let codec = create_int_codec(CODEC32_NAME, CODEC64_NAME).unwrap();

    let mut w = ByteWriter::new();
    w.write_u32(STORAGE_VERSION);
    w.write_u64(0); // meta_off, patched below

    // value-blocks area
    let mut per_col_block_offsets: Vec<Vec<u64>> = Vec::new();
    let mut per_col_distinct: Vec<u64> = Vec::new();
    let mut per_col_pgm: Vec<Vec<u8>> = Vec::new();
    for col in columns {
        // distinct values in domain order, with their sorted row lists
        let mut by_value: BTreeMap<u64, (u64, Vec<u32>)> = BTreeMap::new();
        for (row, &raw) in col.rows.iter().enumerate() {
            by_value
                .entry(order_key(col.attr_type, raw))
                .or_insert_with(|| (raw, Vec::new()))
                .1
                .push(row as u32);
        }
        let distinct: Vec<(u64, Vec<u32>)> = by_value.into_values().collect();
        per_col_distinct.push(distinct.len() as u64);

        let keys: Vec<u64> = distinct
            .iter()
            .map(|(raw, _)| order_key(col.attr_type, *raw))
            .collect();
        let pgm = PgmIndex::build(&keys, epsilon).unwrap();
        let mut blob = Vec::new();
        pgm.save(&mut blob);
        per_col_pgm.push(blob);

        let wide = matches!(
            col.attr_type,
            AttrType::Int64 | AttrType::Int64Set | AttrType::String
        );
        let mut block_offsets = Vec::new();
        for block in distinct.chunks(values_per_block as usize) {
            block_offsets.push(w.pos());

            let raw_values: Vec<u64> = block.iter().map(|(raw, _)| *raw).collect();
            if wide {
                w.write_encoded(&encoded_u64(codec.as_ref(), &raw_values, true));
            } else {
                let narrow: Vec<u32> = raw_values.iter().map(|&v| v as u32).collect();
                w.write_encoded(&encoded_u32(codec.as_ref(), &narrow, true));
            }

            let mut payloads = ByteWriter::new();
            let mut types = Vec::with_capacity(block.len());
            let mut row_starts = Vec::with_capacity(block.len());
            for (_, rows) in block {
                let (packing, row_start) =
                    write_posting(&mut payloads, rows, rows_per_run, codec.as_ref());
                types.push(packing);
                row_starts.push(row_start);
            }

            w.write_encoded(&encoded_u32(codec.as_ref(), &types, false));
            let monotone = row_starts.windows(2).all(|p| p[0] <= p[1]);
            w.write_u8(monotone as u8);
            w.write_encoded(&encoded_u32(codec.as_ref(), &row_starts, monotone));
            w.write_bytes(payloads.bytes());
        }
        per_col_block_offsets.push(block_offsets);
    }

    // meta
    let meta_off = w.pos();
    w.write_u64(0); // next_meta_off
    w.write_u32(columns.len() as u32);
    let n_words = (columns.len() + 31) / 32;
    for word in 0..n_words {
        let mut bits = 0_u32;
        for i in 0..32 {
            if word * 32 + i < columns.len() {
                bits |= 1 << i; // all columns enabled
            }
        }
        w.write_u32(bits);
    }
    w.write_string(CODEC32_NAME);
    w.write_string(CODEC64_NAME);
    w.write_u32(0); // collation: Binary
    w.write_u32(values_per_block);
    for (i, col) in columns.iter().enumerate() {
        w.write_string(&col.name);
        w.pack_u32(col.attr_type.as_u32());
        w.pack_u64(per_col_distinct[i]);
    }

    // per-column block-table start offsets, relative to blocks_base
    let mut table_offsets = Vec::with_capacity(columns.len());
    let mut running = 0_u64;
    for offsets in &per_col_block_offsets {
        table_offsets.push(running);
        running += offsets.len() as u64 * 8;
    }
    w.write_encoded(&encoded_u64(codec.as_ref(), &table_offsets, true));
    let counts: Vec<u64> = per_col_block_offsets
        .iter()
        .map(|o| o.len() as u64)
        .collect();
    w.write_encoded(&encoded_u64(codec.as_ref(), &counts, false));

    for blob in &per_col_pgm {
        w.pack_u64(blob.len() as u64);
        w.write_bytes(blob);
    }

    // blocks_base starts here: the per-column offset tables
    for offsets in &per_col_block_offsets {
        for &off in offsets {
            w.write_u64(off);
        }
    }

    w.patch_u64(4, meta_off);
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(w.bytes()).unwrap();
}
