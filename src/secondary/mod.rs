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
//! Secondary (value-to-row) index.
//!
//! The index file keeps, per column, a PGM position oracle plus an area of
//! sorted-value blocks whose entries point at row-id posting lists. A
//! filter is answered by asking the oracle for an approximate position
//! window, confirming values inside the covered blocks and materializing
//! one row-id iterator per matching value.
//!
//! Current limitations:
//! - Exclude filters are not served here; hosts fall back to a column scan.
//! - String columns support equality only (by collation hash).

use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use hashbrown::HashMap;

use crate::common::{hash_fn, AttrType, Collation, HASH_SEED, STORAGE_VERSION};
use crate::store::analyzer::filter::{Filter, FilterKind};
use crate::store::codec::{create_int_codec, decode_u64_vector};
use crate::store::constants::META_READER_BUFFER;
use crate::store::reader::FileReader;

pub(crate) mod blockreader;
pub mod iterator;
pub mod pgm;

use blockreader::{BlockIter, IdxFloat, IdxInt64, IdxUint32, IndexDomain, ValueBlockReader};
use iterator::{RowIdIterator, RowIdRange};
use pgm::{order_key, ApproxPos, PgmIndex};

pub(crate) mod constants {
    //! Buffer and batch sizing for the index read path.

    /// Value-block and offset readers.
    pub(crate) const VALUES_READER_BUFFER: usize = 256;

    /// Posting-list readers.
    pub(crate) const POSTING_READER_BUFFER: usize = 1024;

    /// Row ids handed to the caller per `next_block` call, at most.
    pub(crate) const ROWID_CHUNK: usize = 1024;
}

/// Per-column record from the index meta.
#[derive(Clone, Debug)]
pub struct IndexColumnInfo {
    pub name: String,
    pub attr_type: AttrType,
    pub enabled: bool,
    pub count_distinct: u64,
}

/// An opened secondary-index file.
#[derive(Debug)]
pub struct SecondaryIndex {
    path: String,
    version: u32,
    meta_off: u64,
    codec32: String,
    codec64: String,
    collation: Collation,
    values_per_block: u32,
    attrs: Vec<IndexColumnInfo>,
    attr_lookup: HashMap<String, usize>,
    block_start_off: Vec<u64>,
    blocks_count: Vec<u64>,
    pgms: Vec<PgmIndex>,
    blocks_base: u64,
    updated: bool,
}

/// Open a secondary-index file and load its meta and per-column models.
pub fn open_index<P: AsRef<Path>>(path: P) -> Result<SecondaryIndex, String> {
    let path_str = path.as_ref().display().to_string();
    let mut reader = FileReader::open_with_buffer(&path_str, META_READER_BUFFER)?;

    let version = reader.read_u32()?;
    if version > STORAGE_VERSION {
        return Err(format!(
            "secondary index format version mismatch: file={}, file_version={}, storage_version={}",
            path_str, version, STORAGE_VERSION
        ));
    }
    let meta_off = reader.read_u64()?;
    reader.seek(meta_off);

    let _next_meta_off = reader.read_u64()?;
    let n_attrs = reader.read_u32()? as usize;

    let enabled_words = (n_attrs + 31) / 32;
    let mut enabled_bits = Vec::with_capacity(enabled_words);
    for _ in 0..enabled_words {
        enabled_bits.push(reader.read_u32()?);
    }

    let codec32 = reader.read_string()?;
    let codec64 = reader.read_string()?;
    let collation_tag = reader.read_u32()?;
    let collation = Collation::from_u32(collation_tag).ok_or_else(|| {
        format!(
            "unknown collation in index meta: file={}, collation={}",
            path_str, collation_tag
        )
    })?;
    let values_per_block = reader.read_u32()?;
    if values_per_block == 0 {
        return Err(format!(
            "invalid values_per_block in index meta: file={}, values_per_block=0",
            path_str
        ));
    }

    let mut attrs = Vec::with_capacity(n_attrs);
    let mut attr_lookup = HashMap::with_capacity(n_attrs);
    for i in 0..n_attrs {
        let name = reader.read_string()?;
        let type_tag = reader.unpack_u32()?;
        let attr_type = AttrType::from_u32(type_tag).ok_or_else(|| {
            format!(
                "unknown attribute type in index meta: file={}, column={}, type={}",
                path_str, name, type_tag
            )
        })?;
        let count_distinct = reader.unpack_u64()?;
        let enabled = enabled_bits[i / 32] & (1 << (i % 32)) != 0;
        attr_lookup.insert(name.clone(), i);
        attrs.push(IndexColumnInfo {
            name,
            attr_type,
            enabled,
            count_distinct,
        });
    }

    let codec = create_int_codec(&codec32, &codec64)?;
    let mut scratch = Vec::new();
    let mut block_start_off = Vec::new();
    decode_u64_vector(&mut reader, codec.as_ref(), &mut scratch, true, &mut block_start_off)?;
    let mut blocks_count = Vec::new();
    decode_u64_vector(&mut reader, codec.as_ref(), &mut scratch, false, &mut blocks_count)?;
    if block_start_off.len() != n_attrs || blocks_count.len() != n_attrs {
        return Err(format!(
            "index meta per-column vectors mismatch: file={}, n_attrs={}, offsets={}, counts={}",
            path_str,
            n_attrs,
            block_start_off.len(),
            blocks_count.len()
        ));
    }

    let mut pgms = Vec::with_capacity(n_attrs);
    for attr in &attrs {
        let pgm_len = reader.unpack_u64()? as usize;
        let mut blob = vec![0_u8; pgm_len];
        reader.read_exact_bytes(&mut blob)?;
        let pgm = PgmIndex::load(&blob).map_err(|e| {
            format!(
                "loading PGM failed: file={}, column={}, error={}",
                path_str, attr.name, e
            )
        })?;
        pgms.push(pgm);
    }

    let blocks_base = reader.pos();
    if reader.is_error() {
        return Err(reader.error().unwrap_or("index meta read failed").to_string());
    }

    Ok(SecondaryIndex {
        path: path_str,
        version,
        meta_off,
        codec32,
        codec64,
        collation,
        values_per_block,
        attrs,
        attr_lookup,
        block_start_off,
        blocks_count,
        pgms,
        blocks_base,
        updated: false,
    })
}

/// Filter literal converted to the raw stored key of a column domain; None
/// when the literal cannot exist in the column.
fn raw_literal(attr_type: AttrType, literal: i64) -> Option<u64> {
    match attr_type {
        AttrType::Uint32 | AttrType::Timestamp | AttrType::Uint32Set => {
            u32::try_from(literal).ok().map(|v| v as u64)
        }
        AttrType::Int64 | AttrType::Int64Set | AttrType::String => Some(literal as u64),
        AttrType::Float => Some((literal as f32).to_bits() as u64),
    }
}

impl SecondaryIndex {
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn values_per_block(&self) -> u32 {
        self.values_per_block
    }

    /// Hash a string with this index's collation.
    pub fn hash(&self, data: &[u8]) -> u64 {
        (hash_fn(self.collation))(data, HASH_SEED)
    }

    pub fn columns(&self) -> &[IndexColumnInfo] {
        &self.attrs
    }

    pub fn column(&self, name: &str) -> Option<&IndexColumnInfo> {
        self.attr_lookup.get(name).map(|&i| &self.attrs[i])
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.column(name).map_or(false, |c| c.enabled)
    }

    pub fn count_distinct(&self, name: &str) -> Option<u64> {
        self.column(name).map(|c| c.count_distinct)
    }

    /// Disable a column after an in-place attribute update; `save_meta`
    /// persists the change.
    pub fn mark_column_updated(&mut self, name: &str) {
        if let Some(&i) = self.attr_lookup.get(name) {
            let attr = &mut self.attrs[i];
            // already-disabled columns should not cause a meta flush
            self.updated |= attr.enabled;
            attr.enabled = false;
        }
    }

    /// Rewrite the enabled bitset in place; the rest of the meta is
    /// immutable.
    pub fn save_meta(&mut self) -> Result<(), String> {
        if !self.updated || self.attrs.is_empty() {
            return Ok(());
        }

        let n_words = (self.attrs.len() + 31) / 32;
        let mut words = vec![0_u32; n_words];
        for (i, attr) in self.attrs.iter().enumerate() {
            if attr.enabled {
                words[i / 32] |= 1 << (i % 32);
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| format!("open index for meta update failed: file={}, error={}", self.path, e))?;
        file.seek(SeekFrom::Start(self.meta_off + 8 + 4))
            .map_err(|e| format!("seek index meta failed: file={}, error={}", self.path, e))?;
        for w in &words {
            file.write_all(&w.to_le_bytes())
                .map_err(|e| format!("write index meta failed: file={}, error={}", self.path, e))?;
        }
        self.updated = false;
        Ok(())
    }

    fn column_index(&self, filter: &Filter) -> Result<usize, String> {
        self.attr_lookup
            .get(filter.attr.as_str())
            .copied()
            .ok_or_else(|| {
                format!(
                    "unknown column in index filter: file={}, column={}",
                    self.path, filter.attr
                )
            })
    }

    /// Normalize a filter against the column type: string equality becomes
    /// hash equality, float predicates become float ranges.
    fn fixup_filter(&self, filter: &Filter, attr_type: AttrType) -> Result<Filter, String> {
        let mut f = filter.clone();
        if attr_type == AttrType::String {
            if f.kind != FilterKind::Values {
                return Err(format!(
                    "only equality filters are served for string columns: column={}",
                    f.attr
                ));
            }
            if !f.string_values.is_empty() {
                f.values = f
                    .string_values
                    .iter()
                    .map(|s| self.hash(s) as i64)
                    .collect();
            }
        }
        if attr_type == AttrType::Float {
            if f.kind == FilterKind::Values && f.values.len() == 1 {
                f.kind = FilterKind::FloatRange;
                f.min_value_f = f.values[0] as f32;
                f.max_value_f = f.min_value_f;
                f.left_closed = true;
                f.right_closed = true;
                f.left_unbounded = false;
                f.right_unbounded = false;
            } else if f.kind == FilterKind::Range {
                f.kind = FilterKind::FloatRange;
                f.min_value_f = f.min_value as f32;
                f.max_value_f = f.max_value as f32;
            }
        }
        if f.kind == FilterKind::FloatRange
            && (f.min_value_f.is_nan() || f.max_value_f.is_nan())
        {
            return Err(format!(
                "NaN endpoint in float range filter: column={}",
                f.attr
            ));
        }
        Ok(f)
    }

    /// Raw stored keys for the range endpoints of a fixed-up filter.
    fn range_endpoints(&self, f: &Filter, attr_type: AttrType) -> (u64, u64) {
        if f.kind == FilterKind::FloatRange {
            return (
                f.min_value_f.to_bits() as u64,
                f.max_value_f.to_bits() as u64,
            );
        }
        match attr_type {
            AttrType::Uint32 | AttrType::Timestamp | AttrType::Uint32Set => (
                f.min_value.clamp(0, u32::MAX as i64) as u64,
                f.max_value.clamp(0, u32::MAX as i64) as u64,
            ),
            _ => (f.min_value as u64, f.max_value as u64),
        }
    }

    fn range_approx(&self, col: usize, f: &Filter, attr_type: AttrType) -> ApproxPos {
        let n_blocks = self.blocks_count[col];
        let (raw_min, raw_max) = self.range_endpoints(f, attr_type);
        let pgm = &self.pgms[col];

        let mut pos = ApproxPos {
            lo: 0,
            pos: 0,
            hi: (n_blocks - 1) * self.values_per_block as u64,
        };
        if f.right_unbounded {
            let found = pgm.search(order_key(attr_type, raw_min));
            pos.pos = found.pos;
            pos.lo = found.lo;
        } else if f.left_unbounded {
            let found = pgm.search(order_key(attr_type, raw_max));
            pos.pos = found.pos;
            pos.hi = found.hi;
        } else {
            let found_min = pgm.search(order_key(attr_type, raw_min));
            let found_max = pgm.search(order_key(attr_type, raw_max));
            pos.lo = found_min.lo.min(found_max.lo);
            pos.pos = found_min.pos.min(found_max.pos);
            pos.hi = found_min.hi.max(found_max.hi);
        }
        pos
    }

    fn vals_rows<D: IndexDomain>(
        &self,
        col: usize,
        block_iters: &[BlockIter],
        bounds: Option<RowIdRange>,
    ) -> Result<Vec<Box<dyn RowIdIterator>>, String> {
        let codec = create_int_codec(&self.codec32, &self.codec64)?;
        let mut reader = ValueBlockReader::<D>::open(
            &self.path,
            codec,
            self.blocks_base + self.block_start_off[col],
            bounds,
        )?;
        let mut out = Vec::new();
        for it in block_iters {
            reader.create_value_iterators(it, &mut out)?;
        }
        Ok(out)
    }

    fn range_rows<D: IndexDomain>(
        &self,
        col: usize,
        it: &BlockIter,
        filter: &Filter,
        bounds: Option<RowIdRange>,
    ) -> Result<Vec<Box<dyn RowIdIterator>>, String> {
        let codec = create_int_codec(&self.codec32, &self.codec64)?;
        let mut reader = ValueBlockReader::<D>::open(
            &self.path,
            codec,
            self.blocks_base + self.block_start_off[col],
            bounds,
        )?;
        let mut out = Vec::new();
        reader.create_range_iterators(it, filter, &mut out)?;
        Ok(out)
    }

    /// Row-id iterators answering `filter`, optionally bounded to a row-id
    /// window. One iterator per matching distinct value; no total order is
    /// promised across iterators.
    pub fn create_iterators(
        &self,
        filter: &Filter,
        bounds: Option<RowIdRange>,
    ) -> Result<Vec<Box<dyn RowIdIterator>>, String> {
        let col = self.column_index(filter)?;
        let attr_type = self.attrs[col].attr_type;
        let f = self.fixup_filter(filter, attr_type)?;
        if f.exclude {
            return Err(format!(
                "exclude filters are not served by the secondary index: column={}",
                f.attr
            ));
        }

        let n_blocks = self.blocks_count[col];
        if n_blocks == 0 {
            return Ok(Vec::new());
        }

        match f.kind {
            FilterKind::Values => {
                let mut block_iters = Vec::new();
                for &literal in &f.values {
                    let Some(raw) = raw_literal(attr_type, literal) else {
                        continue;
                    };
                    let approx = self.pgms[col].search(order_key(attr_type, raw));
                    block_iters.push(BlockIter::new(
                        &approx,
                        raw,
                        n_blocks,
                        self.values_per_block,
                    ));
                }
                // ascending start order keeps file seeks monotone
                block_iters.sort_by_key(|b| b.start);
                match attr_type {
                    AttrType::Uint32 | AttrType::Timestamp | AttrType::Uint32Set => {
                        self.vals_rows::<IdxUint32>(col, &block_iters, bounds)
                    }
                    AttrType::Float => self.vals_rows::<IdxFloat>(col, &block_iters, bounds),
                    AttrType::Int64 | AttrType::Int64Set | AttrType::String => {
                        self.vals_rows::<IdxInt64>(col, &block_iters, bounds)
                    }
                }
            }
            FilterKind::Range | FilterKind::FloatRange => {
                let approx = self.range_approx(col, &f, attr_type);
                let it = BlockIter::new(&approx, 0, n_blocks, self.values_per_block);
                match attr_type {
                    AttrType::Uint32 | AttrType::Timestamp | AttrType::Uint32Set => {
                        self.range_rows::<IdxUint32>(col, &it, &f, bounds)
                    }
                    AttrType::Float => self.range_rows::<IdxFloat>(col, &it, &f, bounds),
                    AttrType::Int64 | AttrType::Int64Set | AttrType::String => {
                        self.range_rows::<IdxInt64>(col, &it, &f, bounds)
                    }
                }
            }
        }
    }

    /// Upper-bound estimate of `create_iterators` output size from the PGM
    /// windows alone; no blocks are opened.
    pub fn estimate_num_iterators(&self, filter: &Filter) -> Result<u32, String> {
        let col = self.column_index(filter)?;
        let attr_type = self.attrs[col].attr_type;
        let f = self.fixup_filter(filter, attr_type)?;

        let n_blocks = self.blocks_count[col];
        if n_blocks == 0 {
            return Ok(0);
        }

        let estimate = match f.kind {
            FilterKind::Values => {
                let mut total = 0_u64;
                for &literal in &f.values {
                    let Some(raw) = raw_literal(attr_type, literal) else {
                        continue;
                    };
                    let approx = self.pgms[col].search(order_key(attr_type, raw));
                    total += BlockIter::new(&approx, raw, n_blocks, self.values_per_block)
                        .n_blocks();
                }
                total
            }
            FilterKind::Range | FilterKind::FloatRange => {
                let approx = self.range_approx(col, &f, attr_type);
                BlockIter::new(&approx, 0, n_blocks, self.values_per_block).n_blocks()
            }
        };
        Ok(estimate.min(n_blocks) as u32)
    }
}
