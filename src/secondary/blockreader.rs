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
//! Value-block readers for the secondary index.
//!
//! A value block stores sorted distinct values followed by per-entry
//! packing types and row-start offsets; the trailing arrays are decoded
//! lazily, only once a value in the block actually matches. Point lookups
//! check the cached block, then the model's best-guess block, then scan
//! outward; range lookups sweep the window in file order.
//!
//! Current limitations:
//! - Equality against a block that turns out not to contain the value stops
//!   the scan once a block's value range goes past the key; values are
//!   sorted across blocks.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::store::analyzer::filter::Filter;
use crate::store::codec::{decode_u32_vector, IntCodec, IntValue};
use crate::store::reader::FileReader;

use super::constants::VALUES_READER_BUFFER;
use super::iterator::{PostingPacking, RowIdIterator, RowIdRange, RowidIterator};
use super::pgm::ApproxPos;

/// Window of candidate value blocks for one key or range.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockIter {
    pub(crate) val: u64,
    /// Best-guess block, relative to `start`.
    pub(crate) pos: u64,
    pub(crate) start: u64,
    pub(crate) last: u64,
}

impl BlockIter {
    pub(crate) fn new(
        approx: &ApproxPos,
        val: u64,
        blocks_count: u64,
        values_per_block: u32,
    ) -> Self {
        debug_assert!(blocks_count > 0);
        let vpb = values_per_block as u64;
        let mut start = approx.lo / vpb;
        let mut last = approx.hi / vpb;
        if last >= blocks_count {
            last = blocks_count - 1;
        }
        if start > last {
            start = last;
        }
        let pos_abs = (approx.pos / vpb).clamp(start, last);
        BlockIter {
            val,
            pos: pos_abs - start,
            start,
            last,
        }
    }

    pub(crate) fn n_blocks(&self) -> u64 {
        self.last - self.start + 1
    }
}

/// Typed comparisons of stored index values against filter keys and ranges.
pub(crate) trait IndexDomain: Send + Sync + 'static {
    type Stored: IntValue;

    fn from_raw(raw: u64) -> Self::Stored;
    fn cmp(a: Self::Stored, b: Self::Stored) -> Ordering;
    fn eval_range(v: Self::Stored, f: &Filter) -> bool;
    /// -1: block entirely left of the range, 1: entirely right, 0: overlap.
    fn cmp_range(min: Self::Stored, max: Self::Stored, f: &Filter) -> i32;
}

fn eval_range_bounds<T: PartialOrd>(
    v: T,
    min: T,
    max: T,
    left_closed: bool,
    right_closed: bool,
    left_unbounded: bool,
    right_unbounded: bool,
) -> bool {
    if left_unbounded && right_unbounded {
        return true;
    }
    if left_unbounded {
        return if right_closed { v <= max } else { v < max };
    }
    if right_unbounded {
        return if left_closed { v >= min } else { v > min };
    }
    (if left_closed { v >= min } else { v > min })
        && (if right_closed { v <= max } else { v < max })
}

fn cmp_range_bounds<T: PartialOrd>(
    block_min: T,
    block_max: T,
    range_min: T,
    range_max: T,
    left_unbounded: bool,
    right_unbounded: bool,
) -> i32 {
    // closed-hull overlap; exact endpoint handling happens per value
    if !right_unbounded && block_min > range_max {
        return 1;
    }
    if !left_unbounded && block_max < range_min {
        return -1;
    }
    0
}

pub(crate) struct IdxUint32;

impl IndexDomain for IdxUint32 {
    type Stored = u32;

    fn from_raw(raw: u64) -> u32 {
        raw as u32
    }

    fn cmp(a: u32, b: u32) -> Ordering {
        a.cmp(&b)
    }

    fn eval_range(v: u32, f: &Filter) -> bool {
        eval_range_bounds(
            v as i64,
            f.min_value,
            f.max_value,
            f.left_closed,
            f.right_closed,
            f.left_unbounded,
            f.right_unbounded,
        )
    }

    fn cmp_range(min: u32, max: u32, f: &Filter) -> i32 {
        cmp_range_bounds(
            min as i64,
            max as i64,
            f.min_value,
            f.max_value,
            f.left_unbounded,
            f.right_unbounded,
        )
    }
}

/// Also serves STRING columns: their 64-bit hashes sort as signed integers.
pub(crate) struct IdxInt64;

impl IndexDomain for IdxInt64 {
    type Stored = u64;

    fn from_raw(raw: u64) -> u64 {
        raw
    }

    fn cmp(a: u64, b: u64) -> Ordering {
        (a as i64).cmp(&(b as i64))
    }

    fn eval_range(v: u64, f: &Filter) -> bool {
        eval_range_bounds(
            v as i64,
            f.min_value,
            f.max_value,
            f.left_closed,
            f.right_closed,
            f.left_unbounded,
            f.right_unbounded,
        )
    }

    fn cmp_range(min: u64, max: u64, f: &Filter) -> i32 {
        cmp_range_bounds(
            min as i64,
            max as i64,
            f.min_value,
            f.max_value,
            f.left_unbounded,
            f.right_unbounded,
        )
    }
}

pub(crate) struct IdxFloat;

impl IndexDomain for IdxFloat {
    type Stored = u32;

    fn from_raw(raw: u64) -> u32 {
        raw as u32
    }

    fn cmp(a: u32, b: u32) -> Ordering {
        f32::from_bits(a)
            .partial_cmp(&f32::from_bits(b))
            .unwrap_or(Ordering::Equal)
    }

    fn eval_range(v: u32, f: &Filter) -> bool {
        eval_range_bounds(
            f32::from_bits(v),
            f.min_value_f,
            f.max_value_f,
            f.left_closed,
            f.right_closed,
            f.left_unbounded,
            f.right_unbounded,
        )
    }

    fn cmp_range(min: u32, max: u32, f: &Filter) -> i32 {
        cmp_range_bounds(
            f32::from_bits(min),
            f32::from_bits(max),
            f.min_value_f,
            f.max_value_f,
            f.left_unbounded,
            f.right_unbounded,
        )
    }
}

struct FindValueResult {
    matched_item: i32,
    cmp: i32,
}

/// Reader over one column's value-blocks area.
pub(crate) struct ValueBlockReader<D: IndexDomain> {
    off_reader: FileReader,
    block_reader: FileReader,
    codec: Arc<dyn IntCodec + Send + Sync>,
    block_table_off: u64,
    bounds: Option<RowIdRange>,

    values: Vec<D::Stored>,
    types: Vec<u32>,
    row_starts: Vec<u32>,
    scratch: Vec<u32>,
    scratch32: Vec<u32>,

    block_offsets: Vec<u64>,
    start_block: i64,
    loaded_block: i64,
    off_past_values: i64,
    payload_base: u64,
}

impl<D: IndexDomain> ValueBlockReader<D> {
    pub(crate) fn open(
        file_name: &str,
        codec: Arc<dyn IntCodec + Send + Sync>,
        block_table_off: u64,
        bounds: Option<RowIdRange>,
    ) -> Result<Self, String> {
        Ok(ValueBlockReader {
            off_reader: FileReader::open_with_buffer(file_name, VALUES_READER_BUFFER)?,
            block_reader: FileReader::open_with_buffer(file_name, VALUES_READER_BUFFER)?,
            codec,
            block_table_off,
            bounds,
            values: Vec::new(),
            types: Vec::new(),
            row_starts: Vec::new(),
            scratch: Vec::new(),
            scratch32: Vec::new(),
            block_offsets: Vec::new(),
            start_block: -1,
            loaded_block: -1,
            off_past_values: -1,
            payload_base: 0,
        })
    }

    /// Decode the sorted values array at the block reader's position; the
    /// trailing types/row-start arrays stay undecoded until a match needs
    /// them.
    fn load_values(&mut self) -> Result<(), String> {
        crate::store::codec::read_encoded_words(&mut self.block_reader, &mut self.scratch)?;
        <D::Stored as IntValue>::decode_words(self.codec.as_ref(), &self.scratch, &mut self.values)?;
        <D::Stored as IntValue>::inverse_deltas(&mut self.values);
        self.off_past_values = self.block_reader.pos() as i64;
        Ok(())
    }

    /// Decode types and row starts (once per block) and build the posting
    /// iterator for entry `item`.
    fn create_iterator(&mut self, item: usize) -> Result<Box<dyn RowIdIterator>, String> {
        if self.off_past_values != -1 {
            self.block_reader.seek(self.off_past_values as u64);
            self.off_past_values = -1;

            decode_u32_vector(
                &mut self.block_reader,
                self.codec.as_ref(),
                &mut self.scratch32,
                false,
                &mut self.types,
            )?;
            let row_start_is_delta = self.block_reader.read_u8()? != 0;
            decode_u32_vector(
                &mut self.block_reader,
                self.codec.as_ref(),
                &mut self.scratch32,
                row_start_is_delta,
                &mut self.row_starts,
            )?;
            if self.types.len() != self.values.len() || self.row_starts.len() != self.values.len()
            {
                return Err(format!(
                    "value block entry arrays mismatch: file={}, values={}, types={}, row_starts={}",
                    self.block_reader.file_name(),
                    self.values.len(),
                    self.types.len(),
                    self.row_starts.len()
                ));
            }
            self.payload_base = self.block_reader.pos();
        }

        let type_tag = *self.types.get(item).ok_or_else(|| {
            format!(
                "value item out of block range: item={}, entries={}",
                item,
                self.types.len()
            )
        })?;
        let packing = PostingPacking::from_u32(type_tag).ok_or_else(|| {
            format!(
                "unknown posting packing tag: file={}, item={}, tag={}",
                self.block_reader.file_name(),
                item,
                type_tag
            )
        })?;

        RowidIterator::create(
            packing,
            self.row_starts[item] as u64,
            self.block_reader.file_name(),
            self.payload_base,
            self.codec.clone(),
            self.bounds,
        )
    }

    fn find_value(&self, raw_val: u64) -> FindValueResult {
        let target = D::from_raw(raw_val);
        match self.values.binary_search_by(|v| D::cmp(*v, target)) {
            Ok(i) => FindValueResult {
                matched_item: i as i32,
                cmp: 0,
            },
            Err(_) => {
                if self.values.is_empty() {
                    return FindValueResult {
                        matched_item: -1,
                        cmp: 0,
                    };
                }
                let front = self.values[0];
                let back = *self.values.last().unwrap();
                if D::cmp(back, target) == Ordering::Less {
                    FindValueResult {
                        matched_item: -1,
                        cmp: -1,
                    }
                } else if D::cmp(front, target) == Ordering::Greater {
                    FindValueResult {
                        matched_item: -1,
                        cmp: 1,
                    }
                } else {
                    // absent, but inside this block's value range: conclusive
                    FindValueResult {
                        matched_item: -1,
                        cmp: 0,
                    }
                }
            }
        }
    }

    /// Load block `rel_block` (or reuse the loaded one when -1), search for
    /// the value and add its posting iterator on a hit. Returns the block
    /// verdict: 0 conclusive, -1 value is further right, 1 further left.
    fn block_load_find(
        &mut self,
        rel_block: i64,
        raw_val: u64,
        out: &mut Vec<Box<dyn RowIdIterator>>,
    ) -> Result<i32, String> {
        if rel_block != -1 {
            let off = *self.block_offsets.get(rel_block as usize).ok_or_else(|| {
                format!(
                    "block offset out of loaded window: rel_block={}, window={}",
                    rel_block,
                    self.block_offsets.len()
                )
            })?;
            self.block_reader.seek(off);
            self.load_values()?;
            self.loaded_block = self.start_block + rel_block;
        }

        let found = self.find_value(raw_val);
        if found.matched_item != -1 {
            let it = self.create_iterator(found.matched_item as usize)?;
            out.push(it);
        }
        Ok(found.cmp)
    }

    /// Point lookup over the window: cached block, best guess, then outward
    /// scan in file order.
    pub(crate) fn create_value_iterators(
        &mut self,
        it: &BlockIter,
        out: &mut Vec<Box<dyn RowIdIterator>>,
    ) -> Result<(), String> {
        self.start_block = it.start as i64;

        let n_blocks = it.n_blocks() as usize;
        self.block_offsets.clear();
        self.block_offsets.reserve(n_blocks);
        self.off_reader
            .seek(self.block_table_off + it.start * 8);
        for _ in 0..n_blocks {
            self.block_offsets.push(self.off_reader.read_u64()?);
        }

        // already-loaded block first, if it sits inside the window
        let mut checked_block = -1_i64;
        if self.loaded_block != -1
            && self.loaded_block != it.start as i64 + it.pos as i64
            && self.loaded_block >= it.start as i64
            && self.loaded_block <= it.last as i64
        {
            if self.block_load_find(-1, it.val, out)? == 0 {
                return Ok(());
            }
            checked_block = self.loaded_block;
        }

        if self.block_load_find(it.pos as i64, it.val, out)? == 0 {
            return Ok(());
        }

        for rel in 0..n_blocks as i64 {
            if rel == it.pos as i64
                || (checked_block != -1 && self.start_block + rel == checked_block)
            {
                continue;
            }
            let cmp = self.block_load_find(rel, it.val, out)?;
            if cmp >= 0 {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Range sweep over the window, streaming blocks in file order.
    pub(crate) fn create_range_iterators(
        &mut self,
        it: &BlockIter,
        filter: &Filter,
        out: &mut Vec<Box<dyn RowIdIterator>>,
    ) -> Result<(), String> {
        self.off_reader
            .seek(self.block_table_off + it.start * 8);

        let mut matching = false;
        'blocks: for _block in it.start..=it.last {
            let off = self.off_reader.read_u64()?;
            self.block_reader.seek(off);
            self.load_values()?;
            self.loaded_block = -1;
            if self.values.is_empty() {
                return Err(format!(
                    "empty value block in range sweep: file={}",
                    self.block_reader.file_name()
                ));
            }

            if !matching {
                let first = self.values[0];
                let last_val = *self.values.last().unwrap();
                let cmp = D::cmp_range(first, last_val, filter);
                if cmp > 0 {
                    break;
                }
                if cmp < 0 {
                    continue;
                }
            } else if !D::eval_range(self.values[0], filter) {
                // sorted values: once matching stops, no later block matches
                break;
            }

            for item in 0..self.values.len() {
                if D::eval_range(self.values[item], filter) {
                    let iterator = self.create_iterator(item)?;
                    out.push(iterator);
                    matching = true;
                } else if matching {
                    break 'blocks;
                }
            }
        }
        Ok(())
    }
}
