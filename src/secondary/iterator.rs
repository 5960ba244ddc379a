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
//! Posting-list decoders: strictly increasing row-id streams.
//!
//! Three packings: ROW (one id), ROW_BLOCK (one coded run) and
//! ROW_BLOCKS_LIST (min-max vector + offset vector + runs). A row-id bound
//! marks overlapping runs in a bitmap up front and the iterator only
//! decodes those. Output is chunked: a run larger than one output batch is
//! drained across several `next_block` calls.

use std::sync::Arc;

use roaring::RoaringBitmap;
use tracing::warn;

use crate::store::codec::{decode_u32_vector, inverse_deltas32, read_encoded_words, IntCodec};
use crate::store::reader::FileReader;

use super::constants::{POSTING_READER_BUFFER, ROWID_CHUNK};

/// Inclusive row-id bound applied to produced streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowIdRange {
    pub min: u32,
    pub max: u32,
}

impl RowIdRange {
    fn contains(&self, row_id: u32) -> bool {
        self.min <= row_id && row_id <= self.max
    }

    fn overlaps(&self, min: u32, max: u32) -> bool {
        self.min <= max && min <= self.max
    }
}

/// Producer of strictly increasing row ids in batches.
pub trait RowIdIterator: Send {
    /// Advisory: the caller will not ask for rows below `row_id`. Returns
    /// whether the iterator may still produce anything.
    fn hint_row_id(&mut self, row_id: u32) -> bool;

    /// Next batch of row ids; false when exhausted.
    fn next_block(&mut self, out: &mut Vec<u32>) -> Result<bool, String>;

    /// Row ids produced so far.
    fn num_processed(&self) -> i64;

    /// Non-fatal decode hiccups observed during iteration.
    fn warning(&self) -> Option<&str>;
}

/// Posting-list entry packing tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PostingPacking {
    Row = 0,
    RowBlock = 1,
    RowBlocksList = 2,
}

impl PostingPacking {
    pub(crate) fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(PostingPacking::Row),
            1 => Some(PostingPacking::RowBlock),
            2 => Some(PostingPacking::RowBlocksList),
            _ => None,
        }
    }
}

pub(crate) struct RowidIterator {
    packing: PostingPacking,
    row_start: u64,
    payload_off: u64,
    reader: Option<FileReader>,
    codec: Arc<dyn IntCodec + Send + Sync>,
    bounds: Option<RowIdRange>,

    started: bool,
    stopped: bool,

    run_minmax: Vec<u32>,
    run_offsets: Vec<u32>,
    runs: RoaringBitmap,
    payloads_base: u64,

    scratch: Vec<u32>,
    decoded: Vec<u32>,
    drain_pos: usize,
    decoded_end: usize,

    num_processed: i64,
    warning: Option<String>,
}

impl RowidIterator {
    /// `row_start` is the row id itself for ROW entries, otherwise the byte
    /// offset of the entry's payload inside the payload area.
    pub(crate) fn create(
        packing: PostingPacking,
        row_start: u64,
        file_name: &str,
        payload_base: u64,
        codec: Arc<dyn IntCodec + Send + Sync>,
        bounds: Option<RowIdRange>,
    ) -> Result<Box<dyn RowIdIterator>, String> {
        let reader = match packing {
            PostingPacking::Row => None,
            PostingPacking::RowBlock | PostingPacking::RowBlocksList => {
                Some(FileReader::open_with_buffer(file_name, POSTING_READER_BUFFER)?)
            }
        };
        Ok(Box::new(RowidIterator {
            packing,
            row_start,
            payload_off: payload_base + row_start,
            reader,
            codec,
            bounds,
            started: false,
            stopped: false,
            run_minmax: Vec::new(),
            run_offsets: Vec::new(),
            runs: RoaringBitmap::new(),
            payloads_base: 0,
            scratch: Vec::new(),
            decoded: Vec::new(),
            drain_pos: 0,
            decoded_end: 0,
            num_processed: 0,
            warning: None,
        }))
    }

    /// Decode one coded run at the reader position and clip it to the
    /// bounds; leaves `[drain_pos, decoded_end)` ready to drain.
    fn decode_run(&mut self) -> Result<(), String> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| "posting reader missing for coded run".to_string())?;
        let _row_min = reader.unpack_u32()?;
        let _row_span = reader.unpack_u32()?;

        read_encoded_words(reader, &mut self.scratch)?;
        self.codec.decode32(&self.scratch, &mut self.decoded)?;
        inverse_deltas32(&mut self.decoded);

        if self.decoded.is_empty() {
            let msg = format!(
                "empty posting run skipped: file={}, offset={}",
                reader.file_name(),
                reader.pos()
            );
            warn!("{}", msg);
            self.warning.get_or_insert(msg);
        }

        self.drain_pos = 0;
        self.decoded_end = self.decoded.len();
        if let Some(bounds) = self.bounds {
            self.drain_pos = self.decoded.partition_point(|&r| r < bounds.min);
            self.decoded_end = self.decoded.partition_point(|&r| r <= bounds.max);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), String> {
        self.started = true;
        match self.packing {
            PostingPacking::Row => {
                self.stopped = true;
                let row = self.row_start as u32;
                if self.bounds.map_or(true, |b| b.contains(row)) {
                    self.decoded.clear();
                    self.decoded.push(row);
                    self.drain_pos = 0;
                    self.decoded_end = 1;
                }
            }
            PostingPacking::RowBlock => {
                self.stopped = true;
                let payload_off = self.payload_off;
                let reader = self
                    .reader
                    .as_mut()
                    .ok_or_else(|| "posting reader missing for coded run".to_string())?;
                reader.seek(payload_off);
                self.decode_run()?;
            }
            PostingPacking::RowBlocksList => {
                let payload_off = self.payload_off;
                let reader = self
                    .reader
                    .as_mut()
                    .ok_or_else(|| "posting reader missing for coded run".to_string())?;
                reader.seek(payload_off);
                let run_count = reader.unpack_u32()? as usize;
                decode_u32_vector(
                    reader,
                    self.codec.as_ref(),
                    &mut self.scratch,
                    true,
                    &mut self.run_minmax,
                )?;
                if self.run_minmax.len() != 2 * run_count {
                    return Err(format!(
                        "posting run min-max vector mismatch: file={}, runs={}, entries={}",
                        reader.file_name(),
                        run_count,
                        self.run_minmax.len()
                    ));
                }
                decode_u32_vector(
                    reader,
                    self.codec.as_ref(),
                    &mut self.scratch,
                    true,
                    &mut self.run_offsets,
                )?;
                if self.run_offsets.len() != run_count {
                    return Err(format!(
                        "posting run offset vector mismatch: file={}, runs={}, entries={}",
                        reader.file_name(),
                        run_count,
                        self.run_offsets.len()
                    ));
                }
                self.payloads_base = reader.pos();

                for k in 0..run_count {
                    let run_min = self.run_minmax[2 * k];
                    let run_max = self.run_minmax[2 * k + 1];
                    let wanted = self
                        .bounds
                        .map_or(true, |b| b.overlaps(run_min, run_max));
                    if wanted {
                        self.runs.insert(k as u32);
                    }
                }
            }
        }
        Ok(())
    }

    fn advance_run(&mut self) -> Result<(), String> {
        let Some(run) = self.runs.min() else {
            self.stopped = true;
            return Ok(());
        };
        self.runs.remove(run);

        let offset = if run > 0 {
            self.run_offsets[run as usize - 1] as u64
        } else {
            0
        };
        let payloads_base = self.payloads_base;
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| "posting reader missing for coded run".to_string())?;
        reader.seek(payloads_base + offset);
        self.decode_run()
    }
}

impl RowIdIterator for RowidIterator {
    fn hint_row_id(&mut self, row_id: u32) -> bool {
        // drop the drained run's tail when it is entirely below the hint
        if self.drain_pos < self.decoded_end && self.decoded[self.decoded_end - 1] < row_id {
            self.drain_pos = self.decoded_end;
        }
        if self.started && self.packing == PostingPacking::RowBlocksList {
            // runs are sorted by row range; binary search the first run
            // whose max reaches the hint and drop everything before it
            let total = self.run_offsets.len();
            let mut lo = 0_usize;
            let mut hi = total;
            while lo < hi {
                let mid = (lo + hi) / 2;
                if self.run_minmax[2 * mid + 1] < row_id {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            if lo > 0 {
                self.runs.remove_range(0..lo as u32);
            }
        }
        !self.stopped || self.drain_pos < self.decoded_end
    }

    fn next_block(&mut self, out: &mut Vec<u32>) -> Result<bool, String> {
        let result = self.next_batch(out);
        if result.is_err() {
            // read or decode failures are terminal for this iterator
            self.stopped = true;
            self.drain_pos = self.decoded_end;
        }
        result
    }

    fn num_processed(&self) -> i64 {
        self.num_processed
    }

    fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }
}

impl RowidIterator {
    fn next_batch(&mut self, out: &mut Vec<u32>) -> Result<bool, String> {
        out.clear();
        loop {
            if self.drain_pos < self.decoded_end {
                let end = self.decoded_end.min(self.drain_pos + ROWID_CHUNK);
                out.extend_from_slice(&self.decoded[self.drain_pos..end]);
                self.drain_pos = end;
                self.num_processed += out.len() as i64;
                return Ok(true);
            }
            if self.stopped {
                return Ok(false);
            }
            if !self.started {
                self.start()?;
            } else {
                self.advance_run()?;
            }
        }
    }
}
