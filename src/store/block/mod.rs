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
//! Per-packing block decoders and the cursor state they share.

use crate::common::INVALID_ROW_ID;

pub(crate) mod int_block;
pub(crate) mod str_block;

/// Per-block packing tag of an integer column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IntPacking {
    Const = 0,
    Table = 1,
    DeltaPfor = 2,
    GenericPfor = 3,
}

pub(crate) const INT_PACKING_TOTAL: usize = 4;

impl IntPacking {
    pub(crate) fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(IntPacking::Const),
            1 => Some(IntPacking::Table),
            2 => Some(IntPacking::DeltaPfor),
            3 => Some(IntPacking::GenericPfor),
            _ => None,
        }
    }
}

/// Per-block packing tag of a string column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StrPacking {
    Const = 0,
    ConstLen = 1,
    Table = 2,
    Generic = 3,
}

impl StrPacking {
    pub(crate) fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(StrPacking::Const),
            1 => Some(StrPacking::ConstLen),
            2 => Some(StrPacking::Table),
            3 => Some(StrPacking::Generic),
            _ => None,
        }
    }
}

pub(crate) const INVALID_BLOCK_ID: u32 = u32::MAX;

/// Position state shared by iterators and analyzers: which block is loaded,
/// where it starts, and which row was last requested.
#[derive(Debug)]
pub(crate) struct BlockCursor {
    pub(crate) subblock_size: usize,
    pub(crate) block_id: u32,
    pub(crate) block_rows: usize,
    pub(crate) block_start_row: u32,
    pub(crate) requested_row: u32,
}

impl BlockCursor {
    pub(crate) fn new(subblock_size: usize) -> Self {
        BlockCursor {
            subblock_size,
            block_id: INVALID_BLOCK_ID,
            block_rows: 0,
            block_start_row: 0,
            requested_row: INVALID_ROW_ID,
        }
    }

    pub(crate) fn set_block(&mut self, block_id: u32, block_rows: usize, start_row: u32) {
        self.block_id = block_id;
        self.block_rows = block_rows;
        self.block_start_row = start_row;
        self.requested_row = INVALID_ROW_ID;
    }

    pub(crate) fn id_in_block(&self) -> usize {
        debug_assert_ne!(self.requested_row, INVALID_ROW_ID);
        (self.requested_row - self.block_start_row) as usize
    }

    pub(crate) fn subblock_id(&self, id_in_block: usize) -> usize {
        id_in_block / self.subblock_size
    }

    pub(crate) fn value_id_in_subblock(&self, id_in_block: usize) -> usize {
        id_in_block % self.subblock_size
    }

    /// Valid values in a subblock; only the last one of a block may be short.
    pub(crate) fn num_subblock_values(&self, subblock_id: usize) -> usize {
        let start = subblock_id * self.subblock_size;
        debug_assert!(start < self.block_rows);
        (self.block_rows - start).min(self.subblock_size)
    }
}
