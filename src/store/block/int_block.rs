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
//! Integer block decoders: CONST, TABLE, DELTA_PFOR, GENERIC_PFOR.
//!
//! Each decoder reads its header once per block and caches the last decoded
//! subblock, so repeated value reads inside one subblock touch the file
//! only once.

use std::sync::Arc;

use crate::store::codec::{decode_u32_vector, IntCodec, IntValue};
use crate::store::codec::bit_unpack_128;
use crate::store::constants::SUBBLOCK_SIZE;
use crate::store::reader::FileReader;

/// Whole block is one value.
#[derive(Default)]
pub(crate) struct IntConstBlock<T: IntValue> {
    value: T,
}

impl<T: IntValue> IntConstBlock<T> {
    pub(crate) fn read_header(&mut self, reader: &mut FileReader) -> Result<(), String> {
        self.value = T::from_u64(reader.unpack_u64()?);
        Ok(())
    }

    pub(crate) fn value(&self) -> T {
        self.value
    }
}

/// Small sorted value table plus fixed-width indices per subblock.
pub(crate) struct IntTableBlock<T: IntValue> {
    table: Vec<T>,
    indexes: Vec<u32>,
    encoded: Vec<u32>,
    bits: usize,
    values_offset: u64,
    subblock_id: i64,
    values_read: usize,
}

impl<T: IntValue> IntTableBlock<T> {
    pub(crate) fn new() -> Self {
        IntTableBlock {
            table: Vec::new(),
            indexes: vec![0; SUBBLOCK_SIZE],
            encoded: Vec::new(),
            bits: 0,
            values_offset: 0,
            subblock_id: -1,
            values_read: 0,
        }
    }

    pub(crate) fn read_header(&mut self, reader: &mut FileReader) -> Result<(), String> {
        let count = reader.read_u8()? as usize;
        if count == 0 {
            return Err(format!(
                "empty value table in TABLE block: file={}, pos={}",
                reader.file_name(),
                reader.pos()
            ));
        }
        self.table.clear();
        self.table.reserve(count);
        let mut cur = 0_u64;
        for _ in 0..count {
            cur = cur.wrapping_add(reader.unpack_u64()?);
            self.table.push(T::from_u64(cur));
        }

        self.bits = if count <= 1 {
            0
        } else {
            (usize::BITS - (count - 1).leading_zeros()) as usize
        };
        self.encoded.resize((SUBBLOCK_SIZE >> 5) * self.bits, 0);

        self.values_offset = reader.pos();
        self.subblock_id = -1;
        Ok(())
    }

    pub(crate) fn read_subblock(
        &mut self,
        subblock_id: usize,
        n_values: usize,
        reader: &mut FileReader,
    ) -> Result<(), String> {
        if self.subblock_id == subblock_id as i64 {
            return Ok(());
        }
        self.subblock_id = subblock_id as i64;

        let packed_bytes = self.encoded.len() * 4;
        reader.seek(self.values_offset + (packed_bytes * subblock_id) as u64);
        let n_words = self.encoded.len();
        reader.read_words(n_words, &mut self.encoded)?;
        bit_unpack_128(&self.encoded, &mut self.indexes, self.bits);
        self.values_read = n_values;
        Ok(())
    }

    pub(crate) fn value(&self, id_in_subblock: usize) -> Result<T, String> {
        let index = self.indexes[id_in_subblock] as usize;
        self.table.get(index).copied().ok_or_else(|| {
            format!(
                "dictionary index out of table range: index={}, table_size={}",
                index,
                self.table.len()
            )
        })
    }

    /// Table position of `value`, or -1 when absent.
    pub(crate) fn index_of(&self, value: T) -> i32 {
        match self.table.binary_search(&value) {
            Ok(i) => i as i32,
            Err(_) => -1,
        }
    }

    pub(crate) fn table_value(&self, index: usize) -> T {
        self.table[index]
    }

    pub(crate) fn table_size(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn value_indexes(&self) -> &[u32] {
        &self.indexes[..self.values_read]
    }
}

/// PFOR-coded subblocks; DELTA applies an inverse prefix sum after decode.
pub(crate) struct IntPforBlock<T: IntValue> {
    codec: Arc<dyn IntCodec + Send + Sync>,
    cumulative_sizes: Vec<u32>,
    scratch: Vec<u32>,
    values: Vec<T>,
    values_offset: u64,
    subblock_id: i64,
}

impl<T: IntValue> IntPforBlock<T> {
    pub(crate) fn new(codec: Arc<dyn IntCodec + Send + Sync>) -> Self {
        IntPforBlock {
            codec,
            cumulative_sizes: Vec::new(),
            scratch: Vec::new(),
            values: Vec::new(),
            values_offset: 0,
            subblock_id: -1,
        }
    }

    pub(crate) fn read_header(&mut self, reader: &mut FileReader) -> Result<(), String> {
        decode_u32_vector(
            reader,
            self.codec.as_ref(),
            &mut self.scratch,
            true,
            &mut self.cumulative_sizes,
        )?;
        self.values_offset = reader.pos();
        self.subblock_id = -1;
        Ok(())
    }

    pub(crate) fn read_subblock(
        &mut self,
        subblock_id: usize,
        reader: &mut FileReader,
        delta: bool,
    ) -> Result<(), String> {
        if self.subblock_id == subblock_id as i64 {
            return Ok(());
        }

        let end = *self.cumulative_sizes.get(subblock_id).ok_or_else(|| {
            format!(
                "subblock id out of block range: file={}, subblock_id={}, n_subblocks={}",
                reader.file_name(),
                subblock_id,
                self.cumulative_sizes.len()
            )
        })?;
        let start = if subblock_id > 0 {
            self.cumulative_sizes[subblock_id - 1]
        } else {
            0
        };
        let size = end.checked_sub(start).ok_or_else(|| {
            format!(
                "subblock size vector not monotone: file={}, subblock_id={}, start={}, end={}",
                reader.file_name(),
                subblock_id,
                start,
                end
            )
        })? as usize;
        if size % 4 != 0 {
            return Err(format!(
                "subblock payload size not word aligned: file={}, subblock_id={}, size_bytes={}",
                reader.file_name(),
                subblock_id,
                size
            ));
        }

        reader.seek(self.values_offset + start as u64);
        reader.read_words(size / 4, &mut self.scratch)?;
        T::decode_words(self.codec.as_ref(), &self.scratch, &mut self.values)?;
        if delta {
            T::inverse_deltas(&mut self.values);
        }
        self.subblock_id = subblock_id as i64;
        Ok(())
    }

    pub(crate) fn value(&self, id_in_subblock: usize) -> Result<T, String> {
        self.values.get(id_in_subblock).copied().ok_or_else(|| {
            format!(
                "value id out of subblock range: id={}, subblock_values={}",
                id_in_subblock,
                self.values.len()
            )
        })
    }

    pub(crate) fn values(&self) -> &[T] {
        &self.values
    }
}
