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
//! String block decoders: CONST, CONSTLEN, TABLE, GENERIC.
//!
//! A hashes area starts with a count byte; when the count is lower than the
//! slot count a 128-slot null-map follows and the compact hash array is
//! re-expanded with zeros in the empty slots. CONSTLEN is the exception and
//! stores one raw 8-byte hash per row with no count byte.
//!
//! Current limitations:
//! - A GENERIC block opened with the need-hashes hint decodes hashes only;
//!   value and length reads in that mode are rejected.

use std::sync::Arc;

use crate::store::codec::{bit_unpack_128, decode_u32_vector, decode_u64_vector, IntCodec};
use crate::store::constants::SUBBLOCK_SIZE;
use crate::store::reader::FileReader;

/// Length-prefixed ("packed") form of a value: varint length + bytes.
pub(crate) fn pack_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 5);
    let mut len = data.len() as u64;
    loop {
        let b = (len & 0x7F) as u8;
        len >>= 7;
        if len == 0 {
            out.push(b);
            break;
        }
        out.push(b | 0x80);
    }
    out.extend_from_slice(data);
    out
}

/// Hashes area decoder shared by CONST, TABLE and GENERIC blocks.
#[derive(Default)]
pub(crate) struct StrHashReader {
    nullmap_packed: Vec<u32>,
    nullmap: Vec<u32>,
    hashes: Vec<u64>,
}

/// Expand a compact hash array against its null-map, walking backwards so
/// the dense output can alias the compact head of the same buffer.
pub(crate) fn expand_hashes(nullmap: &[u32], num_hashes: usize, hashes: &mut [u64]) {
    let mut src = num_hashes;
    for dst in (0..hashes.len()).rev() {
        if nullmap[dst] != 0 {
            src -= 1;
            hashes[dst] = hashes[src];
        } else {
            hashes[dst] = 0;
        }
    }
}

impl StrHashReader {
    /// Read or skip one hashes area covering `n_values` slots.
    pub(crate) fn read_hashes(
        &mut self,
        reader: &mut FileReader,
        n_values: usize,
        need_hashes: bool,
    ) -> Result<(), String> {
        let num_hashes = reader.read_u8()? as usize;
        if num_hashes > n_values {
            return Err(format!(
                "hash count exceeds slot count: file={}, num_hashes={}, n_values={}",
                reader.file_name(),
                num_hashes,
                n_values
            ));
        }
        let have_nullmap = num_hashes != n_values;
        if have_nullmap && n_values > SUBBLOCK_SIZE {
            return Err(format!(
                "hash null-map over too many slots: file={}, n_values={}, max={}",
                reader.file_name(),
                n_values,
                SUBBLOCK_SIZE
            ));
        }

        if !need_hashes {
            let map_bytes = if have_nullmap { (SUBBLOCK_SIZE >> 3) as u64 } else { 0 };
            reader.skip(map_bytes + num_hashes as u64 * 8);
            return Ok(());
        }

        self.hashes.clear();
        self.hashes.resize(n_values, 0);
        if have_nullmap {
            reader.read_words(SUBBLOCK_SIZE >> 5, &mut self.nullmap_packed)?;
            self.nullmap.resize(SUBBLOCK_SIZE, 0);
            bit_unpack_128(&self.nullmap_packed, &mut self.nullmap, 1);

            let set_bits = self.nullmap[..n_values].iter().filter(|&&b| b != 0).count();
            if set_bits != num_hashes {
                return Err(format!(
                    "hash null-map does not match hash count: file={}, num_hashes={}, set_bits={}",
                    reader.file_name(),
                    num_hashes,
                    set_bits
                ));
            }
            for i in 0..num_hashes {
                self.hashes[i] = reader.read_u64()?;
            }
            expand_hashes(&self.nullmap[..n_values], num_hashes, &mut self.hashes);
        } else {
            for i in 0..n_values {
                self.hashes[i] = reader.read_u64()?;
            }
        }
        Ok(())
    }

    pub(crate) fn hash(&self, id: usize) -> Result<u64, String> {
        self.hashes.get(id).copied().ok_or_else(|| {
            format!(
                "hash id out of range: id={}, n_hashes={}",
                id,
                self.hashes.len()
            )
        })
    }
}

/// Whole block is one string.
#[derive(Default)]
pub(crate) struct StrConstBlock {
    hash_reader: StrHashReader,
    value: Vec<u8>,
    packed: Vec<u8>,
}

impl StrConstBlock {
    pub(crate) fn read_header(
        &mut self,
        reader: &mut FileReader,
        have_hashes: bool,
        need_hashes: bool,
    ) -> Result<(), String> {
        if have_hashes {
            self.hash_reader.read_hashes(reader, 1, need_hashes)?;
        }
        let len = reader.unpack_u32()? as usize;
        self.value.resize(len, 0);
        reader.read_exact_bytes(&mut self.value)?;
        self.packed = pack_bytes(&self.value);
        Ok(())
    }

    pub(crate) fn value(&self) -> &[u8] {
        &self.value
    }

    pub(crate) fn value_length(&self) -> usize {
        self.value.len()
    }

    pub(crate) fn packed(&self) -> Vec<u8> {
        self.packed.clone()
    }

    pub(crate) fn hash(&self) -> Result<u64, String> {
        self.hash_reader.hash(0)
    }
}

/// All strings share one length; values are addressed by arithmetic.
#[derive(Default)]
pub(crate) struct StrConstLenBlock {
    hash_offset: u64,
    values_offset: u64,
    value_length: usize,
    last_read_id: i64,
    have_hashes: bool,
    value: Vec<u8>,
}

impl StrConstLenBlock {
    pub(crate) fn read_header(
        &mut self,
        reader: &mut FileReader,
        n_values: usize,
        have_hashes: bool,
    ) -> Result<(), String> {
        self.value_length = reader.unpack_u64()? as usize;
        self.have_hashes = have_hashes;
        if have_hashes {
            self.hash_offset = reader.pos();
            self.values_offset = self.hash_offset + n_values as u64 * 8;
        } else {
            self.hash_offset = 0;
            self.values_offset = reader.pos();
        }
        self.last_read_id = -1;
        Ok(())
    }

    fn seek_value(&mut self, reader: &mut FileReader, id_in_block: usize) {
        if self.last_read_id == -1 || self.last_read_id + 1 != id_in_block as i64 {
            reader.seek(self.values_offset + (id_in_block * self.value_length) as u64);
        }
        self.last_read_id = id_in_block as i64;
    }

    pub(crate) fn read_value<'a>(
        &'a mut self,
        reader: &'a mut FileReader,
        id_in_block: usize,
    ) -> Result<&'a [u8], String> {
        self.seek_value(reader, id_in_block);
        if reader.borrowable(self.value_length) {
            return reader.read_from_buffer(self.value_length);
        }
        self.value.resize(self.value_length, 0);
        reader.read_exact_bytes(&mut self.value)?;
        Ok(&self.value)
    }

    pub(crate) fn read_packed(
        &mut self,
        reader: &mut FileReader,
        id_in_block: usize,
    ) -> Result<Vec<u8>, String> {
        self.seek_value(reader, id_in_block);
        self.value.resize(self.value_length, 0);
        reader.read_exact_bytes(&mut self.value)?;
        Ok(pack_bytes(&self.value))
    }

    pub(crate) fn value_length(&self) -> usize {
        self.value_length
    }

    /// Hash reads share the sequential-position cache with value reads; a
    /// block is read either for hashes or for values, not both interleaved.
    pub(crate) fn read_hash(
        &mut self,
        reader: &mut FileReader,
        id_in_block: usize,
    ) -> Result<u64, String> {
        if !self.have_hashes {
            return Err(format!(
                "string hashes not stored: file={}",
                reader.file_name()
            ));
        }
        if self.last_read_id == -1 || self.last_read_id + 1 != id_in_block as i64 {
            reader.seek(self.hash_offset + id_in_block as u64 * 8);
        }
        self.last_read_id = id_in_block as i64;
        reader.read_u64()
    }
}

/// Small string table plus fixed-width indices per subblock.
pub(crate) struct StrTableBlock {
    codec: Arc<dyn IntCodec + Send + Sync>,
    hash_reader: StrHashReader,
    table_values: Vec<Vec<u8>>,
    cumulative_lengths: Vec<u32>,
    scratch: Vec<u32>,
    indexes: Vec<u32>,
    encoded: Vec<u32>,
    bits: usize,
    values_offset: u64,
    subblock_id: i64,
}

impl StrTableBlock {
    pub(crate) fn new(codec: Arc<dyn IntCodec + Send + Sync>) -> Self {
        StrTableBlock {
            codec,
            hash_reader: StrHashReader::default(),
            table_values: Vec::new(),
            cumulative_lengths: Vec::new(),
            scratch: Vec::new(),
            indexes: vec![0; SUBBLOCK_SIZE],
            encoded: Vec::new(),
            bits: 0,
            values_offset: 0,
            subblock_id: -1,
        }
    }

    pub(crate) fn read_header(
        &mut self,
        reader: &mut FileReader,
        have_hashes: bool,
        need_hashes: bool,
    ) -> Result<(), String> {
        let count = reader.read_u8()? as usize;
        if count == 0 {
            return Err(format!(
                "empty value table in string TABLE block: file={}, pos={}",
                reader.file_name(),
                reader.pos()
            ));
        }

        if have_hashes {
            self.hash_reader.read_hashes(reader, count, need_hashes)?;
        }

        decode_u32_vector(
            reader,
            self.codec.as_ref(),
            &mut self.scratch,
            true,
            &mut self.cumulative_lengths,
        )?;
        if self.cumulative_lengths.len() != count {
            return Err(format!(
                "string table length vector mismatch: file={}, table_size={}, lengths={}",
                reader.file_name(),
                count,
                self.cumulative_lengths.len()
            ));
        }

        self.table_values.resize_with(count, Vec::new);
        let mut prev = 0_u32;
        for i in 0..count {
            let cum = self.cumulative_lengths[i];
            let len = cum.checked_sub(prev).ok_or_else(|| {
                format!(
                    "string table length vector not monotone: file={}, index={}",
                    reader.file_name(),
                    i
                )
            })? as usize;
            prev = cum;
            self.table_values[i].resize(len, 0);
            reader.read_exact_bytes(&mut self.table_values[i])?;
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
        Ok(())
    }

    fn table_index(&self, id_in_subblock: usize) -> Result<usize, String> {
        let index = self.indexes[id_in_subblock] as usize;
        if index >= self.table_values.len() {
            return Err(format!(
                "string table index out of range: index={}, table_size={}",
                index,
                self.table_values.len()
            ));
        }
        Ok(index)
    }

    pub(crate) fn value(&self, id_in_subblock: usize) -> Result<&[u8], String> {
        Ok(&self.table_values[self.table_index(id_in_subblock)?])
    }

    pub(crate) fn value_length(&self, id_in_subblock: usize) -> Result<usize, String> {
        Ok(self.table_values[self.table_index(id_in_subblock)?].len())
    }

    pub(crate) fn hash(&self, id_in_subblock: usize) -> Result<u64, String> {
        self.hash_reader.hash(self.table_index(id_in_subblock)?)
    }
}

/// Per-subblock offset index, optional hashes, cumulative lengths, bodies.
pub(crate) struct StrGenericBlock {
    codec: Arc<dyn IntCodec + Send + Sync>,
    hash_reader: StrHashReader,
    offsets: Vec<u64>,
    cumulative_lengths: Vec<u64>,
    scratch: Vec<u32>,
    value: Vec<u8>,
    values_offset: u64,
    first_value_offset: u64,
    have_hashes: bool,
    need_hashes: bool,
    subblock_id: i64,
    last_read_id: i64,
}

impl StrGenericBlock {
    pub(crate) fn new(codec: Arc<dyn IntCodec + Send + Sync>) -> Self {
        StrGenericBlock {
            codec,
            hash_reader: StrHashReader::default(),
            offsets: Vec::new(),
            cumulative_lengths: Vec::new(),
            scratch: Vec::new(),
            value: Vec::new(),
            values_offset: 0,
            first_value_offset: 0,
            have_hashes: false,
            need_hashes: false,
            subblock_id: -1,
            last_read_id: -1,
        }
    }

    pub(crate) fn read_header(
        &mut self,
        reader: &mut FileReader,
        have_hashes: bool,
        need_hashes: bool,
    ) -> Result<(), String> {
        decode_u64_vector(
            reader,
            self.codec.as_ref(),
            &mut self.scratch,
            true,
            &mut self.offsets,
        )?;
        self.values_offset = reader.pos();
        self.have_hashes = have_hashes;
        self.need_hashes = have_hashes && need_hashes;
        self.subblock_id = -1;
        Ok(())
    }

    pub(crate) fn read_subblock(
        &mut self,
        subblock_id: usize,
        n_subblock_values: usize,
        reader: &mut FileReader,
    ) -> Result<(), String> {
        if self.subblock_id == subblock_id as i64 {
            return Ok(());
        }

        let offset = *self.offsets.get(subblock_id).ok_or_else(|| {
            format!(
                "subblock id out of block range: file={}, subblock_id={}, n_subblocks={}",
                reader.file_name(),
                subblock_id,
                self.offsets.len()
            )
        })?;
        reader.seek(self.values_offset + offset);

        if self.have_hashes {
            self.hash_reader
                .read_hashes(reader, n_subblock_values, self.need_hashes)?;
        }

        // Hashes-only readers never touch lengths or bodies.
        if !self.need_hashes {
            decode_u64_vector(
                reader,
                self.codec.as_ref(),
                &mut self.scratch,
                true,
                &mut self.cumulative_lengths,
            )?;
            if self.cumulative_lengths.len() != n_subblock_values {
                return Err(format!(
                    "string length vector mismatch: file={}, subblock_id={}, expected={}, actual={}",
                    reader.file_name(),
                    subblock_id,
                    n_subblock_values,
                    self.cumulative_lengths.len()
                ));
            }
            self.first_value_offset = reader.pos();
        }

        self.subblock_id = subblock_id as i64;
        self.last_read_id = -1;
        Ok(())
    }

    pub(crate) fn value_length(&self, id_in_subblock: usize) -> Result<usize, String> {
        if self.need_hashes {
            return Err("string block opened for hashes only".to_string());
        }
        let cum = *self.cumulative_lengths.get(id_in_subblock).ok_or_else(|| {
            format!(
                "value id out of subblock range: id={}, subblock_values={}",
                id_in_subblock,
                self.cumulative_lengths.len()
            )
        })?;
        let prev = if id_in_subblock > 0 {
            self.cumulative_lengths[id_in_subblock - 1]
        } else {
            0
        };
        cum.checked_sub(prev)
            .map(|l| l as usize)
            .ok_or_else(|| {
                format!(
                    "string length vector not monotone: id={}",
                    id_in_subblock
                )
            })
    }

    fn seek_value(
        &mut self,
        reader: &mut FileReader,
        id_in_subblock: usize,
    ) -> Result<usize, String> {
        let len = self.value_length(id_in_subblock)?;
        if self.last_read_id == -1 || self.last_read_id + 1 != id_in_subblock as i64 {
            let mut offset = self.first_value_offset;
            if id_in_subblock > 0 {
                offset += self.cumulative_lengths[id_in_subblock - 1];
            }
            reader.seek(offset);
        }
        self.last_read_id = id_in_subblock as i64;
        Ok(len)
    }

    pub(crate) fn read_value<'a>(
        &'a mut self,
        reader: &'a mut FileReader,
        id_in_subblock: usize,
    ) -> Result<&'a [u8], String> {
        let len = self.seek_value(reader, id_in_subblock)?;
        if reader.borrowable(len) {
            return reader.read_from_buffer(len);
        }
        self.value.resize(len, 0);
        reader.read_exact_bytes(&mut self.value)?;
        Ok(&self.value)
    }

    pub(crate) fn read_packed(
        &mut self,
        reader: &mut FileReader,
        id_in_subblock: usize,
    ) -> Result<Vec<u8>, String> {
        let len = self.seek_value(reader, id_in_subblock)?;
        self.value.resize(len, 0);
        reader.read_exact_bytes(&mut self.value)?;
        Ok(pack_bytes(&self.value))
    }

    pub(crate) fn hash(&self, id_in_subblock: usize) -> Result<u64, String> {
        self.hash_reader.hash(id_in_subblock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_hashes_with_gaps() {
        // slots: [set, empty, set, empty, empty, set]
        let nullmap = [1_u32, 0, 1, 0, 0, 1];
        let mut hashes = vec![11, 22, 33, 0, 0, 0];
        expand_hashes(&nullmap, 3, &mut hashes);
        assert_eq!(hashes, vec![11, 0, 22, 0, 0, 33]);
    }

    #[test]
    fn test_expand_hashes_all_set_is_identity() {
        let nullmap = [1_u32; 4];
        let mut hashes = vec![5, 6, 7, 8];
        expand_hashes(&nullmap, 4, &mut hashes);
        assert_eq!(hashes, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_expand_hashes_all_empty() {
        let nullmap = [0_u32; 3];
        let mut hashes = vec![99, 98, 97];
        expand_hashes(&nullmap, 0, &mut hashes);
        assert_eq!(hashes, vec![0, 0, 0]);
    }

    #[test]
    fn test_pack_bytes_prefixes_varint_length() {
        assert_eq!(pack_bytes(b""), vec![0]);
        assert_eq!(pack_bytes(b"ab"), vec![2, b'a', b'b']);
        let long = vec![7_u8; 200];
        let packed = pack_bytes(&long);
        assert_eq!(&packed[..2], &[200, 1]);
        assert_eq!(&packed[2..], &long[..]);
    }
}
