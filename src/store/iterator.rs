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
//! Per-column value cursors.
//!
//! An iterator owns its reader and block decoders. `advance_to` re-reads the
//! block header whenever the target row crosses a block boundary and swaps
//! the active packing; value reads then go through the packing-specific
//! decoder with its cached subblock.
//!
//! Current limitations:
//! - String hash reads on CONST/TABLE/GENERIC blocks require the iterator to
//!   be created with the `need_hashes` hint (CONSTLEN reads hashes straight
//!   from their file area and needs no hint).
//! - Asking an integer iterator for bytes (or a string iterator for an
//!   integer) is rejected as a caller error.

use std::sync::Arc;

use crate::common::{AttrType, INVALID_ROW_ID};

use super::block::int_block::{IntConstBlock, IntPforBlock, IntTableBlock};
use super::block::str_block::{
    pack_bytes, StrConstBlock, StrConstLenBlock, StrGenericBlock, StrTableBlock,
};
use super::block::{BlockCursor, IntPacking, StrPacking};
use super::codec::{create_int_codec, IntValue};
use super::reader::FileReader;
use super::ColumnHeader;

/// Hints passed when creating a string iterator.
#[derive(Clone, Copy, Debug, Default)]
pub struct IteratorHints {
    pub need_hashes: bool,
}

/// Read cursor over one column.
pub trait ValueIterator: Send {
    /// Position at a row. Idempotent for a repeated row id.
    fn advance_to(&mut self, row_id: u32) -> Result<u32, String>;

    /// Integer value at the current row (raw stored bits for FLOAT columns).
    fn get(&mut self) -> Result<i64, String>;

    /// Borrowed bytes of the current string value; the borrow ends at the
    /// next iterator call.
    fn get_bytes(&mut self) -> Result<&[u8], String>;

    /// Owned, length-prefixed copy of the current string value.
    fn get_packed(&mut self) -> Result<Vec<u8>, String>;

    fn get_length(&mut self) -> Result<usize, String>;

    fn get_string_hash(&mut self) -> Result<u64, String>;

    fn has_string_hashes(&self) -> bool;
}

/// Block-level access shared by integer iterators and analyzers: loads a
/// block header, tracks the active packing and decodes values on demand.
pub(crate) struct IntAccessor<T: IntValue> {
    pub(crate) header: Arc<ColumnHeader>,
    pub(crate) reader: FileReader,
    pub(crate) cursor: BlockCursor,
    pub(crate) packing: IntPacking,
    pub(crate) block_const: IntConstBlock<T>,
    pub(crate) block_table: IntTableBlock<T>,
    pub(crate) block_pfor: IntPforBlock<T>,
}

impl<T: IntValue> IntAccessor<T> {
    pub(crate) fn new(header: Arc<ColumnHeader>, reader: FileReader) -> Result<Self, String> {
        let codec = create_int_codec(header.codec32(), header.codec64())?;
        Ok(IntAccessor {
            cursor: BlockCursor::new(header.subblock_size() as usize),
            header,
            reader,
            packing: IntPacking::Const,
            block_const: IntConstBlock::default(),
            block_table: IntTableBlock::new(),
            block_pfor: IntPforBlock::new(codec),
        })
    }

    pub(crate) fn set_cur_block(&mut self, block_id: u32) -> Result<(), String> {
        self.reader.seek(self.header.block_offset(block_id)?);
        let tag = self.reader.unpack_u32()?;
        self.packing = IntPacking::from_u32(tag).ok_or_else(|| {
            format!(
                "unknown integer packing tag: file={}, column={}, block_id={}, tag={}",
                self.reader.file_name(),
                self.header.name(),
                block_id,
                tag
            )
        })?;

        match self.packing {
            IntPacking::Const => self.block_const.read_header(&mut self.reader)?,
            IntPacking::Table => self.block_table.read_header(&mut self.reader)?,
            IntPacking::DeltaPfor | IntPacking::GenericPfor => {
                self.block_pfor.read_header(&mut self.reader)?
            }
        }

        self.cursor.set_block(
            block_id,
            self.header.num_rows_in_block(block_id)?,
            self.header.block_start_row(block_id),
        );
        Ok(())
    }

    fn read_value(&mut self) -> Result<T, String> {
        if self.cursor.requested_row == INVALID_ROW_ID {
            debug_assert!(false, "value requested before advance_to");
            return Err(format!(
                "value requested before advance_to: column={}",
                self.header.name()
            ));
        }
        let id_in_block = self.cursor.id_in_block();
        match self.packing {
            IntPacking::Const => Ok(self.block_const.value()),
            IntPacking::Table => {
                let sub = self.cursor.subblock_id(id_in_block);
                self.block_table.read_subblock(
                    sub,
                    self.cursor.num_subblock_values(sub),
                    &mut self.reader,
                )?;
                self.block_table
                    .value(self.cursor.value_id_in_subblock(id_in_block))
            }
            IntPacking::DeltaPfor | IntPacking::GenericPfor => {
                let sub = self.cursor.subblock_id(id_in_block);
                let delta = self.packing == IntPacking::DeltaPfor;
                self.block_pfor.read_subblock(sub, &mut self.reader, delta)?;
                self.block_pfor
                    .value(self.cursor.value_id_in_subblock(id_in_block))
            }
        }
    }
}

pub(crate) struct IntIterator<T: IntValue> {
    acc: IntAccessor<T>,
}

impl<T: IntValue> IntIterator<T> {
    pub(crate) fn new(header: Arc<ColumnHeader>, reader: FileReader) -> Result<Self, String> {
        Ok(IntIterator {
            acc: IntAccessor::new(header, reader)?,
        })
    }

    fn wrong_type<R>(&self, what: &str) -> Result<R, String> {
        Err(format!(
            "requesting {} from integer iterator: column={}",
            what,
            self.acc.header.name()
        ))
    }
}

impl<T: IntValue> ValueIterator for IntIterator<T> {
    fn advance_to(&mut self, row_id: u32) -> Result<u32, String> {
        if row_id >= self.acc.header.total_rows() {
            return Err(format!(
                "row id out of range: column={}, row_id={}, n_rows={}",
                self.acc.header.name(),
                row_id,
                self.acc.header.total_rows()
            ));
        }
        if self.acc.cursor.requested_row == row_id {
            return Ok(row_id);
        }
        let block_id = self.acc.header.row_id_to_block(row_id);
        if block_id != self.acc.cursor.block_id {
            self.acc.set_cur_block(block_id)?;
        }
        self.acc.cursor.requested_row = row_id;
        Ok(row_id)
    }

    fn get(&mut self) -> Result<i64, String> {
        Ok(self.acc.read_value()?.to_u64() as i64)
    }

    fn get_bytes(&mut self) -> Result<&[u8], String> {
        self.wrong_type("blob")
    }

    fn get_packed(&mut self) -> Result<Vec<u8>, String> {
        self.wrong_type("packed blob")
    }

    fn get_length(&mut self) -> Result<usize, String> {
        self.wrong_type("blob length")
    }

    fn get_string_hash(&mut self) -> Result<u64, String> {
        self.wrong_type("string hash")
    }

    fn has_string_hashes(&self) -> bool {
        false
    }
}

pub(crate) struct StringIterator {
    header: Arc<ColumnHeader>,
    hints: IteratorHints,
    reader: FileReader,
    cursor: BlockCursor,
    packing: StrPacking,
    block_const: StrConstBlock,
    block_const_len: StrConstLenBlock,
    block_table: StrTableBlock,
    block_generic: StrGenericBlock,
}

impl StringIterator {
    pub(crate) fn new(
        header: Arc<ColumnHeader>,
        reader: FileReader,
        hints: IteratorHints,
    ) -> Result<Self, String> {
        let codec = create_int_codec(header.codec32(), header.codec64())?;
        Ok(StringIterator {
            cursor: BlockCursor::new(header.subblock_size() as usize),
            header,
            hints,
            reader,
            packing: StrPacking::Const,
            block_const: StrConstBlock::default(),
            block_const_len: StrConstLenBlock::default(),
            block_table: StrTableBlock::new(codec.clone()),
            block_generic: StrGenericBlock::new(codec),
        })
    }

    fn set_cur_block(&mut self, block_id: u32) -> Result<(), String> {
        self.reader.seek(self.header.block_offset(block_id)?);
        let tag = self.reader.unpack_u32()?;
        self.packing = StrPacking::from_u32(tag).ok_or_else(|| {
            format!(
                "unknown string packing tag: file={}, column={}, block_id={}, tag={}",
                self.reader.file_name(),
                self.header.name(),
                block_id,
                tag
            )
        })?;

        let have_hashes = self.header.has_string_hashes();
        let need_hashes = self.hints.need_hashes;
        let block_rows = self.header.num_rows_in_block(block_id)?;
        match self.packing {
            StrPacking::Const => {
                self.block_const
                    .read_header(&mut self.reader, have_hashes, need_hashes)?
            }
            StrPacking::ConstLen => {
                self.block_const_len
                    .read_header(&mut self.reader, block_rows, have_hashes)?
            }
            StrPacking::Table => {
                self.block_table
                    .read_header(&mut self.reader, have_hashes, need_hashes)?
            }
            StrPacking::Generic => {
                self.block_generic
                    .read_header(&mut self.reader, have_hashes, need_hashes)?
            }
        }

        self.cursor
            .set_block(block_id, block_rows, self.header.block_start_row(block_id));
        Ok(())
    }

    fn ensure_positioned(&self) -> Result<(), String> {
        if self.cursor.requested_row == INVALID_ROW_ID {
            debug_assert!(false, "value requested before advance_to");
            return Err(format!(
                "value requested before advance_to: column={}",
                self.header.name()
            ));
        }
        Ok(())
    }

    fn read_table_subblock(&mut self) -> Result<usize, String> {
        let id_in_block = self.cursor.id_in_block();
        let sub = self.cursor.subblock_id(id_in_block);
        self.block_table.read_subblock(sub, &mut self.reader)?;
        Ok(self.cursor.value_id_in_subblock(id_in_block))
    }

    fn read_generic_subblock(&mut self) -> Result<usize, String> {
        let id_in_block = self.cursor.id_in_block();
        let sub = self.cursor.subblock_id(id_in_block);
        self.block_generic.read_subblock(
            sub,
            self.cursor.num_subblock_values(sub),
            &mut self.reader,
        )?;
        Ok(self.cursor.value_id_in_subblock(id_in_block))
    }

    fn require_hash_hint(&self) -> Result<(), String> {
        if !self.hints.need_hashes {
            return Err(format!(
                "string hashes not requested at iterator creation: column={}",
                self.header.name()
            ));
        }
        Ok(())
    }
}

impl ValueIterator for StringIterator {
    fn advance_to(&mut self, row_id: u32) -> Result<u32, String> {
        if row_id >= self.header.total_rows() {
            return Err(format!(
                "row id out of range: column={}, row_id={}, n_rows={}",
                self.header.name(),
                row_id,
                self.header.total_rows()
            ));
        }
        if self.cursor.requested_row == row_id {
            return Ok(row_id);
        }
        let block_id = self.header.row_id_to_block(row_id);
        if block_id != self.cursor.block_id {
            self.set_cur_block(block_id)?;
        }
        self.cursor.requested_row = row_id;
        Ok(row_id)
    }

    fn get(&mut self) -> Result<i64, String> {
        Err(format!(
            "requesting integer from string iterator: column={}",
            self.header.name()
        ))
    }

    fn get_bytes(&mut self) -> Result<&[u8], String> {
        self.ensure_positioned()?;
        match self.packing {
            StrPacking::Const => Ok(self.block_const.value()),
            StrPacking::ConstLen => {
                let id = self.cursor.id_in_block();
                self.block_const_len.read_value(&mut self.reader, id)
            }
            StrPacking::Table => {
                let id = self.read_table_subblock()?;
                self.block_table.value(id)
            }
            StrPacking::Generic => {
                let id = self.read_generic_subblock()?;
                self.block_generic.read_value(&mut self.reader, id)
            }
        }
    }

    fn get_packed(&mut self) -> Result<Vec<u8>, String> {
        self.ensure_positioned()?;
        match self.packing {
            StrPacking::Const => Ok(self.block_const.packed()),
            StrPacking::ConstLen => {
                let id = self.cursor.id_in_block();
                self.block_const_len.read_packed(&mut self.reader, id)
            }
            StrPacking::Table => {
                let id = self.read_table_subblock()?;
                Ok(pack_bytes(self.block_table.value(id)?))
            }
            StrPacking::Generic => {
                let id = self.read_generic_subblock()?;
                self.block_generic.read_packed(&mut self.reader, id)
            }
        }
    }

    fn get_length(&mut self) -> Result<usize, String> {
        self.ensure_positioned()?;
        match self.packing {
            StrPacking::Const => Ok(self.block_const.value_length()),
            StrPacking::ConstLen => Ok(self.block_const_len.value_length()),
            StrPacking::Table => {
                let id = self.read_table_subblock()?;
                self.block_table.value_length(id)
            }
            StrPacking::Generic => {
                let id = self.read_generic_subblock()?;
                self.block_generic.value_length(id)
            }
        }
    }

    fn get_string_hash(&mut self) -> Result<u64, String> {
        self.ensure_positioned()?;
        if !self.header.has_string_hashes() {
            return Err(format!(
                "column has no string hashes: column={}",
                self.header.name()
            ));
        }
        match self.packing {
            StrPacking::Const => {
                self.require_hash_hint()?;
                self.block_const.hash()
            }
            StrPacking::ConstLen => {
                let id = self.cursor.id_in_block();
                self.block_const_len.read_hash(&mut self.reader, id)
            }
            StrPacking::Table => {
                self.require_hash_hint()?;
                let id = self.read_table_subblock()?;
                self.block_table.hash(id)
            }
            StrPacking::Generic => {
                self.require_hash_hint()?;
                let id = self.read_generic_subblock()?;
                self.block_generic.hash(id)
            }
        }
    }

    fn has_string_hashes(&self) -> bool {
        self.header.has_string_hashes()
    }
}

/// Iterator over an integer column (UINT32, TIMESTAMP, INT64, FLOAT).
pub fn create_int_iterator(
    header: Arc<ColumnHeader>,
    reader: FileReader,
) -> Result<Box<dyn ValueIterator>, String> {
    match header.attr_type() {
        AttrType::Uint32 | AttrType::Timestamp | AttrType::Float => {
            Ok(Box::new(IntIterator::<u32>::new(header, reader)?))
        }
        AttrType::Int64 => Ok(Box::new(IntIterator::<u64>::new(header, reader)?)),
        other => Err(format!(
            "cannot create integer iterator: column={}, type={}",
            header.name(),
            other.name()
        )),
    }
}

/// Iterator over a string column.
pub fn create_string_iterator(
    header: Arc<ColumnHeader>,
    reader: FileReader,
    hints: IteratorHints,
) -> Result<Box<dyn ValueIterator>, String> {
    if header.attr_type() != AttrType::String {
        return Err(format!(
            "cannot create string iterator: column={}, type={}",
            header.name(),
            header.attr_type().name()
        ));
    }
    Ok(Box::new(StringIterator::new(header, reader, hints)?))
}

/// Iterator over an integer-set column; values come back as packed blobs.
pub fn create_mva_iterator(
    header: Arc<ColumnHeader>,
    reader: FileReader,
) -> Result<Box<dyn ValueIterator>, String> {
    if !header.attr_type().is_set() {
        return Err(format!(
            "cannot create MVA iterator: column={}, type={}",
            header.name(),
            header.attr_type().name()
        ));
    }
    Ok(Box::new(StringIterator::new(
        header,
        reader,
        IteratorHints::default(),
    )?))
}
