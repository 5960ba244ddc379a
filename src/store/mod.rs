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
//! Segment read path: file layout, block decoders, iterators and scans.
//!
//! A segment file starts with `[u32 version][u64 meta_off]`, carries the
//! per-column block areas, and ends with the meta record describing each
//! column (type, packing codecs, per-block offsets and row counts). The
//! meta is loaded once per `open_segment`; iterators and analyzers then
//! address blocks directly through their own readers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::{AttrType, LIB_VERSION};

pub mod analyzer;
pub(crate) mod block;
pub mod codec;
pub mod iterator;
pub mod reader;

use reader::FileReader;

pub(crate) mod constants {
    //! Shared constants for the segment read path.

    /// Block-level readers buffer 1 KiB; metadata readers 256 bytes.
    pub(crate) const DEFAULT_READER_BUFFER: usize = 1024;
    pub(crate) const META_READER_BUFFER: usize = 256;

    pub(crate) const MAX_VARINT64_BYTES: usize = 10;

    /// Values per subblock, the unit of independent decodability.
    pub(crate) const SUBBLOCK_SIZE: usize = 128;

    /// Value-set filters up to this size scan linearly, larger sets binary
    /// search.
    pub(crate) const LINEAR_SEARCH_THRESH: usize = 128;
}

use constants::{DEFAULT_READER_BUFFER, META_READER_BUFFER, SUBBLOCK_SIZE};

/// Immutable per-column description loaded from the segment meta.
#[derive(Debug)]
pub struct ColumnHeader {
    name: String,
    attr_type: AttrType,
    has_string_hashes: bool,
    block_size: u32,
    subblock_size: u32,
    codec32: String,
    codec64: String,
    block_offsets: Vec<u64>,
    row_counts: Vec<u32>,
    total_rows: u32,
    path: PathBuf,
}

impl ColumnHeader {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn has_string_hashes(&self) -> bool {
        self.has_string_hashes
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn subblock_size(&self) -> u32 {
        self.subblock_size
    }

    pub fn codec32(&self) -> &str {
        &self.codec32
    }

    pub fn codec64(&self) -> &str {
        &self.codec64
    }

    pub fn n_blocks(&self) -> usize {
        self.row_counts.len()
    }

    pub fn total_rows(&self) -> u32 {
        self.total_rows
    }

    pub(crate) fn segment_path(&self) -> &Path {
        &self.path
    }

    pub fn block_offset(&self, block_id: u32) -> Result<u64, String> {
        self.block_offsets
            .get(block_id as usize)
            .copied()
            .ok_or_else(|| {
                format!(
                    "block id out of range: column={}, block_id={}, n_blocks={}",
                    self.name,
                    block_id,
                    self.n_blocks()
                )
            })
    }

    pub fn num_rows_in_block(&self, block_id: u32) -> Result<usize, String> {
        self.row_counts
            .get(block_id as usize)
            .map(|&n| n as usize)
            .ok_or_else(|| {
                format!(
                    "block id out of range: column={}, block_id={}, n_blocks={}",
                    self.name,
                    block_id,
                    self.n_blocks()
                )
            })
    }

    pub fn row_id_to_block(&self, row_id: u32) -> u32 {
        row_id / self.block_size
    }

    pub fn block_start_row(&self, block_id: u32) -> u32 {
        block_id * self.block_size
    }

    pub(crate) fn subblocks_per_block(&self) -> usize {
        (self.block_size / self.subblock_size) as usize
    }

    /// Total subblocks across the column; the global subblock id space used
    /// by analyzers.
    pub fn total_subblocks(&self) -> usize {
        if self.row_counts.is_empty() {
            return 0;
        }
        let last = *self.row_counts.last().unwrap() as usize;
        (self.row_counts.len() - 1) * self.subblocks_per_block()
            + (last + SUBBLOCK_SIZE - 1) / SUBBLOCK_SIZE
    }
}

/// An opened segment: shared column headers plus the path used to create
/// per-iterator readers.
#[derive(Debug)]
pub struct Segment {
    version: u32,
    path: PathBuf,
    columns: Vec<Arc<ColumnHeader>>,
}

impl Segment {
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn columns(&self) -> &[Arc<ColumnHeader>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Arc<ColumnHeader>> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// A fresh block-sized reader over this segment, for iterator creation.
    pub fn block_reader(&self) -> Result<FileReader, String> {
        FileReader::open_with_buffer(&self.path, DEFAULT_READER_BUFFER)
    }
}

/// Open a segment file and load its column meta.
pub fn open_segment<P: AsRef<Path>>(path: P) -> Result<Segment, String> {
    let path_buf = path.as_ref().to_path_buf();
    let mut reader = FileReader::open_with_buffer(&path_buf, META_READER_BUFFER)?;

    let version = reader.read_u32()?;
    if version > LIB_VERSION {
        return Err(format!(
            "segment format version mismatch: file={}, file_version={}, lib_version={}",
            reader.file_name(),
            version,
            LIB_VERSION
        ));
    }
    let meta_off = reader.read_u64()?;
    reader.seek(meta_off);

    let n_columns = reader.unpack_u32()? as usize;
    let mut columns = Vec::with_capacity(n_columns);
    for _ in 0..n_columns {
        columns.push(Arc::new(read_column_header(&mut reader, &path_buf)?));
    }

    Ok(Segment {
        version,
        path: path_buf,
        columns,
    })
}

fn read_column_header(reader: &mut FileReader, path: &Path) -> Result<ColumnHeader, String> {
    let name = reader.read_string()?;
    let type_tag = reader.unpack_u32()?;
    let attr_type = AttrType::from_u32(type_tag).ok_or_else(|| {
        format!(
            "unknown attribute type in segment meta: file={}, column={}, type={}",
            reader.file_name(),
            name,
            type_tag
        )
    })?;
    let flags = reader.read_u8()?;
    let has_string_hashes = flags & 1 != 0;
    let block_size = reader.unpack_u32()?;
    let subblock_size = reader.unpack_u32()?;
    if subblock_size as usize != SUBBLOCK_SIZE {
        return Err(format!(
            "unsupported subblock size in segment meta: file={}, column={}, subblock_size={}, supported={}",
            reader.file_name(),
            name,
            subblock_size,
            SUBBLOCK_SIZE
        ));
    }
    if block_size == 0 || block_size % subblock_size != 0 {
        return Err(format!(
            "invalid block size in segment meta: file={}, column={}, block_size={}, subblock_size={}",
            reader.file_name(),
            name,
            block_size,
            subblock_size
        ));
    }
    let codec32 = reader.read_string()?;
    let codec64 = reader.read_string()?;

    let n_blocks = reader.unpack_u32()? as usize;
    let mut block_offsets = Vec::with_capacity(n_blocks + 1);
    let mut cur_off = 0_u64;
    for _ in 0..n_blocks + 1 {
        cur_off = cur_off.wrapping_add(reader.unpack_u64()?);
        block_offsets.push(cur_off);
    }

    let mut row_counts = Vec::with_capacity(n_blocks);
    let mut total_rows = 0_u64;
    for b in 0..n_blocks {
        let rows = reader.unpack_u32()?;
        let is_last = b + 1 == n_blocks;
        if rows == 0 || rows > block_size || (!is_last && rows != block_size) {
            return Err(format!(
                "invalid block row count in segment meta: file={}, column={}, block_id={}, rows={}, block_size={}",
                reader.file_name(),
                name,
                b,
                rows,
                block_size
            ));
        }
        total_rows += rows as u64;
        row_counts.push(rows);
    }
    let total_rows = u32::try_from(total_rows).map_err(|_| {
        format!(
            "segment row count overflow: file={}, column={}, total_rows={}",
            reader.file_name(),
            name,
            total_rows
        )
    })?;

    Ok(ColumnHeader {
        name,
        attr_type,
        has_string_hashes,
        block_size,
        subblock_size,
        codec32,
        codec64,
        block_offsets,
        row_counts,
        total_rows,
        path: path.to_path_buf(),
    })
}
