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
//! Buffered positional reader over an immutable segment or index file.
//!
//! All on-disk integers are little-endian; varints are LEB128 (7 data bits
//! per byte, MSB continuation). The reader keeps a sticky error: once a read
//! fails, every later call reports the same failure, so decode loops can
//! check once at a safe point instead of after every primitive.
//!
//! Current limitations:
//! - Files are read through a plain `File` cursor; concurrent iterators each
//!   own their reader instead of sharing one handle.
//! - `read_from_buffer` only borrows when the request fits the reader's
//!   buffer; larger values take the owned-copy path.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::constants::{DEFAULT_READER_BUFFER, MAX_VARINT64_BYTES};

pub struct FileReader {
    file: File,
    path: String,
    file_size: u64,
    buf: Vec<u8>,
    buf_pos: u64,
    buf_used: usize,
    cursor: usize,
    os_pos: u64,
    error: Option<String>,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::open_with_buffer(path, DEFAULT_READER_BUFFER)
    }

    /// Buffer sizes below 16 bytes are raised to 16 so every fixed-width
    /// primitive fits the buffered window.
    pub fn open_with_buffer<P: AsRef<Path>>(path: P, buffer_size: usize) -> Result<Self, String> {
        let path_str = path.as_ref().display().to_string();
        let buffer_size = buffer_size.max(16);
        let file = File::open(path.as_ref())
            .map_err(|e| format!("open file failed: file={}, error={}", path_str, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| format!("stat file failed: file={}, error={}", path_str, e))?
            .len();
        Ok(FileReader {
            file,
            path: path_str,
            file_size,
            buf: vec![0_u8; buffer_size],
            buf_pos: 0,
            buf_used: 0,
            cursor: 0,
            os_pos: 0,
            error: None,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn pos(&self) -> u64 {
        self.buf_pos + self.cursor as u64
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Move the logical read position. Never touches the OS cursor by
    /// itself; the next read does.
    pub fn seek(&mut self, pos: u64) {
        if pos >= self.buf_pos && pos <= self.buf_pos + self.buf_used as u64 {
            self.cursor = (pos - self.buf_pos) as usize;
        } else {
            self.buf_pos = pos;
            self.buf_used = 0;
            self.cursor = 0;
        }
    }

    pub fn skip(&mut self, bytes: u64) {
        self.seek(self.pos() + bytes);
    }

    /// Whether a `read_from_buffer` of `len` bytes can return a borrow.
    pub fn borrowable(&self, len: usize) -> bool {
        len <= self.buf.len()
    }

    fn check(&self) -> Result<(), String> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn fail<T>(&mut self, msg: String) -> Result<T, String> {
        self.error = Some(msg.clone());
        Err(msg)
    }

    /// Ensure at least `need` readable bytes at the cursor. `need` must fit
    /// the buffer.
    fn fill(&mut self, need: usize) -> Result<(), String> {
        debug_assert!(need <= self.buf.len());
        if self.buf_used - self.cursor >= need {
            return Ok(());
        }

        let keep = self.buf_used - self.cursor;
        if keep > 0 {
            self.buf.copy_within(self.cursor..self.buf_used, 0);
        }
        self.buf_pos += self.cursor as u64;
        self.cursor = 0;
        self.buf_used = keep;

        while self.buf_used < need {
            let read_at = self.buf_pos + self.buf_used as u64;
            if self.os_pos != read_at {
                if let Err(e) = self.file.seek(SeekFrom::Start(read_at)) {
                    let msg = format!(
                        "seek failed: file={}, pos={}, error={}",
                        self.path, read_at, e
                    );
                    return self.fail(msg);
                }
                self.os_pos = read_at;
            }
            let n = match self.file.read(&mut self.buf[self.buf_used..]) {
                Ok(n) => n,
                Err(e) => {
                    let msg = format!(
                        "read failed: file={}, pos={}, error={}",
                        self.path, read_at, e
                    );
                    return self.fail(msg);
                }
            };
            if n == 0 {
                let msg = format!(
                    "unexpected end of file: file={}, pos={}, need_bytes={}, file_size={}",
                    self.path,
                    self.pos(),
                    need,
                    self.file_size
                );
                return self.fail(msg);
            }
            self.buf_used += n;
            self.os_pos += n as u64;
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, String> {
        self.check()?;
        self.fill(1)?;
        let v = self.buf[self.cursor];
        self.cursor += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, String> {
        self.check()?;
        self.fill(2)?;
        let v = u16::from_le_bytes([self.buf[self.cursor], self.buf[self.cursor + 1]]);
        self.cursor += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, String> {
        self.check()?;
        self.fill(4)?;
        let mut b = [0_u8; 4];
        b.copy_from_slice(&self.buf[self.cursor..self.cursor + 4]);
        self.cursor += 4;
        Ok(u32::from_le_bytes(b))
    }

    pub fn read_u64(&mut self) -> Result<u64, String> {
        self.check()?;
        self.fill(8)?;
        let mut b = [0_u8; 8];
        b.copy_from_slice(&self.buf[self.cursor..self.cursor + 8]);
        self.cursor += 8;
        Ok(u64::from_le_bytes(b))
    }

    /// LEB128 unsigned varint, at most 10 bytes.
    pub fn unpack_u64(&mut self) -> Result<u64, String> {
        self.check()?;
        let mut out = 0_u64;
        for i in 0..MAX_VARINT64_BYTES {
            let b = self.read_u8()?;
            out |= ((b & 0x7F) as u64) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(out);
            }
        }
        let msg = format!(
            "varint too long: file={}, pos={}",
            self.path,
            self.pos()
        );
        self.fail(msg)
    }

    pub fn unpack_u32(&mut self) -> Result<u32, String> {
        let v = self.unpack_u64()?;
        if v > u32::MAX as u64 {
            let msg = format!(
                "varint out of u32 range: file={}, pos={}, value={}",
                self.path,
                self.pos(),
                v
            );
            return self.fail(msg);
        }
        Ok(v as u32)
    }

    /// Fill `out` completely, bypassing the buffer for oversized reads.
    pub fn read_exact_bytes(&mut self, out: &mut [u8]) -> Result<(), String> {
        self.check()?;
        if out.is_empty() {
            return Ok(());
        }
        if out.len() <= self.buf.len() {
            self.fill(out.len())?;
            out.copy_from_slice(&self.buf[self.cursor..self.cursor + out.len()]);
            self.cursor += out.len();
            return Ok(());
        }

        // Large read: drain whatever is buffered, then read the rest direct.
        let pos = self.pos();
        let buffered = (self.buf_used - self.cursor).min(out.len());
        out[..buffered].copy_from_slice(&self.buf[self.cursor..self.cursor + buffered]);
        let read_at = pos + buffered as u64;
        if self.os_pos != read_at {
            if let Err(e) = self.file.seek(SeekFrom::Start(read_at)) {
                let msg = format!(
                    "seek failed: file={}, pos={}, error={}",
                    self.path, read_at, e
                );
                return self.fail(msg);
            }
            self.os_pos = read_at;
        }
        if let Err(e) = self.file.read_exact(&mut out[buffered..]) {
            let msg = format!(
                "read failed: file={}, pos={}, need_bytes={}, error={}",
                self.path,
                read_at,
                out.len() - buffered,
                e
            );
            return self.fail(msg);
        }
        self.os_pos = read_at + (out.len() - buffered) as u64;
        self.buf_pos = self.os_pos;
        self.buf_used = 0;
        self.cursor = 0;
        Ok(())
    }

    /// Zero-copy read: borrow `len` bytes out of the internal buffer.
    /// Callers must check `borrowable(len)` first.
    pub fn read_from_buffer(&mut self, len: usize) -> Result<&[u8], String> {
        self.check()?;
        if len > self.buf.len() {
            let msg = format!(
                "buffered read too large: file={}, len={}, buffer_size={}",
                self.path,
                len,
                self.buf.len()
            );
            return self.fail(msg);
        }
        self.fill(len)?;
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.buf[start..start + len])
    }

    /// Varint length + raw bytes, as UTF-8.
    pub fn read_string(&mut self) -> Result<String, String> {
        let len = self.unpack_u32()? as usize;
        let mut bytes = vec![0_u8; len];
        self.read_exact_bytes(&mut bytes)?;
        match String::from_utf8(bytes) {
            Ok(s) => Ok(s),
            Err(_) => {
                let msg = format!(
                    "invalid utf-8 string: file={}, pos={}, len={}",
                    self.path,
                    self.pos(),
                    len
                );
                self.fail(msg)
            }
        }
    }

    /// Read `n_words` little-endian u32 words into `out` (cleared first).
    pub fn read_words(&mut self, n_words: usize, out: &mut Vec<u32>) -> Result<(), String> {
        out.clear();
        out.reserve(n_words);
        for _ in 0..n_words {
            out.push(self.read_u32()?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        (dir, path)
    }

    fn varint(mut v: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let b = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                out.push(b);
                break;
            }
            out.push(b | 0x80);
        }
        out
    }

    #[test]
    fn test_fixed_width_reads() {
        let mut bytes = Vec::new();
        bytes.push(0xAB_u8);
        bytes.extend_from_slice(&0x1234_u16.to_le_bytes());
        bytes.extend_from_slice(&0xDEAD_BEEF_u32.to_le_bytes());
        bytes.extend_from_slice(&0x0102_0304_0506_0708_u64.to_le_bytes());
        let (_dir, path) = write_fixture(&bytes);

        let mut r = FileReader::open_with_buffer(&path, 4).unwrap();
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.pos(), bytes.len() as u64);
    }

    #[test]
    fn test_varint_roundtrip() {
        let values = [0_u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX];
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&varint(v));
        }
        let (_dir, path) = write_fixture(&bytes);

        let mut r = FileReader::open_with_buffer(&path, 8).unwrap();
        for v in values {
            assert_eq!(r.unpack_u64().unwrap(), v);
        }
    }

    #[test]
    fn test_seek_and_zero_copy() {
        let bytes: Vec<u8> = (0..64).collect();
        let (_dir, path) = write_fixture(&bytes);

        let mut r = FileReader::open_with_buffer(&path, 16).unwrap();
        r.seek(10);
        assert!(r.borrowable(8));
        assert_eq!(r.read_from_buffer(8).unwrap(), &bytes[10..18]);
        assert!(!r.borrowable(17));

        r.seek(60);
        let mut tail = [0_u8; 4];
        r.read_exact_bytes(&mut tail).unwrap();
        assert_eq!(&tail, &bytes[60..64]);
    }

    #[test]
    fn test_large_read_bypasses_buffer() {
        let bytes: Vec<u8> = (0..255).collect();
        let (_dir, path) = write_fixture(&bytes);

        let mut r = FileReader::open_with_buffer(&path, 8).unwrap();
        r.seek(3);
        let mut out = vec![0_u8; 200];
        r.read_exact_bytes(&mut out).unwrap();
        assert_eq!(&out[..], &bytes[3..203]);
        assert_eq!(r.pos(), 203);
        assert_eq!(r.read_u8().unwrap(), bytes[203]);
    }

    #[test]
    fn test_sticky_error_on_eof() {
        let (_dir, path) = write_fixture(&[1, 2]);
        let mut r = FileReader::open_with_buffer(&path, 8).unwrap();
        let err = r.read_u32().unwrap_err();
        assert!(err.contains("unexpected end of file"));
        assert!(r.is_error());
        // Error sticks even for a read that would otherwise succeed.
        r.seek(0);
        assert!(r.read_u8().is_err());
    }

    #[test]
    fn test_read_string() {
        let mut bytes = varint(5);
        bytes.extend_from_slice(b"hello");
        let (_dir, path) = write_fixture(&bytes);
        let mut r = FileReader::open_with_buffer(&path, 4).unwrap();
        assert_eq!(r.read_string().unwrap(), "hello");
    }
}
