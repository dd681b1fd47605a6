//! Seekable in-memory byte buffer
//!
//! AMF3 decoding occasionally needs to look back at bytes already
//! consumed (tests build a stream, interleave reads and writes, and
//! inspect `position()`), which rules out `bytes::Bytes`'s forward-only
//! cursor. `ByteStream` keeps a plain `Vec<u8>` with an explicit read/write
//! cursor instead, and exposes the big-endian primitives AMF3 needs.
//! `Bytes`/`BytesMut` are still used at the edges to interop with the rest
//! of the crate's bytes-based API.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{AmfError, Result};

/// A growable, seekable byte buffer with big-endian read/write primitives.
#[derive(Debug, Clone, Default)]
pub struct ByteStream {
    data: Vec<u8>,
    position: usize,
}

impl ByteStream {
    /// Create an empty stream, positioned at the start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing bytes for reading, positioned at the start.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor to an absolute position.
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    /// Number of unread bytes remaining.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether the cursor has reached the end of the buffer.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Borrow the full underlying buffer, independent of cursor position.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream, returning the underlying buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Copy out a frozen, ref-counted view of the full buffer.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }

    fn require(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(AmfError::Decode(format!(
                "unexpected end of stream: need {n} bytes, have {}",
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    /// Read a single byte, advancing the cursor.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let b = self.data[self.position];
        self.position += 1;
        Ok(b)
    }

    /// Read a big-endian `u16`, advancing the cursor.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.require(2)?;
        let mut buf = &self.data[self.position..self.position + 2];
        let v = buf.get_u16();
        self.position += 2;
        Ok(v)
    }

    /// Read a big-endian `u32`, advancing the cursor.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.require(4)?;
        let mut buf = &self.data[self.position..self.position + 4];
        let v = buf.get_u32();
        self.position += 4;
        Ok(v)
    }

    /// Read a big-endian `i32`, advancing the cursor.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.require(4)?;
        let mut buf = &self.data[self.position..self.position + 4];
        let v = buf.get_i32();
        self.position += 4;
        Ok(v)
    }

    /// Read a big-endian IEEE-754 `f64`, advancing the cursor.
    pub fn read_f64(&mut self) -> Result<f64> {
        self.require(8)?;
        let mut buf = &self.data[self.position..self.position + 8];
        let v = buf.get_f64();
        self.position += 8;
        Ok(v)
    }

    /// Read `n` raw bytes, advancing the cursor.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.require(n)?;
        let slice = self.data[self.position..self.position + n].to_vec();
        self.position += n;
        Ok(slice)
    }

    /// Append a single byte at the end of the buffer.
    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Append a big-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        let mut tmp = BytesMut::with_capacity(2);
        tmp.put_u16(value);
        self.data.extend_from_slice(&tmp);
    }

    /// Append a big-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        let mut tmp = BytesMut::with_capacity(4);
        tmp.put_u32(value);
        self.data.extend_from_slice(&tmp);
    }

    /// Append a big-endian `i32`.
    pub fn write_i32(&mut self, value: i32) {
        let mut tmp = BytesMut::with_capacity(4);
        tmp.put_i32(value);
        self.data.extend_from_slice(&tmp);
    }

    /// Append a big-endian IEEE-754 `f64`.
    pub fn write_f64(&mut self, value: f64) {
        let mut tmp = BytesMut::with_capacity(8);
        tmp.put_f64(value);
        self.data.extend_from_slice(&tmp);
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}
