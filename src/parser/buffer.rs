//! Byte cursors over the binary format.
//!
//! [`ByteCursor`] is the codec shared by every reader and writer in the crate.
//! Implementors supply raw byte movement (`read_bytes`/`write_bytes`) and get
//! LEB128 integers, length-prefixed vectors and names for free. [`Buffer`] is
//! the forward implementation used for modules; the operand stack implements
//! the same trait in reverse.

use super::encoding::{read_vs32, read_vu32, write_vs32, write_vu32};
use super::error::DecodeError;

pub trait ByteCursor {
    /// Reads `size` bytes, or returns an empty vector if fewer remain.
    fn read_bytes(&mut self, size: usize) -> Vec<u8>;

    fn write_bytes(&mut self, bytes: &[u8]);

    /// Bytes still available to read.
    fn remaining(&self) -> usize;

    fn eof(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads one byte, `None` at end of data.
    fn read_byte(&mut self) -> Option<u8> {
        self.read_bytes(1).first().copied()
    }

    fn write_byte(&mut self, byte: u8) {
        self.write_bytes(&[byte]);
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        read_vu32(&mut || self.read_byte())
    }

    fn read_s32(&mut self) -> Result<i32, DecodeError> {
        read_vs32(&mut || self.read_byte())
    }

    /// Writes `value` as unsigned LEB128, handing the whole encoding to
    /// `write_bytes` at once.
    fn write_u32(&mut self, value: u32) {
        let mut bytes = Vec::with_capacity(5);
        write_vu32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    fn write_s32(&mut self, value: i32) {
        let mut bytes = Vec::with_capacity(5);
        write_vs32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    /// Reads exactly `size` bytes or fails with [`DecodeError::UnexpectedEof`].
    fn read_exact(&mut self, size: usize) -> Result<Vec<u8>, DecodeError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let bytes = self.read_bytes(size);
        if bytes.len() != size {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.read_byte().ok_or(DecodeError::UnexpectedEof)
    }

    /// Reads a u32 length prefix followed by that many elements.
    fn read_vec<T, F>(&mut self, mut read_elem: F) -> Result<Vec<T>, DecodeError>
    where
        Self: Sized,
        F: FnMut(&mut Self) -> Result<T, DecodeError>,
    {
        let len = self.read_u32()?;
        // the length is untrusted; cap the up-front allocation by what is left
        let mut items = Vec::with_capacity((len as usize).min(self.remaining()));
        for _ in 0..len {
            items.push(read_elem(self)?);
        }
        Ok(items)
    }

    fn write_vec<T, F>(&mut self, items: &[T], mut write_elem: F)
    where
        Self: Sized,
        F: FnMut(&mut Self, &T),
    {
        self.write_u32(items.len() as u32);
        for item in items {
            write_elem(self, item);
        }
    }

    /// Length-prefixed raw bytes.
    fn read_byte_vec(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u32()?;
        self.read_exact(len as usize)
    }

    fn write_byte_vec(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.write_bytes(bytes);
    }

    fn read_name(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_byte_vec()?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    fn write_name(&mut self, name: &str) {
        self.write_byte_vec(name.as_bytes());
    }
}

/// Forward byte buffer with a single read/write cursor.
///
/// Reads advance the cursor. Writes overwrite from the cursor onward, growing
/// the buffer as needed, so a freshly created buffer is an append-only sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    bytes: Vec<u8>,
    cursor: usize,
}

impl Buffer {
    pub fn new(bytes: Vec<u8>) -> Buffer {
        Buffer { bytes, cursor: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn set_position(&mut self, position: usize) {
        self.cursor = position.min(self.bytes.len());
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Splits off the next `size` bytes as an independent buffer.
    pub fn sub_buffer(&mut self, size: usize) -> Buffer {
        Buffer::new(self.read_bytes(size))
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Buffer::new(bytes)
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Buffer::new(bytes.to_vec())
    }
}

impl ByteCursor for Buffer {
    fn read_bytes(&mut self, size: usize) -> Vec<u8> {
        if self.remaining() < size {
            return Vec::new();
        }
        let bytes = self.bytes[self.cursor..self.cursor + size].to_vec();
        self.cursor += size;
        bytes
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.cursor + bytes.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(byte)
    }
}
