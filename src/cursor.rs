//! Bounds-checked sequential reader over one borrowed packet buffer.
//!
//! Every other module reads packet bytes through [`ByteCursor`]; nothing indexes the
//! buffer directly. Reads are big-endian unless the method name says otherwise.
//!
//! A failed read never consumes anything: the offset after an `Err` is the offset
//! before the call, so callers can report a stable position for the failure.

use crate::codec::DecodeError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Read-only cursor: a borrowed buffer plus a monotone read offset.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left unread.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    fn ensure(&self, n: usize) -> Result<(), DecodeError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(DecodeError::TooShort { needed: n, remaining });
        }
        Ok(())
    }

    /// Borrow the next `n` bytes without advancing.
    pub fn peek_bytes(&self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure(n)?;
        Ok(&self.data[self.pos..self.pos + n])
    }

    /// Non-advancing lookahead of the next two bytes (a part type tag).
    pub fn peek_u16(&self) -> Result<u16, DecodeError> {
        self.peek_u16_at(0)
    }

    /// Non-advancing read of a u16 located `skip` bytes past the current offset.
    pub fn peek_u16_at(&self, skip: usize) -> Result<u16, DecodeError> {
        let end = skip.checked_add(2).ok_or(DecodeError::TooShort {
            needed: usize::MAX,
            remaining: self.remaining(),
        })?;
        let window = self.peek_bytes(end)?;
        Ok(BigEndian::read_u16(&window[skip..]))
    }

    /// Borrow exactly `n` bytes and advance past them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let out = self.peek_bytes(n)?;
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(BigEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(BigEndian::read_i64(self.read_bytes(8)?))
    }

    /// IEEE-754 double in little-endian (x86) byte order.
    pub fn read_f64_le(&mut self) -> Result<f64, DecodeError> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    /// Unread tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
