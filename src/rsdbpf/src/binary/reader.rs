use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::NULL_OFFSET;
use crate::{Error, Result};

/// Bounded reader over a byte span.
///
/// All primitive reads are little-endian unless the method name says
/// otherwise; running past the end of the span fails with
/// [`Error::UnexpectedEnd`] instead of panicking.
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> ByteReader<'a> {
        ByteReader { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::UnexpectedEnd {
                needed: position,
                available: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Borrow the next `count` bytes and advance past them.
    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEnd {
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a 32-bit offset relative to its own slot position and resolve
    /// it to an absolute position within the span. [`NULL_OFFSET`] resolves
    /// to `None`.
    pub fn read_offset(&mut self) -> Result<Option<usize>> {
        let slot = self.position;
        let raw = self.read_u32()?;
        if raw == NULL_OFFSET {
            return Ok(None);
        }
        let absolute = slot as i64 + raw as i32 as i64;
        if absolute < 0 || absolute as usize > self.data.len() {
            return Err(Error::invalid("relative offset", raw, slot as u64));
        }
        Ok(Some(absolute as usize))
    }

    /// Read a NUL-terminated ASCII string starting at `position`, without
    /// moving the read cursor. Used for name pools addressed by offset.
    pub fn cstring_at(&self, position: usize) -> Result<String> {
        let tail = self.data.get(position..).ok_or(Error::UnexpectedEnd {
            needed: position,
            available: self.data.len(),
        })?;
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::corrupted("unterminated string in name pool"))?;
        Ok(tail[..end].iter().map(|&b| b as char).collect())
    }

    /// Read a NUL-terminated ASCII string at the cursor, consuming the
    /// terminator.
    pub fn read_cstring(&mut self) -> Result<String> {
        let text = self.cstring_at(self.position)?;
        self.position += text.len() + 1;
        Ok(text)
    }

    /// Read `units` UTF-16 code units in little-endian order.
    pub fn read_utf16(&mut self, units: usize) -> Result<String> {
        let mut buffer = Vec::with_capacity(units);
        for _ in 0..units {
            buffer.push(self.read_u16()?);
        }
        String::from_utf16(&buffer)
            .map_err(|_| Error::corrupted("invalid UTF-16 string"))
    }

    /// Read a big-endian UTF-16 string prefixed with a u32 code-unit count.
    /// Only the CAS Part name field is stored this way.
    pub fn read_utf16_be(&mut self) -> Result<String> {
        let units = self.read_u32()? as usize;
        let mut buffer = Vec::with_capacity(units);
        for _ in 0..units {
            buffer.push(self.read_u16_be()?);
        }
        String::from_utf16(&buffer)
            .map_err(|_| Error::corrupted("invalid UTF-16 string"))
    }
}
