//! Bounds-checked big-endian reads over a font buffer.
//!
//! TrueType stores every multi-byte value big-endian. All reads go through
//! these helpers so a truncated file surfaces as [`FontError::OutOfBounds`]
//! instead of a panic.

use crate::error::FontError;

fn bytes<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], FontError> {
    offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or(FontError::OutOfBounds { offset, len: N })
}

pub fn read_u8(data: &[u8], offset: usize) -> Result<u8, FontError> {
    Ok(bytes::<1>(data, offset)?[0])
}

/// Read an unsigned 16-bit big-endian value at `offset`.
pub fn read_u16_be(data: &[u8], offset: usize) -> Result<u16, FontError> {
    Ok(u16::from_be_bytes(bytes(data, offset)?))
}

/// Read a signed 16-bit big-endian value at `offset`.
pub fn read_i16_be(data: &[u8], offset: usize) -> Result<i16, FontError> {
    Ok(i16::from_be_bytes(bytes(data, offset)?))
}

/// Read an unsigned 32-bit big-endian value at `offset`.
pub fn read_u32_be(data: &[u8], offset: usize) -> Result<u32, FontError> {
    Ok(u32::from_be_bytes(bytes(data, offset)?))
}

pub fn read_tag(data: &[u8], offset: usize) -> Result<[u8; 4], FontError> {
    bytes(data, offset)
}

/// Sequential reader used where the format is a stream (glyph flags and
/// coordinate deltas).
#[derive(Debug, Clone)]
pub struct BeCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BeCursor<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, FontError> {
        let v = read_u8(self.data, self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> Result<i16, FontError> {
        let v = read_i16_be(self.data, self.pos)?;
        self.pos += 2;
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_reader() {
        let data = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(read_u16_be(&data, 0).unwrap(), 0x1234);
        assert_eq!(read_u16_be(&data, 2).unwrap(), 0x5678);
        assert_eq!(read_u32_be(&data, 0).unwrap(), 0x12345678);
        assert_eq!(read_i16_be(&[0xFF, 0xFE], 0).unwrap(), -2);
    }

    #[test]
    fn reads_past_the_end_fail() {
        let data = [0u8; 3];
        assert_eq!(
            read_u32_be(&data, 0),
            Err(FontError::OutOfBounds { offset: 0, len: 4 })
        );
        assert!(read_u16_be(&data, usize::MAX).is_err());
    }

    #[test]
    fn cursor_advances() {
        let data = [7, 0x00, 0x10, 0xFF, 0xFF];
        let mut cur = BeCursor::new(&data, 0);
        assert_eq!(cur.read_u8().unwrap(), 7);
        assert_eq!(cur.read_i16().unwrap(), 16);
        assert_eq!(cur.read_i16().unwrap(), -1);
        assert_eq!(cur.position(), 5);
        assert!(cur.read_u8().is_err());
    }
}
