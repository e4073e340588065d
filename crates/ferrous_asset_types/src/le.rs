//! Little-endian primitives over `std::io`. The archive is always written
//! little-endian regardless of host.

use std::io::{self, Read, Write};

pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_f32_le<R: Read>(r: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

pub fn write_u32_le<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn write_f32_le<W: Write>(w: &mut W, value: f32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}
