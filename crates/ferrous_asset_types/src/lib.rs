//! On-disk layout of the baked asset archive.
//!
//! ```text
//! header | asset records | tags | groups | payload blocks
//! ```
//!
//! Every field is a little-endian `u32` or `f32`. Records have fixed sizes so
//! a loader can index the tables directly. Asset 0 and tag 0 are reserved
//! null entries.

pub mod le;

use std::io::{self, Read, Write};

use ferrous_core::UvRect;
use glam::Vec2;

use le::{read_f32_le, read_u32_le, write_f32_le, write_u32_le};

pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

pub const ARCHIVE_SIGNATURE: u32 = fourcc(b"fbak");

pub const HEADER_SIZE: u32 = 28;
pub const ASSET_RECORD_SIZE: u32 = 44;
pub const TAG_SIZE: u32 = 8;
pub const GROUP_SIZE: u32 = 8;
pub const GLYPH_RECORD_SIZE: u32 = 40;

/// Bytes reserved for the kind-specific part of an asset record.
const INLINE_PAYLOAD_SIZE: usize = 28;

/// Index of the reserved null asset; also means "no bitmap".
/// Highest Unicode scalar value a font record may map.
pub const MAX_CODEPOINT: u32 = 0x10_FFFF;

pub const NULL_ASSET: u32 = 0;
/// Index of the reserved null tag.
pub const NULL_TAG: u32 = 0;

/// Asset type tag as stored in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AssetKind {
    Sprite = 0,
    Font = 1,
    Bitmap = 2,
    /// The packed atlas canvas; stored like a bitmap.
    Atlas = 3,
    Null = 0xFFFF_FFFF,
}

impl AssetKind {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => AssetKind::Sprite,
            1 => AssetKind::Font,
            2 => AssetKind::Bitmap,
            3 => AssetKind::Atlas,
            0xFFFF_FFFF => AssetKind::Null,
            _ => return None,
        })
    }
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub signature: u32,
    pub group_count: u32,
    pub asset_count: u32,
    pub tag_count: u32,
    pub offset_to_assets: u32,
    pub offset_to_tags: u32,
    pub offset_to_groups: u32,
}

impl ArchiveHeader {
    /// Header for the given table sizes, with the tables laid out right
    /// after it in asset, tag, group order. `None` when the tables do not
    /// fit in 32-bit offsets.
    pub fn new(asset_count: u32, tag_count: u32, group_count: u32) -> Option<Self> {
        let offset_to_assets = HEADER_SIZE;
        let offset_to_tags =
            offset_to_assets.checked_add(asset_count.checked_mul(ASSET_RECORD_SIZE)?)?;
        let offset_to_groups = offset_to_tags.checked_add(tag_count.checked_mul(TAG_SIZE)?)?;
        let header = Self {
            signature: ARCHIVE_SIGNATURE,
            group_count,
            asset_count,
            tag_count,
            offset_to_assets,
            offset_to_tags,
            offset_to_groups,
        };
        header.end_of_tables().map(|_| header)
    }

    /// First byte after the group table, where payloads start.
    pub fn end_of_tables(&self) -> Option<u32> {
        self.offset_to_groups
            .checked_add(self.group_count.checked_mul(GROUP_SIZE)?)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for v in [
            self.signature,
            self.group_count,
            self.asset_count,
            self.tag_count,
            self.offset_to_assets,
            self.offset_to_tags,
            self.offset_to_groups,
        ] {
            write_u32_le(w, v)?;
        }
        Ok(())
    }

    /// Reads a header and checks its signature.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let header = Self {
            signature: read_u32_le(r)?,
            group_count: read_u32_le(r)?,
            asset_count: read_u32_le(r)?,
            tag_count: read_u32_le(r)?,
            offset_to_assets: read_u32_le(r)?,
            offset_to_tags: read_u32_le(r)?,
            offset_to_groups: read_u32_le(r)?,
        };
        if header.signature != ARCHIVE_SIGNATURE {
            return Err(invalid_data(format!(
                "bad archive signature {:#010x}",
                header.signature
            )));
        }
        Ok(header)
    }
}

/// Font properties stored inline in the asset record. Metrics are scaled
/// to a 1 pixel line height.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FontInfo {
    pub bitmap_id: u32,
    pub one_past_highest_codepoint: u32,
    pub glyph_count: u32,
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssetPayload {
    Null,
    Sprite { bitmap_id: u32, uv: UvRect },
    Font(FontInfo),
    Bitmap { width: u32, height: u32 },
    Atlas { width: u32, height: u32 },
}

impl AssetPayload {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetPayload::Null => AssetKind::Null,
            AssetPayload::Sprite { .. } => AssetKind::Sprite,
            AssetPayload::Font(_) => AssetKind::Font,
            AssetPayload::Bitmap { .. } => AssetKind::Bitmap,
            AssetPayload::Atlas { .. } => AssetKind::Atlas,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetRecord {
    pub offset_to_data: u32,
    pub first_tag: u32,
    pub one_past_last_tag: u32,
    pub payload: AssetPayload,
}

impl AssetRecord {
    /// The reserved record at index 0.
    pub const NULL: AssetRecord = AssetRecord {
        offset_to_data: 0,
        first_tag: NULL_TAG,
        one_past_last_tag: NULL_TAG,
        payload: AssetPayload::Null,
    };

    pub fn kind(&self) -> AssetKind {
        self.payload.kind()
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32_le(w, self.kind() as u32)?;
        write_u32_le(w, self.offset_to_data)?;
        write_u32_le(w, self.first_tag)?;
        write_u32_le(w, self.one_past_last_tag)?;

        let mut inline = Vec::with_capacity(INLINE_PAYLOAD_SIZE);
        match self.payload {
            AssetPayload::Null => {}
            AssetPayload::Sprite { bitmap_id, uv } => {
                write_u32_le(&mut inline, bitmap_id)?;
                write_uv(&mut inline, &uv)?;
            }
            AssetPayload::Font(info) => {
                write_u32_le(&mut inline, info.bitmap_id)?;
                write_u32_le(&mut inline, info.one_past_highest_codepoint)?;
                write_u32_le(&mut inline, info.glyph_count)?;
                write_f32_le(&mut inline, info.ascent)?;
                write_f32_le(&mut inline, info.descent)?;
                write_f32_le(&mut inline, info.line_gap)?;
            }
            AssetPayload::Bitmap { width, height } | AssetPayload::Atlas { width, height } => {
                write_u32_le(&mut inline, width)?;
                write_u32_le(&mut inline, height)?;
            }
        }
        inline.resize(INLINE_PAYLOAD_SIZE, 0);
        w.write_all(&inline)
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let raw_kind = read_u32_le(r)?;
        let kind = AssetKind::from_u32(raw_kind)
            .ok_or_else(|| invalid_data(format!("unknown asset kind {raw_kind}")))?;
        let offset_to_data = read_u32_le(r)?;
        let first_tag = read_u32_le(r)?;
        let one_past_last_tag = read_u32_le(r)?;

        let mut inline = [0u8; INLINE_PAYLOAD_SIZE];
        r.read_exact(&mut inline)?;
        let mut p = &inline[..];
        let payload = match kind {
            AssetKind::Null => AssetPayload::Null,
            AssetKind::Sprite => AssetPayload::Sprite {
                bitmap_id: read_u32_le(&mut p)?,
                uv: read_uv(&mut p)?,
            },
            AssetKind::Font => AssetPayload::Font(FontInfo {
                bitmap_id: read_u32_le(&mut p)?,
                one_past_highest_codepoint: read_u32_le(&mut p)?,
                glyph_count: read_u32_le(&mut p)?,
                ascent: read_f32_le(&mut p)?,
                descent: read_f32_le(&mut p)?,
                line_gap: read_f32_le(&mut p)?,
            }),
            AssetKind::Bitmap => AssetPayload::Bitmap {
                width: read_u32_le(&mut p)?,
                height: read_u32_le(&mut p)?,
            },
            AssetKind::Atlas => AssetPayload::Atlas {
                width: read_u32_le(&mut p)?,
                height: read_u32_le(&mut p)?,
            },
        };
        Ok(Self {
            offset_to_data,
            first_tag,
            one_past_last_tag,
            payload,
        })
    }
}

/// Key/value pair used to pick between assets of the same group at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tag {
    pub kind: u32,
    pub value: f32,
}

impl Tag {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32_le(w, self.kind)?;
        write_f32_le(w, self.value)
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            kind: read_u32_le(r)?,
            value: read_f32_le(r)?,
        })
    }
}

/// Contiguous `[first, one_past_last)` range of asset indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetGroup {
    pub first_asset: u32,
    pub one_past_last_asset: u32,
}

impl AssetGroup {
    pub fn len(&self) -> u32 {
        self.one_past_last_asset - self.first_asset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32_le(w, self.first_asset)?;
        write_u32_le(w, self.one_past_last_asset)
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            first_asset: read_u32_le(r)?,
            one_past_last_asset: read_u32_le(r)?,
        })
    }
}

/// Per-glyph entry of a font payload. Box and advance are in 1 pixel line
/// height units; the box is relative to the pen position, y up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlyphRecord {
    pub codepoint: u32,
    pub uv: UvRect,
    pub box_min: Vec2,
    pub box_max: Vec2,
    pub advance: f32,
}

impl GlyphRecord {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32_le(w, self.codepoint)?;
        write_uv(w, &self.uv)?;
        for v in [self.box_min.x, self.box_min.y, self.box_max.x, self.box_max.y] {
            write_f32_le(w, v)?;
        }
        write_f32_le(w, self.advance)
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            codepoint: read_u32_le(r)?,
            uv: read_uv(r)?,
            box_min: Vec2::new(read_f32_le(r)?, read_f32_le(r)?),
            box_max: Vec2::new(read_f32_le(r)?, read_f32_le(r)?),
            advance: read_f32_le(r)?,
        })
    }
}

fn write_uv<W: Write>(w: &mut W, uv: &UvRect) -> io::Result<()> {
    for v in [uv.min.x, uv.min.y, uv.max.x, uv.max.y] {
        write_f32_le(w, v)?;
    }
    Ok(())
}

fn read_uv<R: Read>(r: &mut R) -> io::Result<UvRect> {
    Ok(UvRect {
        min: Vec2::new(read_f32_le(r)?, read_f32_le(r)?),
        max: Vec2::new(read_f32_le(r)?, read_f32_le(r)?),
    })
}
