//! Archive serializer.
//!
//! Layout: header, asset table, tag table, group table, then one payload
//! block per asset in table order. Payload offsets are only known once the
//! blocks are streamed, so the tables are written twice: once as
//! placeholders and once more after seeking back.

use std::io::{self, Seek, SeekFrom, Write};

use ferrous_asset_types::{
    ArchiveHeader, AssetGroup, AssetKind, AssetPayload, AssetRecord, FontInfo, GlyphRecord, Tag,
    ASSET_RECORD_SIZE, HEADER_SIZE, MAX_CODEPOINT, NULL_ASSET,
};
use ferrous_core::UvRect;
use log::{debug, info};
use thiserror::Error;

use crate::atlas::{Atlas, AtlasFont};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive write failed: {0}")]
    Io(#[from] io::Error),
    #[error("archive exceeds the 4 GiB offset range")]
    TooLarge,
    #[error("bitmap is {width}x{height} but has {len} bytes of pixels")]
    BitmapSize { width: u32, height: u32, len: usize },
    #[error("tag added before any asset")]
    TagWithoutAsset,
    #[error("group {0} is still open")]
    UnclosedGroup(usize),
    #[error("begin_group called while group {0} is open")]
    NestedGroup(usize),
    #[error("end_group called with no open group")]
    NoOpenGroup,
    #[error("font `{font}`: codepoint {codepoint:#X} is beyond U+10FFFF")]
    CodepointOutOfRange { font: String, codepoint: u32 },
    #[error("asset {asset} refers to missing bitmap {bitmap}")]
    MissingBitmap { asset: u32, bitmap: u32 },
}

/// Variable-length data that follows the tables.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetData {
    None,
    /// RGBA8 pixels.
    Pixels(Vec<u8>),
    Font {
        glyphs: Vec<GlyphRecord>,
        /// `glyphs.len()²` row-major.
        kerning: Vec<f32>,
        /// Indexed by codepoint; record index + 1, 0 for "absent".
        codepoint_map: Vec<u32>,
    },
}

impl AssetData {
    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            AssetData::None => Ok(()),
            AssetData::Pixels(pixels) => w.write_all(pixels),
            AssetData::Font {
                glyphs,
                kerning,
                codepoint_map,
            } => {
                for glyph in glyphs {
                    glyph.write_to(w)?;
                }
                for value in kerning {
                    w.write_all(&value.to_le_bytes())?;
                }
                for entry in codepoint_map {
                    w.write_all(&entry.to_le_bytes())?;
                }
                Ok(())
            }
        }
    }
}

/// One asset table entry plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveAsset {
    pub payload: AssetPayload,
    pub first_tag: u32,
    pub one_past_last_tag: u32,
    pub data: AssetData,
}

impl ArchiveAsset {
    fn null() -> Self {
        Self {
            payload: AssetPayload::Null,
            first_tag: 0,
            one_past_last_tag: 0,
            data: AssetData::None,
        }
    }
}

/// Accumulates assets, tags and groups in archive order.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    assets: Vec<ArchiveAsset>,
    tags: Vec<Tag>,
    groups: Vec<AssetGroup>,
    open_group: Option<usize>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    /// Starts with the reserved null asset and null tag in place.
    pub fn new() -> Self {
        Self {
            assets: vec![ArchiveAsset::null()],
            tags: vec![Tag::default()],
            groups: Vec::new(),
            open_group: None,
        }
    }

    pub fn assets(&self) -> &[ArchiveAsset] {
        &self.assets
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn groups(&self) -> &[AssetGroup] {
        &self.groups
    }

    /// Opens a group; every asset pushed until [`end_group`](Self::end_group)
    /// belongs to it. Returns the group index.
    pub fn begin_group(&mut self) -> Result<usize, ArchiveError> {
        if let Some(open) = self.open_group {
            return Err(ArchiveError::NestedGroup(open));
        }
        let next = self.assets.len() as u32;
        self.groups.push(AssetGroup {
            first_asset: next,
            one_past_last_asset: next,
        });
        let id = self.groups.len() - 1;
        self.open_group = Some(id);
        Ok(id)
    }

    pub fn end_group(&mut self) -> Result<(), ArchiveError> {
        let id = self.open_group.take().ok_or(ArchiveError::NoOpenGroup)?;
        self.groups[id].one_past_last_asset = self.assets.len() as u32;
        Ok(())
    }

    fn push(&mut self, payload: AssetPayload, data: AssetData) -> u32 {
        let tag = self.tags.len() as u32;
        self.assets.push(ArchiveAsset {
            payload,
            first_tag: tag,
            one_past_last_tag: tag,
            data,
        });
        self.assets.len() as u32 - 1
    }

    /// Adds an RGBA8 bitmap and returns its asset id.
    pub fn push_bitmap(&mut self, width: u32, height: u32, pixels: Vec<u8>) -> Result<u32, ArchiveError> {
        check_pixels(width, height, &pixels)?;
        Ok(self.push(AssetPayload::Bitmap { width, height }, AssetData::Pixels(pixels)))
    }

    /// Adds the atlas canvas. Sprites and fonts of that atlas refer to the
    /// returned id.
    pub fn push_atlas(&mut self, atlas: &Atlas) -> Result<u32, ArchiveError> {
        check_pixels(atlas.width, atlas.height, &atlas.pixels)?;
        Ok(self.push(
            AssetPayload::Atlas {
                width: atlas.width,
                height: atlas.height,
            },
            AssetData::Pixels(atlas.pixels.clone()),
        ))
    }

    pub fn push_sprite(&mut self, bitmap_id: u32, uv: UvRect) -> u32 {
        self.push(AssetPayload::Sprite { bitmap_id, uv }, AssetData::None)
    }

    /// Adds a font whose glyphs live in bitmap `bitmap_id`.
    pub fn push_font(&mut self, bitmap_id: u32, font: &AtlasFont) -> Result<u32, ArchiveError> {
        let glyphs: Vec<GlyphRecord> = font
            .glyphs
            .iter()
            .map(|g| GlyphRecord {
                codepoint: g.codepoint,
                uv: g.uv,
                box_min: g.box_min,
                box_max: g.box_max,
                advance: g.advance,
            })
            .collect();

        let one_past_highest = match font.highest_codepoint() {
            Some(cp) if cp > MAX_CODEPOINT => {
                return Err(ArchiveError::CodepointOutOfRange {
                    font: font.name.clone(),
                    codepoint: cp,
                })
            }
            Some(cp) => cp + 1,
            None => 0,
        };
        let mut codepoint_map = vec![0u32; one_past_highest as usize];
        for (i, glyph) in glyphs.iter().enumerate() {
            codepoint_map[glyph.codepoint as usize] = i as u32 + 1;
        }

        let info = FontInfo {
            bitmap_id,
            one_past_highest_codepoint: one_past_highest,
            glyph_count: glyphs.len() as u32,
            ascent: font.ascent,
            descent: font.descent,
            line_gap: font.line_gap,
        };
        Ok(self.push(
            AssetPayload::Font(info),
            AssetData::Font {
                glyphs,
                kerning: font.kerning.clone(),
                codepoint_map,
            },
        ))
    }

    /// Attaches a tag to the most recently pushed asset.
    pub fn add_tag(&mut self, kind: u32, value: f32) -> Result<(), ArchiveError> {
        if self.assets.len() <= 1 {
            return Err(ArchiveError::TagWithoutAsset);
        }
        self.tags.push(Tag { kind, value });
        if let Some(last) = self.assets.last_mut() {
            last.one_past_last_tag = self.tags.len() as u32;
        }
        Ok(())
    }

    /// Writes the archive; returns the number of bytes written.
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<u64, ArchiveError> {
        if let Some(open) = self.open_group {
            return Err(ArchiveError::UnclosedGroup(open));
        }
        write_archive(&self.assets, &self.tags, &self.groups, writer)
    }
}

fn check_pixels(width: u32, height: u32, pixels: &[u8]) -> Result<(), ArchiveError> {
    if pixels.len() as u64 != width as u64 * height as u64 * 4 {
        return Err(ArchiveError::BitmapSize {
            width,
            height,
            len: pixels.len(),
        });
    }
    Ok(())
}

fn to_offset(value: u64) -> Result<u32, ArchiveError> {
    u32::try_from(value).map_err(|_| ArchiveError::TooLarge)
}

/// Writes a complete archive at the writer's current position. Offsets in
/// the file are relative to that position.
pub fn write_archive<W: Write + Seek>(
    assets: &[ArchiveAsset],
    tags: &[Tag],
    groups: &[AssetGroup],
    writer: &mut W,
) -> Result<u64, ArchiveError> {
    for (id, asset) in assets.iter().enumerate() {
        let bitmap = match asset.payload {
            AssetPayload::Sprite { bitmap_id, .. } => bitmap_id,
            AssetPayload::Font(info) => info.bitmap_id,
            _ => continue,
        };
        let is_image = assets.get(bitmap as usize).is_some_and(|b| {
            matches!(b.payload.kind(), AssetKind::Bitmap | AssetKind::Atlas)
        });
        if bitmap == NULL_ASSET || !is_image {
            return Err(ArchiveError::MissingBitmap {
                asset: id as u32,
                bitmap,
            });
        }
    }

    let start = writer.stream_position()?;
    let header = ArchiveHeader::new(
        to_offset(assets.len() as u64)?,
        to_offset(tags.len() as u64)?,
        to_offset(groups.len() as u64)?,
    )
    .ok_or(ArchiveError::TooLarge)?;

    // pass 1: placeholders for everything with a fixed size
    let mut records: Vec<AssetRecord> = assets
        .iter()
        .map(|a| AssetRecord {
            offset_to_data: 0,
            first_tag: a.first_tag,
            one_past_last_tag: a.one_past_last_tag,
            payload: a.payload,
        })
        .collect();
    ArchiveHeader::default().write_to(writer)?;
    for record in &records {
        record.write_to(writer)?;
    }
    for tag in tags {
        tag.write_to(writer)?;
    }
    for group in groups {
        group.write_to(writer)?;
    }

    for (record, asset) in records.iter_mut().zip(assets) {
        if asset.data == AssetData::None {
            continue;
        }
        let offset = writer.stream_position()? - start;
        record.offset_to_data = to_offset(offset)?;
        asset.data.write_to(writer)?;
        debug!(
            "asset {:?} payload at {} ({} bytes)",
            record.kind(),
            offset,
            writer.stream_position()? - start - offset
        );
    }
    let end = writer.stream_position()?;
    to_offset(end - start)?;

    // pass 2: patch the offsets, then finalize the header
    writer.seek(SeekFrom::Start(start + HEADER_SIZE as u64))?;
    for record in &records {
        record.write_to(writer)?;
    }
    writer.seek(SeekFrom::Start(start))?;
    header.write_to(writer)?;
    writer.seek(SeekFrom::Start(end))?;
    writer.flush()?;

    debug_assert_eq!(
        header.offset_to_tags as u64,
        HEADER_SIZE as u64 + records.len() as u64 * ASSET_RECORD_SIZE as u64
    );
    info!(
        "wrote archive: {} asset(s), {} tag(s), {} group(s), {} bytes",
        assets.len(),
        tags.len(),
        groups.len(),
        end - start
    );
    Ok(end - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrous_asset_types::{ARCHIVE_SIGNATURE, GLYPH_RECORD_SIZE};
    use std::io::{Cursor, Read};

    fn read_records(bytes: &[u8]) -> (ArchiveHeader, Vec<AssetRecord>) {
        let mut cur = Cursor::new(bytes);
        let header = ArchiveHeader::read_from(&mut cur).unwrap();
        cur.set_position(header.offset_to_assets as u64);
        let records = (0..header.asset_count)
            .map(|_| AssetRecord::read_from(&mut cur).unwrap())
            .collect();
        (header, records)
    }

    #[test]
    fn null_entries_are_reserved() {
        let builder = ArchiveBuilder::new();
        let mut out = Cursor::new(Vec::new());
        builder.write(&mut out).unwrap();
        let (header, records) = read_records(out.get_ref());
        assert_eq!(header.signature, ARCHIVE_SIGNATURE);
        assert_eq!((header.asset_count, header.tag_count, header.group_count), (1, 1, 0));
        assert_eq!(records[0], AssetRecord::NULL);
    }

    #[test]
    fn bitmap_payload_offset_is_patched() {
        let mut builder = ArchiveBuilder::new();
        let pixels: Vec<u8> = (0..16).collect();
        let id = builder.push_bitmap(2, 2, pixels.clone()).unwrap();
        assert_eq!(id, 1);

        let mut out = Cursor::new(Vec::new());
        let written = builder.write(&mut out).unwrap();
        let bytes = out.into_inner();
        assert_eq!(written as usize, bytes.len());

        let (header, records) = read_records(&bytes);
        let offset = records[1].offset_to_data as usize;
        assert_eq!(Some(offset as u32), header.end_of_tables());
        assert_eq!(&bytes[offset..offset + 16], &pixels[..]);
        assert_eq!(records[1].payload, AssetPayload::Bitmap { width: 2, height: 2 });
    }

    #[test]
    fn archive_can_start_mid_stream() {
        let mut builder = ArchiveBuilder::new();
        builder.push_bitmap(1, 1, vec![9, 8, 7, 6]).unwrap();
        let mut out = Cursor::new(vec![0xAA; 10]);
        out.seek(SeekFrom::End(0)).unwrap();
        builder.write(&mut out).unwrap();

        let bytes = out.into_inner();
        let (_, records) = read_records(&bytes[10..]);
        let offset = 10 + records[1].offset_to_data as usize;
        assert_eq!(&bytes[offset..offset + 4], &[9, 8, 7, 6]);
    }

    #[test]
    fn tags_and_groups_cover_their_assets() {
        let mut builder = ArchiveBuilder::new();
        assert!(matches!(builder.add_tag(1, 1.0), Err(ArchiveError::TagWithoutAsset)));

        builder.begin_group().unwrap();
        let bitmap = builder.push_bitmap(1, 1, vec![0; 4]).unwrap();
        builder.add_tag(7, 0.5).unwrap();
        builder.add_tag(8, 2.0).unwrap();
        builder.end_group().unwrap();

        builder.begin_group().unwrap();
        assert!(matches!(builder.begin_group(), Err(ArchiveError::NestedGroup(1))));
        builder.push_sprite(bitmap, UvRect::ZERO);
        builder.push_sprite(bitmap, UvRect::ZERO);
        builder.add_tag(9, 3.0).unwrap();
        builder.end_group().unwrap();
        assert!(matches!(builder.end_group(), Err(ArchiveError::NoOpenGroup)));

        assert_eq!(
            builder.groups(),
            &[
                AssetGroup { first_asset: 1, one_past_last_asset: 2 },
                AssetGroup { first_asset: 2, one_past_last_asset: 4 },
            ]
        );
        let assets = builder.assets();
        assert_eq!((assets[1].first_tag, assets[1].one_past_last_tag), (1, 3));
        assert_eq!((assets[2].first_tag, assets[2].one_past_last_tag), (3, 3));
        assert_eq!((assets[3].first_tag, assets[3].one_past_last_tag), (3, 4));

        let mut out = Cursor::new(Vec::new());
        builder.write(&mut out).unwrap();
        let bytes = out.into_inner();
        let header = ArchiveHeader::read_from(&mut Cursor::new(&bytes)).unwrap();
        let mut cur = Cursor::new(&bytes);
        cur.set_position(header.offset_to_tags as u64 + 8);
        assert_eq!(Tag::read_from(&mut cur).unwrap(), Tag { kind: 7, value: 0.5 });
        cur.set_position(header.offset_to_groups as u64 + 8);
        assert_eq!(
            AssetGroup::read_from(&mut cur).unwrap(),
            AssetGroup { first_asset: 2, one_past_last_asset: 4 }
        );
    }

    #[test]
    fn open_group_blocks_writing() {
        let mut builder = ArchiveBuilder::new();
        builder.begin_group().unwrap();
        let mut out = Cursor::new(Vec::new());
        assert!(matches!(builder.write(&mut out), Err(ArchiveError::UnclosedGroup(0))));
    }

    #[test]
    fn sprite_must_point_at_a_bitmap() {
        let mut builder = ArchiveBuilder::new();
        builder.push_sprite(NULL_ASSET, UvRect::ZERO);
        let mut out = Cursor::new(Vec::new());
        assert!(matches!(
            builder.write(&mut out),
            Err(ArchiveError::MissingBitmap { asset: 1, bitmap: 0 })
        ));
    }

    #[test]
    fn wrong_pixel_count_is_rejected() {
        let mut builder = ArchiveBuilder::new();
        assert!(matches!(
            builder.push_bitmap(2, 2, vec![0; 15]),
            Err(ArchiveError::BitmapSize { .. })
        ));
    }

    #[test]
    fn font_payload_layout() {
        use crate::atlas::AtlasGlyph;
        use ferrous_core::PixelRect;
        use ferrous_font::BitmapBox;
        use glam::Vec2;

        let glyph = |codepoint: u32, advance: f32| AtlasGlyph {
            codepoint,
            glyph: 1,
            bitmap_box: BitmapBox::default(),
            rect: PixelRect::default(),
            uv: UvRect::ZERO,
            box_min: Vec2::ZERO,
            box_max: Vec2::ONE,
            advance,
        };
        let font = AtlasFont {
            name: "f".into(),
            pixel_height: 10.0,
            scale: 0.01,
            ascent: 0.8,
            descent: -0.2,
            line_gap: 0.0,
            glyphs: vec![glyph(3, 0.5), glyph(5, 0.25)],
            kerning: vec![0.5, 0.4, 0.25, 0.3],
        };

        let mut builder = ArchiveBuilder::new();
        let bitmap = builder.push_bitmap(1, 1, vec![0; 4]).unwrap();
        builder.push_font(bitmap, &font).unwrap();
        let mut out = Cursor::new(Vec::new());
        builder.write(&mut out).unwrap();
        let bytes = out.into_inner();

        let (_, records) = read_records(&bytes);
        let AssetPayload::Font(info) = records[2].payload else {
            panic!("expected a font record, got {:?}", records[2].payload);
        };
        assert_eq!((info.glyph_count, info.one_past_highest_codepoint), (2, 6));

        let mut cur = Cursor::new(&bytes);
        cur.set_position(records[2].offset_to_data as u64);
        assert_eq!(GlyphRecord::read_from(&mut cur).unwrap().codepoint, 3);
        assert_eq!(GlyphRecord::read_from(&mut cur).unwrap().advance, 0.25);

        let mut kerning = [0u8; 16];
        cur.read_exact(&mut kerning).unwrap();
        assert_eq!(f32::from_le_bytes([kerning[4], kerning[5], kerning[6], kerning[7]]), 0.4);

        let mut map = [0u8; 24];
        cur.read_exact(&mut map).unwrap();
        let entries: Vec<u32> = map
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(entries, vec![0, 0, 0, 1, 0, 2]);
        assert_eq!(
            cur.position(),
            records[2].offset_to_data as u64 + 2 * GLYPH_RECORD_SIZE as u64 + 16 + 24
        );
    }

    #[test]
    fn codepoints_beyond_unicode_are_rejected() {
        use crate::atlas::AtlasGlyph;
        use ferrous_core::PixelRect;
        use ferrous_font::BitmapBox;
        use glam::Vec2;

        let font = AtlasFont {
            name: "wide".into(),
            pixel_height: 10.0,
            scale: 0.01,
            ascent: 1.0,
            descent: 0.0,
            line_gap: 0.0,
            glyphs: vec![AtlasGlyph {
                codepoint: u32::MAX,
                glyph: 0,
                bitmap_box: BitmapBox::default(),
                rect: PixelRect::default(),
                uv: UvRect::ZERO,
                box_min: Vec2::ZERO,
                box_max: Vec2::ZERO,
                advance: 0.5,
            }],
            kerning: vec![0.5],
        };

        let mut builder = ArchiveBuilder::new();
        let bitmap = builder.push_bitmap(1, 1, vec![0; 4]).unwrap();
        match builder.push_font(bitmap, &font) {
            Err(ArchiveError::CodepointOutOfRange { font, codepoint }) => {
                assert_eq!((font.as_str(), codepoint), ("wide", u32::MAX));
            }
            other => panic!("expected an out of range codepoint, got {other:?}"),
        }
        assert_eq!(builder.assets().len(), 2);
    }
}
