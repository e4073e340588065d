//! The font table index: byte offsets of the tables the baker needs, plus
//! the lookups built directly on top of them.

use std::ops::Range;

use log::{trace, warn};

use crate::binary_reader::{read_i16_be, read_u16_be, read_u32_be};
use crate::error::FontError;
use crate::tables::{
    TableDirectory, TAG_CMAP, TAG_GLYF, TAG_HEAD, TAG_HHEA, TAG_HMTX, TAG_KERN, TAG_LOCA,
    TAG_MAXP,
};

/// Font-internal glyph identifier. Glyph 0 is the "missing glyph".
pub type GlyphIndex = u16;

const PLATFORM_UNICODE: u16 = 0;
const PLATFORM_MICROSOFT: u16 = 3;
const MS_ENCODING_UNICODE_BMP: u16 = 1;
const MS_ENCODING_UNICODE_FULL: u16 = 10;

/// Segment-mapping cmap subtable; the only format we look codepoints up in.
const CMAP_FORMAT_SEGMENT_MAPPING: u16 = 4;

/// Whether `loca` stores half offsets in u16s or full offsets in u32s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocaFormat {
    Short,
    Long,
}

/// Raw glyph bounds in font units. y grows upwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlyphBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

/// Glyph bounds in pixels at some scale: min corner floored, max corner
/// ceiled. A glyph with no outline has an all-zero box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitmapBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BitmapBox {
    pub fn width(&self) -> u32 {
        (self.x1 - self.x0).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y1 - self.y0).max(0) as u32
    }

    /// True when the glyph produces no pixels (e.g. space).
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HorizontalMetrics {
    pub advance_width: u16,
    pub left_side_bearing: i16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerticalMetrics {
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
}

/// Byte offsets into a loaded TrueType buffer. Built once per font and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct FontIndex<'a> {
    data: &'a [u8],
    loca: usize,
    head: usize,
    glyf: usize,
    maxp: usize,
    cmap: usize,
    hhea: usize,
    hmtx: usize,
    kern: Option<usize>,
    /// Start of the selected cmap subtable.
    cmap_mappings: usize,
    loca_format: LocaFormat,
    glyph_count: u16,
}

impl<'a> FontIndex<'a> {
    /// Scans the table directory and records the offsets of every table the
    /// pipeline relies on.
    pub fn parse(data: &'a [u8]) -> Result<Self, FontError> {
        let directory = TableDirectory::read(data)?;

        let loca = directory.require(&TAG_LOCA)?;
        let maxp = directory.require(&TAG_MAXP)?;
        let head = directory.require(&TAG_HEAD)?;
        let glyf = directory.require(&TAG_GLYF)?;
        let cmap = directory.require(&TAG_CMAP)?;
        let hhea = directory.require(&TAG_HHEA)?;
        let hmtx = directory.require(&TAG_HMTX)?;
        let kern = directory.get(&TAG_KERN).map(|rec| rec.offset as usize);

        let loca_format = match read_i16_be(data, head + 50)? {
            0 => LocaFormat::Short,
            1 => LocaFormat::Long,
            other => return Err(FontError::UnsupportedLocaFormat(other)),
        };
        let glyph_count = read_u16_be(data, maxp + 4)?;
        let cmap_mappings = select_cmap_subtable(data, cmap)?;

        trace!(
            "font index: {} tables, {} glyphs, {:?} loca, kern: {}",
            directory.len(),
            glyph_count,
            loca_format,
            kern.is_some()
        );

        Ok(Self {
            data,
            loca,
            head,
            glyf,
            maxp,
            cmap,
            hhea,
            hmtx,
            kern,
            cmap_mappings,
            loca_format,
            glyph_count,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    pub fn loca_format(&self) -> LocaFormat {
        self.loca_format
    }

    pub fn has_kerning(&self) -> bool {
        self.kern.is_some()
    }

    /// Offsets of the required tables, in directory-tag order. Mostly useful
    /// for diagnostics.
    pub fn table_offsets(&self) -> [(&'static str, usize); 7] {
        [
            ("cmap", self.cmap),
            ("glyf", self.glyf),
            ("head", self.head),
            ("hhea", self.hhea),
            ("hmtx", self.hmtx),
            ("loca", self.loca),
            ("maxp", self.maxp),
        ]
    }

    /// Maps a codepoint to a glyph through the cmap format 4 segment table.
    ///
    /// Segments are found with a linear scan over the end codes. Codepoints
    /// that no segment covers, `0xFFFF`, and anything outside the BMP map to
    /// glyph 0.
    pub fn glyph_index_for_codepoint(&self, codepoint: u32) -> Result<GlyphIndex, FontError> {
        let data = self.data;
        let m = self.cmap_mappings;
        if read_u16_be(data, m)? != CMAP_FORMAT_SEGMENT_MAPPING {
            return Ok(0);
        }
        if codepoint >= 0xFFFF {
            return Ok(0);
        }

        let seg_count = (read_u16_be(data, m + 6)? >> 1) as usize;
        let end_codes = m + 14;
        // skip reservedPad
        let start_codes = end_codes + 2 * seg_count + 2;
        let id_deltas = start_codes + 2 * seg_count;
        let id_range_offsets = id_deltas + 2 * seg_count;

        let mut segment = None;
        for i in 0..seg_count {
            if read_u16_be(data, end_codes + 2 * i)? as u32 >= codepoint {
                segment = Some(i);
                break;
            }
        }
        let Some(seg) = segment else {
            return Ok(0);
        };

        let start_code = read_u16_be(data, start_codes + 2 * seg)? as u32;
        if start_code > codepoint {
            return Ok(0);
        }

        let delta = read_i16_be(data, id_deltas + 2 * seg)?;
        let range_offset_pos = id_range_offsets + 2 * seg;
        let range_offset = read_u16_be(data, range_offset_pos)? as usize;

        let glyph = if range_offset == 0 {
            (codepoint as u16).wrapping_add(delta as u16)
        } else {
            // idRangeOffset is relative to its own position in the array
            let pos = range_offset_pos + range_offset + 2 * (codepoint - start_code) as usize;
            match read_u16_be(data, pos)? {
                0 => 0,
                g => g.wrapping_add(delta as u16),
            }
        };
        Ok(glyph)
    }

    /// Byte range of the glyph's `glyf` entry, or `None` when the glyph has
    /// no outline (two equal `loca` offsets).
    pub fn glyph_location(&self, glyph: GlyphIndex) -> Result<Option<Range<usize>>, FontError> {
        if glyph >= self.glyph_count {
            return Err(FontError::GlyphOutOfRange {
                glyph: glyph as u32,
                count: self.glyph_count,
            });
        }
        let g = glyph as usize;
        let (g1, g2) = match self.loca_format {
            LocaFormat::Short => (
                read_u16_be(self.data, self.loca + g * 2)? as usize * 2,
                read_u16_be(self.data, self.loca + g * 2 + 2)? as usize * 2,
            ),
            LocaFormat::Long => (
                read_u32_be(self.data, self.loca + g * 4)? as usize,
                read_u32_be(self.data, self.loca + g * 4 + 4)? as usize,
            ),
        };
        if g1 == g2 {
            return Ok(None);
        }
        if g2 < g1 {
            return Err(FontError::MalformedGlyph {
                glyph,
                reason: "loca offsets decrease",
            });
        }
        Ok(Some(self.glyf + g1..self.glyf + g2))
    }

    /// The four signed bounds stored in the glyph header, in font units.
    pub fn glyph_box(&self, glyph: GlyphIndex) -> Result<Option<GlyphBox>, FontError> {
        let Some(range) = self.glyph_location(glyph)? else {
            return Ok(None);
        };
        let g = range.start;
        Ok(Some(GlyphBox {
            x_min: read_i16_be(self.data, g + 2)?,
            y_min: read_i16_be(self.data, g + 4)?,
            x_max: read_i16_be(self.data, g + 6)?,
            y_max: read_i16_be(self.data, g + 8)?,
        }))
    }

    /// Pixel-space bounds at `scale`; all zero for glyphs without outline.
    pub fn glyph_bitmap_box(&self, glyph: GlyphIndex, scale: f32) -> Result<BitmapBox, FontError> {
        Ok(match self.glyph_box(glyph)? {
            Some(b) => BitmapBox {
                x0: (b.x_min as f32 * scale).floor() as i32,
                y0: (b.y_min as f32 * scale).floor() as i32,
                x1: (b.x_max as f32 * scale).ceil() as i32,
                y1: (b.y_max as f32 * scale).ceil() as i32,
            },
            None => BitmapBox::default(),
        })
    }

    /// Advance width and left side bearing. Glyphs past the long-metrics
    /// count reuse the last long advance and read their bearing from the
    /// trailing bearing array.
    pub fn horizontal_metrics(&self, glyph: GlyphIndex) -> Result<HorizontalMetrics, FontError> {
        let long_count = read_u16_be(self.data, self.hhea + 34)? as usize;
        if long_count == 0 {
            return Err(FontError::DegenerateMetrics("hhea.numberOfHMetrics is zero"));
        }
        let g = glyph as usize;
        let metrics = if g < long_count {
            HorizontalMetrics {
                advance_width: read_u16_be(self.data, self.hmtx + 4 * g)?,
                left_side_bearing: read_i16_be(self.data, self.hmtx + 4 * g + 2)?,
            }
        } else {
            HorizontalMetrics {
                advance_width: read_u16_be(self.data, self.hmtx + 4 * (long_count - 1))?,
                left_side_bearing: read_i16_be(
                    self.data,
                    self.hmtx + 4 * long_count + 2 * (g - long_count),
                )?,
            }
        };
        Ok(metrics)
    }

    pub fn vertical_metrics(&self) -> Result<VerticalMetrics, FontError> {
        Ok(VerticalMetrics {
            ascent: read_i16_be(self.data, self.hhea + 4)?,
            descent: read_i16_be(self.data, self.hhea + 6)?,
            line_gap: read_i16_be(self.data, self.hhea + 8)?,
        })
    }

    /// Scale factor mapping font units to pixels so that ascent - descent
    /// spans `pixel_height` pixels.
    pub fn scale_for_pixel_height(&self, pixel_height: f32) -> Result<f32, FontError> {
        let v = self.vertical_metrics()?;
        let font_height = v.ascent as i32 - v.descent as i32;
        if font_height == 0 {
            return Err(FontError::DegenerateMetrics("ascent equals descent"));
        }
        Ok(pixel_height / font_height as f32)
    }

    /// Kerning adjustment in font units from the `kern` format 0 subtable.
    ///
    /// Returns 0 when the font has no `kern` table, when the first subtable is
    /// not a horizontal format 0 table, or when the pair is not listed.
    pub fn kerning(&self, glyph_1: GlyphIndex, glyph_2: GlyphIndex) -> Result<i32, FontError> {
        let Some(kern) = self.kern else {
            return Ok(0);
        };
        let data = self.data;

        if read_u16_be(data, kern + 2)? < 1 {
            return Ok(0);
        }
        // coverage: horizontal bit set, format 0 in the high byte
        if read_u16_be(data, kern + 8)? != 1 {
            return Ok(0);
        }

        let needle = (glyph_1 as u32) << 16 | glyph_2 as u32;
        let mut lo = 0i64;
        let mut hi = read_u16_be(data, kern + 10)? as i64 - 1;
        while lo <= hi {
            let mid = (lo + hi) / 2;
            let pair = kern + 18 + mid as usize * 6;
            let straw = read_u32_be(data, pair)?;
            if needle < straw {
                hi = mid - 1;
            } else if needle > straw {
                lo = mid + 1;
            } else {
                return Ok(read_i16_be(data, pair + 4)? as i32);
            }
        }
        Ok(0)
    }
}

/// Picks the cmap subtable used for lookups: Microsoft Unicode BMP/full
/// first, then the Unicode platform. Among those, a format 4 subtable wins
/// over other formats.
fn select_cmap_subtable(data: &[u8], cmap: usize) -> Result<usize, FontError> {
    let subtable_count = read_u16_be(data, cmap + 2)? as usize;

    let mut candidates = Vec::new();
    for i in 0..subtable_count {
        let record = cmap + 4 + 8 * i;
        let platform_id = read_u16_be(data, record)?;
        let encoding_id = read_u16_be(data, record + 2)?;
        let rank = match (platform_id, encoding_id) {
            (PLATFORM_MICROSOFT, MS_ENCODING_UNICODE_BMP | MS_ENCODING_UNICODE_FULL) => 0,
            (PLATFORM_UNICODE, _) => 1,
            _ => continue,
        };
        let offset = cmap + read_u32_be(data, record + 4)? as usize;
        let format = read_u16_be(data, offset)?;
        candidates.push((format != CMAP_FORMAT_SEGMENT_MAPPING, rank, offset));
    }

    candidates.sort_by_key(|&(not_format_4, rank, _)| (not_format_4, rank));
    match candidates.first() {
        Some(&(not_format_4, _, offset)) => {
            if not_format_4 {
                warn!("no format 4 cmap subtable; every codepoint will map to the missing glyph");
            }
            Ok(offset)
        }
        None => Err(FontError::NoUnicodeCmap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{FontBuilder, SynthGlyph};

    fn square(size: i16) -> SynthGlyph {
        SynthGlyph::new(600, 10).contour(&[(0, 0), (size, 0), (size, size), (0, size)])
    }

    fn two_glyph_font() -> Vec<u8> {
        FontBuilder::new(800, -200, 50)
            .glyph(SynthGlyph::empty(500, 0))
            .glyph(square(100))
            .glyph(SynthGlyph::empty(250, 0))
            .map('A' as u32, 1)
            .map(' ' as u32, 2)
            .build()
    }

    #[test]
    fn test_font_parser_cmap() {
        let font = two_glyph_font();
        let index = FontIndex::parse(&font).expect("parser must succeed");
        assert_eq!(index.glyph_count(), 3);
        assert_eq!(index.glyph_index_for_codepoint('A' as u32).unwrap(), 1);
        assert_eq!(index.glyph_index_for_codepoint(' ' as u32).unwrap(), 2);
        assert_eq!(index.glyph_index_for_codepoint('B' as u32).unwrap(), 0);
        assert_eq!(index.glyph_index_for_codepoint(0xFFFF).unwrap(), 0);
        assert_eq!(index.glyph_index_for_codepoint(0x1F600).unwrap(), 0);
    }

    fn cmap_font(builder: FontBuilder) -> Vec<u8> {
        builder
            .glyph(SynthGlyph::empty(500, 0))
            .glyph(square(100))
            .glyph(square(50))
            .map('A' as u32, 1)
            .build()
    }

    #[test]
    fn unicode_platform_subtable_is_a_fallback() {
        let font = cmap_font(FontBuilder::new(800, -200, 0).cmap_records(&[(0, 3)]));
        let index = FontIndex::parse(&font).unwrap();
        assert_eq!(index.glyph_index_for_codepoint('A' as u32).unwrap(), 1);
    }

    #[test]
    fn microsoft_subtable_wins_over_unicode_platform() {
        // the platform 0 record comes first in the table and maps 'A' elsewhere
        for encoding in [1, 10] {
            let font = cmap_font(
                FontBuilder::new(800, -200, 0)
                    .extra_cmap(0, 3, &[('A' as u32, 2)])
                    .cmap_records(&[(3, encoding)]),
            );
            let index = FontIndex::parse(&font).unwrap();
            assert_eq!(index.glyph_index_for_codepoint('A' as u32).unwrap(), 1);
        }
    }

    #[test]
    fn font_without_unicode_subtable_is_rejected() {
        let font = cmap_font(FontBuilder::new(800, -200, 0).cmap_records(&[(1, 0)]));
        assert_eq!(FontIndex::parse(&font).err(), Some(FontError::NoUnicodeCmap));
    }

    #[test]
    fn cmap_glyph_id_array_lookup() {
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 0))
            .glyph(square(10))
            .glyph(square(20))
            .map('x' as u32, 2)
            .map('y' as u32, 1)
            .use_glyph_id_array(true)
            .build();
        let index = FontIndex::parse(&font).unwrap();
        assert_eq!(index.glyph_index_for_codepoint('x' as u32).unwrap(), 2);
        assert_eq!(index.glyph_index_for_codepoint('y' as u32).unwrap(), 1);
        assert_eq!(index.glyph_index_for_codepoint('z' as u32).unwrap(), 0);
    }

    #[test]
    fn missing_required_table_is_reported() {
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 0))
            .without_table(*b"hmtx")
            .build();
        assert_eq!(
            FontIndex::parse(&font).unwrap_err(),
            FontError::MissingTable("hmtx")
        );
    }

    #[test]
    fn bad_loca_format_is_rejected() {
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 0))
            .loca_format_value(2)
            .build();
        assert_eq!(
            FontIndex::parse(&font).unwrap_err(),
            FontError::UnsupportedLocaFormat(2)
        );
    }

    #[test]
    fn truncated_font_fails_without_panicking() {
        let font = two_glyph_font();
        assert!(FontIndex::parse(&font[..20]).is_err());
    }

    #[test]
    fn glyph_boxes_and_bitmap_boxes() {
        for long in [false, true] {
            let font = FontBuilder::new(800, -200, 0)
                .glyph(SynthGlyph::empty(500, 0))
                .glyph(SynthGlyph::new(600, 0).contour(&[(-5, -7), (95, -7), (95, 193)]))
                .long_loca(long)
                .build();
            let index = FontIndex::parse(&font).unwrap();
            assert_eq!(index.glyph_box(0).unwrap(), None);
            assert_eq!(
                index.glyph_box(1).unwrap(),
                Some(GlyphBox { x_min: -5, y_min: -7, x_max: 95, y_max: 193 })
            );
            let bb = index.glyph_bitmap_box(1, 0.1).unwrap();
            assert_eq!(bb, BitmapBox { x0: -1, y0: -1, x1: 10, y1: 20 });
            assert_eq!((bb.width(), bb.height()), (11, 21));
            assert!(index.glyph_bitmap_box(0, 0.1).unwrap().is_empty());
            assert!(index.glyph_box(2).is_err());
        }
    }

    #[test]
    fn horizontal_metrics_clamp_to_last_long_entry() {
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 1))
            .glyph(SynthGlyph::empty(600, 2))
            .glyph(SynthGlyph::empty(600, 3))
            .glyph(SynthGlyph::empty(600, -4))
            .build();
        let index = FontIndex::parse(&font).unwrap();
        // trailing glyphs with the same advance are stored as bearings only
        assert_eq!(
            index.horizontal_metrics(0).unwrap(),
            HorizontalMetrics { advance_width: 500, left_side_bearing: 1 }
        );
        assert_eq!(
            index.horizontal_metrics(3).unwrap(),
            HorizontalMetrics { advance_width: 600, left_side_bearing: -4 }
        );
    }

    #[test]
    fn scale_uses_ascent_minus_descent() {
        let font = two_glyph_font();
        let index = FontIndex::parse(&font).unwrap();
        assert_eq!(index.scale_for_pixel_height(100.0).unwrap(), 0.1);
        assert_eq!(
            index.vertical_metrics().unwrap(),
            VerticalMetrics { ascent: 800, descent: -200, line_gap: 50 }
        );
    }

    #[test]
    fn kerning_binary_search() {
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 0))
            .glyph(square(10))
            .glyph(square(20))
            .glyph(square(30))
            .kern(1, 2, -40)
            .kern(2, 1, 15)
            .kern(3, 3, -1)
            .build();
        let index = FontIndex::parse(&font).unwrap();
        assert!(index.has_kerning());
        assert_eq!(index.kerning(1, 2).unwrap(), -40);
        assert_eq!(index.kerning(2, 1).unwrap(), 15);
        assert_eq!(index.kerning(3, 3).unwrap(), -1);
        assert_eq!(index.kerning(1, 3).unwrap(), 0);
    }

    #[test]
    fn kerning_without_table_is_zero() {
        let font = two_glyph_font();
        let index = FontIndex::parse(&font).unwrap();
        assert!(!index.has_kerning());
        assert_eq!(index.kerning(1, 1).unwrap(), 0);
    }
}
