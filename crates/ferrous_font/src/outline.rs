//! Decoding of simple `glyf` outlines into contours of on/off-curve points.

use crate::binary_reader::{read_i16_be, read_u16_be, BeCursor};
use crate::error::FontError;
use crate::index::{FontIndex, GlyphIndex};

const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
/// Short vector: sign bit (set = positive). Long vector: "same as previous".
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlinePoint {
    pub x: i16,
    pub y: i16,
    pub on_curve: bool,
}

impl OutlinePoint {
    pub const fn on(x: i16, y: i16) -> Self {
        Self { x, y, on_curve: true }
    }

    pub const fn off(x: i16, y: i16) -> Self {
        Self { x, y, on_curve: false }
    }
}

/// One closed loop of points, in the order the font stores them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<OutlinePoint>,
}

/// All contours of a single glyph, in font units (y up).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphOutline {
    pub contours: Vec<Contour>,
}

impl GlyphOutline {
    pub fn is_empty(&self) -> bool {
        self.contours.iter().all(|c| c.points.is_empty())
    }

    pub fn point_count(&self) -> usize {
        self.contours.iter().map(|c| c.points.len()).sum()
    }
}

/// Decodes one simple glyph.
///
/// Glyphs without an outline, and glyphs with zero contours, yield an empty
/// outline. Composite glyphs fail with [`FontError::UnsupportedGlyph`].
pub fn extract_outline(font: &FontIndex<'_>, glyph: GlyphIndex) -> Result<GlyphOutline, FontError> {
    let Some(range) = font.glyph_location(glyph)? else {
        return Ok(GlyphOutline::default());
    };
    let data = font.data();
    let g = range.start;

    let contour_count = read_i16_be(data, g)?;
    if contour_count < 0 {
        return Err(FontError::UnsupportedGlyph(glyph));
    }
    if contour_count == 0 {
        return Ok(GlyphOutline::default());
    }
    let contour_count = contour_count as usize;

    let mut end_points = Vec::with_capacity(contour_count);
    let mut previous: Option<u16> = None;
    for i in 0..contour_count {
        let end = read_u16_be(data, g + 10 + 2 * i)?;
        if previous.is_some_and(|p| end <= p) {
            return Err(FontError::MalformedGlyph {
                glyph,
                reason: "contour end points are not increasing",
            });
        }
        previous = Some(end);
        end_points.push(end as usize);
    }
    let point_count = end_points.last().map_or(0, |&e| e + 1);

    let instruction_len = read_u16_be(data, g + 10 + 2 * contour_count)? as usize;
    let mut cursor = BeCursor::new(data, g + 10 + 2 * contour_count + 2 + instruction_len);

    let mut flags = Vec::with_capacity(point_count);
    while flags.len() < point_count {
        let flag = cursor.read_u8()?;
        flags.push(flag);
        if flag & REPEAT != 0 {
            let repeat = cursor.read_u8()? as usize;
            if flags.len() + repeat > point_count {
                return Err(FontError::MalformedGlyph {
                    glyph,
                    reason: "flag repeat runs past the last point",
                });
            }
            flags.extend(std::iter::repeat(flag).take(repeat));
        }
    }

    let xs = read_coordinates(&mut cursor, &flags, X_SHORT, X_SAME_OR_POSITIVE)?;
    let ys = read_coordinates(&mut cursor, &flags, Y_SHORT, Y_SAME_OR_POSITIVE)?;

    let mut contours = Vec::with_capacity(contour_count);
    let mut start = 0;
    for end in end_points {
        let points = (start..=end)
            .map(|i| OutlinePoint {
                x: xs[i],
                y: ys[i],
                on_curve: flags[i] & ON_CURVE != 0,
            })
            .collect();
        contours.push(Contour { points });
        start = end + 1;
    }
    Ok(GlyphOutline { contours })
}

/// Reads one axis of delta-encoded coordinates and accumulates them into
/// absolute positions.
fn read_coordinates(
    cursor: &mut BeCursor<'_>,
    flags: &[u8],
    short_bit: u8,
    same_or_positive_bit: u8,
) -> Result<Vec<i16>, FontError> {
    let mut value: i16 = 0;
    let mut out = Vec::with_capacity(flags.len());
    for &flag in flags {
        if flag & short_bit != 0 {
            let delta = cursor.read_u8()? as i16;
            if flag & same_or_positive_bit != 0 {
                value = value.wrapping_add(delta);
            } else {
                value = value.wrapping_sub(delta);
            }
        } else if flag & same_or_positive_bit == 0 {
            value = value.wrapping_add(cursor.read_i16()?);
        }
        out.push(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{FontBuilder, SynthGlyph};

    #[test]
    fn decodes_mixed_short_long_and_repeated_points() {
        // 300 forces a long x delta, the repeated y keeps runs going
        let points = [(0, 0), (300, 0), (300, 0), (300, 10), (0, 10), (-20, -200)];
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 0))
            .glyph(SynthGlyph::new(500, 0).contour(&points))
            .build();
        let index = FontIndex::parse(&font).unwrap();
        let outline = extract_outline(&index, 1).unwrap();
        assert_eq!(outline.contours.len(), 1);
        let decoded: Vec<_> = outline.contours[0].points.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(decoded, points);
        assert!(outline.contours[0].points.iter().all(|p| p.on_curve));
    }

    #[test]
    fn keeps_on_and_off_curve_flags_per_contour() {
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 0))
            .glyph(
                SynthGlyph::new(500, 0)
                    .points(&[
                        OutlinePoint::on(0, 0),
                        OutlinePoint::off(50, 100),
                        OutlinePoint::on(100, 0),
                    ])
                    .contour(&[(10, 10), (20, 10), (20, 20)]),
            )
            .build();
        let index = FontIndex::parse(&font).unwrap();
        let outline = extract_outline(&index, 1).unwrap();
        assert_eq!(outline.contours.len(), 2);
        assert_eq!(
            outline.contours[0].points,
            vec![
                OutlinePoint::on(0, 0),
                OutlinePoint::off(50, 100),
                OutlinePoint::on(100, 0)
            ]
        );
        assert_eq!(outline.contours[1].points.len(), 3);
        assert_eq!(outline.point_count(), 6);
    }

    #[test]
    fn empty_glyph_has_empty_outline() {
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 0))
            .glyph(SynthGlyph::empty(250, 0))
            .build();
        let index = FontIndex::parse(&font).unwrap();
        let outline = extract_outline(&index, 1).unwrap();
        assert!(outline.is_empty());
    }

    #[test]
    fn composite_glyph_is_rejected() {
        let font = FontBuilder::new(800, -200, 0)
            .glyph(SynthGlyph::empty(500, 0))
            .glyph(SynthGlyph::composite(500))
            .build();
        let index = FontIndex::parse(&font).unwrap();
        let err = extract_outline(&index, 1).unwrap_err();
        assert_eq!(err, FontError::UnsupportedGlyph(1));
        assert!(!err.is_format_error());
    }
}
