//! TrueType glyph rasterization for the Ferrous asset baker.
//!
//! The pipeline for one glyph is: [`FontIndex`] lookup, [`extract_outline`],
//! [`tessellate`], then [`rasterize`] in bitmap space. [`rasterize_glyph`]
//! runs all of it.

pub mod binary_reader;
pub mod error;
pub mod index;
pub mod outline;
pub mod path;
pub mod raster;
#[cfg(any(test, feature = "test-support"))]
pub mod synth;
pub mod tables;

pub use error::FontError;
pub use index::{
    BitmapBox, FontIndex, GlyphBox, GlyphIndex, HorizontalMetrics, LocaFormat, VerticalMetrics,
};
pub use outline::{extract_outline, Contour, GlyphOutline, OutlinePoint};
pub use path::{tessellate, tessellate_quad, GlyphPath, QuadSubdivision, MAX_SUBDIVISION_DEPTH};
pub use raster::{rasterize, rasterize_into, to_bitmap_space, AlphaBitmap, RasterScratch};

/// Curve tolerance used when nothing else is configured, in pixels.
pub const DEFAULT_FLATNESS_PX: f32 = 0.35;

/// Rasterizes one glyph at `scale` (pixels per font unit).
///
/// `flatness_px` is the curve tolerance in output pixels. Glyphs without ink
/// return an empty box and a 0x0 bitmap.
pub fn rasterize_glyph(
    font: &FontIndex<'_>,
    glyph: GlyphIndex,
    scale: f32,
    flatness_px: f32,
) -> Result<(BitmapBox, AlphaBitmap), FontError> {
    let bbox = font.glyph_bitmap_box(glyph, scale)?;
    let mut bitmap = AlphaBitmap::new(bbox.width(), bbox.height());
    let mut scratch = RasterScratch::new();
    rasterize_glyph_into(font, glyph, scale, flatness_px, &mut bitmap.pixels, &mut scratch)?;
    Ok((bbox, bitmap))
}

/// Like [`rasterize_glyph`], writing into a caller-owned buffer of at least
/// `width * height` bytes of the glyph's bitmap box.
pub fn rasterize_glyph_into(
    font: &FontIndex<'_>,
    glyph: GlyphIndex,
    scale: f32,
    flatness_px: f32,
    out: &mut [u8],
    scratch: &mut RasterScratch,
) -> Result<BitmapBox, FontError> {
    let bbox = font.glyph_bitmap_box(glyph, scale)?;
    if bbox.is_empty() {
        return Ok(bbox);
    }
    let outline = extract_outline(font, glyph)?;
    // tolerance is compared in font units
    let path = tessellate(&outline, flatness_px / scale);
    let path = to_bitmap_space(&path, scale, &bbox);
    rasterize_into(&path, bbox.width(), bbox.height(), out, scratch);
    Ok(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{FontBuilder, SynthGlyph};

    fn square_font() -> Vec<u8> {
        FontBuilder::new(10, 0, 0)
            .glyph(SynthGlyph::empty(10, 0))
            .glyph(SynthGlyph::new(10, 0).contour(&[(0, 0), (10, 0), (10, 10), (0, 10)]))
            .glyph(SynthGlyph::empty(5, 0))
            .map('A' as u32, 1)
            .map('B' as u32, 2)
            .build()
    }

    #[test]
    fn square_glyph_fills_its_box() {
        let data = square_font();
        let font = FontIndex::parse(&data).unwrap();
        let scale = font.scale_for_pixel_height(10.0).unwrap();
        assert_eq!(scale, 1.0);

        let glyph = font.glyph_index_for_codepoint('A' as u32).unwrap();
        let (bbox, bitmap) = rasterize_glyph(&font, glyph, scale, DEFAULT_FLATNESS_PX).unwrap();
        assert_eq!((bbox.width(), bbox.height()), (10, 10));
        assert_eq!(bitmap.covered_count(), 100);
    }

    #[test]
    fn scaled_square_still_fills_exactly() {
        let data = square_font();
        let font = FontIndex::parse(&data).unwrap();
        let (bbox, bitmap) = rasterize_glyph(&font, 1, 2.0, DEFAULT_FLATNESS_PX).unwrap();
        assert_eq!(bbox, BitmapBox { x0: 0, y0: 0, x1: 20, y1: 20 });
        assert_eq!(bitmap.covered_count(), 400);
    }

    #[test]
    fn empty_glyph_rasterizes_to_nothing() {
        let data = square_font();
        let font = FontIndex::parse(&data).unwrap();
        let glyph = font.glyph_index_for_codepoint('B' as u32).unwrap();
        let (bbox, bitmap) = rasterize_glyph(&font, glyph, 1.0, DEFAULT_FLATNESS_PX).unwrap();
        assert!(bbox.is_empty());
        assert!(bitmap.pixels.is_empty());
    }

    #[test]
    fn curved_glyph_is_filled_below_the_arch() {
        // a dome: flat base, quadratic top peaking at y = 50
        let data = FontBuilder::new(100, 0, 0)
            .glyph(SynthGlyph::empty(10, 0))
            .glyph(SynthGlyph::new(100, 0).points(&[
                OutlinePoint::on(0, 0),
                OutlinePoint::on(100, 0),
                OutlinePoint::off(50, 100),
            ]))
            .build();
        let font = FontIndex::parse(&data).unwrap();
        let (bbox, bitmap) = rasterize_glyph(&font, 1, 0.1, 0.05).unwrap();
        assert_eq!((bbox.width(), bbox.height()), (10, 10));
        // the base row is solid, the corners of the top row are empty
        let bottom = bbox.height() - 1;
        assert!((1..9).all(|x| bitmap.get(x, bottom) != 0));
        assert_eq!(bitmap.get(0, 0), 0);
        assert_eq!(bitmap.get(9, 0), 0);
        assert!(bitmap.covered_count() < 100);
    }
}
