//! Packed RGBA atlas holding every rasterized glyph and every sprite.

use std::path::Path;

use ferrous_asset_types::MAX_CODEPOINT;
use ferrous_core::{Arena, PixelRect, UvRect};
use ferrous_font::{
    rasterize_glyph_into, BitmapBox, FontError, FontIndex, GlyphIndex, RasterScratch,
    DEFAULT_FLATNESS_PX,
};
use glam::Vec2;
use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::rect_pack::{pack, PackError, PackRect, SortHeuristic};
use crate::sprite::{DecodeError, SpriteSource};

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("atlas canvas must not be empty ({width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("font `{font}`: pixel height {pixel_height} must be positive")]
    BadPixelHeight { font: String, pixel_height: f32 },
    #[error("font `{font}`: codepoint {codepoint:#X} is beyond U+10FFFF")]
    CodepointOutOfRange { font: String, codepoint: u32 },
    #[error("font `{font}`: {source}")]
    Font {
        font: String,
        #[source]
        source: FontError,
    },
    #[error("font `{font}`, codepoint U+{codepoint:04X}: {source}")]
    Glyph {
        font: String,
        codepoint: u32,
        #[source]
        source: FontError,
    },
    #[error("sprite `{sprite}`: {source}")]
    Sprite {
        sprite: String,
        #[source]
        source: DecodeError,
    },
    #[error("sprite `{sprite}` decoded to {actual:?}, expected {expected:?}")]
    SpriteSizeChanged {
        sprite: String,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error(transparent)]
    Pack(#[from] PackError),
}

#[derive(Debug, Clone)]
struct FontRequest {
    name: String,
    data: Vec<u8>,
    pixel_height: f32,
    codepoints: Vec<u32>,
}

#[derive(Debug, Clone)]
struct SpriteRequest {
    name: String,
    source: SpriteSource,
}

/// Back-reference from a packed rect to the asset it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RectSource {
    Glyph { font: usize, slot: usize },
    Sprite(usize),
}

/// One rasterized codepoint. Metrics are scaled to a 1 pixel line height.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasGlyph {
    pub codepoint: u32,
    pub glyph: GlyphIndex,
    /// Pixel box at the font's bake height; empty for glyphs without ink.
    pub bitmap_box: BitmapBox,
    pub rect: PixelRect,
    pub uv: UvRect,
    pub box_min: Vec2,
    pub box_max: Vec2,
    pub advance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtlasFont {
    pub name: String,
    pub pixel_height: f32,
    /// Pixels per font unit at `pixel_height`.
    pub scale: f32,
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
    /// Sorted by codepoint.
    pub glyphs: Vec<AtlasGlyph>,
    /// Row-major `glyphs.len()²` matrix: advance of the row glyph plus the
    /// kerning against the column glyph.
    pub kerning: Vec<f32>,
}

impl AtlasFont {
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    pub fn highest_codepoint(&self) -> Option<u32> {
        self.glyphs.last().map(|g| g.codepoint)
    }

    pub fn glyph(&self, codepoint: u32) -> Option<&AtlasGlyph> {
        self.glyphs
            .binary_search_by_key(&codepoint, |g| g.codepoint)
            .ok()
            .map(|i| &self.glyphs[i])
    }

    /// Pen advance from glyph record `first` to glyph record `second`.
    pub fn advance_between(&self, first: usize, second: usize) -> f32 {
        self.kerning[first * self.glyphs.len() + second]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtlasSprite {
    pub name: String,
    pub rect: PixelRect,
    pub uv: UvRect,
}

#[derive(Debug, Clone)]
pub struct Atlas {
    pub width: u32,
    pub height: u32,
    /// RGBA8, `width * height * 4` bytes, row 0 at the top.
    pub pixels: Vec<u8>,
    pub fonts: Vec<AtlasFont>,
    pub sprites: Vec<AtlasSprite>,
}

impl Atlas {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Writes the canvas as a PNG, for eyeballing the packing.
    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        image::save_buffer(
            path,
            &self.pixels,
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )
    }
}

/// Collects fonts and sprites, then packs and renders them into one canvas.
///
/// ```ignore
/// let mut builder = AtlasBuilder::new(512, 512).with_padding(1);
/// let font = builder.push_font("ui", ttf_bytes, 32.0, 32..=126);
/// let atlas = builder.build()?;
/// ```
#[derive(Debug, Clone)]
pub struct AtlasBuilder {
    width: u32,
    height: u32,
    padding: u32,
    flatness_px: f32,
    sort: SortHeuristic,
    fonts: Vec<FontRequest>,
    sprites: Vec<SpriteRequest>,
}

impl AtlasBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            padding: 1,
            flatness_px: DEFAULT_FLATNESS_PX,
            sort: SortHeuristic::Height,
            fonts: Vec::new(),
            sprites: Vec::new(),
        }
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Curve tolerance in output pixels.
    pub fn with_flatness(mut self, flatness_px: f32) -> Self {
        self.flatness_px = flatness_px;
        self
    }

    pub fn with_sort(mut self, sort: SortHeuristic) -> Self {
        self.sort = sort;
        self
    }

    /// Registers a font; returns its index in [`Atlas::fonts`]. Duplicate
    /// codepoints are merged.
    pub fn push_font(
        &mut self,
        name: impl Into<String>,
        data: Vec<u8>,
        pixel_height: f32,
        codepoints: impl IntoIterator<Item = u32>,
    ) -> usize {
        let mut codepoints: Vec<u32> = codepoints.into_iter().collect();
        codepoints.sort_unstable();
        codepoints.dedup();
        self.fonts.push(FontRequest {
            name: name.into(),
            data,
            pixel_height,
            codepoints,
        });
        self.fonts.len() - 1
    }

    /// Registers a sprite; returns its index in [`Atlas::sprites`].
    pub fn push_sprite(&mut self, name: impl Into<String>, source: impl Into<SpriteSource>) -> usize {
        self.sprites.push(SpriteRequest {
            name: name.into(),
            source: source.into(),
        });
        self.sprites.len() - 1
    }

    pub fn build(&self) -> Result<Atlas, AtlasError> {
        if self.width == 0 || self.height == 0 {
            return Err(AtlasError::EmptyCanvas {
                width: self.width,
                height: self.height,
            });
        }

        let mut indices = Vec::with_capacity(self.fonts.len());
        let mut fonts = Vec::with_capacity(self.fonts.len());
        let mut rects = Vec::new();

        for (font_id, request) in self.fonts.iter().enumerate() {
            // codepoints are sorted, so the last one is the highest
            if let Some(&codepoint) = request.codepoints.last().filter(|&&cp| cp > MAX_CODEPOINT) {
                return Err(AtlasError::CodepointOutOfRange {
                    font: request.name.clone(),
                    codepoint,
                });
            }
            let index = FontIndex::parse(&request.data).map_err(|source| AtlasError::Font {
                font: request.name.clone(),
                source,
            })?;
            let font = measure_font(&index, request)?;
            for (slot, glyph) in font.glyphs.iter().enumerate() {
                rects.push(PackRect::new(
                    glyph.bitmap_box.width(),
                    glyph.bitmap_box.height(),
                    RectSource::Glyph { font: font_id, slot },
                ));
            }
            indices.push(index);
            fonts.push(font);
        }

        let mut sprites = Vec::with_capacity(self.sprites.len());
        for (sprite_id, request) in self.sprites.iter().enumerate() {
            let (w, h) = request
                .source
                .dimensions()
                .map_err(|source| AtlasError::Sprite {
                    sprite: request.name.clone(),
                    source,
                })?;
            trace!("sprite `{}` is {}x{}", request.name, w, h);
            rects.push(PackRect::new(w, h, RectSource::Sprite(sprite_id)));
            sprites.push(AtlasSprite {
                name: request.name.clone(),
                rect: PixelRect::new(0, 0, w, h),
                uv: UvRect::ZERO,
            });
        }

        info!(
            "packing {} rect(s) from {} font(s) and {} sprite(s) into {}x{}",
            rects.len(),
            fonts.len(),
            sprites.len(),
            self.width,
            self.height
        );
        pack(&mut rects, self.padding, self.width, self.height, self.sort)?;

        let mut pixels = vec![0u8; self.width as usize * self.height as usize * 4];
        let mut raster = RasterScratch::new();
        let mut coverage: Arena<u8> = Arena::new();

        for rect in &rects {
            let placement = rect.placement();
            match rect.user {
                RectSource::Glyph { font, slot } => {
                    let scale = fonts[font].scale;
                    let glyph = &mut fonts[font].glyphs[slot];
                    glyph.rect = placement;
                    glyph.uv = placement.to_uv(self.width, self.height);
                    if placement.is_empty() {
                        continue;
                    }
                    let request = &self.fonts[font];
                    coverage
                        .scope(|scratch| -> Result<(), FontError> {
                            let range = scratch.alloc(placement.w as usize * placement.h as usize, 0);
                            rasterize_glyph_into(
                                &indices[font],
                                glyph.glyph,
                                scale,
                                self.flatness_px,
                                scratch.get_mut(range.clone()),
                                &mut raster,
                            )?;
                            blit_alpha(&mut pixels, self.width, placement, scratch.get(range));
                            Ok(())
                        })
                        .map_err(|source| AtlasError::Glyph {
                            font: request.name.clone(),
                            codepoint: glyph.codepoint,
                            source,
                        })?;
                }
                RectSource::Sprite(id) => {
                    let sprite = &mut sprites[id];
                    sprite.rect = placement;
                    sprite.uv = placement.to_uv(self.width, self.height);
                    if placement.is_empty() {
                        continue;
                    }
                    let request = &self.sprites[id];
                    let image = request.source.decode().map_err(|source| AtlasError::Sprite {
                        sprite: request.name.clone(),
                        source,
                    })?;
                    if image.dimensions() != (placement.w, placement.h) {
                        return Err(AtlasError::SpriteSizeChanged {
                            sprite: request.name.clone(),
                            expected: (placement.w, placement.h),
                            actual: image.dimensions(),
                        });
                    }
                    blit_rgba(&mut pixels, self.width, placement, image.as_raw());
                }
            }
            debug!("{:?} -> {:?}", rect.user, placement);
        }

        Ok(Atlas {
            width: self.width,
            height: self.height,
            pixels,
            fonts,
            sprites,
        })
    }
}

/// Looks up every requested codepoint and computes its box, advance and
/// kerning, without rasterizing anything.
fn measure_font(index: &FontIndex<'_>, request: &FontRequest) -> Result<AtlasFont, AtlasError> {
    let font_err = |source| AtlasError::Font {
        font: request.name.clone(),
        source,
    };
    if !(request.pixel_height > 0.0 && request.pixel_height.is_finite()) {
        return Err(AtlasError::BadPixelHeight {
            font: request.name.clone(),
            pixel_height: request.pixel_height,
        });
    }

    let scale = index.scale_for_pixel_height(request.pixel_height).map_err(font_err)?;
    let unit_scale = index.scale_for_pixel_height(1.0).map_err(font_err)?;
    let metrics = index.vertical_metrics().map_err(font_err)?;

    let mut glyphs = Vec::with_capacity(request.codepoints.len());
    let mut advances = Vec::with_capacity(request.codepoints.len());
    for &codepoint in &request.codepoints {
        let glyph_err = |source| AtlasError::Glyph {
            font: request.name.clone(),
            codepoint,
            source,
        };
        let glyph = index.glyph_index_for_codepoint(codepoint).map_err(glyph_err)?;
        if glyph == 0 {
            warn!(
                "font `{}` has no glyph for U+{:04X}; using the missing glyph",
                request.name, codepoint
            );
        }
        let bitmap_box = index.glyph_bitmap_box(glyph, scale).map_err(glyph_err)?;
        let hmetrics = index.horizontal_metrics(glyph).map_err(glyph_err)?;

        advances.push(hmetrics.advance_width as f32);
        glyphs.push(AtlasGlyph {
            codepoint,
            glyph,
            bitmap_box,
            rect: PixelRect::default(),
            uv: UvRect::ZERO,
            box_min: Vec2::new(bitmap_box.x0 as f32, bitmap_box.y0 as f32) / request.pixel_height,
            box_max: Vec2::new(bitmap_box.x1 as f32, bitmap_box.y1 as f32) / request.pixel_height,
            advance: hmetrics.advance_width as f32 * unit_scale,
        });
    }

    let n = glyphs.len();
    let mut kerning = Vec::with_capacity(n * n);
    for (row, first) in glyphs.iter().enumerate() {
        for second in &glyphs {
            let kern = index.kerning(first.glyph, second.glyph).map_err(font_err)?;
            kerning.push((advances[row] + kern as f32) * unit_scale);
        }
    }

    debug!(
        "font `{}`: {} glyph(s) at {}px (scale {})",
        request.name, n, request.pixel_height, scale
    );
    Ok(AtlasFont {
        name: request.name.clone(),
        pixel_height: request.pixel_height,
        scale,
        ascent: metrics.ascent as f32 * unit_scale,
        descent: metrics.descent as f32 * unit_scale,
        line_gap: metrics.line_gap as f32 * unit_scale,
        glyphs,
        kerning,
    })
}

/// Copies single-channel coverage into the canvas as `[a, a, a, a]`.
fn blit_alpha(canvas: &mut [u8], canvas_width: u32, rect: PixelRect, alpha: &[u8]) {
    let w = rect.w as usize;
    for (row, src) in alpha.chunks_exact(w).enumerate() {
        let start = ((rect.y as usize + row) * canvas_width as usize + rect.x as usize) * 4;
        for (dst, &a) in canvas[start..start + w * 4].chunks_exact_mut(4).zip(src) {
            dst.copy_from_slice(&[a; 4]);
        }
    }
}

fn blit_rgba(canvas: &mut [u8], canvas_width: u32, rect: PixelRect, rgba: &[u8]) {
    let row_bytes = rect.w as usize * 4;
    for (row, src) in rgba.chunks_exact(row_bytes).enumerate() {
        let start = ((rect.y as usize + row) * canvas_width as usize + rect.x as usize) * 4;
        canvas[start..start + row_bytes].copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::encode_png;
    use ferrous_font::synth::{FontBuilder, SynthGlyph};

    fn square_font() -> Vec<u8> {
        FontBuilder::new(10, 0, 0)
            .glyph(SynthGlyph::empty(10, 0))
            .glyph(SynthGlyph::new(12, 0).contour(&[(0, 0), (10, 0), (10, 10), (0, 10)]))
            .glyph(SynthGlyph::empty(4, 0))
            .map('A' as u32, 1)
            .map(' ' as u32, 2)
            .kern(1, 1, -2)
            .build()
    }

    fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let pixels: Vec<u8> = rgba.iter().copied().cycle().take((width * height * 4) as usize).collect();
        encode_png(width, height, &pixels).unwrap()
    }

    #[test]
    fn glyph_and_sprite_land_in_their_rects() {
        let mut builder = AtlasBuilder::new(32, 32).with_padding(1);
        builder.push_font("square", square_font(), 10.0, ['A' as u32, ' ' as u32]);
        builder.push_sprite("red", solid_png(8, 8, [255, 0, 0, 255]));
        let atlas = builder.build().unwrap();

        let font = &atlas.fonts[0];
        let a = font.glyph('A' as u32).unwrap();
        assert_eq!((a.rect.w, a.rect.h), (10, 10));
        assert_eq!(atlas.pixel(a.rect.x, a.rect.y), [255; 4]);
        assert_eq!(atlas.pixel(a.rect.right() - 1, a.rect.bottom() - 1), [255; 4]);

        let space = font.glyph(' ' as u32).unwrap();
        assert!(space.rect.is_empty());
        assert!(space.uv.is_zero());

        let red = &atlas.sprites[0];
        assert_eq!(atlas.pixel(red.rect.x + 3, red.rect.y + 3), [255, 0, 0, 255]);
        assert!(!red.rect.inflate(1).intersects(&a.rect.inflate(1)));

        for uv in [a.uv, red.uv] {
            assert!(uv.min.x >= 0.0 && uv.min.y >= 0.0);
            assert!(uv.min.x < uv.max.x && uv.min.y < uv.max.y);
            assert!(uv.max.x <= 1.0 && uv.max.y <= 1.0);
        }
    }

    #[test]
    fn font_metrics_are_scaled_to_one_pixel() {
        let mut builder = AtlasBuilder::new(32, 32);
        builder.push_font("square", square_font(), 10.0, ['A' as u32, ' ' as u32, 'A' as u32]);
        let atlas = builder.build().unwrap();
        let font = &atlas.fonts[0];

        assert_eq!(font.glyph_count(), 2);
        assert_eq!(font.highest_codepoint(), Some('A' as u32));
        assert_eq!((font.ascent, font.descent), (1.0, 0.0));

        // glyphs are sorted: ' ' is record 0, 'A' record 1
        assert_eq!(font.glyphs[1].advance, 1.2);
        assert_eq!(font.advance_between(1, 1), 1.0);
        assert_eq!(font.advance_between(1, 0), 1.2);
        assert_eq!(font.glyphs[1].box_max, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn too_small_canvas_reports_pack_error() {
        let mut builder = AtlasBuilder::new(8, 8);
        builder.push_font("square", square_font(), 10.0, ['A' as u32]);
        assert!(matches!(builder.build(), Err(AtlasError::Pack(_))));
    }

    #[test]
    fn codepoint_past_unicode_range_is_rejected() {
        let mut builder = AtlasBuilder::new(32, 32);
        builder.push_font("square", square_font(), 10.0, ['A' as u32, u32::MAX]);
        match builder.build() {
            Err(AtlasError::CodepointOutOfRange { font, codepoint }) => {
                assert_eq!(font, "square");
                assert_eq!(codepoint, u32::MAX);
            }
            other => panic!("expected an out of range codepoint, got {other:?}"),
        }
    }

    #[test]
    fn broken_font_names_the_font() {
        let mut builder = AtlasBuilder::new(32, 32);
        builder.push_font("broken", vec![0; 8], 10.0, ['A' as u32]);
        let err = builder.build().unwrap_err();
        assert!(err.to_string().starts_with("font `broken`"));
    }

    #[test]
    fn composite_glyph_names_the_codepoint() {
        let font = FontBuilder::new(10, 0, 0)
            .glyph(SynthGlyph::empty(10, 0))
            .glyph(SynthGlyph::composite(10))
            .map('Z' as u32, 1)
            .build();
        let mut builder = AtlasBuilder::new(64, 64);
        builder.push_font("composite", font, 10.0, ['Z' as u32]);
        match builder.build() {
            Err(AtlasError::Glyph { codepoint, source, .. }) => {
                assert_eq!(codepoint, 'Z' as u32);
                assert_eq!(source, FontError::UnsupportedGlyph(1));
            }
            other => panic!("expected a glyph error, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_sprite_names_the_sprite() {
        let mut builder = AtlasBuilder::new(32, 32);
        builder.push_sprite("junk", b"junk".to_vec());
        let err = builder.build().unwrap_err();
        assert!(matches!(err, AtlasError::Sprite { ref sprite, .. } if sprite == "junk"));
    }

    #[test]
    fn empty_canvas_is_rejected() {
        assert!(matches!(
            AtlasBuilder::new(0, 16).build(),
            Err(AtlasError::EmptyCanvas { .. })
        ));
    }
}
