//! Scanline fill of flattened glyph paths into 8-bit coverage bitmaps.
//!
//! Uses an active-edge list per row and the non-zero winding rule. Coverage
//! is binary (0 or 255); there is no anti-aliasing.

use ferrous_core::Arena;
use glam::Vec2;

use crate::index::BitmapBox;
use crate::path::GlyphPath;

/// Value written into covered pixels.
pub const COVERED: u8 = 255;

/// Single-channel coverage bitmap, row 0 at the top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlphaBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl AlphaBitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn covered_count(&self) -> usize {
        self.pixels.iter().filter(|&&a| a != 0).count()
    }
}

/// Non-horizontal polygon edge with `p0.y < p1.y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub p0: Vec2,
    pub p1: Vec2,
    /// Set when the endpoints were swapped to run top to bottom.
    pub inverted: bool,
    /// x of the intersection with the current scanline.
    pub x: f32,
}

impl Edge {
    fn new(a: Vec2, b: Vec2) -> Option<Self> {
        if a.y == b.y {
            return None;
        }
        let (p0, p1, inverted) = if a.y > b.y { (b, a, true) } else { (a, b, false) };
        Some(Self { p0, p1, inverted, x: p0.x })
    }

    fn winding(&self) -> i32 {
        if self.inverted {
            1
        } else {
            -1
        }
    }

    fn x_at(&self, y: f32) -> f32 {
        let t = (y - self.p0.y) / (self.p1.y - self.p0.y);
        self.p0.x + t * (self.p1.x - self.p0.x)
    }
}

/// Reusable edge storage. Both arenas are reverted after every call so a
/// single scratch can serve a whole atlas build.
#[derive(Debug, Default)]
pub struct RasterScratch {
    edges: Arena<Edge>,
    active: Arena<usize>,
}

impl RasterScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rasterizes a path already expressed in bitmap space (x right, y down,
/// origin at the top-left corner of the bitmap).
pub fn rasterize(path: &GlyphPath, width: u32, height: u32) -> AlphaBitmap {
    let mut bitmap = AlphaBitmap::new(width, height);
    let mut scratch = RasterScratch::new();
    rasterize_into(path, width, height, &mut bitmap.pixels, &mut scratch);
    bitmap
}

/// Like [`rasterize`], writing into a caller-owned `width * height` buffer.
/// The buffer is not cleared first.
pub fn rasterize_into(
    path: &GlyphPath,
    width: u32,
    height: u32,
    out: &mut [u8],
    scratch: &mut RasterScratch,
) {
    debug_assert!(out.len() >= width as usize * height as usize);

    let edge_mark = scratch.edges.mark();
    let active_mark = scratch.active.mark();

    let first = scratch.edges.len();
    for contour in path.contours() {
        let n = contour.len();
        for i in 0..n {
            if let Some(edge) = Edge::new(contour[i], contour[(i + 1) % n]) {
                scratch.edges.push(edge);
            }
        }
    }
    let edge_range = first..scratch.edges.len();
    scratch
        .edges
        .get_mut(edge_range.clone())
        .sort_by(|a, b| a.p0.y.total_cmp(&b.p0.y));

    let active_start = scratch.active.len();
    for y in 0..height {
        let yf = y as f32;
        let edges = scratch.edges.get_mut(edge_range.clone());

        scratch.active.revert(active_mark);
        for (i, edge) in edges.iter_mut().enumerate() {
            // sorted by top y: nothing further down can be active yet
            if edge.p0.y > yf {
                break;
            }
            if yf < edge.p1.y {
                edge.x = edge.x_at(yf);
                scratch.active.push(i);
            }
        }

        let active_range = active_start..scratch.active.len();
        let active = scratch.active.get_mut(active_range);
        active.sort_by(|&a, &b| edges[a].x.total_cmp(&edges[b].x));

        let row = &mut out[(y * width) as usize..((y + 1) * width) as usize];
        let mut crossings = 0;
        for pair in active.windows(2) {
            let left = &edges[pair[0]];
            let right = &edges[pair[1]];
            crossings += left.winding();
            if crossings != 0 {
                fill_span(row, left.x, right.x, width);
            }
        }
    }

    scratch.active.revert(active_mark);
    scratch.edges.revert(edge_mark);
}

fn fill_span(row: &mut [u8], x_left: f32, x_right: f32, width: u32) {
    let start = (x_left.floor().max(0.0) as u32).min(width) as usize;
    let end = (x_right.floor().max(0.0) as u32).min(width) as usize;
    if start < end {
        row[start..end].fill(COVERED);
    }
}

/// Maps a font-unit path into the bitmap space of `bbox` at `scale`:
/// scaled, shifted so the box's minimum corner is at the origin, and flipped
/// so y grows downwards.
pub fn to_bitmap_space(path: &GlyphPath, scale: f32, bbox: &BitmapBox) -> GlyphPath {
    let height = bbox.height() as f32;
    let origin = Vec2::new(bbox.x0 as f32, bbox.y0 as f32);
    GlyphPath {
        vertices: path
            .vertices
            .iter()
            .map(|&v| {
                let p = v * scale - origin;
                Vec2::new(p.x, height - p.y)
            })
            .collect(),
        contour_lengths: path.contour_lengths.clone(),
    }
}
