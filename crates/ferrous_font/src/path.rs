//! Flattening of glyph outlines into closed polylines.
//!
//! TrueType contours encode quadratic curves implicitly: an off-curve point
//! is a control point, and two consecutive off-curve points imply an
//! on-curve point halfway between them.

use glam::Vec2;
use log::warn;

use crate::outline::{Contour, GlyphOutline, OutlinePoint};

/// Subdivision depth at which a quadratic segment is emitted as-is.
pub const MAX_SUBDIVISION_DEPTH: u32 = 16;

/// Closed polylines, one per non-empty contour, in font units. Each contour
/// is implicitly closed: its last vertex connects back to its first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphPath {
    pub vertices: Vec<Vec2>,
    pub contour_lengths: Vec<usize>,
}

impl GlyphPath {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contour_count(&self) -> usize {
        self.contour_lengths.len()
    }

    /// Iterates the vertex slice of each contour.
    pub fn contours(&self) -> impl Iterator<Item = &[Vec2]> + '_ {
        let mut start = 0;
        self.contour_lengths.iter().map(move |&len| {
            let slice = &self.vertices[start..start + len];
            start += len;
            slice
        })
    }
}

/// What happened while flattening one quadratic segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadSubdivision {
    pub splits: u32,
    pub depth_capped: bool,
}

/// Flattens every contour of `outline`. `flatness` is the tolerated
/// deviation between curve and chord, in font units.
pub fn tessellate(outline: &GlyphOutline, flatness: f32) -> GlyphPath {
    let mut path = GlyphPath::default();
    let mut capped = 0usize;
    for contour in &outline.contours {
        let before = path.vertices.len();
        capped += tessellate_contour(contour, flatness, &mut path.vertices);
        let len = path.vertices.len() - before;
        if len > 0 {
            path.contour_lengths.push(len);
        }
    }
    if capped > 0 {
        warn!(
            "{} curve segment(s) hit the subdivision depth limit of {}; flatness {} is too fine",
            capped, MAX_SUBDIVISION_DEPTH, flatness
        );
    }
    path
}

/// Returns the number of segments whose subdivision was cut short.
fn tessellate_contour(contour: &Contour, flatness: f32, out: &mut Vec<Vec2>) -> usize {
    let points = with_implicit_points(&contour.points);
    let Some(first_on) = points.iter().position(|p| p.on_curve) else {
        return 0;
    };
    let n = points.len();
    let at = |i: usize| points[(first_on + i) % n];

    let start = out.len();
    let mut capped = 0;
    let mut current = at(0).pos;
    out.push(current);

    let mut i = 1;
    while i < n {
        let p = at(i);
        if p.on_curve {
            current = p.pos;
            out.push(current);
            i += 1;
        } else {
            // every control point is followed by an on-curve point here
            let end = at(i + 1).pos;
            let stats = tessellate_quad(current, p.pos, end, flatness, out);
            if stats.depth_capped {
                capped += 1;
            }
            current = end;
            i += 2;
        }
    }

    // a curve that closes the contour lands back on the start vertex
    if out.len() - start > 1 && out.last() == out.get(start) {
        out.pop();
    }
    capped
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PathPoint {
    pos: Vec2,
    on_curve: bool,
}

impl From<OutlinePoint> for PathPoint {
    fn from(p: OutlinePoint) -> Self {
        Self {
            pos: Vec2::new(p.x as f32, p.y as f32),
            on_curve: p.on_curve,
        }
    }
}

/// Converts the contour to float and inserts the on-curve midpoint between
/// every pair of consecutive off-curve points (including the pair wrapping
/// around the end).
fn with_implicit_points(points: &[OutlinePoint]) -> Vec<PathPoint> {
    let n = points.len();
    let mut out = Vec::with_capacity(n * 2);
    for (i, &p) in points.iter().enumerate() {
        let next = points[(i + 1) % n];
        let (p, next) = (PathPoint::from(p), PathPoint::from(next));
        out.push(p);
        if !p.on_curve && !next.on_curve {
            out.push(PathPoint {
                pos: (p.pos + next.pos) * 0.5,
                on_curve: true,
            });
        }
    }
    out
}

/// Flattens one quadratic segment starting at `p0` (already emitted) and
/// appends the vertices after it, ending with `p2`.
pub fn tessellate_quad(
    p0: Vec2,
    p1: Vec2,
    p2: Vec2,
    flatness: f32,
    out: &mut Vec<Vec2>,
) -> QuadSubdivision {
    let mut stats = QuadSubdivision::default();
    subdivide(p0, p1, p2, flatness * flatness, 0, out, &mut stats);
    stats
}

fn subdivide(
    p0: Vec2,
    p1: Vec2,
    p2: Vec2,
    flatness_sq: f32,
    depth: u32,
    out: &mut Vec<Vec2>,
    stats: &mut QuadSubdivision,
) {
    let mid = (p0 + 2.0 * p1 + p2) * 0.25;
    let deviation = (p0 + p2) * 0.5 - mid;

    if deviation.length_squared() <= flatness_sq {
        out.push(p2);
        return;
    }
    if depth >= MAX_SUBDIVISION_DEPTH {
        stats.depth_capped = true;
        out.push(p2);
        return;
    }

    stats.splits += 1;
    subdivide(p0, (p0 + p1) * 0.5, mid, flatness_sq, depth + 1, out, stats);
    subdivide(mid, (p1 + p2) * 0.5, p2, flatness_sq, depth + 1, out, stats);
}
