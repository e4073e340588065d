//! Greedy guillotine rectangle packer.
//!
//! Rects are visited in descending order of a sort key and dropped into the
//! most recently created free node that fits. The node is then split into at
//! most two smaller free nodes. No backtracking: a rect that does not fit
//! fails the whole pack.

use std::fmt;
use std::str::FromStr;

use ferrous_core::PixelRect;
use log::{debug, trace};
use thiserror::Error;

/// Ordering applied before packing; larger keys are packed first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortHeuristic {
    #[default]
    Height,
    Width,
    Area,
    Perimeter,
    BiggerSide,
    /// `max(w,h) / min(w,h) * w * h`: long thin rects first.
    Pathological,
}

impl SortHeuristic {
    pub const ALL: [SortHeuristic; 6] = [
        SortHeuristic::Height,
        SortHeuristic::Width,
        SortHeuristic::Area,
        SortHeuristic::Perimeter,
        SortHeuristic::BiggerSide,
        SortHeuristic::Pathological,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SortHeuristic::Height => "height",
            SortHeuristic::Width => "width",
            SortHeuristic::Area => "area",
            SortHeuristic::Perimeter => "perimeter",
            SortHeuristic::BiggerSide => "bigger-side",
            SortHeuristic::Pathological => "pathological",
        }
    }

    fn key(&self, w: u32, h: u32) -> f64 {
        let (w, h) = (w as f64, h as f64);
        match self {
            SortHeuristic::Height => h,
            SortHeuristic::Width => w,
            SortHeuristic::Area => w * h,
            SortHeuristic::Perimeter => w + h,
            SortHeuristic::BiggerSide => w.max(h),
            SortHeuristic::Pathological => {
                let min = w.min(h);
                if min == 0.0 {
                    0.0
                } else {
                    w.max(h) / min * w * h
                }
            }
        }
    }
}

impl fmt::Display for SortHeuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown sort heuristic `{0}`")]
pub struct UnknownHeuristic(pub String);

impl FromStr for SortHeuristic {
    type Err = UnknownHeuristic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortHeuristic::ALL
            .into_iter()
            .find(|h| h.name() == s)
            .ok_or_else(|| UnknownHeuristic(s.to_owned()))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PackError {
    #[error(
        "no free space for rect #{index} ({width}x{height}, padding {padding}) \
         in a {canvas_width}x{canvas_height} canvas"
    )]
    NoFit {
        index: usize,
        width: u32,
        height: u32,
        padding: u32,
        canvas_width: u32,
        canvas_height: u32,
    },
}

/// A rect to place. `user` links the rect back to whatever produced it and
/// is never inspected by the packer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRect<T> {
    pub w: u32,
    pub h: u32,
    /// Top-left corner, written by [`pack`].
    pub x: u32,
    pub y: u32,
    pub user: T,
}

impl<T> PackRect<T> {
    pub fn new(w: u32, h: u32, user: T) -> Self {
        Self { w, h, x: 0, y: 0, user }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn placement(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.w, self.h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeNode {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl FreeNode {
    fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

/// Places every non-empty rect inside a `width`×`height` canvas, keeping
/// `padding` texels free on each side of it.
///
/// The slice keeps its order; only `x`/`y` are written. Empty rects are left
/// at the origin.
pub fn pack<T>(
    rects: &mut [PackRect<T>],
    padding: u32,
    width: u32,
    height: u32,
    heuristic: SortHeuristic,
) -> Result<(), PackError> {
    let mut order: Vec<usize> = (0..rects.len()).collect();
    // stable: equal keys keep their input order
    order.sort_by(|&a, &b| {
        let ka = heuristic.key(rects[a].w, rects[a].h);
        let kb = heuristic.key(rects[b].w, rects[b].h);
        kb.total_cmp(&ka)
    });

    let mut free = vec![FreeNode { x: 0, y: 0, w: width, h: height }];
    let mut placed = 0usize;

    for index in order {
        let rect = &mut rects[index];
        if rect.is_empty() {
            continue;
        }
        let no_fit = || PackError::NoFit {
            index,
            width: rect.w,
            height: rect.h,
            padding,
            canvas_width: width,
            canvas_height: height,
        };

        let padded = padding.checked_mul(2);
        let (Some(pw), Some(ph)) = (
            padded.and_then(|p| rect.w.checked_add(p)),
            padded.and_then(|p| rect.h.checked_add(p)),
        ) else {
            return Err(no_fit());
        };

        let Some(chosen) = free.iter().rposition(|n| pw <= n.w && ph <= n.h) else {
            return Err(no_fit());
        };
        let node = free.swap_remove(chosen);

        match (node.w == pw, node.h == ph) {
            (true, true) => {}
            (true, false) => free.push(FreeNode {
                x: node.x,
                y: node.y + ph,
                w: node.w,
                h: node.h - ph,
            }),
            (false, true) => free.push(FreeNode {
                x: node.x + pw,
                y: node.y,
                w: node.w - pw,
                h: node.h,
            }),
            (false, false) => {
                let right = FreeNode {
                    x: node.x + pw,
                    y: node.y,
                    w: node.w - pw,
                    h: ph,
                };
                let down = FreeNode {
                    x: node.x,
                    y: node.y + ph,
                    w: node.w,
                    h: node.h - ph,
                };
                if right.area() > down.area() {
                    free.extend([right, down]);
                } else {
                    free.extend([down, right]);
                }
            }
        }

        rect.x = node.x + padding;
        rect.y = node.y + padding;
        placed += 1;
        trace!("placed rect #{} {}x{} at ({}, {})", index, rect.w, rect.h, rect.x, rect.y);
    }

    debug!(
        "packed {} rect(s) into {}x{} by {}, {} free node(s) left",
        placed,
        width,
        height,
        heuristic,
        free.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(rects: &[PackRect<usize>], padding: u32, width: u32, height: u32) {
        let placed: Vec<_> = rects.iter().filter(|r| !r.is_empty()).collect();
        for r in &placed {
            assert!(r.x >= padding && r.y >= padding, "{r:?} inside the left/top padding");
            assert!(r.x + r.w + padding <= width, "{r:?} overflows the canvas width");
            assert!(r.y + r.h + padding <= height, "{r:?} overflows the canvas height");
        }
        for (i, a) in placed.iter().enumerate() {
            for b in &placed[i + 1..] {
                let pa = a.placement().inflate(padding);
                let pb = b.placement().inflate(padding);
                assert!(!pa.intersects(&pb), "{a:?} overlaps {b:?}");
            }
        }
    }

    fn sample_rects() -> Vec<PackRect<usize>> {
        [
            (10, 30), (25, 5), (12, 12), (7, 19), (30, 2), (3, 3), (16, 8), (9, 14), (0, 5),
            (20, 20), (1, 1), (5, 11),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (w, h))| PackRect::new(w, h, i))
        .collect()
    }

    #[test]
    fn no_overlap_for_every_heuristic() {
        for heuristic in SortHeuristic::ALL {
            let mut rects = sample_rects();
            pack(&mut rects, 1, 96, 96, heuristic).unwrap();
            assert_valid(&rects, 1, 96, 96);
        }
    }

    #[test]
    fn packing_is_deterministic() {
        for heuristic in SortHeuristic::ALL {
            let mut a = sample_rects();
            let mut b = sample_rects();
            pack(&mut a, 2, 128, 128, heuristic).unwrap();
            pack(&mut b, 2, 128, 128, heuristic).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn input_order_is_preserved() {
        let mut rects = sample_rects();
        pack(&mut rects, 0, 64, 64, SortHeuristic::Area).unwrap();
        assert!(rects.iter().enumerate().all(|(i, r)| r.user == i));
    }

    #[test]
    fn tallest_rect_goes_first_into_the_corner() {
        let mut rects = vec![PackRect::new(4, 4, 0), PackRect::new(4, 8, 1)];
        pack(&mut rects, 1, 32, 32, SortHeuristic::Height).unwrap();
        assert_eq!((rects[1].x, rects[1].y), (1, 1));
    }

    #[test]
    fn exact_fit_fills_the_canvas() {
        // four quadrants leave nothing behind
        let mut rects: Vec<_> = (0..4).map(|i| PackRect::new(8, 8, i)).collect();
        pack(&mut rects, 0, 16, 16, SortHeuristic::Height).unwrap();
        assert_valid(&rects, 0, 16, 16);
        let mut corners: Vec<_> = rects.iter().map(|r| (r.x, r.y)).collect();
        corners.sort();
        assert_eq!(corners, vec![(0, 0), (0, 8), (8, 0), (8, 8)]);
    }

    #[test]
    fn empty_rects_are_skipped() {
        let mut rects = vec![PackRect::new(0, 10, 0), PackRect::new(10, 0, 1)];
        pack(&mut rects, 5, 1, 1, SortHeuristic::Height).unwrap();
        assert_eq!(rects[0].placement(), PixelRect::new(0, 0, 0, 10));
    }

    #[test]
    fn too_small_canvas_fails() {
        let mut rects = vec![PackRect::new(10, 10, 0), PackRect::new(10, 10, 1)];
        let err = pack(&mut rects, 1, 12, 20, SortHeuristic::Height).unwrap_err();
        assert!(matches!(err, PackError::NoFit { width: 10, height: 10, padding: 1, .. }));
    }

    #[test]
    fn padding_counts_on_both_sides() {
        let mut rects = vec![PackRect::new(8, 8, 0)];
        assert!(pack(&mut rects, 1, 10, 10, SortHeuristic::Height).is_ok());
        assert!(pack(&mut rects, 2, 10, 10, SortHeuristic::Height).is_err());
    }

    #[test]
    fn heuristic_names_round_trip() {
        for h in SortHeuristic::ALL {
            assert_eq!(h.name().parse::<SortHeuristic>().unwrap(), h);
        }
        assert!("diagonal".parse::<SortHeuristic>().is_err());
    }

    #[test]
    fn pathological_prefers_thin_rects() {
        let h = SortHeuristic::Pathological;
        assert!(h.key(30, 2) > h.key(7, 7));
        assert_eq!(h.key(0, 7), 0.0);
    }
}
