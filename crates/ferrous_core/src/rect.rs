//! Rectangle types used across packing, atlas building and archive writing.

use glam::Vec2;

/// Integer rect in texel space, `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    /// True when the two rects share at least one texel.
    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Grows the rect by `amount` on every side, saturating at zero.
    pub fn inflate(&self, amount: u32) -> PixelRect {
        let x = self.x.saturating_sub(amount);
        let y = self.y.saturating_sub(amount);
        PixelRect {
            x,
            y,
            w: self.right() + amount - x,
            h: self.bottom() + amount - y,
        }
    }

    /// Normalizes the rect against a `width`×`height` canvas. Empty rects map
    /// to the zero UV rect.
    pub fn to_uv(&self, width: u32, height: u32) -> UvRect {
        if self.is_empty() || width == 0 || height == 0 {
            return UvRect::ZERO;
        }
        let dims = Vec2::new(width as f32, height as f32);
        UvRect {
            min: Vec2::new(self.x as f32, self.y as f32) / dims,
            max: Vec2::new(self.right() as f32, self.bottom() as f32) / dims,
        }
    }
}

/// Normalized `[0,1]` texture rect.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UvRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl UvRect {
    pub const ZERO: UvRect = UvRect {
        min: Vec2::ZERO,
        max: Vec2::ZERO,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uv_of_placed_rect_is_normalized() {
        let uv = PixelRect::new(8, 16, 8, 16).to_uv(32, 32);
        assert_eq!(uv.min, Vec2::new(0.25, 0.5));
        assert_eq!(uv.max, Vec2::new(0.5, 1.0));
    }

    #[test]
    fn empty_rect_maps_to_zero_uv() {
        assert!(PixelRect::new(3, 3, 0, 5).to_uv(32, 32).is_zero());
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = PixelRect::new(0, 0, 4, 4);
        let b = PixelRect::new(4, 0, 4, 4);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&PixelRect::new(3, 3, 2, 2)));
    }

    #[test]
    fn inflate_saturates_at_origin() {
        let r = PixelRect::new(1, 0, 2, 2).inflate(1);
        assert_eq!(r, PixelRect::new(0, 0, 4, 3));
    }
}
