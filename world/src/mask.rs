//! Occupancy bitmaps used for exact-shape collision tests.

use bitvec::prelude::*;

/// Boolean coverage map with one bit per sprite pixel.
///
/// A set bit marks a non-transparent pixel. Two masks overlap only when at
/// least one pixel is set in both after applying an offset, so bounding-box
/// contact alone never counts as a hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: BitVec,
}

impl Mask {
    /// Creates a fully transparent mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            bits: BitVec::repeat(false, len),
        }
    }

    /// Creates a mask whose pixels are set wherever `covered` returns `true`.
    #[must_use]
    pub fn from_fn<F>(width: u32, height: u32, mut covered: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if covered(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    /// Width of the mask in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the mask in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the pixel is covered. Pixels outside the mask are not.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.index(x, y).map_or(false, |index| self.bits[index])
    }

    /// Sets or clears a pixel. Writes outside the mask are ignored.
    pub fn set(&mut self, x: u32, y: u32, covered: bool) {
        if let Some(index) = self.index(x, y) {
            self.bits.set(index, covered);
        }
    }

    /// Number of covered pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Returns a copy mirrored across the horizontal axis.
    #[must_use]
    pub fn flipped_vertically(&self) -> Self {
        let bottom = self.height.saturating_sub(1);
        Self::from_fn(self.width, self.height, |x, y| self.get(x, bottom - y))
    }

    /// Finds the first pixel covered by both masks.
    ///
    /// `offset` places `other`'s top-left corner relative to this mask's
    /// top-left corner. The returned coordinate is expressed in this mask's
    /// space, scanning rows top to bottom.
    #[must_use]
    pub fn overlap(&self, other: &Mask, offset: (i32, i32)) -> Option<(u32, u32)> {
        let (dx, dy) = (i64::from(offset.0), i64::from(offset.1));
        let x_start = dx.max(0);
        let x_end = (dx + i64::from(other.width)).min(i64::from(self.width));
        let y_start = dy.max(0);
        let y_end = (dy + i64::from(other.height)).min(i64::from(self.height));
        if x_start >= x_end || y_start >= y_end {
            return None;
        }

        for y in y_start..y_end {
            for x in x_start..x_end {
                let (own_x, own_y) = (x as u32, y as u32);
                let (other_x, other_y) = ((x - dx) as u32, (y - dy) as u32);
                if self.get(own_x, own_y) && other.get(other_x, other_y) {
                    return Some((own_x, own_y));
                }
            }
        }
        None
    }

    /// Reports whether the masks share any covered pixel at `offset`.
    #[must_use]
    pub fn overlaps(&self, other: &Mask, offset: (i32, i32)) -> bool {
        self.overlap(other, offset).is_some()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }
}
