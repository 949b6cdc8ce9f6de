
use std::fmt::{Debug, Formatter};

/// A rectangle given by its top-left corner and its size.
///
/// This is the geometry the blit engine consumes, so unlike a region box it
/// carries a width and height rather than a second corner.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Debug for Rect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rect")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates the rectangle spanned by two corners. Returns `None` if the
    /// second corner lies above or to the left of the first.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        if x2 < x1 || y2 < y1 {
            return None;
        }
        Some(Self::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub const fn x2(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub const fn y2(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub const fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Moves the rectangle to `(x, y)` keeping its size.
    pub const fn at(&self, x: i32, y: i32) -> Self {
        Self::new(x, y, self.width, self.height)
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());
        Self::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
    }

    /// The smallest rectangle containing both. Empty rectangles are ignored.
    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.x2().max(other.x2());
        let y2 = self.y2().max(other.y2());
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// The way a copy between two rectangles has to be executed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CopyPath {
    Hardware,
    Software,
}

/// Returns whether the two spans `[a, a + len]` and `[b, b + len]` are
/// strictly separated.
///
/// Touching spans are not considered disjoint.
pub fn spans_disjoint(a: i32, b: i32, len: i32) -> bool {
    let a = a as i64;
    let b = b as i64;
    let len = len as i64;
    a + len < b || b + len < a
}

/// Decides whether copying `src` to `(dst_x, dst_y)` can be handed to the
/// blit engine.
///
/// The engine reads and writes through separate pipelines, so a copy
/// within one surface is only safe if source and destination are separated
/// on both axes. Everything else on a single surface goes through the CPU.
pub fn copy_path(same_surface: bool, src: Rect, dst_x: i32, dst_y: i32) -> CopyPath {
    if !same_surface {
        return CopyPath::Hardware;
    }
    let vertical = spans_disjoint(src.y, dst_y, src.height);
    let horizontal = spans_disjoint(src.x, dst_x, src.width);
    if vertical && horizontal {
        CopyPath::Hardware
    } else {
        CopyPath::Software
    }
}
