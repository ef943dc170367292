//! Axis-aligned rectangles, the only value type stored in the tree.
//!
//! A rectangle carries an identifier next to its four coordinates. At leaf
//! level the identifier names a data object, at internal levels it is the
//! block id of the child node whose entries the rectangle covers.
//!
//! Geometric measures (area, margin, overlap) are always computed in `f64`
//! so that integer coordinates cannot overflow while the split heuristic
//! multiplies extents.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

/// Numeric coordinate type usable in a [`Rectangle`].
pub trait Coord:
    Copy + PartialOrd + Debug + Display + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Factor applied to coordinates before they are snapped onto the
    /// integer Hilbert grid used by the bulk loader.
    const HILBERT_SCALE: f64;

    /// Number of bytes one coordinate occupies in an encoded block.
    const ENCODED_LEN: usize;

    fn to_f64(self) -> f64;
}

macro_rules! impl_coord {
    ($ty:ty, $scale:expr) => {
        impl Coord for $ty {
            const HILBERT_SCALE: f64 = $scale;
            const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_coord!(f64, 1_000_000.0);
impl_coord!(f32, 1_000_000.0);
impl_coord!(i64, 1.0);
impl_coord!(i32, 1.0);

#[inline]
fn min_of<C: Coord>(a: C, b: C) -> C {
    if b < a {
        b
    } else {
        a
    }
}

#[inline]
fn max_of<C: Coord>(a: C, b: C) -> C {
    if b > a {
        b
    } else {
        a
    }
}

/// An axis-aligned rectangle tagged with an identifier.
///
/// The constructor normalises the corners, so `xlo <= xhi` and
/// `ylo <= yhi` hold for every value of this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle<C = f64> {
    id: u64,
    xlo: C,
    ylo: C,
    xhi: C,
    yhi: C,
}

impl<C: Coord> Rectangle<C> {
    /// Creates a rectangle from two opposite corners given in any order.
    pub fn new(id: u64, x1: C, y1: C, x2: C, y2: C) -> Self {
        Self {
            id,
            xlo: min_of(x1, x2),
            ylo: min_of(y1, y2),
            xhi: max_of(x1, x2),
            yhi: max_of(y1, y2),
        }
    }

    /// A degenerate rectangle covering a single point.
    pub fn point(id: u64, x: C, y: C) -> Self {
        Self {
            id,
            xlo: x,
            ylo: y,
            xhi: x,
            yhi: y,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    /// Returns a copy carrying a different identifier.
    #[inline]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    #[inline]
    pub fn xlo(&self) -> C {
        self.xlo
    }

    #[inline]
    pub fn ylo(&self) -> C {
        self.ylo
    }

    #[inline]
    pub fn xhi(&self) -> C {
        self.xhi
    }

    #[inline]
    pub fn yhi(&self) -> C {
        self.yhi
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.xhi.to_f64() - self.xlo.to_f64()
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.yhi.to_f64() - self.ylo.to_f64()
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Half of the perimeter, the "margin" of the R*-tree split heuristic.
    #[inline]
    pub fn margin(&self) -> f64 {
        self.width() + self.height()
    }

    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xlo.to_f64() + self.xhi.to_f64()) / 2.0,
            (self.ylo.to_f64() + self.yhi.to_f64()) / 2.0,
        )
    }

    /// Squared distance between this rectangle's centre and `(x, y)`.
    #[inline]
    pub fn center_distance_sq(&self, x: f64, y: f64) -> f64 {
        let (cx, cy) = self.center();
        (cx - x) * (cx - x) + (cy - y) * (cy - y)
    }

    /// Closed-interval overlap of the x extents.
    #[inline]
    pub fn x_overlaps(&self, other: &Rectangle<C>) -> bool {
        self.xlo <= other.xhi && other.xlo <= self.xhi
    }

    /// Closed-interval overlap of the y extents.
    #[inline]
    pub fn y_overlaps(&self, other: &Rectangle<C>) -> bool {
        self.ylo <= other.yhi && other.ylo <= self.yhi
    }

    /// True if the rectangles share at least one point (borders included).
    #[inline]
    pub fn intersects(&self, other: &Rectangle<C>) -> bool {
        self.x_overlaps(other) && self.y_overlaps(other)
    }

    /// True if `other` lies completely inside this rectangle.
    #[inline]
    pub fn contains(&self, other: &Rectangle<C>) -> bool {
        self.xlo <= other.xlo && self.ylo <= other.ylo && other.xhi <= self.xhi && other.yhi <= self.yhi
    }

    /// Grows this rectangle so that it also covers `other`. The id is kept.
    pub fn extend(&mut self, other: &Rectangle<C>) {
        self.xlo = min_of(self.xlo, other.xlo);
        self.ylo = min_of(self.ylo, other.ylo);
        self.xhi = max_of(self.xhi, other.xhi);
        self.yhi = max_of(self.yhi, other.yhi);
    }

    /// Grows this rectangle so that it also covers the point `(x, y)`.
    pub fn extend_point(&mut self, x: C, y: C) {
        self.xlo = min_of(self.xlo, x);
        self.ylo = min_of(self.ylo, y);
        self.xhi = max_of(self.xhi, x);
        self.yhi = max_of(self.yhi, y);
    }

    /// Bounding box of both rectangles, tagged with this rectangle's id.
    pub fn union(&self, other: &Rectangle<C>) -> Rectangle<C> {
        let mut out = *self;
        out.extend(other);
        out
    }

    /// Area of the bounding box of `self` and `other`.
    pub fn extended_area(&self, other: &Rectangle<C>) -> f64 {
        self.union(other).area()
    }

    /// Area growth needed for this rectangle to cover `other`.
    pub fn enlargement(&self, other: &Rectangle<C>) -> f64 {
        self.extended_area(other) - self.area()
    }

    /// Area of the intersection, zero for disjoint rectangles.
    pub fn overlap_area(&self, other: &Rectangle<C>) -> f64 {
        if !self.intersects(other) {
            return 0.0;
        }
        let w = min_of(self.xhi, other.xhi).to_f64() - max_of(self.xlo, other.xlo).to_f64();
        let h = min_of(self.yhi, other.yhi).to_f64() - max_of(self.ylo, other.ylo).to_f64();
        w * h
    }

    /// Same corners, ignoring the identifier.
    pub fn same_extent(&self, other: &Rectangle<C>) -> bool {
        self.xlo == other.xlo && self.ylo == other.ylo && self.xhi == other.xhi && self.yhi == other.yhi
    }

    /// Bounding box of a non-empty slice, tagged with `id`.
    pub fn cover_of(id: u64, rects: &[Rectangle<C>]) -> Option<Rectangle<C>> {
        let (first, rest) = rects.split_first()?;
        let mut cover = first.with_id(id);
        for r in rest {
            cover.extend(r);
        }
        Some(cover)
    }
}

impl<C: Coord> Display for Rectangle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}, {}] x [{}, {}]",
            self.id, self.xlo, self.xhi, self.ylo, self.yhi
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_normalises_corners() {
        let r = Rectangle::new(1, 10.0, 8.0, 2.0, 4.0);
        assert_eq!(r.xlo(), 2.0);
        assert_eq!(r.ylo(), 4.0);
        assert_eq!(r.xhi(), 10.0);
        assert_eq!(r.yhi(), 8.0);
    }

    #[test]
    fn test_measures() {
        let r = Rectangle::new(1, 0.0, 0.0, 4.0, 2.0);
        assert_eq!(r.width(), 4.0);
        assert_eq!(r.height(), 2.0);
        assert_eq!(r.area(), 8.0);
        assert_eq!(r.margin(), 6.0);
        assert_eq!(r.center(), (2.0, 1.0));
    }

    #[test]
    fn test_intersects_is_closed() {
        let a = Rectangle::new(1, 0.0, 0.0, 1.0, 1.0);
        let touching = Rectangle::new(2, 1.0, 1.0, 2.0, 2.0);
        let apart = Rectangle::new(3, 1.5, 0.0, 2.0, 1.0);
        assert!(a.intersects(&touching));
        assert!(!a.intersects(&apart));
        assert!(a.y_overlaps(&apart));
        assert!(!a.x_overlaps(&apart));
    }

    #[test]
    fn test_extend_keeps_id() {
        let mut a = Rectangle::new(7, 0.0, 0.0, 1.0, 1.0);
        a.extend(&Rectangle::new(9, 3.0, -1.0, 4.0, 0.5));
        assert_eq!(a.id(), 7);
        assert_eq!(a, Rectangle::new(7, 0.0, -1.0, 4.0, 1.0));

        a.extend_point(-2.0, 5.0);
        assert_eq!(a, Rectangle::new(7, -2.0, -1.0, 4.0, 5.0));
    }

    #[test]
    fn test_extended_and_overlap_area() {
        let a = Rectangle::new(1, 0.0, 0.0, 2.0, 2.0);
        let b = Rectangle::new(2, 1.0, 1.0, 3.0, 3.0);
        assert_eq!(a.extended_area(&b), 9.0);
        assert_eq!(a.enlargement(&b), 5.0);
        assert_eq!(a.overlap_area(&b), 1.0);
        assert_eq!(a.overlap_area(&Rectangle::new(3, 5.0, 5.0, 6.0, 6.0)), 0.0);
    }

    #[test]
    fn test_equality_includes_id() {
        let a = Rectangle::new(1, 0.0, 0.0, 1.0, 1.0);
        let b = Rectangle::new(2, 0.0, 0.0, 1.0, 1.0);
        assert_ne!(a, b);
        assert!(a.same_extent(&b));
        assert_eq!(a, b.with_id(1));
    }

    #[test]
    fn test_integer_coordinates() {
        let a: Rectangle<i32> = Rectangle::new(1, 0, 0, 100_000, 100_000);
        assert_eq!(a.area(), 1e10);
        let b: Rectangle<i32> = Rectangle::point(2, 50_000, 50_000);
        assert!(a.contains(&b));
        assert_eq!(b.area(), 0.0);
    }

    #[test]
    fn test_cover_of() {
        let rects = vec![
            Rectangle::new(1, 0.0, 0.0, 1.0, 1.0),
            Rectangle::new(2, 5.0, 5.0, 6.0, 7.0),
        ];
        let cover = Rectangle::cover_of(99, &rects).unwrap();
        assert_eq!(cover, Rectangle::new(99, 0.0, 0.0, 6.0, 7.0));
        assert!(Rectangle::<f64>::cover_of(1, &[]).is_none());
    }
}
