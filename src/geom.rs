use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeomError {
    #[error("outline has fewer than 3 points")]
    TooFewPoints,
    #[error("outline is not rectilinear")]
    NotRectilinear,
    #[error("outline encloses no area")]
    EmptyRegion,
}

/// A point in layout database units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An immutable axis-aligned rectangle, `x0 <= x1` and `y0 <= y1`.
///
/// Doubles as the bounding box of arbitrary geometry and as the unit of
/// rectilinear region decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl BoundingBox {
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bb = Self::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bb.x0 = bb.x0.min(p.x);
            bb.y0 = bb.y0.min(p.y);
            bb.x1 = bb.x1.max(p.x);
            bb.y1 = bb.y1.max(p.y);
        }
        Some(bb)
    }

    /// Closed-interval overlap: shared edges and corners count.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }

    /// Positive-area overlap: shared edges and corners do not count.
    pub fn overlaps_area(&self, other: &Self) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// The intersection rectangle, if it has positive area.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.overlaps_area(other) {
            return None;
        }
        Some(Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        })
    }

    pub fn contains_point(&self, p: Point) -> bool {
        self.x0 <= p.x && p.x <= self.x1 && self.y0 <= p.y && p.y <= self.y1
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2, (self.y0 + self.y1) / 2)
    }

    /// Overlap with positive-length contact: rectangles that share area or a
    /// run of edge, but not a single corner point.
    fn touches(&self, other: &Self) -> bool {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        x0 <= x1 && y0 <= y1 && (x0 < x1 || y0 < y1)
    }
}

/// An immutable rectilinear region, stored as its decomposition into
/// axis-aligned rectangles (sorted by `x0`) plus a cached bounding box.
///
/// Geometric operations never mutate a `Poly`; every boolean result is a new
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly {
    rects: Vec<BoundingBox>,
    bbox: BoundingBox,
}

impl Poly {
    pub fn from_rect(rect: BoundingBox) -> Self {
        Self {
            rects: vec![rect],
            bbox: rect,
        }
    }

    /// Builds a region from a closed rectilinear outline. The outline may be
    /// given with or without a repeated closing point.
    pub fn from_outline(points: &[Point]) -> Result<Self, GeomError> {
        let mut pts = points;
        if pts.len() >= 2 && pts.first() == pts.last() {
            pts = &pts[..pts.len() - 1];
        }
        if pts.len() < 3 {
            return Err(GeomError::TooFewPoints);
        }
        let rects = decompose(pts)?;
        if rects.is_empty() {
            return Err(GeomError::EmptyRegion);
        }
        Self::from_rects(rects).ok_or(GeomError::EmptyRegion)
    }

    fn from_rects(mut rects: Vec<BoundingBox>) -> Option<Self> {
        if rects.is_empty() {
            return None;
        }
        rects.sort_by_key(|r| (r.x0, r.y0));
        let bbox = rects[1..]
            .iter()
            .fold(rects[0], |acc, r| acc.union(r));
        Some(Self { rects, bbox })
    }

    pub fn rects(&self) -> &[BoundingBox] {
        &self.rects
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    /// Whether `p` lies within the region (boundary inclusive).
    pub fn contains_point(&self, p: Point) -> bool {
        self.bbox.contains_point(p) && self.rects.iter().any(|r| r.contains_point(p))
    }

    /// Maps every rectangle corner through `f` and renormalizes. Exact for
    /// axis-preserving maps (translation, right-angle rotation, reflection).
    pub fn transformed(&self, f: impl Fn(Point) -> Point) -> Self {
        let rects = self
            .rects
            .iter()
            .map(|r| {
                let a = f(Point::new(r.x0, r.y0));
                let b = f(Point::new(r.x1, r.y1));
                BoundingBox::new(a.x, a.y, b.x, b.y)
            })
            .collect();
        Self::from_rects(rects).expect("non-empty region")
    }

    /// Exact positive-area intersection test. Regions that only share an edge
    /// or corner do not intersect.
    pub fn overlaps(&self, other: &Self) -> bool {
        if !self.bbox.overlaps(&other.bbox) {
            return false;
        }
        for a in &self.rects {
            for b in &other.rects {
                if a.overlaps_area(b) {
                    return true;
                }
            }
        }
        false
    }
}

/// Boolean AND of one region against a set of regions. Each connected piece
/// of the result becomes its own `Poly`.
pub fn and(a: &Poly, others: &[Poly]) -> Vec<Poly> {
    let mut pieces = Vec::new();
    for other in others {
        if !a.bbox.overlaps(&other.bbox) {
            continue;
        }
        for ra in a.rects() {
            for rb in other.rects() {
                if let Some(ix) = ra.intersection(rb) {
                    pieces.push(ix);
                }
            }
        }
    }
    merge_groups(pieces)
}

/// Boolean OR over a set of regions: connected input pieces are merged into
/// single result regions. Pieces sharing a run of edge belong together, as a
/// polygon-level union would fuse them; single-corner contact does not.
pub fn or(shapes: &[Poly]) -> Vec<Poly> {
    let rects = shapes.iter().flat_map(|s| s.rects().iter().copied()).collect();
    merge_groups(rects)
}

/// Groups rectangles into connected components under positive-length contact
/// and emits one `Poly` per component.
fn merge_groups(rects: Vec<BoundingBox>) -> Vec<Poly> {
    let n = rects.len();
    let mut group: Vec<usize> = (0..n).collect();

    fn root(group: &mut Vec<usize>, mut i: usize) -> usize {
        while group[i] != i {
            group[i] = group[group[i]];
            i = group[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if rects[i].touches(&rects[j]) {
                let ri = root(&mut group, i);
                let rj = root(&mut group, j);
                if ri != rj {
                    group[rj] = ri;
                }
            }
        }
    }

    let mut buckets: Vec<Vec<BoundingBox>> = vec![Vec::new(); n];
    for i in 0..n {
        let r = root(&mut group, i);
        buckets[r].push(rects[i]);
    }
    buckets.into_iter().filter_map(Poly::from_rects).collect()
}

/// Slab decomposition of a simple rectilinear outline: for each horizontal
/// slab between consecutive distinct y coordinates, the vertical edges that
/// span it are paired up even-odd to give the covered x intervals.
fn decompose(pts: &[Point]) -> Result<Vec<BoundingBox>, GeomError> {
    let n = pts.len();
    let mut v_edges = Vec::new();
    let mut ys = Vec::new();

    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        if a.x == b.x {
            if a.y != b.y {
                v_edges.push((a.x, a.y.min(b.y), a.y.max(b.y)));
            }
        } else if a.y == b.y {
            // Horizontal edge, contributes only its y level.
        } else {
            return Err(GeomError::NotRectilinear);
        }
        ys.push(a.y);
    }

    ys.sort_unstable();
    ys.dedup();

    let mut rects = Vec::new();
    for w in ys.windows(2) {
        let (slab_lo, slab_hi) = (w[0], w[1]);
        let mut xs: Vec<i64> = v_edges
            .iter()
            .filter(|&&(_, lo, hi)| lo <= slab_lo && hi >= slab_hi)
            .map(|&(x, _, _)| x)
            .collect();
        xs.sort_unstable();
        for pair in xs.chunks_exact(2) {
            if pair[0] < pair[1] {
                rects.push(BoundingBox::new(pair[0], slab_lo, pair[1], slab_hi));
            }
        }
    }

    Ok(rects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Poly {
        Poly::from_rect(BoundingBox::new(x0, y0, x1, y1))
    }

    #[test]
    fn test_bbox_overlap() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 5, 15, 15);
        let c = BoundingBox::new(11, 0, 20, 10);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        // Shared edge: closed overlap but no area.
        let d = BoundingBox::new(10, 0, 20, 10);
        assert!(a.overlaps(&d));
        assert!(!a.overlaps_area(&d));
    }

    #[test]
    fn test_bbox_center() {
        let a = BoundingBox::new(0, 0, 10, 20);
        assert_eq!(a.center(), Point::new(5, 10));
    }

    #[test]
    fn test_outline_rect() {
        let pts = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        let p = Poly::from_outline(&pts).unwrap();
        assert_eq!(p.rects(), &[BoundingBox::new(0, 0, 10, 10)]);
        assert_eq!(p.bbox(), BoundingBox::new(0, 0, 10, 10));
    }

    #[test]
    fn test_outline_closed_duplicate() {
        let pts = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(0, 0),
        ];
        let p = Poly::from_outline(&pts).unwrap();
        assert_eq!(p.rects().len(), 1);
    }

    #[test]
    fn test_outline_l_shape() {
        // An L covering [0,0,20,10] plus [0,10,10,20].
        let pts = [
            Point::new(0, 0),
            Point::new(20, 0),
            Point::new(20, 10),
            Point::new(10, 10),
            Point::new(10, 20),
            Point::new(0, 20),
        ];
        let p = Poly::from_outline(&pts).unwrap();
        assert_eq!(p.rects().len(), 2);
        assert!(p.contains_point(Point::new(5, 15)));
        assert!(p.contains_point(Point::new(15, 5)));
        assert!(!p.contains_point(Point::new(15, 15)));
    }

    #[test]
    fn test_outline_not_rectilinear() {
        let pts = [Point::new(0, 0), Point::new(10, 0), Point::new(5, 10)];
        assert!(matches!(
            Poly::from_outline(&pts),
            Err(GeomError::NotRectilinear)
        ));
    }

    #[test]
    fn test_overlap_positive_area_only() {
        let a = rect(0, 0, 10, 10);
        assert!(a.overlaps(&rect(5, 5, 15, 15)));
        // Edge-adjacent rectangles share no area.
        assert!(!a.overlaps(&rect(10, 0, 20, 10)));
        // Corner contact shares no area either.
        assert!(!a.overlaps(&rect(10, 10, 20, 20)));
    }

    #[test]
    fn test_and() {
        let marker = rect(0, 0, 10, 10);
        let drawing = [rect(5, 5, 15, 15), rect(-5, -5, 2, 2)];
        let mut pieces = and(&marker, &drawing);
        pieces.sort_by_key(|p| p.bbox().x0);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].rects(), &[BoundingBox::new(0, 0, 2, 2)]);
        assert_eq!(pieces[1].rects(), &[BoundingBox::new(5, 5, 10, 10)]);
    }

    #[test]
    fn test_and_disjoint() {
        let marker = rect(0, 0, 10, 10);
        assert!(and(&marker, &[rect(20, 20, 30, 30)]).is_empty());
    }

    #[test]
    fn test_or_merges_connected_pieces() {
        let shapes = [rect(0, 0, 10, 10), rect(5, 5, 15, 15), rect(100, 0, 110, 10)];
        let merged = or(&shapes);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_or_merges_edge_contact() {
        // A union would fuse rectangles sharing a run of edge into one
        // polygon, so the region keeps them together.
        let shapes = [rect(0, 0, 10, 10), rect(10, 0, 20, 10)];
        assert_eq!(or(&shapes).len(), 1);
        // Single-corner contact stays separate.
        let shapes = [rect(0, 0, 10, 10), rect(10, 10, 20, 20)];
        assert_eq!(or(&shapes).len(), 2);
    }
}
