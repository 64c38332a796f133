//! Coordinate codec and MBR computation (§4.1).
//!
//! Coordinate lists are whitespace-separated `x,y` pairs. Legacy
//! Windows-produced snapshots carry stray backslash escapes; those are
//! stripped before parsing. A malformed pair is skipped with a `warn!` and
//! never aborts the whole list — mirrors the original `GeoTools` behavior of
//! degrading row-by-row instead of rejecting a file.

use crate::model::{Kind, Point};

/// Axis-aligned bounding box. `min`/`max` are inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mbr {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Mbr {
    #[must_use]
    pub fn degenerate(p: Point) -> Self {
        Self {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        }
    }

    /// Envelope over a non-empty slice of points.
    ///
    /// # Panics
    ///
    /// Panics if `points` is empty; callers must validate geometry first.
    #[must_use]
    pub fn envelope(points: &[Point]) -> Self {
        assert!(!points.is_empty(), "envelope of empty point list");
        let mut mbr = Self::degenerate(points[0]);
        for p in &points[1..] {
            mbr.expand(*p);
        }
        mbr
    }

    fn expand(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    #[must_use]
    pub fn union(&self, other: &Mbr) -> Mbr {
        Mbr {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    #[must_use]
    pub fn intersects(&self, other: &Mbr) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0) * (self.max_y - self.min_y).max(0.0)
    }

    #[must_use]
    pub fn enlargement(&self, other: &Mbr) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Six-digit fixed-precision `[(minx, miny), (maxx, maxy)]` rendering, matching
    /// the original `box_to_string` output shape.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        format!(
            "[({:.6}, {:.6}), ({:.6}, {:.6})]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Computes the envelope for a geometry of the given `kind`, closing polygons
/// implicitly when the first and last vertex differ (§3, §4.1).
///
/// Returns `None` if `coords` is empty.
#[must_use]
pub fn mbr_for(kind: Kind, coords: &[Point]) -> Option<Mbr> {
    match (kind, coords) {
        (_, []) => None,
        (Kind::Point, [p, ..]) => Some(Mbr::degenerate(*p)),
        (Kind::Line, pts) => Some(Mbr::envelope(pts)),
        (Kind::Polygon, pts) => {
            if pts.first() == pts.last() {
                Some(Mbr::envelope(pts))
            } else {
                let mut closed = pts.to_vec();
                closed.push(pts[0]);
                Some(Mbr::envelope(&closed))
            }
        }
    }
}

/// Parses a whitespace-separated `x,y ...` coordinate list.
///
/// Strips stray backslashes and surrounding quotes before splitting.
/// Malformed pairs are skipped (and the warning text returned alongside so
/// callers can log it) instead of aborting the whole row.
pub fn parse_coords(raw: &str) -> (Vec<Point>, Vec<String>) {
    let cleaned = raw.trim().trim_matches('"').replace('\\', "");
    let mut points = Vec::new();
    let mut warnings = Vec::new();

    for pair in cleaned.split_whitespace() {
        match parse_pair(pair) {
            Some(p) => points.push(p),
            None => warnings.push(format!("malformed coordinate pair: {pair:?}")),
        }
    }
    (points, warnings)
}

fn parse_pair(pair: &str) -> Option<Point> {
    let (x_str, y_str) = pair.split_once(',')?;
    let x: f64 = x_str.trim().parse().ok()?;
    let y: f64 = y_str.trim().parse().ok()?;
    if x.is_finite() && y.is_finite() {
        Some(Point::new(x, y))
    } else {
        None
    }
}

/// Emits a coordinate list with six-digit fixed precision, space-separated
/// pairs, matching the CSV grammar in §6.
#[must_use]
pub fn format_coords(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.6},{:.6}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_pairs() {
        let (pts, warnings) = parse_coords("1.0,2.0 3.5,4.5");
        assert!(warnings.is_empty());
        assert_eq!(pts, vec![Point::new(1.0, 2.0), Point::new(3.5, 4.5)]);
    }

    #[test]
    fn strips_backslashes_and_quotes() {
        let (pts, warnings) = parse_coords("\"1.0,2.0\\ 3.0,4.0\"");
        assert!(warnings.is_empty());
        assert_eq!(pts, vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
    }

    #[test]
    fn skips_malformed_pairs_without_aborting() {
        let (pts, warnings) = parse_coords("1.0,2.0 garbage 3.0,4.0");
        assert_eq!(pts, vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn round_trip_preserves_precision() {
        let original = vec![Point::new(12.123_456_7, -4.5), Point::new(0.0, 0.000_001)];
        let emitted = format_coords(&original);
        let (parsed, _) = parse_coords(&emitted);
        for (a, b) in original.iter().zip(parsed.iter()) {
            assert!((a.x - b.x).abs() < 1e-6);
            assert!((a.y - b.y).abs() < 1e-6);
        }
    }

    #[test]
    fn polygon_closes_implicitly() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let mbr = mbr_for(Kind::Polygon, &pts).unwrap();
        assert_eq!(mbr.min_x, 0.0);
        assert_eq!(mbr.max_x, 10.0);
    }

    #[test]
    fn point_mbr_is_degenerate() {
        let mbr = mbr_for(Kind::Point, &[Point::new(3.0, 4.0)]).unwrap();
        assert_eq!(mbr.min_x, mbr.max_x);
        assert_eq!(mbr.min_y, mbr.max_y);
    }
}
