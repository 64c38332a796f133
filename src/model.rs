//! The `GeoObject` geometry model (§3).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Point,
    Line,
    Polygon,
}

impl Kind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Point => "Point",
            Kind::Line => "Line",
            Kind::Polygon => "Polygon",
        }
    }

    #[must_use]
    pub fn min_coords(self) -> usize {
        match self {
            Kind::Point => 1,
            Kind::Line => 2,
            Kind::Polygon => 3,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Point" => Ok(Kind::Point),
            "Line" => Ok(Kind::Line),
            "Polygon" => Ok(Kind::Polygon),
            other => Err(format!("unknown geometry kind: {other}")),
        }
    }
}

/// A stored geographic object: identity, geometry kind, and ordered coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoObject {
    pub id: u64,
    pub kind: Kind,
    pub coords: Vec<Point>,
}

impl GeoObject {
    #[must_use]
    pub fn new(id: u64, kind: Kind, coords: Vec<Point>) -> Self {
        Self { id, kind, coords }
    }

    /// Encodes the opaque index payload `"{id},{kind}"` (§3, §9: payload-encoded ids).
    #[must_use]
    pub fn payload(&self) -> String {
        format!("{},{}", self.id, self.kind)
    }

    /// A geometry is well-formed when it meets its kind's minimum vertex count.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.coords.is_empty() && self.coords.len() >= self.kind.min_coords()
    }
}

/// Splits an index payload `"{id},{kind}"` back into its parts.
///
/// Returns `None` (an `IndexConsistency` condition, §7) when the leading
/// field does not parse as a `u64`.
pub fn parse_payload(payload: &str) -> Option<(u64, &str)> {
    let (id_str, kind_str) = payload.split_once(',')?;
    let id = id_str.parse::<u64>().ok()?;
    Some((id, kind_str))
}
