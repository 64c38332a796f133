//! Synthetic data generation (§4.7).
//!
//! The original system shelled out to an external process for this; here
//! it is a narrow collaborator trait so the default in-process
//! implementation can be swapped for an external one without touching the
//! rest of the core.

use crate::coord::{mbr_for, Mbr};
use crate::error::{GeoError, GeoResult};
use crate::model::{GeoObject, Kind, Point};
use rand::Rng;

pub trait Generator: Send + Sync {
    /// Produces `count` freshly-generated objects, each paired with its own
    /// MBR, with ids starting at `start_id` (inclusive, contiguous). Returns
    /// `GeneratorFailure` if the collaborator cannot honor the request.
    /// Callers treat a result shorter than `count` as a `GeneratorFailure`
    /// too, since an implementation isn't required to self-check this.
    fn generate(&self, count: u64, start_id: u64) -> GeoResult<Vec<(Mbr, GeoObject)>>;
}

/// Generates uniformly random points, lines, and polygons over a fixed
/// coordinate range.
pub struct RandomGenerator {
    pub min_coord: f64,
    pub max_coord: f64,
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self {
            min_coord: -180.0,
            max_coord: 180.0,
        }
    }
}

impl Generator for RandomGenerator {
    fn generate(&self, count: u64, start_id: u64) -> GeoResult<Vec<(Mbr, GeoObject)>> {
        if self.min_coord >= self.max_coord {
            return Err(GeoError::GeneratorFailure(format!(
                "invalid coordinate range [{}, {}]",
                self.min_coord, self.max_coord
            )));
        }

        let mut rng = rand::rng();
        let mut out = Vec::with_capacity(count as usize);
        for i in 0..count {
            let kind = match i % 3 {
                0 => Kind::Point,
                1 => Kind::Line,
                _ => Kind::Polygon,
            };
            let coords = self.random_coords(&mut rng, kind);
            let obj = GeoObject::new(start_id + i, kind, coords);
            let mbr = mbr_for(obj.kind, &obj.coords).ok_or_else(|| {
                GeoError::GeneratorFailure(format!("generated object {} has no valid geometry", obj.id))
            })?;
            out.push((mbr, obj));
        }
        Ok(out)
    }
}

impl RandomGenerator {
    fn random_coords(&self, rng: &mut impl Rng, kind: Kind) -> Vec<Point> {
        let n = kind.min_coords();
        (0..n)
            .map(|_| {
                Point::new(
                    rng.random_range(self.min_coord..=self.max_coord),
                    rng.random_range(self.min_coord..=self.max_coord),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_contiguous_ids() {
        let r#gen = RandomGenerator::default();
        let pairs = r#gen.generate(10, 100).unwrap();
        assert_eq!(pairs.len(), 10);
        for (i, (_, obj)) in pairs.iter().enumerate() {
            assert_eq!(obj.id, 100 + i as u64);
        }
    }

    #[test]
    fn generated_objects_are_well_formed() {
        let r#gen = RandomGenerator::default();
        let pairs = r#gen.generate(30, 0).unwrap();
        assert!(pairs.iter().all(|(_, obj)| obj.is_well_formed()));
    }

    #[test]
    fn invalid_coordinate_range_fails() {
        let r#gen = RandomGenerator {
            min_coord: 10.0,
            max_coord: -10.0,
        };
        assert!(r#gen.generate(1, 0).is_err());
    }
}
