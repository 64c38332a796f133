//! Polygon-window query engine (§4.4): parses a boundary, searches the
//! index, and shapes the result into the JSON envelope described in §6.

use crate::coord::{parse_coords, Mbr};
use crate::error::{GeoError, GeoResult};
use crate::index::SpatialIndex;
use crate::workerpool::WorkerPool;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatistics {
    pub point_count: usize,
    pub line_count: usize,
    pub polygon_count: usize,
}

#[derive(Debug, Serialize)]
pub struct QueryHit {
    pub id: u64,
    pub kind: String,
    pub coordinates: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub status: &'static str,
    pub statistics: QueryStatistics,
    pub data: Vec<QueryHit>,
    pub query_time: u128,
}

/// Runs a window query over `raw_coords` (§4.4).
///
/// Requires at least 3 coordinate pairs to form a boundary; fewer is a
/// `BadRequest` raised before the index is ever touched. The boundary ring
/// is closed implicitly if the caller didn't close it.
pub fn run_query(index: &SpatialIndex, pool: &WorkerPool, raw_coords: &str) -> GeoResult<QueryResponse> {
    let started = std::time::Instant::now();
    let (points, warnings) = parse_coords(raw_coords);
    for w in &warnings {
        log::warn!("query boundary: {w}");
    }

    if points.len() < 3 {
        return Err(GeoError::BadRequest(format!(
            "query boundary needs at least 3 coordinate pairs, got {}",
            points.len()
        )));
    }

    let query_box = Mbr::envelope(&points);
    let hits = index.search(&query_box);

    let shaped = shape_hits(hits, pool);
    let elapsed = started.elapsed();

    Ok(finish(shaped, elapsed))
}

fn shape_hits(hits: Vec<crate::index::Hit>, pool: &WorkerPool) -> Vec<QueryHit> {
    if hits.is_empty() {
        return Vec::new();
    }
    let partitions = pool.partitions(hits.len());
    let hits = std::sync::Arc::new(hits);
    let handles: Vec<_> = partitions
        .into_iter()
        .map(|(start, end)| {
            let hits = std::sync::Arc::clone(&hits);
            pool.submit(move || {
                hits[start..end]
                    .iter()
                    .map(|h| QueryHit {
                        id: h.id,
                        kind: h.kind.clone(),
                        coordinates: h.mbr.to_display_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .ok()
        })
        .collect();

    handles
        .into_iter()
        .flatten()
        .filter_map(|h| h.join())
        .flatten()
        .collect()
}

fn finish(data: Vec<QueryHit>, elapsed: Duration) -> QueryResponse {
    let mut stats = QueryStatistics {
        point_count: 0,
        line_count: 0,
        polygon_count: 0,
    };
    for hit in &data {
        match hit.kind.as_str() {
            "Point" => stats.point_count += 1,
            "Line" => stats.line_count += 1,
            "Polygon" => stats.polygon_count += 1,
            other => log::warn!("index consistency: unknown kind {other:?} in query result"),
        }
    }

    QueryResponse {
        status: "success",
        statistics: stats,
        data,
        query_time: elapsed.as_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SpatialIndex;
    use crate::model::{GeoObject, Kind, Point};
    use crate::workerpool::{PoolMode, WorkerPool};

    fn pool() -> WorkerPool {
        WorkerPool::start(PoolMode::Fixed, 4, 4, 256)
    }

    #[test]
    fn rejects_fewer_than_three_points() {
        let index = SpatialIndex::new(64);
        let pool = pool();
        let err = run_query(&index, &pool, "0.0,0.0 1.0,1.0").unwrap_err();
        assert!(matches!(err, GeoError::BadRequest(_)));
    }

    #[test]
    fn counts_hits_by_kind() {
        let index = SpatialIndex::new(64);
        let pool = pool();
        index.build_from(
            &[
                GeoObject::new(1, Kind::Point, vec![Point::new(5.0, 5.0)]),
                GeoObject::new(
                    2,
                    Kind::Line,
                    vec![Point::new(1.0, 1.0), Point::new(9.0, 9.0)],
                ),
                GeoObject::new(3, Kind::Point, vec![Point::new(500.0, 500.0)]),
            ],
            &pool,
        );

        let resp = run_query(&index, &pool, "0.0,0.0 10.0,0.0 10.0,10.0 0.0,10.0").unwrap();
        assert_eq!(resp.statistics.point_count, 1);
        assert_eq!(resp.statistics.line_count, 1);
        assert_eq!(resp.data.len(), 2);
    }
}
