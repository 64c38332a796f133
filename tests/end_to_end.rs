use geocore::config::{Config, PoolModeConfig};
use geocore::core::GeoCore;
use geocore::generator::RandomGenerator;
use std::io::Write as _;

fn bootstrap(initial_rows: &str) -> (tempfile::NamedTempFile, GeoCore) {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(f, "{initial_rows}").unwrap();
    f.flush().unwrap();

    let config = Config {
        data_file: f.path().to_path_buf(),
        geo_log: None,
        reconciler_period_seconds: 3600,
        fanout_node_size: 8,
        initial_workers: 2,
        pool_mode: PoolModeConfig::Fixed,
        max_workers: 2,
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
    };
    let core = GeoCore::bootstrap(&config, Box::new(RandomGenerator::default())).unwrap();
    (f, core)
}

/// A freshly loaded snapshot is fully queryable and every row is present
/// exactly once.
#[test]
fn loads_snapshot_and_answers_queries() {
    let (_f, core) = bootstrap(
        "id,kind,coords\n\
         1,Point,10.0,10.0\n\
         2,Point,500.0,500.0\n\
         3,Line,0.0,0.0 20.0,20.0\n",
    );

    assert_eq!(core.count(), 3);

    let resp = core.query("0.0,0.0 20.0,0.0 20.0,20.0 0.0,20.0").unwrap();
    assert_eq!(resp.statistics.point_count, 1);
    assert_eq!(resp.statistics.line_count, 1);
    core.shutdown();
}

/// Deleting an id removes it from the index immediately, and the id never
/// reappears in a later query even before a reconciler tick runs.
#[test]
fn delete_one_is_immediately_visible_to_queries() {
    let (_f, core) = bootstrap(
        "id,kind,coords\n\
         1,Point,1.0,1.0\n\
         2,Point,2.0,2.0\n",
    );

    assert!(core.delete_one(1));
    assert!(!core.delete_one(1)); // already gone; second attempt removes nothing

    let resp = core.query("0.0,0.0 5.0,0.0 5.0,5.0 0.0,5.0").unwrap();
    assert_eq!(resp.data.len(), 1);
    assert_eq!(resp.data[0].id, 2);
    core.shutdown();
}

/// A large synthetic insert batch extends the index and is queryable right
/// away; out-of-range batch sizes are rejected before any id is reserved.
#[test]
fn insert_batch_grows_the_index_and_enforces_size_bounds() {
    let (_f, core) = bootstrap("id,kind,coords\n10,Point,1.0,1.0\n");

    assert!(matches!(
        core.insert_batch(9_999).unwrap_err(),
        geocore::GeoError::BadRequest(_)
    ));
    assert!(matches!(
        core.insert_batch(100_001).unwrap_err(),
        geocore::GeoError::BadRequest(_)
    ));

    assert!(core.insert_batch(10_000).unwrap());
    assert_eq!(core.count(), 10_001);
    core.shutdown();
}

/// Random delete reports the achieved count and actually removes that many
/// entries from the index; a count above the current max id is rejected.
#[test]
fn random_delete_reports_achieved_count_and_rejects_out_of_range() {
    let (_f, core) = bootstrap(
        "id,kind,coords\n\
         1,Point,1.0,1.0\n\
         2,Point,2.0,2.0\n\
         3,Point,3.0,3.0\n",
    );

    assert!(matches!(
        core.delete_random(10).unwrap_err(),
        geocore::GeoError::BadRequest(_)
    ));

    let achieved = core.delete_random(3).unwrap();
    assert_eq!(achieved, 3);
    assert_eq!(core.count(), 0);
    core.shutdown();
}

/// A reconciler tick persists staged inserts and deletes back to the CSV
/// snapshot without disturbing unrelated rows.
#[test]
fn reconciler_tick_persists_staged_mutations_to_csv() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(
        f,
        "id,kind,coords\n\
         1,Point,1.0,1.0\n\
         2,Point,2.0,2.0\n"
    )
    .unwrap();
    f.flush().unwrap();

    let config = Config {
        data_file: f.path().to_path_buf(),
        geo_log: None,
        reconciler_period_seconds: 1,
        fanout_node_size: 8,
        initial_workers: 2,
        pool_mode: PoolModeConfig::Fixed,
        max_workers: 2,
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
    };
    let core = GeoCore::bootstrap(&config, Box::new(RandomGenerator::default())).unwrap();

    core.delete_one(1);
    core.insert_batch(10_000).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(1500));

    let on_disk = geocore::csv_io::read_range(f.path(), 0, 100_000).unwrap();
    let ids: Vec<u64> = on_disk.iter().map(|o| o.id).collect();
    assert!(!ids.contains(&1));
    assert!(ids.contains(&2));
    assert_eq!(ids.len(), 10_001);
    core.shutdown();
}

/// A query boundary with fewer than three coordinate pairs is rejected
/// before the index is touched.
#[test]
fn malformed_query_boundary_is_rejected() {
    let (_f, core) = bootstrap("id,kind,coords\n1,Point,1.0,1.0\n");
    let err = core.query("1.0,1.0 2.0,2.0").unwrap_err();
    assert!(matches!(err, geocore::GeoError::BadRequest(_)));
    core.shutdown();
}
