//! `GeoCore`: the operation surface the HTTP boundary and CLI both drive
//! (§4, §5). Wires the index, worker pool, staging, reconciler, and
//! generator together.

use crate::config::Config;
use crate::csv_io;
use crate::error::{GeoError, GeoResult};
use crate::generator::Generator;
use crate::index::SpatialIndex;
use crate::model::GeoObject;
use crate::query::{self, QueryResponse};
use crate::reconciler::Reconciler;
use crate::staging::Staging;
use crate::workerpool::WorkerPool;
use rand::Rng;
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct GeoCore {
    index: Arc<SpatialIndex>,
    pool: Arc<WorkerPool>,
    staging: Arc<Staging>,
    next_id: AtomicU64,
    data_file: PathBuf,
    generator: Arc<dyn Generator>,
    reconciler: Mutex<Option<Reconciler>>,
}

impl GeoCore {
    /// Loads the CSV snapshot in parallel, builds the index, seeds the id
    /// counter from the snapshot's last row, and starts the reconciler
    /// (§5: startup sequence).
    pub fn bootstrap(config: &Config, generator: Box<dyn Generator>) -> GeoResult<Self> {
        let pool = Arc::new(WorkerPool::start(
            config.pool_mode.into(),
            config.initial_workers,
            config.max_workers,
            config.initial_workers.max(1) * 64,
        ));
        let index = Arc::new(SpatialIndex::new(config.fanout_node_size));
        let staging = Arc::new(Staging::new());

        let total_rows = csv_io::count_lines(&config.data_file)?;
        if total_rows > 0 {
            let partitions = pool.partitions(total_rows);
            let data_file = config.data_file.clone();
            let handles: Vec<_> = partitions
                .into_iter()
                .map(|(start, end)| {
                    let path = data_file.clone();
                    pool.submit(move || csv_io::read_range(&path, start, end))
                        .ok()
                })
                .collect();

            let mut objs = Vec::with_capacity(total_rows);
            for h in handles.into_iter().flatten() {
                match h.join() {
                    Some(Ok(chunk)) => objs.extend(chunk),
                    Some(Err(e)) => log::error!("failed to load CSV partition: {e}"),
                    None => log::error!("CSV load worker dropped without a result"),
                }
            }
            index.build_from(&objs, &pool);
        }

        let next_id = csv_io::get_init_id(&config.data_file)? + 1;
        log::info!(
            "loaded {} objects from {}; next id {next_id}",
            index.size(),
            config.data_file.display()
        );

        let period = Duration::from_secs(config.reconciler_period_seconds);
        let reconciler = Reconciler::spawn(config.data_file.clone(), Arc::clone(&staging), period);

        Ok(Self {
            index,
            pool,
            staging,
            next_id: AtomicU64::new(next_id),
            data_file: config.data_file.clone(),
            generator: Arc::from(generator),
            reconciler: Mutex::new(Some(reconciler)),
        })
    }

    #[must_use]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn query(&self, raw_coords: &str) -> GeoResult<QueryResponse> {
        query::run_query(&self.index, &self.pool, raw_coords)
    }

    /// Stages `id` for deletion, then immediately applies every currently
    /// staged index-side delete as one batched exclusive-lock removal.
    /// Returns `true` iff at least one entry was actually removed.
    pub fn delete_one(&self, id: u64) -> bool {
        self.staging.stage_delete(id);
        self.apply_staged_index_deletes()
    }

    /// Draws `count` distinct ids uniformly from `[1, current_max_id]` by
    /// rejection sampling, stages them for deletion, and applies the
    /// removal (§4.5). Returns the achieved deletion count, which may be
    /// less than `count` when some drawn ids were already absent.
    pub fn delete_random(&self, count: u64) -> GeoResult<u64> {
        let max_id = self.next_id.load(Ordering::SeqCst).saturating_sub(1);
        if count < 1 || count > max_id {
            return Err(GeoError::BadRequest(format!(
                "delete_random count must be between 1 and {max_id}, got {count}"
            )));
        }

        let mut rng = rand::rng();
        let mut chosen = FxHashSet::default();
        while (chosen.len() as u64) < count {
            chosen.insert(rng.random_range(1..=max_id));
        }
        self.staging.stage_delete_many(chosen);

        let before = self.index.size();
        self.apply_staged_index_deletes();
        let after = self.index.size();
        Ok((before - after) as u64)
    }

    fn apply_staged_index_deletes(&self) -> bool {
        let ids = self.staging.take_index_deletes();
        if ids.is_empty() {
            return false;
        }
        self.index.remove_by_ids(&ids, &self.pool)
    }

    /// Generates a synthetic batch of `count` objects from the external
    /// generator, reserves contiguous ids for them, inserts them into the
    /// index immediately, and stages the CSV append (§4.5, §6). `count`
    /// must fall in `[10_000, 100_000]`.
    ///
    /// The batch is partitioned across the worker pool: each worker asks
    /// the generator for its own slice, inserts its slice into the index,
    /// and appends its slice to a batch-local collection under a mutex.
    /// Once every worker has finished, the collection is sorted by id and
    /// staged for the next reconciler tick. The global id counter is
    /// reserved up front and rolled back if the batch fails partway, so a
    /// failed `insert_batch` never advances it (§7).
    pub fn insert_batch(&self, count: u64) -> GeoResult<bool> {
        if !(10_000..=100_000).contains(&count) {
            return Err(GeoError::BadRequest(format!(
                "insert_batch count must be between 10,000 and 100,000, got {count}"
            )));
        }

        let start_id = self.next_id.fetch_add(count, Ordering::SeqCst);
        match self.generate_and_insert(count, start_id) {
            Ok(objs) => {
                self.staging.stage_insert_batch(objs);
                Ok(true)
            }
            Err(e) => {
                self.next_id.fetch_sub(count, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn generate_and_insert(&self, count: u64, start_id: u64) -> GeoResult<Vec<GeoObject>> {
        let partitions = self.pool.partitions(count as usize);
        let locals: Arc<Mutex<Vec<GeoObject>>> = Arc::new(Mutex::new(Vec::with_capacity(count as usize)));

        let mut handles = Vec::with_capacity(partitions.len());
        for (chunk_start, chunk_end) in partitions {
            let chunk_count = (chunk_end - chunk_start) as u64;
            let chunk_start_id = start_id + chunk_start as u64;
            let generator = Arc::clone(&self.generator);
            let index = Arc::clone(&self.index);
            let locals = Arc::clone(&locals);

            let task = move || -> GeoResult<()> {
                let pairs = generator.generate(chunk_count, chunk_start_id)?;
                if pairs.len() as u64 != chunk_count {
                    return Err(GeoError::GeneratorFailure(format!(
                        "generator returned {} objects, expected {chunk_count}",
                        pairs.len()
                    )));
                }
                let entries: Vec<(crate::coord::Mbr, String)> =
                    pairs.iter().map(|(mbr, obj)| (*mbr, obj.payload())).collect();
                index.insert_batch(entries);
                locals.lock().unwrap().extend(pairs.into_iter().map(|(_, obj)| obj));
                Ok(())
            };

            match self.pool.submit(task) {
                Ok(h) => handles.push(h),
                Err(_) => {
                    return Err(GeoError::GeneratorFailure(
                        "worker pool dropped an insert partition before it ran".to_string(),
                    ))
                }
            }
        }

        for h in handles {
            match h.join() {
                Some(Ok(())) => {}
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(GeoError::GeneratorFailure(
                        "insert worker terminated without a result".to_string(),
                    ))
                }
            }
        }

        let mut objs = Arc::try_unwrap(locals)
            .expect("every insert worker has joined; no outstanding clones remain")
            .into_inner()
            .unwrap();
        objs.sort_by_key(|o| o.id);
        Ok(objs)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.index.size()
    }

    #[must_use]
    pub fn data_file(&self) -> &std::path::Path {
        &self.data_file
    }

    pub fn shutdown(&self) {
        if let Some(mut reconciler) = self.reconciler.lock().unwrap().take() {
            reconciler.shutdown();
        }
    }
}
