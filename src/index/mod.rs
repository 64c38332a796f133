//! Thread-safe spatial index (§4.3): the shared/exclusive-locked R-tree the
//! rest of the core reads and writes through.

mod rtree;

use crate::coord::{mbr_for, Mbr};
use crate::model::{parse_payload, GeoObject};
use crate::workerpool::WorkerPool;
use rtree::{Entry, RTree};
use rustc_hash::FxHashSet;
use std::sync::RwLock;

pub use rtree::Entry as IndexEntry;

/// A shaped query hit, with the MBR already rendered for display.
pub struct Hit {
    pub id: u64,
    pub kind: String,
    pub mbr: Mbr,
}

pub struct SpatialIndex {
    tree: RwLock<RTree>,
    fanout: usize,
}

impl SpatialIndex {
    #[must_use]
    pub fn new(fanout: usize) -> Self {
        Self {
            tree: RwLock::new(RTree::new(fanout)),
            fanout,
        }
    }

    /// Builds the index from a freshly loaded object vector (§4.3).
    ///
    /// Partitions `objs` across `pool`'s current worker count, has each
    /// worker compute (mbr, payload) pairs and locally dedup on
    /// `{id,kind}`, merges and globally dedups the locals, then performs
    /// exactly one bulk insert under the exclusive lock.
    pub fn build_from(&self, objs: &[GeoObject], pool: &WorkerPool) {
        if objs.is_empty() {
            return;
        }

        let partitions = pool.partitions(objs.len());
        let handles: Vec<_> = partitions
            .into_iter()
            .filter_map(|(start, end)| {
                let chunk: Vec<GeoObject> = objs[start..end].to_vec();
                match pool.submit(move || build_local(&chunk)) {
                    Ok(h) => Some(h),
                    Err(_) => {
                        log::error!("index build: worker pool dropped a partition, {} objects lost", end - start);
                        None
                    }
                }
            })
            .collect();

        let mut merged: Vec<Entry> = handles
            .into_iter()
            .filter_map(|h| h.join())
            .flatten()
            .collect();

        merged.sort_by(|a, b| a.payload.cmp(&b.payload));
        merged.dedup_by(|a, b| a.payload == b.payload);

        let mut tree = self.tree.write().unwrap();
        tree.insert_batch(merged);
    }

    pub fn insert_one(&self, mbr: Mbr, payload: String) {
        self.tree.write().unwrap().insert(Entry { mbr, payload });
    }

    pub fn insert_batch(&self, entries: Vec<(Mbr, String)>) {
        let entries = entries
            .into_iter()
            .map(|(mbr, payload)| Entry { mbr, payload })
            .collect::<Vec<_>>();
        self.tree.write().unwrap().insert_batch(entries);
    }

    /// Runs the polygon-window search under a shared lock (§4.4).
    #[must_use]
    pub fn search(&self, query: &Mbr) -> Vec<Hit> {
        let tree = self.tree.read().unwrap();
        tree.search(query)
            .into_iter()
            .filter_map(|e| {
                let (id, kind) = parse_payload(&e.payload)?;
                Some(Hit {
                    id,
                    kind: kind.to_string(),
                    mbr: e.mbr,
                })
            })
            .collect()
    }

    /// Removes every entry whose payload id is in `ids`, fanning the scan
    /// phase out across `pool` (§4.3: parallel delete).
    ///
    /// Returns `true` iff at least one entry was removed.
    pub fn remove_by_ids(&self, ids: &FxHashSet<u64>, pool: &WorkerPool) -> bool {
        if ids.is_empty() {
            return false;
        }

        let snapshot: Vec<String> = {
            let tree = self.tree.read().unwrap();
            tree.snapshot().into_iter().map(|e| e.payload.clone()).collect()
        };
        if snapshot.is_empty() {
            return false;
        }

        let partitions = pool.partitions(snapshot.len());
        let ids_arc = std::sync::Arc::new(ids.clone());
        let snapshot_arc = std::sync::Arc::new(snapshot);
        let handles: Vec<_> = partitions
            .into_iter()
            .filter_map(|(start, end)| {
                let ids = std::sync::Arc::clone(&ids_arc);
                let snapshot = std::sync::Arc::clone(&snapshot_arc);
                let result = pool.submit(move || {
                    let mut matched = FxHashSet::default();
                    for payload in &snapshot[start..end] {
                        match parse_payload(payload) {
                            Some((id, _)) if ids.contains(&id) => {
                                matched.insert(payload.clone());
                            }
                            Some(_) => {}
                            None => log::warn!("index consistency: unparseable payload {payload:?}"),
                        }
                    }
                    matched
                });
                match result {
                    Ok(h) => Some(h),
                    Err(_) => {
                        log::error!("remove_by_ids: worker pool dropped a partition, {} entries unscanned", end - start);
                        None
                    }
                }
            })
            .collect();

        let mut to_remove = FxHashSet::default();
        for h in handles {
            if let Some(matched) = h.join() {
                to_remove.extend(matched);
            }
        }

        if to_remove.is_empty() {
            return false;
        }

        let mut tree = self.tree.write().unwrap();
        let removed = tree.remove_matching(|payload| to_remove.contains(payload));
        !removed.is_empty()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.tree.read().unwrap().size()
    }

    #[must_use]
    pub fn fanout(&self) -> usize {
        self.fanout
    }
}

fn build_local(chunk: &[GeoObject]) -> Vec<Entry> {
    let mut local = Vec::with_capacity(chunk.len());
    let mut seen = FxHashSet::default();
    for obj in chunk {
        if obj.coords.is_empty() {
            continue;
        }
        let Some(mbr) = mbr_for(obj.kind, &obj.coords) else {
            continue;
        };
        let payload = obj.payload();
        if seen.insert(payload.clone()) {
            local.push(Entry { mbr, payload });
        }
    }
    local
}
