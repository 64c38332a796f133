//! Mutation staging (§4.5).
//!
//! Writes never touch the CSV or the index directly. They land here first;
//! a periodic reconciler tick is the only thing that drains these sets.
//!
//! Lock order is staging mutexes before the index lock, never the reverse —
//! `GeoCore`'s insert/delete paths take a staging lock, record the mutation,
//! release it, and only then touch the index.

use crate::model::GeoObject;
use rustc_hash::FxHashSet;
use std::sync::Mutex;

#[derive(Default)]
pub struct Staging {
    pending_inserts: Mutex<Vec<GeoObject>>,
    pending_csv_deletes: Mutex<FxHashSet<u64>>,
    pending_index_deletes: Mutex<FxHashSet<u64>>,
}

impl Staging {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_insert(&self, obj: GeoObject) {
        self.pending_inserts.lock().unwrap().push(obj);
    }

    pub fn stage_insert_batch(&self, objs: impl IntoIterator<Item = GeoObject>) {
        self.pending_inserts.lock().unwrap().extend(objs);
    }

    pub fn stage_delete(&self, id: u64) {
        self.pending_csv_deletes.lock().unwrap().insert(id);
        self.pending_index_deletes.lock().unwrap().insert(id);
    }

    pub fn stage_delete_many(&self, ids: impl IntoIterator<Item = u64>) {
        let ids: Vec<u64> = ids.into_iter().collect();
        self.pending_csv_deletes.lock().unwrap().extend(ids.iter().copied());
        self.pending_index_deletes.lock().unwrap().extend(ids);
    }

    /// Drains staged index-side deletes for an immediate `remove_by_ids`
    /// call. The CSV-side set is left alone — it drains only on a
    /// reconciler tick, so a crash between an index removal and the next
    /// tick is recoverable by replaying the CSV delete on restart.
    pub fn take_index_deletes(&self) -> FxHashSet<u64> {
        std::mem::take(&mut *self.pending_index_deletes.lock().unwrap())
    }

    /// Drains both staged inserts and staged CSV deletes for a reconciler
    /// tick (§4.5). Returns `(inserts, delete_ids)`.
    pub fn drain_for_reconciler(&self) -> (Vec<GeoObject>, FxHashSet<u64>) {
        let inserts = std::mem::take(&mut *self.pending_inserts.lock().unwrap());
        let deletes = std::mem::take(&mut *self.pending_csv_deletes.lock().unwrap());
        (inserts, deletes)
    }

    #[must_use]
    pub fn pending_insert_count(&self) -> usize {
        self.pending_inserts.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Kind, Point};

    #[test]
    fn stage_delete_updates_both_sets() {
        let staging = Staging::new();
        staging.stage_delete(7);
        assert_eq!(staging.take_index_deletes().len(), 1);
        let (_, csv_deletes) = staging.drain_for_reconciler();
        assert!(csv_deletes.contains(&7));
    }

    #[test]
    fn drain_for_reconciler_empties_pending_sets() {
        let staging = Staging::new();
        staging.stage_insert(GeoObject::new(1, Kind::Point, vec![Point::new(0.0, 0.0)]));
        staging.stage_delete(2);
        let (inserts, deletes) = staging.drain_for_reconciler();
        assert_eq!(inserts.len(), 1);
        assert_eq!(deletes.len(), 1);
        assert_eq!(staging.pending_insert_count(), 0);
        let (inserts2, deletes2) = staging.drain_for_reconciler();
        assert!(inserts2.is_empty());
        assert!(deletes2.is_empty());
    }

    #[test]
    fn take_index_deletes_does_not_affect_csv_deletes() {
        let staging = Staging::new();
        staging.stage_delete(5);
        staging.take_index_deletes();
        let (_, csv_deletes) = staging.drain_for_reconciler();
        assert!(csv_deletes.contains(&5));
    }
}
