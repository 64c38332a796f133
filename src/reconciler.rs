//! Periodic CSV reconciler (§4.5): the only writer of the CSV snapshot.
//!
//! Runs on a dedicated thread, waking every `period` to drain staged
//! inserts/deletes and persist them. Failures are logged as
//! `ReconcilerIo` and retried on the next tick rather than surfaced to a
//! caller, since by the time a tick runs the request that staged the
//! mutation has already returned.

use crate::csv_io;
use crate::staging::Staging;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct Reconciler {
    running: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Reconciler {
    /// Spawns the reconciler thread. Ticks every `period`, checking the
    /// running flag between sleeps in 1s slices so shutdown is prompt even
    /// with a long period.
    #[must_use]
    pub fn spawn(data_file: PathBuf, staging: Arc<Staging>, period: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = Arc::clone(&running);

        let handle = std::thread::spawn(move || {
            let mut waited = Duration::ZERO;
            while running_thread.load(Ordering::Relaxed) {
                if waited < period {
                    std::thread::sleep(Duration::from_secs(1).min(period - waited));
                    waited += Duration::from_secs(1).min(period - waited);
                    continue;
                }
                waited = Duration::ZERO;
                tick(&data_file, &staging);
            }
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn tick(data_file: &std::path::Path, staging: &Staging) {
    let (inserts, delete_ids) = staging.drain_for_reconciler();

    if !inserts.is_empty() {
        let mut sorted = inserts;
        sorted.sort_by_key(|o| o.id);
        if let Err(e) = csv_io::append_rows(data_file, &sorted) {
            log::error!("reconciler failed to append {} inserts: {e}", sorted.len());
            staging.stage_insert_batch(sorted);
        }
    }

    if !delete_ids.is_empty() {
        if let Err(e) = csv_io::rewrite_dropping(data_file, &delete_ids) {
            log::error!("reconciler failed to rewrite snapshot dropping {} ids: {e}", delete_ids.len());
            staging.stage_delete_many(delete_ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoObject, Kind, Point};
    use std::io::Write as _;

    #[test]
    fn tick_appends_and_rewrites() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "id,kind,coords\n1,Point,1.0,2.0\n2,Point,3.0,4.0\n").unwrap();
        f.flush().unwrap();

        let staging = Staging::new();
        staging.stage_insert(GeoObject::new(3, Kind::Point, vec![Point::new(9.0, 9.0)]));
        staging.stage_delete(1);

        tick(f.path(), &staging);

        let objs = csv_io::read_range(f.path(), 0, 10).unwrap();
        let ids: Vec<u64> = objs.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
