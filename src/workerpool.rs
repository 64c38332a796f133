//! Bounded-queue worker pool (§4.6), the core's only collaborator for
//! fanning out CSV parsing, index building, deletion scans, and query
//! shaping across OS threads.
//!
//! Two modes: `Fixed` never grows past its initial worker count; `Elastic`
//! spins up workers on demand, up to `max_workers`, whenever a submission
//! would otherwise have to wait for queue capacity, and retires workers
//! above the initial count after they sit idle past `idle_timeout`.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
    Fixed,
    Elastic,
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    not_empty: Condvar,
    not_full: Condvar,
    queue_capacity: usize,
    running: Mutex<bool>,
    worker_count: Mutex<usize>,
    mode: PoolMode,
    max_workers: usize,
    idle_timeout: Duration,
}

/// A handle to a submitted task's eventual result.
///
/// The task keeps running after `submit` returns; call [`Handle::join`] from
/// any thread to block for the result.
pub struct Handle<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Handle<T> {
    #[must_use]
    pub fn join(self) -> Option<T> {
        self.rx.recv().ok()
    }
}

/// Returned by [`WorkerPool::submit`] when the bounded queue stayed full for
/// the full 1s timeout and (in `Fixed` mode, or at the `Elastic` cap) growth
/// was not possible.
#[derive(Debug)]
pub struct TaskDropped;

pub struct WorkerPool {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(1);

impl WorkerPool {
    /// Starts a pool with `initial_workers` threads. `queue_capacity` bounds
    /// the pending-task queue; `max_workers` is only consulted in `Elastic`
    /// mode.
    #[must_use]
    pub fn start(
        mode: PoolMode,
        initial_workers: usize,
        max_workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let initial_workers = initial_workers.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            queue_capacity: queue_capacity.max(1),
            running: Mutex::new(true),
            worker_count: Mutex::new(0),
            mode,
            max_workers: max_workers.max(initial_workers),
            idle_timeout: Duration::from_secs(60),
        });

        let mut threads = Vec::with_capacity(initial_workers);
        for _ in 0..initial_workers {
            threads.push(spawn_worker(Arc::clone(&shared), true));
        }
        *shared.worker_count.lock().unwrap() = initial_workers;

        Self {
            shared,
            threads: Mutex::new(threads),
        }
    }

    #[must_use]
    pub fn current_worker_count(&self) -> usize {
        *self.shared.worker_count.lock().unwrap()
    }

    /// Submits a task, returning a [`Handle`] to its result.
    ///
    /// Blocks up to 1s waiting for queue capacity. If capacity never frees
    /// up: in `Elastic` mode below `max_workers` a new worker is spawned and
    /// the task is queued anyway; otherwise the submission is dropped.
    pub fn submit<F, T>(&self, f: F) -> Result<Handle<T>, TaskDropped>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let task: Task = Box::new(move || {
            let _ = tx.send(f());
        });

        let mut queue = self.shared.queue.lock().unwrap();
        let deadline = Instant::now() + SUBMIT_TIMEOUT;
        while queue.len() >= self.shared.queue_capacity {
            let timeout = deadline.saturating_duration_since(Instant::now());
            if timeout.is_zero() {
                break;
            }
            let (guard, result) = self.shared.not_full.wait_timeout(queue, timeout).unwrap();
            queue = guard;
            if result.timed_out() {
                break;
            }
        }

        if queue.len() >= self.shared.queue_capacity {
            if self.shared.mode == PoolMode::Elastic {
                let mut count = self.shared.worker_count.lock().unwrap();
                if *count < self.shared.max_workers {
                    drop(queue);
                    self.threads
                        .lock()
                        .unwrap()
                        .push(spawn_worker(Arc::clone(&self.shared), false));
                    *count += 1;
                    queue = self.shared.queue.lock().unwrap();
                } else {
                    drop(count);
                }
            }
            if queue.len() >= self.shared.queue_capacity {
                return Err(TaskDropped);
            }
        }

        queue.push_back(task);
        drop(queue);
        self.shared.not_empty.notify_one();
        Ok(Handle { rx })
    }

    /// Partitions `len` items into `min(current_worker_count(), len)`
    /// contiguous, non-empty ranges (never zero segments for non-empty
    /// input) — the fan-out rule used by index build, delete scan, and
    /// query shaping (§4.3, §4.4).
    #[must_use]
    pub fn partitions(&self, len: usize) -> Vec<(usize, usize)> {
        if len == 0 {
            return Vec::new();
        }
        let segments = self.current_worker_count().max(1).min(len);
        let chunk = len.div_ceil(segments);
        (0..segments)
            .map(|i| {
                let start = i * chunk;
                let end = (start + chunk).min(len);
                (start, end)
            })
            .filter(|(s, e)| s < e)
            .collect()
    }

    pub fn shutdown(&self) {
        *self.shared.running.lock().unwrap() = false;
        self.shared.not_empty.notify_all();
        let mut threads = self.threads.lock().unwrap();
        for t in threads.drain(..) {
            let _ = t.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker(shared: Arc<Shared>, permanent: bool) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut last_task_at = Instant::now();
        loop {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if !*shared.running.lock().unwrap() {
                    return;
                }
                if let Some(task) = queue.pop_front() {
                    drop(queue);
                    shared.not_full.notify_one();
                    task();
                    last_task_at = Instant::now();
                    break;
                }
                if !permanent && shared.mode == PoolMode::Elastic {
                    let idle_for = Instant::now().saturating_duration_since(last_task_at);
                    let wait = shared.idle_timeout.saturating_sub(idle_for);
                    if wait.is_zero() {
                        let mut count = shared.worker_count.lock().unwrap();
                        if *count > 1 {
                            *count -= 1;
                            return;
                        }
                    }
                    let (guard, _) = shared.not_empty.wait_timeout(queue, wait.max(Duration::from_millis(50))).unwrap();
                    queue = guard;
                } else {
                    queue = shared.not_empty.wait(queue).unwrap();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_submitted_tasks_and_returns_values() {
        let pool = WorkerPool::start(PoolMode::Fixed, 4, 4, 64);
        let handles: Vec<_> = (0..16)
            .map(|i| pool.submit(move || i * 2).unwrap())
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().sum::<i32>(), (0..16).map(|i| i * 2).sum::<i32>());
    }

    #[test]
    fn fixed_mode_never_exceeds_initial_workers() {
        let pool = WorkerPool::start(PoolMode::Fixed, 2, 2, 4);
        assert_eq!(pool.current_worker_count(), 2);
    }

    #[test]
    fn partitions_never_yield_more_segments_than_items() {
        let pool = WorkerPool::start(PoolMode::Fixed, 8, 8, 64);
        let parts = pool.partitions(3);
        assert!(parts.len() <= 3);
        assert!(!parts.is_empty());
    }

    #[test]
    fn partitions_of_empty_input_is_empty() {
        let pool = WorkerPool::start(PoolMode::Fixed, 4, 4, 64);
        assert!(pool.partitions(0).is_empty());
    }
}
