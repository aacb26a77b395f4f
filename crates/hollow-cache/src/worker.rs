//! Region-scoped task execution.
//!
//! Tasks submitted for one region run strictly in submission order and
//! never concurrently with each other; different regions run in parallel.
//! [`RegionWorkerPool`] achieves this by pinning each region to one worker
//! thread, each draining its own FIFO channel.

use std::hash::BuildHasher;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, unbounded};
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use crate::error::CacheError;
use crate::region::RegionAddress;

/// A unit of work executed on a region's queue.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Per-region serial executor.
pub trait TaskQueue: Send + Sync + 'static {
    /// Appends `task` to `region`'s queue. Must not run it inline.
    fn enqueue(&self, region: RegionAddress, task: Task);

    /// Drops every not-yet-started task of `region`.
    ///
    /// Tasks enqueued afterwards run normally (the region was reloaded).
    fn close(&self, region: RegionAddress);
}

/// A task plus the cancellation flag of the region load it belongs to.
struct Job {
    region: RegionAddress,
    task: Task,
    cancelled: Arc<AtomicBool>,
}

/// Fixed pool of worker threads with region affinity.
pub struct RegionWorkerPool {
    /// One FIFO per worker thread.
    senders: Vec<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    /// Cancellation flag of each region's current load.
    active: Arc<DashMap<RegionAddress, Arc<AtomicBool>, FxBuildHasher>>,
    /// Jobs queued or executing.
    in_flight: Arc<AtomicU64>,
}

impl RegionWorkerPool {
    /// Spawns `thread_count` workers (at least one).
    pub fn new(thread_count: usize) -> Result<Self, CacheError> {
        let thread_count = thread_count.max(1);
        let in_flight = Arc::new(AtomicU64::new(0));
        let mut senders = Vec::with_capacity(thread_count);
        let mut handles = Vec::with_capacity(thread_count);

        for index in 0..thread_count {
            let (sender, receiver) = unbounded::<Job>();
            let in_flight = Arc::clone(&in_flight);

            let handle = std::thread::Builder::new()
                .name(format!("region-worker-{index}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if job.cancelled.load(Ordering::Acquire) {
                            tracing::trace!("dropping task for unloaded region {}", job.region);
                        } else if catch_unwind(AssertUnwindSafe(job.task)).is_err() {
                            tracing::error!("task for region {} panicked", job.region);
                        }
                        in_flight.fetch_sub(1, Ordering::AcqRel);
                    }
                })
                .map_err(CacheError::WorkerSpawn)?;

            senders.push(sender);
            handles.push(handle);
        }

        tracing::debug!("started {thread_count} region workers");
        Ok(Self {
            senders,
            handles,
            active: Arc::new(DashMap::with_hasher(FxBuildHasher)),
            in_flight,
        })
    }

    /// Create a pool sized from the CPU count, leaving headroom for the caller.
    pub fn with_defaults() -> Result<Self, CacheError> {
        let cpus = num_cpus::get().max(2);
        Self::new((cpus - 1).max(1))
    }

    /// Create a pool from a configured thread count (0 = [`with_defaults`](Self::with_defaults)).
    pub fn with_threads(threads: usize) -> Result<Self, CacheError> {
        if threads == 0 {
            Self::with_defaults()
        } else {
            Self::new(threads)
        }
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.senders.len()
    }

    /// Number of tasks currently queued or executing.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Blocks until no task is in flight or `timeout` elapses.
    ///
    /// Returns `true` if the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight_count() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn worker_for(&self, region: RegionAddress) -> usize {
        (FxBuildHasher.hash_one(region) % self.senders.len() as u64) as usize
    }
}

impl TaskQueue for RegionWorkerPool {
    fn enqueue(&self, region: RegionAddress, task: Task) {
        let cancelled = Arc::clone(
            self.active
                .entry(region)
                .or_insert_with(|| Arc::new(AtomicBool::new(false)))
                .value(),
        );
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        let job = Job {
            region,
            task,
            cancelled,
        };
        if self.senders[self.worker_for(region)].send(job).is_err() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            tracing::error!("region worker for {region} has shut down; task dropped");
        }
    }

    fn close(&self, region: RegionAddress) {
        if let Some((_, cancelled)) = self.active.remove(&region) {
            cancelled.store(true, Ordering::Release);
        }
    }
}

impl Drop for RegionWorkerPool {
    fn drop(&mut self) {
        // Disconnect the channels so workers exit after draining.
        self.senders.clear();
        let current = std::thread::current().id();
        for handle in self.handles.drain(..) {
            // The last owner can be a task running on one of the workers.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("region worker exited abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_tasks_for_one_region_run_in_order() {
        let pool = RegionWorkerPool::new(4).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let region = RegionAddress::new(3, -2);

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            pool.enqueue(
                region,
                Box::new(move || {
                    seen.lock().unwrap().push(i);
                }),
            );
        }

        assert!(pool.wait_idle(TIMEOUT));
        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_regions_run_in_parallel_without_losing_tasks() {
        let pool = RegionWorkerPool::new(4).unwrap();
        let counter = Arc::new(AtomicU64::new(0));

        for x in 0..8 {
            for z in 0..8 {
                let counter = Arc::clone(&counter);
                pool.enqueue(
                    RegionAddress::new(x, z),
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }),
                );
            }
        }

        assert!(pool.wait_idle(TIMEOUT));
        assert_eq!(counter.load(Ordering::Relaxed), 64);
        assert_eq!(pool.in_flight_count(), 0);
    }

    #[test]
    fn test_close_drops_pending_tasks() {
        let pool = RegionWorkerPool::new(1).unwrap();
        let region = RegionAddress::new(0, 0);
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let ran = Arc::new(AtomicBool::new(false));

        // Block the only worker until the region has been closed.
        pool.enqueue(
            RegionAddress::new(9, 9),
            Box::new(move || {
                let _ = gate_rx.recv();
            }),
        );
        let flag = Arc::clone(&ran);
        pool.enqueue(region, Box::new(move || flag.store(true, Ordering::Release)));
        pool.close(region);
        gate_tx.send(()).unwrap();

        assert!(pool.wait_idle(TIMEOUT));
        assert!(!ran.load(Ordering::Acquire));
    }

    #[test]
    fn test_tasks_after_close_run() {
        let pool = RegionWorkerPool::new(2).unwrap();
        let region = RegionAddress::new(1, 1);
        pool.close(region);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        pool.enqueue(region, Box::new(move || flag.store(true, Ordering::Release)));
        assert!(pool.wait_idle(TIMEOUT));
        assert!(ran.load(Ordering::Acquire));
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = RegionWorkerPool::new(1).unwrap();
        let region = RegionAddress::new(0, 0);
        let explode = true;
        pool.enqueue(
            region,
            Box::new(move || {
                if explode {
                    panic!("boom");
                }
            }),
        );
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        pool.enqueue(region, Box::new(move || flag.store(true, Ordering::Release)));
        assert!(pool.wait_idle(TIMEOUT));
        assert!(ran.load(Ordering::Acquire));
    }

    #[test]
    fn test_pool_dropped_from_own_worker() {
        let pool = Arc::new(RegionWorkerPool::new(2).unwrap());
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let last_owner = Arc::clone(&pool);
        pool.enqueue(
            RegionAddress::new(0, 0),
            Box::new(move || {
                drop(last_owner);
                let _ = done_tx.send(());
            }),
        );
        drop(pool);
        assert!(done_rx.recv_timeout(TIMEOUT).is_ok());
    }

    #[test]
    fn test_zero_threads_clamped_to_one() {
        let pool = RegionWorkerPool::new(0).unwrap();
        assert_eq!(pool.thread_count(), 1);
    }
}
