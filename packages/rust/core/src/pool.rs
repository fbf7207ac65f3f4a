//! Fixed-size worker pool with blocking submission.
//!
//! The pool hands out one permit per worker. `submit` waits for a permit
//! before enqueueing, so the number of accepted-but-unfinished tasks never
//! exceeds the worker count and a saturated pool throttles its caller instead
//! of buffering work.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use storefinder_shared::{Result, StoreFinderError};

/// A unit of work executed once by a pool worker.
pub trait Task: Send + 'static {
    /// Short human-readable label used in logs.
    fn label(&self) -> String;

    /// Execute the task. Errors are logged by the worker and go no further.
    fn run(self) -> impl Future<Output = Result<()>> + Send;
}

/// An accepted task together with the permit it occupies.
struct Job<T> {
    task: T,
    permit: OwnedSemaphorePermit,
}

/// Bounded pool of `size` workers draining a shared queue.
pub struct WorkerPool<T: Task> {
    size: usize,
    permits: Arc<Semaphore>,
    sender: Mutex<Option<mpsc::Sender<Job<T>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Task> WorkerPool<T> {
    /// Spawn `size` workers on the current tokio runtime. A size of 0 is treated as 1.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job<T>>(size);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|worker_id| {
                let rx = Arc::clone(&receiver);
                tokio::spawn(worker_loop(worker_id, rx))
            })
            .collect();

        info!(size, "worker pool started");

        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Hand `task` to the pool, waiting until a worker is free to take it.
    ///
    /// Returns `PoolClosed` once [`shutdown`](Self::shutdown) has begun.
    pub async fn submit(&self, task: T) -> Result<()> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StoreFinderError::PoolClosed)?;

        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(StoreFinderError::PoolClosed)?;

        sender
            .send(Job { task, permit })
            .await
            .map_err(|_| StoreFinderError::PoolClosed)
    }

    /// Stop accepting tasks and wait for every accepted task and worker to finish.
    ///
    /// Calling it again after it has returned is a no-op.
    pub async fn shutdown(&self) {
        self.permits.close();
        self.sender.lock().await.take();

        let workers = std::mem::take(&mut *self.workers.lock().await);
        if workers.is_empty() {
            return;
        }

        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "worker exited abnormally");
            }
        }
        info!(size = self.size, "worker pool stopped");
    }

    /// Fixed number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks accepted and not yet finished.
    pub fn in_flight(&self) -> usize {
        if self.permits.is_closed() {
            return 0;
        }
        self.size - self.permits.available_permits()
    }
}

impl<T: Task> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("available", &self.permits.available_permits())
            .finish()
    }
}

async fn worker_loop<T: Task>(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job<T>>>>) {
    loop {
        // Lock is released before the task runs so idle workers can take the next job.
        let next = receiver.lock().await.recv().await;
        let Some(Job { task, permit }) = next else {
            break;
        };

        let label = task.label();
        debug!(worker_id, task = %label, "task started");

        // Run on its own tokio task so a panic stays contained to this job.
        match tokio::spawn(task.run()).await {
            Ok(Ok(())) => debug!(worker_id, task = %label, "task finished"),
            Ok(Err(e)) => warn!(worker_id, task = %label, error = %e, "task failed"),
            Err(e) => error!(worker_id, task = %label, error = %e, "task panicked"),
        }

        drop(permit);
    }
    debug!(worker_id, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Test task: waits on `gate`, records its id, tracks concurrency.
    struct Tracked {
        id: usize,
        gate: Option<Arc<Semaphore>>,
        outcome: Outcome,
        done: Arc<std::sync::Mutex<Vec<usize>>>,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Ok,
        Fail,
        Panic,
    }

    #[derive(Clone, Default)]
    struct Tracker {
        gate: Option<Arc<Semaphore>>,
        done: Arc<std::sync::Mutex<Vec<usize>>>,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Tracker {
        fn gated() -> Self {
            Self {
                gate: Some(Arc::new(Semaphore::new(0))),
                ..Default::default()
            }
        }

        fn task(&self, id: usize, outcome: Outcome) -> Tracked {
            Tracked {
                id,
                gate: self.gate.clone(),
                outcome,
                done: Arc::clone(&self.done),
                running: Arc::clone(&self.running),
                peak: Arc::clone(&self.peak),
            }
        }

        fn release(&self, n: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(n);
            }
        }

        fn done(&self) -> Vec<usize> {
            let mut done = self.done.lock().unwrap().clone();
            done.sort_unstable();
            done
        }
    }

    impl Task for Tracked {
        fn label(&self) -> String {
            format!("job-{}", self.id)
        }

        async fn run(self) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            } else {
                tokio::task::yield_now().await;
            }

            self.running.fetch_sub(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Ok => {
                    self.done.lock().unwrap().push(self.id);
                    Ok(())
                }
                Outcome::Fail => Err(StoreFinderError::Network("boom".into())),
                Outcome::Panic => panic!("job {} panicked", self.id),
            }
        }
    }

    #[tokio::test]
    async fn runs_every_submitted_task() {
        let pool = WorkerPool::new(2);
        let tracker = Tracker::default();
        for id in 0..10 {
            pool.submit(tracker.task(id, Outcome::Ok)).await.unwrap();
        }
        pool.shutdown().await;
        assert_eq!(tracker.done(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn zero_size_is_coerced_to_one() {
        let pool: WorkerPool<Tracked> = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_size() {
        let pool = Arc::new(WorkerPool::new(3));
        let tracker = Tracker::default();
        for id in 0..50 {
            pool.submit(tracker.task(id, Outcome::Ok)).await.unwrap();
            assert!(pool.in_flight() <= 3);
        }
        pool.shutdown().await;
        assert!(tracker.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(tracker.done().len(), 50);
    }

    #[tokio::test]
    async fn excess_submission_blocks_until_a_worker_frees_up() {
        let pool = Arc::new(WorkerPool::new(2));
        let tracker = Tracker::gated();

        pool.submit(tracker.task(0, Outcome::Ok)).await.unwrap();
        pool.submit(tracker.task(1, Outcome::Ok)).await.unwrap();
        assert_eq!(pool.in_flight(), 2);

        let blocked = tokio::spawn({
            let pool = Arc::clone(&pool);
            let task = tracker.task(2, Outcome::Ok);
            async move { pool.submit(task).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "third submit must wait for a free worker");

        tracker.release(1);
        tokio::time::timeout(Duration::from_secs(5), blocked)
            .await
            .expect("submit unblocked")
            .unwrap()
            .unwrap();

        tracker.release(2);
        pool.shutdown().await;
        assert_eq!(tracker.done(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn failures_and_panics_do_not_kill_workers() {
        let pool = WorkerPool::new(1);
        let tracker = Tracker::default();

        pool.submit(tracker.task(0, Outcome::Fail)).await.unwrap();
        pool.submit(tracker.task(1, Outcome::Panic)).await.unwrap();
        pool.submit(tracker.task(2, Outcome::Ok)).await.unwrap();
        pool.submit(tracker.task(3, Outcome::Ok)).await.unwrap();

        pool.shutdown().await;
        assert_eq!(tracker.done(), vec![2, 3]);
    }

    #[tokio::test]
    async fn shutdown_waits_for_accepted_tasks() {
        let pool = Arc::new(WorkerPool::new(2));
        let tracker = Tracker::gated();

        pool.submit(tracker.task(0, Outcome::Ok)).await.unwrap();
        pool.submit(tracker.task(1, Outcome::Ok)).await.unwrap();

        let shutdown = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.shutdown().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!shutdown.is_finished(), "shutdown must wait for running tasks");
        assert!(tracker.done().is_empty());

        tracker.release(2);
        tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .expect("shutdown finished")
            .unwrap();
        assert_eq!(tracker.done(), vec![0, 1]);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let pool = WorkerPool::new(2);
        let tracker = Tracker::default();
        pool.shutdown().await;

        let err = pool.submit(tracker.task(0, Outcome::Ok)).await.unwrap_err();
        assert!(matches!(err, StoreFinderError::PoolClosed));

        // Second shutdown is a no-op.
        pool.shutdown().await;
        assert!(tracker.done().is_empty());
    }
}
