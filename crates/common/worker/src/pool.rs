// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! N long-lived workers, each on its own period, with a resettable wake
//! signal and a last-active timestamp the Manager Loop watches for
//! liveness.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use tokio::{sync::Notify, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::metrics::{
    WORKER_ACTIVE, WORKER_EXECUTION_DURATION_SECONDS, WORKER_FAULTS, WORKER_RESTARTS, WORKER_STARTED, WORKER_STOPPED,
};

/// Implemented by callers that want `WorkerPool` to drive their logic.
/// `work` returning `Ok(true)` requests an immediate re-run with no sleep.
#[async_trait::async_trait]
pub trait Work: Send + Sync + 'static {
    async fn work(&self, index: usize) -> Result<bool, rsketch_error::Error>;
}

fn now_unix_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Per-worker liveness bookkeeping, readable by the Manager Loop without
/// taking any lock the worker itself holds.
pub struct WorkerHandle {
    index:        usize,
    active:       AtomicBool,
    last_active:  AtomicI64,
    wake:         Arc<Notify>,
    cancel:       std::sync::Mutex<CancellationToken>,
    join:         std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    #[must_use]
    pub fn index(&self) -> usize { self.index }

    #[must_use]
    pub fn is_active(&self) -> bool { self.active.load(Ordering::Acquire) }

    #[must_use]
    pub fn last_active_unix_secs(&self) -> i64 { self.last_active.load(Ordering::Acquire) }

    /// Wakes the worker immediately, skipping the rest of its current sleep.
    pub fn wake_now(&self) { self.wake.notify_one(); }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join
            .lock()
            .unwrap()
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }
}

/// `thread_count` long-lived workers sharing one `Work` implementation,
/// each on its own configured interval.
pub struct WorkerPool<W: Work> {
    work:           Arc<W>,
    intervals:      Vec<i64>,
    thread_names:   Vec<String>,
    workers:        Vec<Arc<WorkerHandle>>,
    shutting_down:  Arc<AtomicBool>,
    started_at:     std::sync::Mutex<Option<Instant>>,
    wait_for_exit:  Duration,
}

impl<W: Work> WorkerPool<W> {
    /// `thread_count` is `intervals.len()`. `thread_names[i]` defaults to
    /// `A{i}` when absent.
    #[must_use]
    pub fn new(work: W, intervals: Vec<i64>, thread_names: Vec<String>, wait_for_exit: Duration) -> Arc<Self> {
        let thread_count = intervals.len();
        let thread_names = (0..thread_count)
            .map(|i| thread_names.get(i).cloned().unwrap_or_else(|| format!("A{i}")))
            .collect();
        let workers = (0..thread_count)
            .map(|index| {
                Arc::new(WorkerHandle {
                    index,
                    active: AtomicBool::new(false),
                    last_active: AtomicI64::new(0),
                    wake: Arc::new(Notify::new()),
                    cancel: std::sync::Mutex::new(CancellationToken::new()),
                    join: std::sync::Mutex::new(None),
                })
            })
            .collect();
        Arc::new(Self {
            work: Arc::new(work),
            intervals,
            thread_names,
            workers,
            shutting_down: Arc::new(AtomicBool::new(false)),
            started_at: std::sync::Mutex::new(None),
            wait_for_exit,
        })
    }

    #[must_use]
    pub fn thread_count(&self) -> usize { self.workers.len() }

    #[must_use]
    pub fn work(&self) -> &Arc<W> { &self.work }

    #[must_use]
    pub fn handle(&self, index: usize) -> Option<&Arc<WorkerHandle>> { self.workers.get(index) }

    #[must_use]
    pub fn workers(&self) -> &[Arc<WorkerHandle>] { &self.workers }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool { self.shutting_down.load(Ordering::Acquire) }

    #[must_use]
    pub fn started_at(&self) -> Option<Instant> { *self.started_at.lock().unwrap() }

    fn period_ms(&self, index: usize) -> u64 {
        let period = self.intervals[index.min(self.intervals.len() - 1)];
        (period.max(0) as u64) * 1000
    }

    /// Starts every worker whose configured interval is non-negative.
    /// Errors during an individual worker's preflight are logged; the
    /// remaining workers still start.
    pub fn start_all(self: &Arc<Self>) {
        *self.started_at.lock().unwrap() = Some(Instant::now());
        self.shutting_down.store(false, Ordering::Release);
        for i in 0..self.workers.len() {
            if self.intervals[i] >= 0 {
                self.start_one(i);
            } else {
                info!(worker = %self.thread_names[i], "worker disabled by negative interval");
            }
        }
    }

    /// Starts worker `i`. Calling this while the worker is already active is
    /// a caller error; use [`Self::stop_one`] first.
    pub fn start_one(self: &Arc<Self>, index: usize) {
        let Some(handle) = self.workers.get(index) else {
            warn!(index, "start_one: no such worker");
            return;
        };
        handle.active.store(true, Ordering::Release);
        handle.last_active.store(now_unix_secs(), Ordering::Release);
        // Caller contract: start_one is only called after the previous task
        // for this index has fully exited, so replacing the token here is
        // race-free.
        *handle.cancel.lock().unwrap() = CancellationToken::new();

        let name = self.thread_names[index].clone();
        let pool = self.clone();
        let join = tokio::spawn(
            async move { pool.run_worker(index).await }.instrument(info_span!("worker", name = %name)),
        );
        *handle.join.lock().unwrap() = Some(join);
        WORKER_STARTED.with_label_values(&[&name]).inc();
    }

    async fn run_worker(self: Arc<Self>, index: usize) {
        let handle = self.workers[index].clone();
        let name = self.thread_names[index].clone();
        WORKER_ACTIVE.with_label_values(&[&name]).set(1);
        loop {
            handle.last_active.store(now_unix_secs(), Ordering::Release);
            let start = Instant::now();
            let outcome = self.work.work(index).await;
            WORKER_EXECUTION_DURATION_SECONDS
                .with_label_values(&[&name])
                .observe(start.elapsed().as_secs_f64());
            let run_again = match outcome {
                Ok(run_again) => run_again,
                Err(error) => {
                    warn!(worker = %name, %error, "work returned an error, continuing");
                    WORKER_FAULTS.with_label_values(&[&name]).inc();
                    false
                }
            };
            handle.last_active.store(now_unix_secs(), Ordering::Release);

            if self.shutting_down.load(Ordering::Acquire) {
                info!(worker = %name, "shutting down, exiting loop");
                break;
            }

            if !run_again {
                let period = self.period_ms(index);
                let cancel = handle.cancel.lock().unwrap().clone();
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(Duration::from_millis(period.max(1))) => {},
                    () = handle.wake.notified() => {},
                }
            }

            if !handle.active.load(Ordering::Acquire) {
                info!(worker = %name, "deactivated, exiting loop");
                break;
            }
        }
        WORKER_ACTIVE.with_label_values(&[&name]).set(0);
    }

    /// Stops the whole pool: signals every worker to stop, waits up to
    /// `wait_for_exit` per worker, then force-cancels stragglers.
    pub async fn stop_all(self: &Arc<Self>) {
        self.shutting_down.store(true, Ordering::Release);
        for handle in &self.workers {
            handle.active.store(false, Ordering::Release);
            handle.wake.notify_one();
        }
        for index in 0..self.workers.len() {
            self.join_or_abort(index).await;
        }
    }

    /// Marks the pool as shutting down and wakes every worker so each
    /// notices the flag at the end of its current iteration, without
    /// joining or cancelling anything. Used by the Restart Orchestrator,
    /// which drains by polling rather than joining.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        for handle in &self.workers {
            handle.wake.notify_one();
        }
    }

    #[must_use]
    pub fn all_finished(&self) -> bool { self.workers.iter().all(|w| w.is_finished()) }

    /// Forcibly cancels worker `i` without waiting for a graceful exit.
    pub fn stop_one(self: &Arc<Self>, index: usize) {
        if let Some(handle) = self.workers.get(index) {
            handle.active.store(false, Ordering::Release);
            handle.cancel.lock().unwrap().cancel();
            handle.wake.notify_one();
        }
    }

    /// Joins worker `i` within `wait_for_exit`; if it has not exited by
    /// then, aborts its task outright. Matches `StopWork(i)`'s documented
    /// forceful, no-join fallback semantics.
    async fn join_or_abort(&self, index: usize) {
        let name = &self.thread_names[index];
        let mut join = self.workers[index].join.lock().unwrap().take();
        let Some(handle) = join.as_mut() else { return };
        tokio::select! {
            result = handle => {
                match result {
                    Ok(()) => { WORKER_STOPPED.with_label_values(&[name]).inc(); }
                    Err(join_error) => {
                        warn!(worker = %name, %join_error, "worker task panicked");
                        WORKER_STOPPED.with_label_values(&[name]).inc();
                    }
                }
            }
            () = tokio::time::sleep(self.wait_for_exit) => {
                warn!(worker = %name, "worker did not exit within deadline, aborting");
                handle.abort();
                self.workers[index].cancel.lock().unwrap().cancel();
                WORKER_RESTARTS.with_label_values(&[name]).inc();
            }
        }
    }

    /// Restarts worker `i`: stops it (waiting up to `wait_for_exit`), then
    /// starts a fresh instance. Used by the Manager Loop's liveness check.
    pub async fn restart_one(self: &Arc<Self>, index: usize) {
        self.workers[index].active.store(false, Ordering::Release);
        self.workers[index].wake.notify_one();
        self.join_or_abort(index).await;
        self.start_one(index);
        WORKER_RESTARTS.with_label_values(&[&self.thread_names[index]]).inc();
    }

    #[must_use]
    pub fn thread_name(&self, index: usize) -> &str { &self.thread_names[index] }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct CountingWork {
        counts: Vec<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Work for CountingWork {
        async fn work(&self, index: usize) -> Result<bool, rsketch_error::Error> {
            self.counts[index].fetch_add(1, Ordering::SeqCst);
            // worker 1 always requests immediate re-run, worker 0 sleeps
            Ok(index == 1)
        }
    }

    #[tokio::test]
    async fn two_worker_liveness() {
        let work = CountingWork {
            counts: vec![AtomicUsize::new(0), AtomicUsize::new(0)],
        };
        let pool = WorkerPool::new(work, vec![1, 2], vec![], Duration::from_millis(500));
        pool.start_all();
        tokio::time::sleep(Duration::from_millis(3100)).await;
        pool.stop_all().await;

        let work = &pool.work;
        assert!(work.counts[0].load(Ordering::SeqCst) >= 2);
        assert!(work.counts[1].load(Ordering::SeqCst) >= 3);
        assert!(!pool.handle(0).unwrap().is_active());
        assert!(!pool.handle(1).unwrap().is_active());
    }

    struct AlwaysFailWork;

    #[async_trait::async_trait]
    impl Work for AlwaysFailWork {
        async fn work(&self, _index: usize) -> Result<bool, rsketch_error::Error> {
            Err(rsketch_error::Error::Configuration {
                message: "synthetic failure".to_string(),
                loc:     snafu::Location::new(file!(), line!(), column!()),
            })
        }
    }

    #[tokio::test]
    async fn worker_survives_repeated_work_errors() {
        let pool = WorkerPool::new(AlwaysFailWork, vec![0], vec![], Duration::from_millis(500));
        pool.start_all();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pool.handle(0).unwrap().is_active());
        assert!(pool.handle(0).unwrap().last_active_unix_secs() > 0);
        pool.stop_all().await;
    }
}
