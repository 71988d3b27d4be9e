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

//! Wires the Worker Pool, Manager Loop, default Timer Scheduler, and an
//! SCM adapter into one long-running service host.

pub mod console;

use std::sync::Arc;

use bon::Builder;
use rsketch_common_worker::{
    Scm, Settings, SystemctlScm, Work, WorkerPool,
    timer::{SchedulerRegistry, install_clock_refresh},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Top-level service host configuration. `work` and `intervals` describe
/// the worker pool; everything else comes from [`Settings`].
#[derive(Builder)]
pub struct ServiceHostConfig<W: Work> {
    pub work:      W,
    pub intervals: Vec<i64>,
    #[builder(default)]
    pub thread_names: Vec<String>,
    pub settings:  Settings,
    #[builder(default = Arc::new(SystemctlScm))]
    pub scm:       Arc<dyn Scm>,
}

/// A running service host: the worker pool, its manager loop, and the
/// default timer scheduler (hosting the cached-clock refresh).
pub struct ServiceHost<W: Work> {
    pool:     Arc<WorkerPool<W>>,
    settings: Settings,
    scm:      Arc<dyn Scm>,
    cancel:   CancellationToken,
    manager:  std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<W: Work> ServiceHost<W> {
    #[must_use]
    pub fn new(config: ServiceHostConfig<W>) -> Arc<Self> {
        let pool = WorkerPool::new(
            config.work,
            config.intervals,
            config.thread_names,
            config.settings.wait_for_exit,
        );
        Arc::new(Self {
            pool,
            settings: config.settings,
            scm: config.scm,
            cancel: CancellationToken::new(),
            manager: std::sync::Mutex::new(None),
        })
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool<W>> { &self.pool }

    #[must_use]
    pub fn settings(&self) -> &Settings { &self.settings }

    #[must_use]
    pub fn scm(&self) -> &Arc<dyn Scm> { &self.scm }

    /// `WorkerPool::StartWork()`: starts every enabled worker, installs the
    /// default scheduler's clock-refresh timer, then starts the manager
    /// loop.
    pub fn start(self: &Arc<Self>) {
        let scheduler = SchedulerRegistry::get_or_create(SchedulerRegistry::DEFAULT);
        install_clock_refresh(&scheduler);

        self.pool.start_all();
        info!(threads = self.pool.thread_count(), "worker pool started");

        let pool = self.pool.clone();
        let settings = self.settings.clone();
        let scm = self.scm.clone();
        let cancel = self.cancel.clone();
        let join = tokio::spawn(rsketch_common_worker::manager_loop::run(pool, settings, scm, cancel));
        *self.manager.lock().unwrap() = Some(join);
    }

    /// `WorkerPool::StopWork()`: stops the manager loop, then every worker.
    pub async fn stop(self: &Arc<Self>) {
        self.cancel.cancel();
        if let Some(join) = self.manager.lock().unwrap().take() {
            let _ = join.await;
        }
        self.pool.stop_all().await;
        info!("worker pool stopped");
    }

    /// Runs `Work(i)` once for every worker index, then returns; this is the
    /// `-step` CLI behavior.
    pub async fn step_once(&self) {
        for index in 0..self.pool.thread_count() {
            info!(index, "step: running Work once");
            if let Err(error) = self.pool.work().work(index).await {
                info!(index, %error, "step: work returned an error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct NoopWork;

    #[async_trait::async_trait]
    impl Work for NoopWork {
        async fn work(&self, _index: usize) -> Result<bool, rsketch_error::Error> { Ok(false) }
    }

    #[tokio::test]
    async fn starts_and_stops_cleanly() {
        let host = ServiceHost::new(
            ServiceHostConfig::builder()
                .work(NoopWork)
                .intervals(vec![1])
                .settings(Settings::builder().wait_for_exit(Duration::from_millis(200)).build())
                .build(),
        );
        host.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(host.pool().handle(0).unwrap().is_active());
        host.stop().await;
        assert!(!host.pool().handle(0).unwrap().is_active());
    }
}
