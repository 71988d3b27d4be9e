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

//! The supervisor task: once every 60 s, checks liveness, memory, thread
//! count, uptime, and watchdog peers, in that exact order, and triggers a
//! restart when a threshold trips.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::{
    metrics::MANAGER_RESTARTS_TOTAL,
    pool::{Work, WorkerPool},
    restart::trigger_restart,
    scm::Scm,
    settings::Settings,
    watchdog::check_watchdog,
};

const TICK: Duration = Duration::from_secs(60);

/// Runs the manager loop until `cancel` fires. Each tick runs
/// `CheckActive → CheckMemory → CheckThread → CheckAutoRestart →
/// CheckWatchDog` in order; if any of the three threshold checks trips, a
/// restart is triggered and the loop exits (the process is expected to be
/// taken down by the restart script).
pub async fn run<W: Work>(
    pool: Arc<WorkerPool<W>>,
    settings: Settings,
    scm: Arc<dyn Scm>,
    cancel: CancellationToken,
) {
    let span = info_span!("manager", name = "AM");
    async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(TICK) => {},
            }

            check_active(&pool, &settings).await;

            if check_memory(&settings) {
                MANAGER_RESTARTS_TOTAL.with_label_values(&["memory"]).inc();
                trigger_restart(&pool, &settings.service_name).await;
                break;
            }
            if check_thread(&settings) {
                MANAGER_RESTARTS_TOTAL.with_label_values(&["thread"]).inc();
                trigger_restart(&pool, &settings.service_name).await;
                break;
            }
            if check_auto_restart(&pool, &settings) {
                MANAGER_RESTARTS_TOTAL.with_label_values(&["auto_restart"]).inc();
                trigger_restart(&pool, &settings.service_name).await;
                break;
            }

            let scm = scm.clone();
            let peers = settings.watch_dog.clone();
            tokio::spawn(check_watchdog(scm, peers));
        }
    }
    .instrument(span)
    .await;
}

/// `CheckActive`: restarts any worker whose task has terminated, or whose
/// `last_active` has not advanced within `max_active_secs`.
async fn check_active<W: Work>(pool: &Arc<WorkerPool<W>>, settings: &Settings) {
    let now = chrono::Utc::now().timestamp();
    for index in 0..pool.thread_count() {
        let Some(handle) = pool.handle(index) else { continue };
        if !pool.is_shutting_down() && handle.is_active() && handle.is_finished() {
            warn!(worker = pool.thread_name(index), "worker task terminated unexpectedly, restarting");
            pool.restart_one(index).await;
            continue;
        }
        if settings.max_active_secs > 0 {
            let stalled = now - handle.last_active_unix_secs() > settings.max_active_secs as i64;
            if stalled {
                warn!(
                    worker = pool.thread_name(index),
                    max_active_secs = settings.max_active_secs,
                    "worker exceeded max active interval, restarting"
                );
                pool.restart_one(index).await;
            }
        }
    }
}

/// `CheckMemory`: `true` when the process's resident memory exceeds
/// `max_memory_mib`. Disabled when the setting is `0`.
fn check_memory(settings: &Settings) -> bool {
    if settings.max_memory_mib == 0 {
        return false;
    }
    let Some(stats) = rsketch_common_util::current_process_stats() else {
        return false;
    };
    let exceeded = stats.memory_mib > settings.max_memory_mib;
    if exceeded {
        warn!(memory_mib = stats.memory_mib, max = settings.max_memory_mib, "memory threshold exceeded");
    }
    exceeded
}

/// `CheckThread`: `true` when the process's thread count exceeds
/// `max_thread`. Disabled when the setting is `0`.
fn check_thread(settings: &Settings) -> bool {
    if settings.max_thread == 0 {
        return false;
    }
    let Some(stats) = rsketch_common_util::current_process_stats() else {
        return false;
    };
    let Some(thread_count) = stats.thread_count else {
        return false;
    };
    let exceeded = thread_count > settings.max_thread;
    if exceeded {
        warn!(thread_count, max = settings.max_thread, "thread threshold exceeded");
    }
    exceeded
}

/// `CheckAutoRestart`: `true` when the pool has been running longer than
/// `auto_restart_minutes`. Disabled when the setting is `0`.
fn check_auto_restart<W: Work>(pool: &Arc<WorkerPool<W>>, settings: &Settings) -> bool {
    if settings.auto_restart_minutes == 0 {
        return false;
    }
    let Some(started_at) = pool.started_at() else {
        return false;
    };
    let uptime = started_at.elapsed();
    let exceeded = uptime > Duration::from_secs(settings.auto_restart_minutes * 60);
    if exceeded {
        info!(uptime_secs = uptime.as_secs(), "auto-restart interval reached");
    }
    exceeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::SystemctlScm;

    struct NoopWork;

    #[async_trait::async_trait]
    impl Work for NoopWork {
        async fn work(&self, _index: usize) -> Result<bool, rsketch_error::Error> { Ok(false) }
    }

    #[test]
    fn memory_check_disabled_at_zero() {
        let settings = Settings::builder().max_memory_mib(0).build();
        assert!(!check_memory(&settings));
    }

    #[test]
    fn thread_check_disabled_at_zero() {
        let settings = Settings::builder().max_thread(0).build();
        assert!(!check_thread(&settings));
    }

    #[tokio::test]
    async fn auto_restart_disabled_at_zero() {
        let pool = WorkerPool::new(NoopWork, vec![1], vec![], Duration::from_millis(100));
        pool.start_all();
        let settings = Settings::builder().auto_restart_minutes(0).build();
        assert!(!check_auto_restart(&pool, &settings));
        pool.stop_all().await;
    }

    #[test]
    fn scm_placeholder_compiles() {
        let _scm: Arc<dyn Scm> = Arc::new(SystemctlScm);
    }
}
