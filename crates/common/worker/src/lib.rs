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

//! Supervised multi-worker execution engine: a fixed pool of long-lived
//! workers, a manager loop that restarts on liveness/memory/thread/uptime
//! thresholds, an SCM watchdog, a detached restart orchestrator, and a
//! non-reentrant timer scheduler with weak-reference callback lifetime.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use rsketch_common_worker::{
//!     manager_loop,
//!     pool::{Work, WorkerPool},
//!     scm::SystemctlScm,
//!     settings::Settings,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! struct Heartbeat;
//!
//! #[async_trait::async_trait]
//! impl Work for Heartbeat {
//!     async fn work(&self, index: usize) -> Result<bool, rsketch_error::Error> {
//!         tracing::info!(index, "tick");
//!         Ok(false)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::default();
//!     let pool = WorkerPool::new(Heartbeat, vec![5, 5], vec![], settings.wait_for_exit);
//!     pool.start_all();
//!
//!     let cancel = CancellationToken::new();
//!     manager_loop::run(pool.clone(), settings, Arc::new(SystemctlScm), cancel).await;
//! }
//! ```
//!
//! # Architecture
//!
//! - [`pool`]: [`pool::WorkerPool`] / [`pool::Work`], the supervised worker
//!   state machine.
//! - [`manager_loop`]: the 60 s liveness/memory/thread/uptime/watchdog
//!   supervisor.
//! - [`restart`]: the detached stop/wait/start restart orchestrator.
//! - [`watchdog`]: peer-service keep-alive.
//! - [`scm`]: the service-control-manager abstraction the above consume.
//! - [`timer`]: the ordered, non-reentrant timer scheduler and weak
//!   callbacks.
//! - [`settings`]: recognized configuration fields.

pub mod manager_loop;
mod metrics;
pub mod pool;
pub mod restart;
pub mod scm;
pub mod settings;
pub mod timer;
pub mod watchdog;

pub use metrics::{
    MANAGER_RESTARTS_TOTAL, TIMER_FIRES_TOTAL, WATCHDOG_ACTIONS_TOTAL, WORKER_ACTIVE,
    WORKER_EXECUTION_DURATION_SECONDS, WORKER_FAULTS, WORKER_RESTARTS, WORKER_STARTED,
    WORKER_STOPPED,
};
pub use pool::{Work, WorkerHandle, WorkerPool};
pub use scm::{Scm, ScmAction, SystemctlScm, TriState};
pub use settings::Settings;
pub use timer::{Scheduler, SchedulerRegistry, TimerHandle, TimerSpec};
