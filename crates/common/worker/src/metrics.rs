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

use lazy_static::lazy_static;
use prometheus::{
    HistogramVec, IntCounterVec, IntGaugeVec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec,
};

pub const WORKER_LABEL: &str = "worker";

lazy_static! {
    pub static ref WORKER_STARTED: IntCounterVec = register_int_counter_vec!(
        "rsketch_worker_started_total",
        "number of times a worker task has been started",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref WORKER_STOPPED: IntCounterVec = register_int_counter_vec!(
        "rsketch_worker_stopped_total",
        "number of times a worker task has exited cleanly",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref WORKER_RESTARTS: IntCounterVec = register_int_counter_vec!(
        "rsketch_worker_restarts_total",
        "number of times the manager loop has restarted a worker",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref WORKER_FAULTS: IntCounterVec = register_int_counter_vec!(
        "rsketch_worker_faults_total",
        "number of Work() invocations that returned an error",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref WORKER_ACTIVE: IntGaugeVec = register_int_gauge_vec!(
        "rsketch_worker_active",
        "1 if the worker is currently active, 0 otherwise",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref WORKER_EXECUTION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "rsketch_worker_execution_duration_seconds",
        "time spent inside a single Work() invocation",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref MANAGER_RESTARTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rsketch_manager_restarts_total",
        "number of process restarts triggered by the manager loop, by reason",
        &["reason"]
    )
    .unwrap();
    pub static ref WATCHDOG_ACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rsketch_watchdog_actions_total",
        "number of start requests issued by the watchdog, by peer service",
        &["peer"]
    )
    .unwrap();
    pub static ref TIMER_FIRES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rsketch_timer_fires_total",
        "number of timer dispatches, by scheduler name",
        &["scheduler"]
    )
    .unwrap();
}
