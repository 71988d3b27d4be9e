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

//! A process-wide cached clock, refreshed every 500 ms by a timer on the
//! default scheduler. This is an optimization for hot paths that want a
//! timestamp without an OS call; it must never be used for `cost_ms`
//! measurement, drain budgeting, or any interval below 500 ms. Those use
//! [`std::time::Instant`] directly, as the scheduler's own dispatch loop
//! does.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use super::scheduler::{Scheduler, TimerSpec};
use crate::timer::weak::static_callback;

static CACHED_NOW_MILLIS: AtomicU64 = AtomicU64::new(0);

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Returns the cached "now," in epoch milliseconds. Until
/// [`install_clock_refresh`] has run at least once, falls back to a direct
/// OS read so early callers never see a zero timestamp.
#[must_use]
pub fn now_ms() -> u64 {
    let cached = CACHED_NOW_MILLIS.load(Ordering::Relaxed);
    if cached == 0 { wall_clock_ms() } else { cached }
}

/// Registers the 500 ms clock-refresh timer on `scheduler`. Intended to be
/// called once, on the process's default scheduler, at startup.
pub fn install_clock_refresh(scheduler: &Arc<Scheduler>) -> super::scheduler::TimerHandle {
    CACHED_NOW_MILLIS.store(wall_clock_ms(), Ordering::Relaxed);
    scheduler.add_timer(TimerSpec {
        callback: static_callback(|| {
            CACHED_NOW_MILLIS.store(wall_clock_ms(), Ordering::Relaxed);
        }),
        initial_delay: Duration::from_millis(500),
        period: Some(Duration::from_millis(500)),
        absolutely: false,
        is_async: false,
        can_execute: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_wall_clock_before_install() {
        assert!(now_ms() > 0);
    }
}
