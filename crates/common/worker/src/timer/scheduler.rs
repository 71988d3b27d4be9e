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

//! One dedicated task per named scheduler dispatches due timers in order,
//! non-reentrantly, with `async` timers offloaded to the background
//! runtime instead of running inline on the scheduler task.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

use super::weak::{CallOutcome, TimerCallback};
use crate::metrics::TIMER_FIRES_TOTAL;

/// Large fallback sleep when a scheduler has no timers registered at all.
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

/// Construction parameters for a new timer.
pub struct TimerSpec {
    pub callback: TimerCallback,
    /// Delay before the first dispatch.
    pub initial_delay: Duration,
    /// Recurrence period; `None` makes this a one-shot timer.
    pub period: Option<Duration>,
    /// If true, `period` is measured from a fixed anchor (no drift across
    /// skipped ticks) rather than from the completion of the previous
    /// dispatch.
    pub absolutely: bool,
    /// Run on the background runtime instead of the scheduler task.
    pub is_async: bool,
    /// Gate consulted before dispatch; `None` means always eligible.
    pub can_execute: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

struct Timer {
    callback: TimerCallback,
    next_time: Instant,
    period: Option<Duration>,
    absolutely: bool,
    abs_next: Instant,
    calling: Arc<AtomicBool>,
    is_async: bool,
    can_execute: Option<Box<dyn Fn() -> bool + Send + Sync>>,
    has_set_next: bool,
    cost_ms: f64,
    timers_fired: u64,
}

/// A handle to a registered timer. Dropping the handle does not remove the
/// timer; call [`TimerHandle::dispose`] explicitly.
#[derive(Clone)]
pub struct TimerHandle {
    id:        u64,
    scheduler: Arc<Scheduler>,
}

impl TimerHandle {
    #[must_use]
    pub fn id(&self) -> u64 { self.id }

    /// `SetNext(ms)`: overrides the next dispatch time and wakes the
    /// scheduler so it re-evaluates its sleep immediately.
    pub fn set_next(&self, ms: u64) {
        let mut timers = self.scheduler.timers.lock().unwrap();
        if let Some(timer) = timers.get_mut(&self.id) {
            timer.next_time = Instant::now() + Duration::from_millis(ms);
            timer.has_set_next = true;
        }
        drop(timers);
        self.scheduler.wake.notify_one();
    }

    pub fn dispose(&self) { self.scheduler.dispose(self.id); }
}

pub struct Scheduler {
    name:    String,
    timers:  Mutex<HashMap<u64, Timer>>,
    next_id: AtomicU64,
    wake:    tokio::sync::Notify,
}

impl Scheduler {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            timers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            wake: tokio::sync::Notify::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Constructs and registers a timer, returning a handle to it.
    pub fn add_timer(self: &Arc<Self>, spec: TimerSpec) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let next_time = Instant::now() + spec.initial_delay;
        let timer = Timer {
            callback: spec.callback,
            next_time,
            period: spec.period,
            absolutely: spec.absolutely,
            abs_next: next_time,
            calling: Arc::new(AtomicBool::new(false)),
            is_async: spec.is_async,
            can_execute: spec.can_execute,
            has_set_next: false,
            cost_ms: 0.0,
            timers_fired: 0,
        };
        self.timers.lock().unwrap().insert(id, timer);
        self.wake.notify_one();
        TimerHandle {
            id,
            scheduler: self.clone(),
        }
    }

    /// `Delay(callback, ms)`: a one-shot timer that fires once after `ms`.
    pub fn delay(self: &Arc<Self>, callback: TimerCallback, ms: u64) -> TimerHandle {
        self.add_timer(TimerSpec {
            callback,
            initial_delay: Duration::from_millis(ms),
            period: None,
            absolutely: false,
            is_async: true,
            can_execute: None,
        })
    }

    fn dispose(&self, id: u64) {
        self.timers.lock().unwrap().remove(&id);
        self.wake.notify_one();
    }

    /// Runs the scheduler's main dispatch loop until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let sleep_ms = self.dispatch_due();
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {},
                () = self.wake.notified() => {},
            }
        }
    }

    /// One iteration of the main loop: finds due timers, executes each,
    /// and returns how long the caller should sleep before the next
    /// iteration.
    fn dispatch_due(self: &Arc<Self>) -> u64 {
        let now = Instant::now();
        let due_ids: Vec<u64> = {
            let timers = self.timers.lock().unwrap();
            timers
                .iter()
                .filter(|(_, t)| {
                    t.next_time <= now && t.can_execute.as_ref().is_none_or(|gate| gate())
                })
                .map(|(id, _)| *id)
                .collect()
        };

        for id in due_ids {
            self.execute_one(id);
        }

        let timers = self.timers.lock().unwrap();
        timers
            .values()
            .map(|t| {
                t.next_time
                    .saturating_duration_since(Instant::now())
                    .as_millis()
                    .max(1) as u64
            })
            .min()
            .unwrap_or_else(|| IDLE_SLEEP.as_millis() as u64)
    }

    /// `Execute(t, now)`, steps 1-5: skip if already calling (non-reentrancy
    /// guard for async timers), otherwise mark calling, invoke (inline or
    /// offloaded), and hand off to [`Scheduler::finish_dispatch`] for the
    /// post-amble (steps 6-8).
    fn execute_one(self: &Arc<Self>, id: u64) {
        let (callback, is_async, calling) = {
            let mut timers = self.timers.lock().unwrap();
            let Some(timer) = timers.get_mut(&id) else {
                return;
            };
            if timer.calling.load(Ordering::Acquire) {
                return;
            }
            timer.calling.store(true, Ordering::Release);
            (timer.callback.clone(), timer.is_async, timer.calling.clone())
        };

        if is_async {
            let scheduler = self.clone();
            rsketch_common_runtime::background_runtime().spawn(async move {
                let start = Instant::now();
                let outcome = callback();
                let elapsed = start.elapsed();
                scheduler.finish_dispatch(id, outcome, elapsed);
                drop(calling);
            });
        } else {
            let start = Instant::now();
            let outcome = callback();
            let elapsed = start.elapsed();
            self.finish_dispatch(id, outcome, elapsed);
        }
    }

    /// Steps 6-8: record cost/fire-count, advance `next_time` per
    /// `SetAndGetNextTime`, clear the non-reentrancy guard, and remove the
    /// timer if it was one-shot or its target was collected.
    fn finish_dispatch(&self, id: u64, outcome: CallOutcome, elapsed: Duration) {
        let remove = {
            let mut timers = self.timers.lock().unwrap();
            let Some(timer) = timers.get_mut(&id) else {
                return;
            };
            if outcome == CallOutcome::Collected {
                true
            } else {
                TIMER_FIRES_TOTAL.with_label_values(&[&self.name]).inc();
                let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
                timer.cost_ms = if timer.timers_fired == 0 {
                    elapsed_ms
                } else {
                    0.8f64.mul_add(timer.cost_ms, 0.2 * elapsed_ms)
                };
                timer.timers_fired += 1;

                set_and_get_next_time(timer);
                timer.calling.store(false, Ordering::Release);
                timer.period.is_none() && !timer.has_set_next
            }
        };
        if remove {
            self.timers.lock().unwrap().remove(&id);
        }
        self.wake.notify_one();
    }
}

/// `SetAndGetNextTime`: advances `next_time` according to whichever of
/// `SetNext`, absolute, or relative scheduling applies, consuming
/// `has_set_next` if it was set.
fn set_and_get_next_time(timer: &mut Timer) {
    if timer.has_set_next {
        timer.has_set_next = false;
        return;
    }
    let Some(period) = timer.period else { return };
    if timer.absolutely {
        timer.abs_next += period;
        timer.next_time = timer.abs_next;
    } else {
        timer.next_time = Instant::now() + period;
    }
}

/// Process-wide, lazily-initialized registry of named schedulers. The
/// `"Default"` scheduler additionally hosts the cached-clock refresh timer.
pub struct SchedulerRegistry;

impl SchedulerRegistry {
    pub const DEFAULT: &'static str = "Default";

    #[must_use]
    pub fn get_or_create(name: &str) -> Arc<Scheduler> {
        static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Scheduler>>>> = OnceLock::new();
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        let mut guard = registry.lock().unwrap();
        guard
            .entry(name.to_string())
            .or_insert_with(|| Scheduler::new(name))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::timer::weak::static_callback;

    #[tokio::test(start_paused = true)]
    async fn relative_timer_fires_repeatedly() {
        let scheduler = Scheduler::new("test-relative");
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let _handle = scheduler.add_timer(TimerSpec {
            callback: static_callback(move || {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
            initial_delay: Duration::from_millis(10),
            period: Some(Duration::from_millis(10)),
            absolutely: false,
            is_async: false,
            can_execute: None,
        });

        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let runner = tokio::spawn(scheduler.run(cancel2));
        tokio::time::advance(Duration::from_millis(55)).await;
        tokio::task::yield_now().await;
        cancel.cancel();
        let _ = runner.await;

        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn one_shot_timer_removed_after_fire() {
        let scheduler = Scheduler::new("test-oneshot");
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let handle = scheduler.add_timer(TimerSpec {
            callback: static_callback(move || {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
            initial_delay: Duration::from_millis(1),
            period: None,
            absolutely: false,
            is_async: false,
            can_execute: None,
        });

        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let runner = tokio::spawn(scheduler.run(cancel2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let _ = runner.await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.timers.lock().unwrap().contains_key(&handle.id()));
    }

    #[test]
    fn named_registry_returns_same_instance() {
        let a = SchedulerRegistry::get_or_create("shared-test-scheduler");
        let b = SchedulerRegistry::get_or_create("shared-test-scheduler");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
