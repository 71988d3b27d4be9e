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

//! A weak callback holds its target by [`std::sync::Weak`] and its method
//! as a closure. Rust's ownership model gives an exact weak-reference
//! primitive for `Arc`-owned targets, so no explicit revocation token is
//! needed the way it would be in a language without weak references.

use std::sync::Arc;

/// Outcome of attempting to invoke a timer's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Invoked,
    /// The weak target has been reclaimed; the owning timer should be
    /// removed from its scheduler.
    Collected,
}

/// A type-erased, possibly-weak callback invoked by the scheduler. `Arc`
/// rather than `Box` so an async-offloaded dispatch can clone it onto a
/// pool task without holding the scheduler's timer-table lock across the
/// call.
pub type TimerCallback = Arc<dyn Fn() -> CallOutcome + Send + Sync>;

/// Builds a callback that holds `target` weakly. Once the last strong
/// reference to `target` is dropped, every future invocation reports
/// [`CallOutcome::Collected`] instead of running `f`.
pub fn weak_callback<T, F>(target: &Arc<T>, f: F) -> TimerCallback
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    let weak = Arc::downgrade(target);
    Arc::new(move || match weak.upgrade() {
        Some(target) => {
            f(&target);
            CallOutcome::Invoked
        }
        None => CallOutcome::Collected,
    })
}

/// Builds a callback with no owning target (bound to a static or free
/// function). Such a callback is always alive.
pub fn static_callback<F>(f: F) -> TimerCallback
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(move || {
        f();
        CallOutcome::Invoked
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn invokes_while_target_alive() {
        let target = Arc::new(AtomicUsize::new(0));
        let cb = weak_callback(&target, |t| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(cb(), CallOutcome::Invoked);
        assert_eq!(target.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reports_collected_after_target_dropped() {
        let target = Arc::new(AtomicUsize::new(0));
        let cb = weak_callback(&target, |t| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        drop(target);
        assert_eq!(cb(), CallOutcome::Collected);
    }

    #[test]
    fn static_callback_is_always_alive() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        let cb = static_callback(move || {
            counter2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(cb(), CallOutcome::Invoked);
        assert_eq!(cb(), CallOutcome::Invoked);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
