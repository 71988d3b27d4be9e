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

//! Ordered timer dispatch with absolute/relative periods, non-reentrant
//! invocation, and weak-reference callback targets.

pub mod clock;
pub mod scheduler;
pub mod weak;

pub use clock::{install_clock_refresh, now_ms};
pub use scheduler::{Scheduler, SchedulerRegistry, TimerHandle, TimerSpec};
pub use weak::{CallOutcome, TimerCallback, static_callback, weak_callback};
