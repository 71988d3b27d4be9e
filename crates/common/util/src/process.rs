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

//! Current-process memory and thread-count introspection, consumed by the
//! manager loop's `CheckMemory`/`CheckThread` thresholds.

use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};

/// Snapshot of the current process's resource usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    /// Resident memory, in mebibytes.
    pub memory_mib: u64,
    /// Number of threads belonging to the process, if the platform reports
    /// it.
    pub thread_count: Option<u64>,
}

/// Reads memory and thread-count for the current process via `sysinfo`.
///
/// Returns `None` if the current process cannot be found in the system
/// snapshot, which should not happen in practice but is not treated as a
/// hard error by callers: a missing stat simply disables that threshold
/// check for one tick.
#[must_use]
pub fn current_process_stats() -> Option<ProcessStats> {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new_with_specifics(
        RefreshKind::nothing().with_processes(ProcessRefreshKind::everything()),
    );
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);

    let process = system.process(pid)?;
    Some(ProcessStats {
        memory_mib: process.memory() / (1024 * 1024),
        thread_count: process.tasks().map(|tasks| tasks.len() as u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_has_nonzero_memory() {
        let stats = current_process_stats().expect("current process must be visible to sysinfo");
        assert!(stats.memory_mib < u64::MAX);
    }
}
