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

//! Writes and launches a detached stop/wait/start script against the SCM,
//! then drains workers up to a bounded deadline.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};
#[cfg(unix)]
use std::os::unix::process::CommandExt;

use tracing::{info, warn};

use crate::pool::{Work, WorkerPool};

const DRAIN_ATTEMPTS: u32 = 10;
const DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Picks the restart script's directory: a temp directory if writable,
/// falling back to the current working directory. Either choice is logged.
fn script_dir() -> PathBuf {
    let candidate = std::env::temp_dir();
    if candidate.metadata().is_ok_and(|m| !m.permissions().readonly()) {
        info!(dir = %candidate.display(), "restart script: using temp directory");
        candidate
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        warn!(dir = %cwd.display(), "restart script: temp directory unavailable, falling back to cwd");
        cwd
    }
}

/// Renders the stop/wait/start script body for `service_name`.
fn render_script(service_name: &str) -> String {
    format!(
        "#!/bin/sh\nsystemctl stop {service_name}\nsleep 5\nsystemctl start {service_name}\n"
    )
}

/// Materializes `restart.sh` in [`script_dir`], overwriting any existing
/// file, and returns its path.
pub fn write_restart_script(service_name: &str) -> std::io::Result<PathBuf> {
    let path = script_dir().join("restart.sh");
    std::fs::write(&path, render_script(service_name))?;
    #[cfg(unix)]
    {
        use std::{fs::Permissions, os::unix::fs::PermissionsExt};
        std::fs::set_permissions(&path, Permissions::from_mode(0o755))?;
    }
    Ok(path)
}

/// Spawns `script` as a detached process: its own session/process group, no
/// inherited stdio. Returns once the child has been launched; it is not
/// waited on.
#[cfg(unix)]
pub fn spawn_detached(script: &Path) -> std::io::Result<()> {
    let mut command = std::process::Command::new(script);
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .process_group(0);
    command.spawn()?;
    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_detached(script: &Path) -> std::io::Result<()> {
    std::process::Command::new(script).spawn()?;
    Ok(())
}

/// Runs the full restart sequence: write the script, mark the pool as
/// shutting down, drain by polling up to `DRAIN_ATTEMPTS * DRAIN_INTERVAL`,
/// then launch the script detached and return. Any workers still alive
/// after the drain are force-cancelled, standing in for the SCM's
/// `OnStop → StopWork` callback this process does not receive from itself.
pub async fn trigger_restart<W: Work>(pool: &std::sync::Arc<WorkerPool<W>>, service_name: &str) {
    match write_restart_script(service_name) {
        Ok(path) => info!(path = %path.display(), "restart script written"),
        Err(error) => warn!(%error, "failed to write restart script"),
    }

    pool.begin_shutdown();

    let mut drained = false;
    for attempt in 0..DRAIN_ATTEMPTS {
        if pool.all_finished() {
            info!(attempt, "drain complete, no workers alive");
            drained = true;
            break;
        }
        tokio::time::sleep(DRAIN_INTERVAL).await;
    }
    if !drained {
        warn!("drain timed out, force-cancelling remaining workers");
        pool.stop_all().await;
    }

    let script = script_dir().join("restart.sh");
    if let Err(error) = spawn_detached(&script) {
        warn!(%error, "failed to spawn detached restart script");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_contains_stop_wait_start_for_service() {
        let rendered = render_script("rsketch-host");
        assert!(rendered.contains("stop rsketch-host"));
        assert!(rendered.contains("sleep 5"));
        assert!(rendered.contains("start rsketch-host"));
    }

    #[test]
    fn write_restart_script_creates_readable_file() {
        let path = write_restart_script("rsketch-host-test").expect("script should be writable");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("rsketch-host-test"));
        let _ = std::fs::remove_file(path);
    }
}
