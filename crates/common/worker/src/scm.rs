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

//! Abstraction over the operating system's service controller (SCM). The
//! core only consumes this interface; installation, uninstallation, and
//! liveness queries are someone else's concern in the real deployment, so
//! [`SystemctlScm`] is one concrete, Unix-oriented realization rather than
//! the mandated one.

use std::process::Command;

use rsketch_error::{Error, ScmFailureSnafu};
use snafu::ResultExt;

/// A tri-state result for questions the SCM cannot always answer
/// definitively. Callers must never treat `Unknown` as either `Yes` or `No`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    Yes,
    No,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScmAction {
    Start,
    Stop,
}

impl ScmAction {
    fn as_verb(self) -> &'static str {
        match self {
            ScmAction::Start => "start",
            ScmAction::Stop => "stop",
        }
    }
}

/// Service-control-manager interface consumed by the watchdog and the
/// restart orchestrator.
pub trait Scm: Send + Sync {
    fn is_installed(&self, service_name: &str) -> TriState;

    fn is_running(&self, service_name: &str) -> TriState;

    fn install(&self, service_name: &str, enable: bool) -> Result<(), Error>;

    fn control(&self, service_name: &str, action: ScmAction) -> Result<(), Error>;
}

/// Shells out to `systemctl`. Treated as `Unknown` whenever the call itself
/// cannot be made (missing binary, no systemd on this host); the watchdog
/// and manager loop are specified to never act on `Unknown`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemctlScm;

impl Scm for SystemctlScm {
    fn is_installed(&self, service_name: &str) -> TriState {
        match Command::new("systemctl")
            .args(["list-unit-files", service_name])
            .output()
        {
            Ok(out) => {
                if String::from_utf8_lossy(&out.stdout).contains(service_name) {
                    TriState::Yes
                } else {
                    TriState::No
                }
            }
            Err(_) => TriState::Unknown,
        }
    }

    fn is_running(&self, service_name: &str) -> TriState {
        match Command::new("systemctl")
            .args(["is-active", service_name])
            .output()
        {
            Ok(out) if out.status.success() => TriState::Yes,
            Ok(out) => match String::from_utf8_lossy(&out.stdout).trim() {
                "inactive" | "failed" | "dead" => TriState::No,
                _ => TriState::Unknown,
            },
            Err(_) => TriState::Unknown,
        }
    }

    fn install(&self, service_name: &str, enable: bool) -> Result<(), Error> {
        let verb = if enable { "enable" } else { "disable" };
        let status = Command::new("systemctl")
            .args([verb, service_name])
            .status()
            .context(ScmFailureSnafu {
                action: format!("{verb} {service_name}"),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!("systemctl {verb} exited with {status}")))
                .context(ScmFailureSnafu {
                    action: format!("{verb} {service_name}"),
                })
        }
    }

    fn control(&self, service_name: &str, action: ScmAction) -> Result<(), Error> {
        let verb = action.as_verb();
        let status = Command::new("systemctl")
            .args([verb, service_name])
            .status()
            .context(ScmFailureSnafu {
                action: format!("{verb} {service_name}"),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!("systemctl {verb} exited with {status}")))
                .context(ScmFailureSnafu {
                    action: format!("{verb} {service_name}"),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_service_is_reported_unknown_or_no() {
        let scm = SystemctlScm;
        // On a host without systemd this call itself fails and must surface
        // as Unknown, never as a false Yes/No.
        let state = scm.is_running("definitely-not-a-real-service.service");
        assert_ne!(state, TriState::Yes);
    }
}
