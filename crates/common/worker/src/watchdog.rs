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

//! Keeps a configured list of peer services running. Acts only on peers
//! reporting exactly [`TriState::No`]; `Unknown` is never treated as a
//! reason to act.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    metrics::WATCHDOG_ACTIONS_TOTAL,
    scm::{Scm, ScmAction, TriState},
};

/// Checks every peer in `peers` and issues a start request for each one
/// reporting `No`. Dispatched as a fire-and-forget task by the Manager
/// Loop so a slow SCM call never delays its 60 s cadence.
pub async fn check_watchdog(scm: Arc<dyn Scm>, peers: Vec<String>) {
    for peer in peers {
        match scm.is_running(&peer) {
            TriState::No => {
                info!(peer = %peer, "watchdog: peer not running, requesting start");
                match scm.control(&peer, ScmAction::Start) {
                    Ok(()) => {
                        WATCHDOG_ACTIONS_TOTAL.with_label_values(&[&peer]).inc();
                    }
                    Err(error) => warn!(peer = %peer, %error, "watchdog: start request failed"),
                }
            }
            TriState::Unknown => {
                warn!(peer = %peer, "watchdog: peer state unknown, taking no action");
            }
            TriState::Yes => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rsketch_error::Error;

    use super::*;

    struct FakeScm {
        states:  std::collections::HashMap<String, TriState>,
        started: Mutex<Vec<String>>,
    }

    impl Scm for FakeScm {
        fn is_installed(&self, _service_name: &str) -> TriState { TriState::Yes }

        fn is_running(&self, service_name: &str) -> TriState {
            *self.states.get(service_name).unwrap_or(&TriState::Unknown)
        }

        fn install(&self, _service_name: &str, _enable: bool) -> Result<(), Error> { Ok(()) }

        fn control(&self, service_name: &str, _action: ScmAction) -> Result<(), Error> {
            self.started.lock().unwrap().push(service_name.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn starts_only_the_peer_reporting_no() {
        let scm = Arc::new(FakeScm {
            states: [("svcA".to_string(), TriState::No), ("svcB".to_string(), TriState::Unknown)]
                .into_iter()
                .collect(),
            started: Mutex::new(Vec::new()),
        });
        check_watchdog(scm.clone(), vec!["svcA".to_string(), "svcB".to_string()]).await;
        let started = scm.started.lock().unwrap();
        assert_eq!(started.as_slice(), ["svcA"]);
    }
}
