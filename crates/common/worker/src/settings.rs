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

//! Process-wide settings recognized by the host, per the external-interfaces
//! configuration table. Every field is optional and a zero/`None` value
//! disables the corresponding check.

use std::time::Duration;

use bon::Builder;
use smart_default::SmartDefault;

/// Recognized configuration fields for the service host.
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct Settings {
    /// Overrides the default SCM service name.
    #[default("rsketch".to_string())]
    #[builder(default = "rsketch".to_string(), into)]
    pub service_name: String,

    #[default("rsketch service".to_string())]
    #[builder(default = "rsketch service".to_string(), into)]
    pub display_name: String,

    #[builder(default, into)]
    pub description: String,

    /// Per-worker join deadline on stop.
    #[default(Duration::from_millis(5000))]
    #[builder(default = Duration::from_millis(5000), into)]
    pub wait_for_exit: Duration,

    /// Seconds of inactivity before `CheckActive` restarts a worker. `0`
    /// disables the check.
    #[builder(default = 0)]
    pub max_active_secs: u64,

    /// MiB of resident memory before a process restart is triggered. `0`
    /// disables the check.
    #[builder(default = 0)]
    pub max_memory_mib: u64,

    /// Thread count before a process restart is triggered. `0` disables the
    /// check.
    #[builder(default = 0)]
    pub max_thread: u64,

    /// Minutes of uptime before a process restart is triggered. `0`
    /// disables the check.
    #[builder(default = 0)]
    pub auto_restart_minutes: u64,

    /// Comma/semicolon-delimited peer service names the watchdog keeps
    /// running; already split at load time.
    #[builder(default)]
    pub watch_dog: Vec<String>,
}

impl Settings {
    /// Parses the `a,b;c` watchdog list format into individual peer names.
    #[must_use]
    pub fn parse_watch_dog(raw: &str) -> Vec<String> {
        raw.split([',', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_all_thresholds() {
        let settings = Settings::default();
        assert_eq!(settings.max_active_secs, 0);
        assert_eq!(settings.max_memory_mib, 0);
        assert_eq!(settings.max_thread, 0);
        assert_eq!(settings.auto_restart_minutes, 0);
        assert!(settings.watch_dog.is_empty());
    }

    #[test]
    fn parses_mixed_delimiters() {
        let peers = Settings::parse_watch_dog("svcA;svcB,svcC");
        assert_eq!(peers, vec!["svcA", "svcB", "svcC"]);
    }

    #[test]
    fn ignores_empty_segments() {
        let peers = Settings::parse_watch_dog("svcA;;svcB,");
        assert_eq!(peers, vec!["svcA", "svcB"]);
    }
}
