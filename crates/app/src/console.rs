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

//! Menu-driven operator front-end: the same operations reachable via CLI
//! flags, plus operator-registered custom entries.

use std::{collections::BTreeMap, io::Write, sync::Arc};

use rsketch_common_worker::{ScmAction, Work, watchdog::check_watchdog};
use tracing::info;

use crate::ServiceHost;

/// A custom console entry: `key → (label, callback)`.
type CustomEntry = (String, Box<dyn Fn() + Send + Sync>);

/// Operator-registered menu entries beyond the fixed 1/2/3/4/5/7/0 set.
#[derive(Default)]
pub struct CustomMenu {
    entries: BTreeMap<String, CustomEntry>,
}

impl CustomMenu {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, key: impl Into<String>, label: impl Into<String>, callback: impl Fn() + Send + Sync + 'static) {
        self.entries.insert(key.into(), (label.into(), Box::new(callback)));
    }
}

fn print_menu(custom: &CustomMenu) {
    println!("1) show status");
    println!("2) install/uninstall service");
    println!("3) start/stop service");
    println!("4) single-step (run Work once)");
    println!("5) loop-debug (start, wait for key, stop)");
    println!("7) watchdog check");
    for (key, (label, _)) in &custom.entries {
        println!("{key}) {label}");
    }
    println!("0) exit");
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn read_line() -> String {
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
    line.trim().to_string()
}

fn print_status<W: Work>(host: &ServiceHost<W>) {
    println!("service: {}", host.settings().service_name);
    println!("shutting_down: {}", host.pool().is_shutting_down());
    for handle in host.pool().workers() {
        println!(
            "  {} active={} last_active={}",
            host.pool().thread_name(handle.index()),
            handle.is_active(),
            handle.last_active_unix_secs()
        );
    }
}

/// Runs the interactive console loop until the operator chooses `0`.
pub async fn run<W: Work>(host: Arc<ServiceHost<W>>, custom: CustomMenu) {
    loop {
        print_menu(&custom);
        let choice = tokio::task::spawn_blocking(read_line).await.unwrap_or_default();
        match choice.as_str() {
            "1" => print_status(&host),
            "2" => {
                let service_name = host.settings().service_name.clone();
                println!("enable (1) or disable (0)?");
                let answer = tokio::task::spawn_blocking(read_line).await.unwrap_or_default();
                match host.scm().install(&service_name, answer.trim() == "1") {
                    Ok(()) => println!("ok"),
                    Err(error) => println!("failed: {error}"),
                }
            }
            "3" => {
                let service_name = host.settings().service_name.clone();
                println!("start (1) or stop (0)?");
                let answer = tokio::task::spawn_blocking(read_line).await.unwrap_or_default();
                let action = if answer.trim() == "1" { ScmAction::Start } else { ScmAction::Stop };
                match host.scm().control(&service_name, action) {
                    Ok(()) => println!("ok"),
                    Err(error) => println!("failed: {error}"),
                }
            }
            "4" => host.step_once().await,
            "5" => {
                host.start();
                println!("pool started, press enter to stop");
                let _ = tokio::task::spawn_blocking(read_line).await;
                host.stop().await;
            }
            "7" => {
                info!("console: manual watchdog check");
                check_watchdog(host.scm().clone(), host.settings().watch_dog.clone()).await;
            }
            "0" => break,
            other => {
                if let Some((_, callback)) = custom.entries.get(other) {
                    callback();
                } else {
                    println!("unrecognized choice: {other}");
                }
            }
        }
    }
}
