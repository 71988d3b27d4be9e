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

use std::sync::Arc;

use clap::Parser;
use rsketch_app::{ServiceHost, ServiceHostConfig, console::CustomMenu};
use rsketch_common_worker::{Scm, ScmAction, Settings, SystemctlScm, Work};
use snafu::Whatever;
use tracing::info;

mod build_info;

/// Placeholder supervised work until an embedding application supplies its
/// own `Work` implementation; logs a heartbeat and never requests an
/// immediate re-run.
struct HeartbeatWork;

#[async_trait::async_trait]
impl Work for HeartbeatWork {
    async fn work(&self, index: usize) -> Result<bool, rsketch_error::Error> {
        info!(index, "heartbeat");
        Ok(false)
    }
}

/// Supported first-positional-argument modes, matched case-insensitively.
/// `None` (no argument at all) enters the interactive console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Service,
    Install,
    Uninstall,
    Start,
    Stop,
    Run,
    Step,
    Console,
}

fn parse_mode(raw: Option<&str>) -> Mode {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("-s") => Mode::Service,
        Some("-i") => Mode::Install,
        Some("-u") => Mode::Uninstall,
        Some("-start") => Mode::Start,
        Some("-stop") => Mode::Stop,
        Some("-run") => Mode::Run,
        Some("-step") => Mode::Step,
        _ => Mode::Console,
    }
}

#[derive(Debug, Parser)]
#[clap(
    name = "rsketch",
    about = "rsketch service host",
    author = build_info::AUTHOR,
    version = build_info::FULL_VERSION
)]
struct Cli {
    /// -s | -i | -u | -start | -stop | -run | -step; no argument enters the
    /// interactive console.
    mode: Option<String>,
}

fn default_intervals() -> Vec<i64> { vec![5, 10] }

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();
    let _guards = rsketch_common_telemetry_init();
    rsketch_common_telemetry::set_panic_hook();

    let cli = Cli::parse();
    let mode = parse_mode(cli.mode.as_deref());
    let settings = Settings::default();
    let scm: Arc<dyn Scm> = Arc::new(SystemctlScm);

    match mode {
        Mode::Install => match scm.install(&settings.service_name, true) {
            Ok(()) => println!("installed {}", settings.service_name),
            Err(error) => tracing::warn!(%error, "install failed"),
        },
        Mode::Uninstall => match scm.install(&settings.service_name, false) {
            Ok(()) => println!("uninstalled {}", settings.service_name),
            Err(error) => tracing::warn!(%error, "uninstall failed"),
        },
        Mode::Start => match scm.control(&settings.service_name, ScmAction::Start) {
            Ok(()) => println!("start requested for {}", settings.service_name),
            Err(error) => tracing::warn!(%error, "start failed"),
        },
        Mode::Stop => match scm.control(&settings.service_name, ScmAction::Stop) {
            Ok(()) => println!("stop requested for {}", settings.service_name),
            Err(error) => tracing::warn!(%error, "stop failed"),
        },
        Mode::Service | Mode::Run | Mode::Step | Mode::Console => {
            let host = ServiceHost::new(
                ServiceHostConfig::builder()
                    .work(HeartbeatWork)
                    .intervals(default_intervals())
                    .settings(settings)
                    .scm(scm)
                    .build(),
            );

            match mode {
                Mode::Step => host.step_once().await,
                Mode::Run => {
                    host.start();
                    println!("running, press enter to exit");
                    let _ = tokio::task::spawn_blocking(|| {
                        let mut line = String::new();
                        let _ = std::io::stdin().read_line(&mut line);
                    })
                    .await;
                    host.stop().await;
                }
                Mode::Service => {
                    host.start();
                    tokio::signal::ctrl_c().await.ok();
                    host.stop().await;
                }
                Mode::Console => rsketch_app::console::run(host, CustomMenu::new()).await,
                _ => unreachable!(),
            }
        }
    }

    Ok(())
}

fn rsketch_common_telemetry_init() -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    rsketch_common_telemetry::init_tracing_subscriber(build_info::PKG_NAME)
}
