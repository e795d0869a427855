use subproxy_host::demo::run_scenario;
use subproxy_host::error::HostError;
use subproxy_host::logger::{Console, initialize as LoggerInitialize, log_directory};
use subproxy_host::targets::{registry, runner_constructor};

use subproxy_core::worker::{is_worker_invocation, serve_if_worker};
use subproxy_core::{ProxyConfig, ProxyFactory, wrap};

use std::env::args;
use std::process::ExitCode;

use log::{error, info, warn};

fn main() -> ExitCode {
    let worker_mode = is_worker_invocation(args());
    let console = if worker_mode {
        Console::Stderr
    } else {
        Console::Stdout
    };

    let log_dir = log_directory();
    if let Err(e) = LoggerInitialize(&log_dir, console) {
        // A worker without logs can still serve; the demo wants them.
        if !worker_mode {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    }

    // Never returns in worker mode.
    serve_if_worker(&registry());

    info!("subproxy host starting");
    info!("Log directory: {}", log_dir.display());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), HostError> {
    let config = ProxyConfig::from_env()?;

    for strategy in config.strategies.clone() {
        info!("== {strategy} ==");
        let factory: ProxyFactory = wrap(runner_constructor())
            .with_config(config.clone().with_strategies(vec![strategy]));

        match run_scenario(&factory) {
            Ok(report) => info!(
                "Report: {}",
                serde_json::to_string(&report).unwrap_or_default()
            ),
            Err(e) => warn!("{strategy} scenario failed: {e}"),
        }
    }

    Ok(())
}
