//! Command-line driver: load a TOML config, run the TLE access workflow
//! against a live STK instance, and print the report to stdout.

use std::process::ExitCode;

use env_logger::Builder;
use log::{error, info, LevelFilter};

use stk_harness::{HarnessConfig, Workflow};

fn main() -> ExitCode {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("stk_harness"), LevelFilter::Debug)
        .init();

    let Some(config_path) = std::env::args().nth(1) else {
        eprintln!("usage: stk_workflow <config.toml>");
        return ExitCode::FAILURE;
    };

    let config = match HarnessConfig::load(std::path::Path::new(&config_path)) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load {config_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let workflow = Workflow::new(config);
    match workflow.run(|status| eprintln!("{status}")) {
        Ok(outcome) => {
            info!(
                "scenario {}: loaded {} satellite(s), {} facility(ies)",
                outcome.scenario,
                outcome.load_summary.created_names().len(),
                outcome.facilities.len()
            );
            if outcome.found_access() {
                print!("{}", outcome.report);
            } else {
                info!("no access intervals above the duration threshold");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("workflow failed: {err}");
            ExitCode::FAILURE
        }
    }
}
