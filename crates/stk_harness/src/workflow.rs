//! End-to-end workflow: readiness, scenario resolution, satellite load,
//! access computation, report assembly.
//!
//! The workflow runs on one caller-provided thread and drives exactly one
//! connection; no two protocol operations ever overlap. Wire-level and
//! scenario failures abort the run, while per-satellite and per-row
//! problems only reduce the completeness of the final report.

use std::io::{Read, Write};
use std::thread;

use log::{info, warn};

use crate::client::ConnectClient;
use crate::config::HarnessConfig;
use crate::error::StkResult;
use crate::loader::{self, LoadSummary};
use crate::readiness::ReadinessPoller;
use crate::report::AccessReportEngine;
use crate::scenario;
use crate::tle::TleSet;

/// Result of a completed workflow run.
///
/// An empty `report` with no prior error means the run succeeded but no
/// access interval survived the filters; callers present that as "no
/// access found", not as a failure.
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub scenario: String,
    pub load_summary: LoadSummary,
    pub facilities: Vec<String>,
    pub report: String,
}

impl WorkflowOutcome {
    pub fn found_access(&self) -> bool {
        !self.report.is_empty()
    }
}

/// One-shot orchestration of a full run against STK.
pub struct Workflow {
    config: HarnessConfig,
}

impl Workflow {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Ensure STK is reachable, then drive the full workflow. The
    /// connection is torn down before returning regardless of outcome.
    pub fn run(&self, mut status: impl FnMut(&str)) -> StkResult<WorkflowOutcome> {
        status("Waiting for STK to accept connections...");
        let poller = ReadinessPoller::from_config(&self.config);
        let mut client = poller.ensure_ready(&self.config, |attempt, total| {
            status(&format!("Connecting to STK (attempt {attempt} of {total})"));
        })?;

        let outcome = self.run_with_client(&mut client, &mut status);
        client.disconnect();
        outcome
    }

    /// Drive every stage over an already-connected client.
    pub fn run_with_client<S: Read + Write>(
        &self,
        client: &mut ConnectClient<S>,
        status: &mut impl FnMut(&str),
    ) -> StkResult<WorkflowOutcome> {
        let tle_set = TleSet::load(&self.config.tle_file)?;

        status("Resolving scenario...");
        let scenario_name = scenario::resolve_scenario(client, self.config.scenario_file.as_deref())?;

        status("Loading satellites...");
        let load_summary =
            loader::load_all(client, &scenario_name, &tle_set.entries, &self.config.tle_file)?;
        if load_summary.skipped_count() > 0 {
            warn!("{} satellites skipped during load", load_summary.skipped_count());
        }
        // STK needs a moment of internal propagation bookkeeping after a
        // batch before its objects answer access queries.
        thread::sleep(self.config.load_settle());

        let engine = AccessReportEngine::new(
            self.config.time_filter.threshold_seconds(),
            self.config.report_format,
        );

        status("Calculating access to ground facilities...");
        let facilities = engine.enumerate_facilities(client)?;
        let report = if facilities.is_empty() {
            info!("no facilities in scenario {scenario_name}; skipping report");
            String::new()
        } else {
            let satellites = load_summary.created_names();
            engine.generate(client, &scenario_name, &satellites, &facilities)?
        };

        Ok(WorkflowOutcome {
            scenario: scenario_name,
            load_summary,
            facilities,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write as IoWrite};
    use std::time::Duration;

    use super::*;
    use crate::error::StkError;

    struct Pipe {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl std::io::Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl std::io::Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn single_record(verb: &str, body: &str) -> Vec<u8> {
        let mut wire = format!("{:<40}", format!("{verb} {}", body.len())).into_bytes();
        wire.extend(body.as_bytes());
        wire
    }

    fn tle_fixture() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(
            b"SAT ALPHA\n\
1 11111U 98067A   24183.54166667  .00016717  00000-0  10270-3 0  9000\n\
2 11111  51.6400 208.9163 0006317  69.9862 290.2000 15.49815308  1000\n",
        )
        .expect("write");
        file
    }

    #[test]
    fn run_with_no_facilities_is_successful_but_empty() {
        let tle = tle_fixture();
        let config = HarnessConfig::new(tle.path()).with_load_settle(Duration::ZERO);

        let mut wire = b"ACK".to_vec();
        wire.extend(single_record("CHECKSCENARIO", "0"));
        wire.extend(b"ACK"); // New / Scenario
        wire.extend(b"ACK"); // New / */Satellite
        wire.extend(b"ACK"); // SetState
        wire.extend(b"ACK"); // AllInstanceNames / Facility
        wire.extend(single_record("ALLINSTANCENAMES", " "));

        let pipe = Pipe {
            input: Cursor::new(wire),
            written: Vec::new(),
        };
        let mut client = ConnectClient::from_stream(pipe, true);
        let workflow = Workflow::new(config);
        let outcome = workflow
            .run_with_client(&mut client, &mut |_| {})
            .expect("workflow");

        assert!(!outcome.found_access());
        assert!(outcome.facilities.is_empty());
        assert_eq!(outcome.load_summary.created_names(), vec!["SAT_ALPHA"]);
    }

    #[test]
    fn rejected_scenario_setup_aborts_the_run() {
        let tle = tle_fixture();
        let config = HarnessConfig::new(tle.path()).with_load_settle(Duration::ZERO);

        let mut wire = b"ACK".to_vec();
        wire.extend(single_record("CHECKSCENARIO", "0"));
        wire.extend(b"NACK"); // New / Scenario rejected

        let pipe = Pipe {
            input: Cursor::new(wire),
            written: Vec::new(),
        };
        let mut client = ConnectClient::from_stream(pipe, true);
        let err = Workflow::new(config)
            .run_with_client(&mut client, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, StkError::ScenarioSetup(_)));
    }
}
