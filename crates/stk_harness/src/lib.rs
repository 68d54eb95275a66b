//! Utilities for driving the STK desktop application through its Connect
//! TCP command protocol: launch or reuse a running instance, set up a
//! scenario, load satellites from a TLE file, and compute access reports
//! against the scenario's ground facilities.
//!
//! Typical usage:
//! ```no_run
//! use stk_harness::{HarnessConfig, ReportFormat, Workflow};
//!
//! let config = HarnessConfig::new("downloads/selected.tle")
//!     .with_scenario_file("scenarios/ops.sc")
//!     .with_report_format(ReportFormat::Csv)
//!     .with_time_filter(7, 0);
//!
//! let workflow = Workflow::new(config);
//! let outcome = workflow.run(|message| println!("{message}")).expect("workflow should finish");
//! if outcome.found_access() {
//!     println!("{}", outcome.report);
//! } else {
//!     println!("no access found for scenario {}", outcome.scenario);
//! }
//! ```

mod client;
mod codec;
mod config;
mod error;
mod loader;
mod readiness;
mod report;
mod scenario;
mod tle;
mod workflow;

pub use client::{ConnectClient, ResponseFrame};
pub use codec::{AsyncHeader, CommandShape};
pub use config::{
    HarnessConfig, ReportFormat, TimeFilter, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SCENARIO_NAME,
    FALLBACK_STK_EXECUTABLE,
};
pub use error::{StkError, StkResult};
pub use loader::{load_all, LoadRecord, LoadStatus, LoadSummary};
pub use readiness::ReadinessPoller;
pub use report::{AccessRecord, AccessReportEngine};
pub use scenario::{extract_scenario_name, resolve_scenario};
pub use tle::{find_catalog_number, sanitize_name, TleEntry, TleSet};
pub use workflow::{Workflow, WorkflowOutcome};
