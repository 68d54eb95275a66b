use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{StkError, StkResult};

/// Default Connect endpoint STK listens on.
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5001;

/// Scenario name used when no scenario file is configured and none is open.
pub const DEFAULT_SCENARIO_NAME: &str = "TleAccess";

/// Install location tried when no executable path is configured.
pub const FALLBACK_STK_EXECUTABLE: &str =
    r"C:\Program Files\AGI\STK 12\bin\AgUiApplication.exe";

/// Output format for the generated access report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Csv,
}

/// Minimum access duration; intervals at or below the threshold are dropped.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TimeFilter {
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

impl TimeFilter {
    pub fn new(minutes: u32, seconds: u32) -> Self {
        Self { minutes, seconds }
    }

    /// Threshold in seconds.
    pub fn threshold_seconds(&self) -> f64 {
        f64::from(self.seconds) + f64::from(self.minutes) * 60.0
    }
}

/// Configuration for one workflow run against STK.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HarnessConfig {
    /// Host the Connect socket listens on.
    #[serde(default = "default_host")]
    pub host: String,
    /// Connect port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// TLE file fed to the scenario's satellites.
    pub tle_file: PathBuf,
    /// Path to the STK executable; the fixed install path is tried when unset.
    #[serde(default)]
    pub stk_executable: Option<PathBuf>,
    /// Scenario save file (`.sc`); loaded when it exists, otherwise a scenario
    /// named after its stem is created. Unset means the default name is used.
    #[serde(default)]
    pub scenario_file: Option<PathBuf>,
    /// Report rendering selected by the caller.
    #[serde(default)]
    pub report_format: ReportFormat,
    /// Minimum access duration filter.
    #[serde(default)]
    pub time_filter: TimeFilter,
    /// Connection attempts made while waiting for STK to come up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds between failed connection attempts.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Seconds allowed for the freshly launched process to start listening.
    #[serde(default = "default_launch_settle_secs")]
    pub launch_settle_secs: u64,
    /// Milliseconds STK needs after a satellite batch before its propagation
    /// bookkeeping settles. Empirical wait, not a polled condition.
    #[serde(default = "default_load_settle_millis")]
    pub load_settle_millis: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_attempts() -> u32 {
    12
}

fn default_retry_interval_secs() -> u64 {
    5
}

fn default_launch_settle_secs() -> u64 {
    10
}

fn default_load_settle_millis() -> u64 {
    2000
}

impl HarnessConfig {
    /// Create a config targeting a specific TLE file, with defaults elsewhere.
    pub fn new(tle_file: impl Into<PathBuf>) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tle_file: tle_file.into(),
            stk_executable: None,
            scenario_file: None,
            report_format: ReportFormat::default(),
            time_filter: TimeFilter::default(),
            max_attempts: default_max_attempts(),
            retry_interval_secs: default_retry_interval_secs(),
            launch_settle_secs: default_launch_settle_secs(),
            load_settle_millis: default_load_settle_millis(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(config_path: &Path) -> StkResult<Self> {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| StkError::Config(format!("failed to read {}: {e}", config_path.display())))?;
        toml::from_str(&content)
            .map_err(|e| StkError::Config(format!("failed to parse {}: {e}", config_path.display())))
    }

    /// Override the Connect endpoint.
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Provide the STK executable to launch when nothing is listening.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.stk_executable = Some(path.into());
        self
    }

    /// Provide a scenario save file to load or name the scenario after.
    pub fn with_scenario_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.scenario_file = Some(path.into());
        self
    }

    /// Select the report output format.
    pub fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    /// Set the minimum access duration filter.
    pub fn with_time_filter(mut self, minutes: u32, seconds: u32) -> Self {
        self.time_filter = TimeFilter::new(minutes, seconds);
        self
    }

    /// Override the readiness polling bounds.
    pub fn with_retry(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_interval_secs = interval.as_secs();
        self
    }

    /// Override the post-launch settle delay.
    pub fn with_launch_settle(mut self, settle: Duration) -> Self {
        self.launch_settle_secs = settle.as_secs();
        self
    }

    /// Override the post-batch settle delay.
    pub fn with_load_settle(mut self, settle: Duration) -> Self {
        self.load_settle_millis = settle.as_millis() as u64;
        self
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_secs(self.launch_settle_secs)
    }

    pub fn load_settle(&self) -> Duration {
        Duration::from_millis(self.load_settle_millis)
    }
}
