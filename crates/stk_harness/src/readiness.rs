//! Ensures STK is running and accepting Connect sessions.
//!
//! The host takes a while to come up after launch, so connection attempts
//! are retried with a fixed interval and a hard attempt bound. Only
//! [`StkError::Connect`] is retried; any other failure is surfaced as-is.

use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::client::ConnectClient;
use crate::config::{HarnessConfig, FALLBACK_STK_EXECUTABLE};
use crate::error::{StkError, StkResult};

/// Fixed arguments handed to the STK executable on launch.
const STK_LAUNCH_ARGS: [&str; 2] = ["/pers", "STK"];

/// Bounded connect-retry loop with a one-shot process launch hook.
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    max_attempts: u32,
    interval: Duration,
    launch_settle: Duration,
}

impl ReadinessPoller {
    pub fn new(max_attempts: u32, interval: Duration, launch_settle: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            launch_settle,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.retry_interval(),
            config.launch_settle(),
        )
    }

    /// Connect to the configured endpoint, launching STK if the first
    /// attempt finds nothing listening.
    pub fn ensure_ready(
        &self,
        config: &HarnessConfig,
        status: impl FnMut(u32, u32),
    ) -> StkResult<ConnectClient> {
        let host = config.host.clone();
        let port = config.port;
        let executable = config.stk_executable.clone();
        self.ensure_ready_with(
            move || ConnectClient::connect(&host, port),
            move || launch_stk(executable.as_deref()),
            status,
        )
    }

    /// Readiness loop with injectable connector and launcher.
    ///
    /// The launcher runs at most once, after the first failed attempt,
    /// followed by the launch settle delay. Up to `max_attempts` connection
    /// attempts are made in total, sleeping `interval` between failures.
    /// Exhaustion yields [`StkError::ReadinessTimeout`] carrying the
    /// attempt count.
    pub fn ensure_ready_with<T, C, L, F>(
        &self,
        mut connector: C,
        mut launcher: L,
        mut status: F,
    ) -> StkResult<T>
    where
        C: FnMut() -> StkResult<T>,
        L: FnMut() -> StkResult<()>,
        F: FnMut(u32, u32),
    {
        let mut launched = false;
        for attempt in 1..=self.max_attempts {
            status(attempt, self.max_attempts);
            match connector() {
                Ok(client) => {
                    info!("connected to STK on attempt {attempt}");
                    return Ok(client);
                }
                Err(StkError::Connect(err)) => {
                    warn!("connection attempt {attempt}/{} failed: {err}", self.max_attempts);
                }
                Err(other) => return Err(other),
            }

            if !launched {
                launched = true;
                launcher()?;
                thread::sleep(self.launch_settle);
            } else if attempt < self.max_attempts {
                thread::sleep(self.interval);
            }
        }

        Err(StkError::ReadinessTimeout {
            attempts: self.max_attempts,
        })
    }
}

/// Launch the STK desktop application.
///
/// Tries the configured executable path first, then the fixed install
/// location; reports both when neither exists.
pub fn launch_stk(configured: Option<&std::path::Path>) -> StkResult<()> {
    let fallback = PathBuf::from(FALLBACK_STK_EXECUTABLE);
    let primary = configured
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback.clone());

    let executable = if primary.exists() {
        primary.clone()
    } else if fallback.exists() {
        fallback.clone()
    } else {
        return Err(StkError::ExecutableNotFound { primary, fallback });
    };

    info!("launching STK from {}", executable.display());
    Command::new(&executable)
        .args(STK_LAUNCH_ARGS)
        .spawn()
        .map_err(|err| StkError::Launch(format!("{}: {err}", executable.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn refused() -> StkError {
        StkError::Connect(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }

    fn poller(max_attempts: u32) -> ReadinessPoller {
        ReadinessPoller::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn succeeds_after_n_failures_with_n_plus_one_attempts() {
        let mut attempts = 0u32;
        let mut launches = 0u32;
        let mut reported = Vec::new();

        let result = poller(10).ensure_ready_with(
            || {
                attempts += 1;
                if attempts <= 3 {
                    Err(refused())
                } else {
                    Ok("client")
                }
            },
            || {
                launches += 1;
                Ok(())
            },
            |attempt, total| reported.push((attempt, total)),
        );

        assert_eq!(result.expect("ready"), "client");
        assert_eq!(attempts, 4);
        assert_eq!(launches, 1, "launcher must run at most once");
        assert_eq!(reported, vec![(1, 10), (2, 10), (3, 10), (4, 10)]);
    }

    #[test]
    fn times_out_after_exactly_max_attempts() {
        let mut attempts = 0u32;
        let err = poller(5)
            .ensure_ready_with(
                || -> StkResult<()> {
                    attempts += 1;
                    Err(refused())
                },
                || Ok(()),
                |_, _| {},
            )
            .unwrap_err();

        assert_eq!(attempts, 5);
        assert!(matches!(err, StkError::ReadinessTimeout { attempts: 5 }));
    }

    #[test]
    fn non_retryable_errors_propagate_immediately() {
        let mut attempts = 0u32;
        let err = poller(5)
            .ensure_ready_with(
                || -> StkResult<()> {
                    attempts += 1;
                    Err(StkError::protocol("bad frame"))
                },
                || Ok(()),
                |_, _| {},
            )
            .unwrap_err();

        assert_eq!(attempts, 1);
        assert!(matches!(err, StkError::Protocol(_)));
    }

    #[test]
    fn launcher_failure_aborts_the_loop() {
        let err = poller(5)
            .ensure_ready_with(
                || -> StkResult<()> { Err(refused()) },
                || {
                    Err(StkError::ExecutableNotFound {
                        primary: "C:/missing.exe".into(),
                        fallback: FALLBACK_STK_EXECUTABLE.into(),
                    })
                },
                |_, _| {},
            )
            .unwrap_err();

        assert!(matches!(err, StkError::ExecutableNotFound { .. }));
    }

    #[test]
    fn missing_executables_report_both_paths() {
        let err = launch_stk(Some(std::path::Path::new("Z:/definitely/not/here.exe"))).unwrap_err();
        match err {
            StkError::ExecutableNotFound { primary, fallback } => {
                assert!(primary.to_string_lossy().contains("not/here.exe"));
                assert_eq!(fallback, PathBuf::from(FALLBACK_STK_EXECUTABLE));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
