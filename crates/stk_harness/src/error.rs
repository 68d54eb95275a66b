use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for harness operations.
pub type StkResult<T> = Result<T, StkError>;

/// Errors that can occur while launching STK or driving it over Connect.
#[derive(Debug, Error)]
pub enum StkError {
    #[error("STK executable not found at {primary:?} or fallback {fallback:?}")]
    ExecutableNotFound { primary: PathBuf, fallback: PathBuf },
    #[error("failed to launch STK: {0}")]
    Launch(String),
    /// Connection could not be established. Retryable through the readiness
    /// poller; every other error aborts the in-progress operation.
    #[error("could not connect to STK: {0}")]
    Connect(#[source] io::Error),
    #[error("not connected to STK")]
    NotConnected,
    #[error("socket error while talking to STK: {0}")]
    Transport(#[source] io::Error),
    #[error("malformed Connect frame: {0}")]
    Protocol(String),
    #[error("STK rejected command: {0}")]
    HostRejected(String),
    #[error("scenario setup failed: {0}")]
    ScenarioSetup(String),
    #[error("STK did not become ready after {attempts} connection attempts")]
    ReadinessTimeout { attempts: u32 },
    #[error("malformed TLE data: {0}")]
    TleFormat(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl StkError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        StkError::Protocol(message.into())
    }

    pub(crate) fn rejected(command: impl Into<String>) -> Self {
        StkError::HostRejected(command.into())
    }
}
