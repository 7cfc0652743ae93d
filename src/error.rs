//! Error types for the router client

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Connection refused, reset, TLS failure, ...
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-zero, non-401 response code returned by the router
    #[error("router rejected {action} with response code {code}")]
    Router { action: String, code: u32 },

    /// Missing or unreadable response code; usually a wrong port/TLS pairing
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown MAC address: {0}")]
    DeviceNotFound(String),

    #[error("device is not connected: {0}")]
    DeviceNotConnected(String),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Router response code carried by this error, if any
    pub fn response_code(&self) -> Option<u32> {
        match self {
            Error::Router { code, .. } => Some(*code),
            Error::DeviceNotFound(_) => Some(1),
            Error::DeviceNotConnected(_) => Some(2),
            _ => None,
        }
    }

    pub(crate) fn router(action: &str, code: u32) -> Self {
        Error::Router {
            action: action.to_string(),
            code,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_status() {
            if let Some(status) = e.status() {
                return Error::HttpStatus(status.as_u16());
            }
        }
        Error::Transport(e.to_string())
    }
}
