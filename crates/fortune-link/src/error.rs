//! Errors raised while talking to the device

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Connection to {address}:{port} failed: {source}")]
    Connect {
        address: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("Connection to {address}:{port} timed out after {timeout:?}")]
    ConnectTimeout {
        address: String,
        port: u16,
        timeout: Duration,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No reply from {0} before timeout")]
    NoReply(String),
}
