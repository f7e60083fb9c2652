//! Update-channel readiness probe
//!
//! The device's firmware updater listens for a UDP invitation of the form
//! `<command> <port> <size> <md5>\n`. An all-zero invitation is never acted
//! on, but a ready updater still answers it with `OK` or `AUTH ...`.

use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::LinkError;

/// Largest reply worth reading
const REPLY_MTU: usize = 64;

/// How the updater answered an invitation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateReply {
    /// Updater accepted without authentication
    Ok,
    /// Updater wants an authenticated transfer; carries the nonce text
    Auth(String),
    /// Something answered, but not the updater
    Other(String),
}

impl UpdateReply {
    /// Parse a reply datagram
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data).trim().to_string();
        if text.starts_with("OK") {
            UpdateReply::Ok
        } else if let Some(rest) = text.strip_prefix("AUTH") {
            UpdateReply::Auth(rest.trim().to_string())
        } else {
            UpdateReply::Other(text)
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, UpdateReply::Ok | UpdateReply::Auth(_))
    }
}

/// The invitation payload: three zero fields and a zeroed 32-character digest
pub fn invitation() -> String {
    format!("0 0 0 {}\n", "0".repeat(32))
}

/// Send one invitation and wait for the reply
pub async fn probe_update_channel(
    address: &str,
    port: u16,
    reply_timeout: Duration,
) -> Result<UpdateReply, LinkError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let payload = invitation();

    trace!(address = %address, port = port, "Sending update invitation");
    socket.send_to(payload.as_bytes(), (address, port)).await?;

    let mut buf = [0u8; REPLY_MTU];
    let (len, _from) = timeout(reply_timeout, socket.recv_from(&mut buf))
        .await
        .map_err(|_| LinkError::NoReply(format!("{}:{}", address, port)))??;

    let reply = UpdateReply::parse(&buf[..len]);
    debug!(address = %address, reply = ?reply, "Update channel replied");
    Ok(reply)
}
