//! Control-channel session
//!
//! The device never marks the end of a response, so every read collects bytes
//! until the line goes quiet for one read timeout or the peer closes.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, trace};

use crate::error::LinkError;

const READ_CHUNK: usize = 4096;

/// How the session answered the device's initial output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// The device asked for a secret and it was sent
    Secret,
    /// No secret prompt; a bare newline was sent
    Newline,
}

/// True when device output looks like a secret prompt
pub fn is_auth_cue(text: &str) -> bool {
    text.to_lowercase().contains("password") || text.contains('#')
}

/// An open control-channel connection with a fixed read timeout
pub struct ControlSession<S> {
    stream: S,
    read_timeout: Duration,
}

impl<S> ControlSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            stream,
            read_timeout,
        }
    }

    /// Read until the peer is quiet for one read timeout or closes the stream
    pub async fn read_until_quiet(&mut self) -> Result<Vec<u8>, LinkError> {
        let mut collected = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match timeout(self.read_timeout, self.stream.read(&mut buf)).await {
                Err(_elapsed) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => collected.extend_from_slice(&buf[..n]),
                Ok(Err(e)) => return Err(e.into()),
            }
        }
        trace!(bytes = collected.len(), "Read from control channel");
        Ok(collected)
    }

    /// Read and decode everything currently available
    pub async fn read_all(&mut self) -> Result<String, LinkError> {
        let bytes = self.read_until_quiet().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Discard anything the device has buffered
    pub async fn drain(&mut self) -> Result<usize, LinkError> {
        let discarded = self.read_until_quiet().await?.len();
        if discarded > 0 {
            trace!(bytes = discarded, "Drained control channel");
        }
        Ok(discarded)
    }

    /// Write raw bytes and flush
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Write one newline-terminated line
    pub async fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        if line.ends_with('\n') {
            self.send(line.as_bytes()).await
        } else {
            let mut framed = String::with_capacity(line.len() + 1);
            framed.push_str(line);
            framed.push('\n');
            self.send(framed.as_bytes()).await
        }
    }

    /// Answer the device's initial output.
    ///
    /// Sends the secret when `initial` carries a prompt, otherwise a neutral
    /// newline. Either way the reply is drained after `pause`.
    pub async fn handshake(
        &mut self,
        initial: &str,
        secret: Option<&str>,
        pause: Duration,
    ) -> Result<Handshake, LinkError> {
        let kind = if is_auth_cue(initial) {
            debug!("Control channel asked for a secret");
            self.send_line(secret.unwrap_or("")).await?;
            Handshake::Secret
        } else {
            self.send(b"\n").await?;
            Handshake::Newline
        };
        sleep(pause).await;
        self.drain().await?;
        Ok(kind)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
