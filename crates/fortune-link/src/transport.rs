//! Connection factory for the control channel

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::error::LinkError;

/// Opens control-channel streams.
///
/// Dispatch code only sees this trait, so retry and rediscovery behavior can
/// be driven by an in-memory transport in tests.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The stream type this connector produces
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Connect to `address:port`, giving up after `connect_timeout`
    async fn connect(
        &self,
        address: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self::Stream, LinkError>;
}

/// Plain TCP connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(
        &self,
        address: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<TcpStream, LinkError> {
        trace!(address = %address, port = port, "Connecting to control channel");
        match timeout(connect_timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                Ok(stream)
            }
            Ok(Err(source)) => Err(LinkError::Connect {
                address: address.to_string(),
                port,
                source,
            }),
            Err(_elapsed) => Err(LinkError::ConnectTimeout {
                address: address.to_string(),
                port,
                timeout: connect_timeout,
            }),
        }
    }
}

/// Quick liveness check: does the port accept a connection within the timeout.
///
/// No handshake is attempted and the stream is dropped immediately.
pub async fn quick_probe(address: &str, port: u16, connect_timeout: Duration) -> bool {
    TcpConnector
        .connect(address, port, connect_timeout)
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_quick_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(quick_probe("127.0.0.1", port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = TcpConnector
            .connect("127.0.0.1", port, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Connect { .. }));
        assert!(!quick_probe("127.0.0.1", port, Duration::from_millis(500)).await);
    }
}
