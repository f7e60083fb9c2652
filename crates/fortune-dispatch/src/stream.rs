//! Continuous log mirroring over one persistent control-channel connection

use fortune_core::{DeviceSettings, HostCache, Settings, StreamSettings};
use fortune_discovery::Discover;
use fortune_link::{Connector, ControlSession, LinkError};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::DispatchError;
use crate::escalate::Escalation;
use crate::queue::CandidateQueue;

const READ_CHUNK: usize = 4096;

pub struct LogStreamer<C> {
    settings: StreamSettings,
    device: DeviceSettings,
    cache: HostCache,
    connector: C,
    discovery: Arc<dyn Discover>,
}

impl<C: Connector> LogStreamer<C> {
    pub fn new(settings: &Settings, connector: C, discovery: Arc<dyn Discover>) -> Self {
        Self {
            settings: settings.stream.clone(),
            device: settings.device.clone(),
            cache: HostCache::new(&settings.cache.path),
            connector,
            discovery,
        }
    }

    pub fn cache(&self) -> &HostCache {
        &self.cache
    }

    /// Mirror device output into `sink`, reconnecting after every drop.
    ///
    /// A clean connection resets the attempt count and re-arms rediscovery.
    /// Returns only when the reconnect budget is spent or the sink fails.
    pub async fn run<W>(&self, explicit: Option<&str>, sink: &mut W) -> Result<(), DispatchError>
    where
        W: AsyncWrite + Unpin,
    {
        let queue = CandidateQueue::build(explicit, &self.device, self.cache.read());
        let mut current = match queue.front() {
            Some(candidate) => candidate.address.clone(),
            None => self.device.fallback_host.clone(),
        };

        let mut escalation =
            Escalation::new(self.settings.auto_discover, self.settings.full_discovery);
        let max_attempts = (self.settings.retries >= 0).then_some(self.settings.retries as u32);
        let mut hosts = vec![current.clone()];
        let mut attempt = 0u32;
        let mut total = 0u32;

        while max_attempts.map_or(true, |max| attempt < max) {
            attempt += 1;
            total += 1;

            match self.open(&current).await {
                Ok(session) => {
                    self.cache.write(&current);
                    escalation.reset();
                    attempt = 0;
                    info!(host = %current, "Streaming device log");
                    self.pump(session, sink).await?;
                }
                Err(e) => {
                    warn!(host = %current, attempt = attempt, error = %e, "Stream attempt failed");
                    let failed = current.clone();
                    let found = escalation
                        .rediscover(self.discovery.as_ref(), |found| {
                            found.address.trim() != failed
                        })
                        .await;
                    if let Some(found) = found {
                        current = found.address.trim().to_string();
                        if !hosts.contains(&current) {
                            hosts.push(current.clone());
                        }
                        continue;
                    }
                }
            }

            sleep(self.settings.delay()).await;
        }

        Err(DispatchError::Exhausted {
            hosts,
            attempts: total,
        })
    }

    /// Connect, discard buffered output and switch the device to log mode
    async fn open(&self, host: &str) -> Result<ControlSession<C::Stream>, LinkError> {
        let stream = self
            .connector
            .connect(host, self.device.control_port, self.settings.connect_timeout())
            .await?;
        let mut session = ControlSession::new(stream, self.settings.poll());
        session.drain().await?;
        session.send_line(&self.settings.command).await?;
        Ok(session)
    }

    /// Copy bytes until the device hangs up or the link fails
    async fn pump<W>(&self, session: ControlSession<C::Stream>, sink: &mut W) -> Result<(), DispatchError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stream = session.into_inner();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    info!("Device closed the log stream");
                    return Ok(());
                }
                Ok(n) => {
                    sink.write_all(&buf[..n]).await?;
                    sink.flush().await?;
                }
                Err(e) => {
                    warn!(error = %e, "Log stream read failed");
                    return Ok(());
                }
            }
        }
    }
}
