//! Handshake-and-send with per-host retries and rediscovery

use fortune_core::{AddressCandidate, DeviceSettings, DispatchSettings, HostCache, Settings};
use fortune_discovery::Discover;
use fortune_link::{Connector, ControlSession, LinkError};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::escalate::Escalation;
use crate::queue::CandidateQueue;

/// Build the line sent to the device.
///
/// The `send` verb passes its extra words through verbatim (possibly nothing,
/// which yields a bare newline); any other command is joined with its extras.
pub fn build_payload(command: &str, extra: &[String]) -> String {
    let mut payload = if command.eq_ignore_ascii_case("send") {
        extra.join(" ")
    } else if extra.is_empty() {
        command.to_string()
    } else {
        let mut words = Vec::with_capacity(extra.len() + 1);
        words.push(command);
        words.extend(extra.iter().map(String::as_str));
        words.join(" ")
    };
    if !payload.ends_with('\n') {
        payload.push('\n');
    }
    payload
}

/// A command that reached the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub address: String,
    pub response: String,
    /// Connection cycles spent across every host, including the successful one
    pub attempts: u32,
}

pub struct CommandDispatcher<C> {
    settings: DispatchSettings,
    device: DeviceSettings,
    cache: HostCache,
    connector: C,
    discovery: Arc<dyn Discover>,
}

impl<C: Connector> CommandDispatcher<C> {
    pub fn new(settings: &Settings, connector: C, discovery: Arc<dyn Discover>) -> Self {
        Self {
            settings: settings.dispatch.clone(),
            device: settings.device.clone(),
            cache: HostCache::new(&settings.cache.path),
            connector,
            discovery,
        }
    }

    pub fn cache(&self) -> &HostCache {
        &self.cache
    }

    /// Send `payload` to the first candidate that completes a full cycle
    pub async fn dispatch(
        &self,
        payload: &str,
        explicit: Option<&str>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut queue = CandidateQueue::build(explicit, &self.device, self.cache.read());
        let mut escalation =
            Escalation::new(self.settings.auto_discover, self.settings.full_discovery);
        let mut tried = Vec::new();
        let mut total = 0u32;

        debug!(candidates = ?queue.addresses(), "Dispatch queue");

        while let Some(candidate) = queue.pop() {
            tried.push(candidate.address.clone());

            if let Some(response) = self.attempt(&candidate, payload, &mut total).await {
                return Ok(DispatchOutcome {
                    address: candidate.address,
                    response,
                    attempts: total,
                });
            }

            escalation
                .rediscover(self.discovery.as_ref(), |found| {
                    queue.offer(found, &candidate.address)
                })
                .await;
        }

        Err(DispatchError::Exhausted {
            hosts: tried,
            attempts: total,
        })
    }

    /// Send `payload` to `host` alone: no other candidates, no rediscovery
    pub async fn dispatch_to(
        &self,
        host: &str,
        payload: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        let candidate = AddressCandidate::new(host);
        let mut total = 0u32;

        match self.attempt(&candidate, payload, &mut total).await {
            Some(response) => Ok(DispatchOutcome {
                address: candidate.address,
                response,
                attempts: total,
            }),
            None => Err(DispatchError::Exhausted {
                hosts: vec![candidate.address],
                attempts: total,
            }),
        }
    }

    /// Retry one host up to the attempt budget; caches the host on success
    async fn attempt(
        &self,
        candidate: &AddressCandidate,
        payload: &str,
        total: &mut u32,
    ) -> Option<String> {
        let max_attempts = self.settings.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            *total += 1;
            match self.cycle(&candidate.address, payload).await {
                Ok(response) => {
                    self.cache.write(&candidate.address);
                    info!(host = %candidate, attempt = attempt, "Command delivered");
                    return Some(response);
                }
                Err(e) => {
                    warn!(host = %candidate, attempt = attempt, error = %e, "Attempt failed");
                    if matches!(max_attempts, Some(max) if attempt >= max) {
                        return None;
                    }
                    sleep(self.settings.retry_delay()).await;
                }
            }
        }
    }

    /// One connection cycle; the stream is dropped on every exit path
    async fn cycle(&self, host: &str, payload: &str) -> Result<String, LinkError> {
        let stream = self
            .connector
            .connect(host, self.device.control_port, self.settings.connect_timeout())
            .await?;
        let mut session = ControlSession::new(stream, self.settings.read_timeout());

        session.drain().await?;
        let initial = session.read_all().await?;
        session
            .handshake(
                &initial,
                self.device.secret.as_deref(),
                self.settings.handshake_delay(),
            )
            .await?;

        session.send(payload.as_bytes()).await?;
        sleep(self.settings.settle_delay()).await;
        session.read_all().await
    }
}
