//! Protocol probing of a single candidate address

use async_trait::async_trait;
use fortune_core::{ClassificationPolicy, Lookup, ProbeResult, Settings};
use fortune_link::{probe_update_channel, Connector, ControlSession, TcpConnector};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::hostname::reverse_lookup;

/// Produces a fresh probe result for one address
#[async_trait]
pub trait Diagnose: Send + Sync {
    async fn diagnose(&self, ip: Ipv4Addr) -> ProbeResult;
}

/// Control-channel banner read plus update-channel invitation
#[derive(Debug, Clone)]
pub struct DiagnosticProbe {
    control_port: u16,
    update_port: u16,
    connect_timeout: Duration,
    banner_timeout: Duration,
    wake_delay: Duration,
    update_timeout: Duration,
    resolve_hostnames: bool,
    policy: ClassificationPolicy,
}

impl DiagnosticProbe {
    pub fn new(settings: &Settings) -> Self {
        let discovery = &settings.discovery;
        Self {
            control_port: settings.device.control_port,
            update_port: settings.device.update_port,
            connect_timeout: discovery.probe_connect_timeout(),
            banner_timeout: discovery.banner_timeout(),
            wake_delay: discovery.wake_delay(),
            update_timeout: discovery.update_timeout(),
            resolve_hostnames: discovery.resolve_hostnames,
            policy: settings.classification.clone(),
        }
    }

    /// Probe one address; every failure just leaves the matching field unset
    pub async fn probe(&self, ip: Ipv4Addr) -> ProbeResult {
        let address = ip.to_string();

        let hostname = if self.resolve_hostnames {
            reverse_lookup(ip).await
        } else {
            Lookup::NotAttempted
        };
        if let Lookup::Failed(reason) = &hostname {
            debug!(ip = %ip, error = %reason, "Hostname lookup failed");
        }

        let (control_channel_reachable, banner_text) = self.read_banner(&address).await;
        let banner_recognized = self.policy.banner_recognized(&banner_text);
        let update_port_ready = self.update_ready(&address).await;

        let result = ProbeResult {
            address,
            hostname: hostname.found(),
            control_channel_reachable,
            banner_text,
            banner_recognized,
            update_port_ready,
        };
        debug!(
            ip = %ip,
            hostname = ?result.hostname,
            control = result.control_channel_reachable,
            banner = result.banner_recognized,
            update = result.update_port_ready,
            "Probed host"
        );
        result
    }

    /// Connect to the control channel and collect whatever it volunteers.
    ///
    /// When the device stays silent a single newline is sent to wake the prompt.
    async fn read_banner(&self, address: &str) -> (bool, String) {
        let stream = match TcpConnector
            .connect(address, self.control_port, self.connect_timeout)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                trace!(address = %address, error = %e, "Control channel closed");
                return (false, String::new());
            }
        };

        let mut session = ControlSession::new(stream, self.banner_timeout);
        let mut text = session.read_all().await.unwrap_or_default();

        if text.trim().is_empty() && session.send(b"\n").await.is_ok() {
            sleep(self.wake_delay).await;
            text.push_str(&session.read_all().await.unwrap_or_default());
        }

        (true, text.trim().to_string())
    }

    async fn update_ready(&self, address: &str) -> bool {
        match probe_update_channel(address, self.update_port, self.update_timeout).await {
            Ok(reply) => reply.is_ready(),
            Err(e) => {
                trace!(address = %address, error = %e, "Update channel silent");
                false
            }
        }
    }
}

#[async_trait]
impl Diagnose for DiagnosticProbe {
    async fn diagnose(&self, ip: Ipv4Addr) -> ProbeResult {
        self.probe(ip).await
    }
}
