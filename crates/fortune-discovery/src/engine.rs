//! Prioritized address resolution
//!
//! Tiers run cheapest first and stop at the first success:
//! explicit address, cached host, well-known hostnames, then (full mode only)
//! a subnet sweep with protocol probing. Every success is written to the
//! host cache before it is returned.

use async_trait::async_trait;
use fortune_core::{DeviceStatus, HostCache, Lookup, ProbeResult, Settings};
use fortune_link::quick_probe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::hostname::resolve_name;
use crate::probe::{Diagnose, DiagnosticProbe};
use crate::scanner::{NetworkScanner, PingProbe, Reachability};
use crate::subnet::{resolve_prefix, SubnetPrefix};

/// How far the resolution chain may go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    /// Cache and hostnames only; never sweeps the subnet
    #[default]
    Fast,
    /// Everything, including the subnet sweep
    Full,
}

/// Which tier produced an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    Explicit,
    Cache,
    Hostname(String),
    Scan,
}

/// A resolved device address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub address: String,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryRequest {
    /// Caller-supplied address; ignored when equal to the placeholder default
    pub explicit: Option<String>,
    pub mode: DiscoveryMode,
}

impl DiscoveryRequest {
    pub fn fast() -> Self {
        Self {
            explicit: None,
            mode: DiscoveryMode::Fast,
        }
    }

    pub fn full() -> Self {
        Self {
            explicit: None,
            mode: DiscoveryMode::Full,
        }
    }

    pub fn with_explicit(mut self, address: impl Into<String>) -> Self {
        self.explicit = Some(address.into());
        self
    }
}

/// In-process discovery boundary used by the dispatchers
#[async_trait]
pub trait Discover: Send + Sync {
    async fn discover(&self, request: DiscoveryRequest) -> Option<Resolution>;
}

/// Quick "is the control port open" check with no handshake
#[async_trait]
pub trait Liveness: Send + Sync {
    async fn is_alive(&self, address: &str) -> bool;
}

/// Liveness over a plain TCP connect
#[derive(Debug, Clone, Copy)]
pub struct TcpLiveness {
    pub port: u16,
    pub timeout: Duration,
}

#[async_trait]
impl Liveness for TcpLiveness {
    async fn is_alive(&self, address: &str) -> bool {
        quick_probe(address, self.port, self.timeout).await
    }
}

/// One probed address in a survey
#[derive(Debug, Clone)]
pub struct SurveyEntry {
    pub result: ProbeResult,
    pub status: DeviceStatus,
}

/// Every responsive address of a full sweep, sorted by address
#[derive(Debug, Clone)]
pub struct SurveyReport {
    pub prefix: SubnetPrefix,
    pub entries: Vec<SurveyEntry>,
}

impl SurveyReport {
    /// First ACTIVE address, in address order
    pub fn active(&self) -> Option<&SurveyEntry> {
        self.entries
            .iter()
            .find(|e| e.status == DeviceStatus::Active)
    }
}

/// Composes scanner, probe and cache into the resolution chain
pub struct DiscoveryEngine {
    settings: Settings,
    cache: HostCache,
    scanner: NetworkScanner,
    liveness: Arc<dyn Liveness>,
    diagnose: Arc<dyn Diagnose>,
}

impl DiscoveryEngine {
    /// Engine wired to the real network
    pub fn new(settings: &Settings) -> Self {
        let discovery = &settings.discovery;
        Self {
            settings: settings.clone(),
            cache: HostCache::new(&settings.cache.path),
            scanner: NetworkScanner::new(
                Arc::new(PingProbe),
                discovery.workers,
                discovery.ping_timeout(),
            ),
            liveness: Arc::new(TcpLiveness {
                port: settings.device.control_port,
                timeout: discovery.liveness_timeout(),
            }),
            diagnose: Arc::new(DiagnosticProbe::new(settings)),
        }
    }

    pub fn with_reachability(mut self, prober: Arc<dyn Reachability>) -> Self {
        let discovery = &self.settings.discovery;
        self.scanner = NetworkScanner::new(prober, discovery.workers, discovery.ping_timeout());
        self
    }

    pub fn with_liveness(mut self, liveness: Arc<dyn Liveness>) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_diagnose(mut self, diagnose: Arc<dyn Diagnose>) -> Self {
        self.diagnose = diagnose;
        self
    }

    pub fn cache(&self) -> &HostCache {
        &self.cache
    }

    /// Run the resolution chain
    pub async fn resolve(&self, request: DiscoveryRequest) -> Option<Resolution> {
        if let Some(explicit) = self.explicit(&request) {
            return Some(self.accept(explicit, ResolutionSource::Explicit));
        }

        if let Some(address) = self.cached_alive().await {
            return Some(self.accept(address, ResolutionSource::Cache));
        }

        if let Some((name, address)) = self.well_known_alive().await {
            return Some(self.accept(address, ResolutionSource::Hostname(name)));
        }

        if request.mode == DiscoveryMode::Fast {
            debug!("Fast discovery found nothing");
            return None;
        }

        let report = self.survey().await;
        match report.active() {
            Some(entry) => {
                let address = entry.result.address.clone();
                Some(self.accept(address, ResolutionSource::Scan))
            }
            None => {
                warn!(prefix = %report.prefix, "Full discovery found no active device");
                None
            }
        }
    }

    /// Sweep the subnet and probe every responsive address.
    ///
    /// The report is returned as-is; only `resolve` writes the cache.
    pub async fn survey(&self) -> SurveyReport {
        let prefix = resolve_prefix(&self.settings.discovery);
        info!(prefix = %prefix, "Scanning network for the device");

        let mut responsive = self
            .scanner
            .sweep(prefix, self.settings.discovery.scan_range())
            .await;
        responsive.sort();

        let mut entries = Vec::with_capacity(responsive.len());
        for ip in responsive {
            let result = self.diagnose.diagnose(ip).await;
            let status = self.settings.classification.classify(&result);
            debug!(ip = %ip, status = %status, "Classified host");
            entries.push(SurveyEntry { result, status });
        }

        SurveyReport { prefix, entries }
    }

    /// Record an address found outside `resolve` (e.g. a survey pick)
    pub fn remember(&self, address: &str) {
        self.cache.write(address);
    }

    fn explicit(&self, request: &DiscoveryRequest) -> Option<String> {
        let explicit = request.explicit.as_deref()?.trim();
        if explicit.is_empty() || explicit == self.settings.device.placeholder() {
            return None;
        }
        Some(explicit.to_string())
    }

    async fn cached_alive(&self) -> Option<String> {
        let cached = match self.cache.load() {
            Lookup::Found(address) => address,
            Lookup::Failed(reason) => {
                debug!(error = %reason, "Host cache unreadable");
                return None;
            }
            _ => return None,
        };

        if self.liveness.is_alive(&cached).await {
            Some(cached)
        } else {
            debug!(address = %cached, "Cached host is not answering");
            None
        }
    }

    async fn well_known_alive(&self) -> Option<(String, String)> {
        for name in &self.settings.discovery.well_known_hosts {
            let ip = match resolve_name(name).await {
                Lookup::Found(ip) => ip,
                Lookup::Failed(reason) => {
                    debug!(name = %name, error = %reason, "Hostname lookup failed");
                    continue;
                }
                _ => continue,
            };

            let address = ip.to_string();
            if self.liveness.is_alive(&address).await {
                return Some((name.clone(), address));
            }
            debug!(name = %name, address = %address, "Hostname resolved but not answering");
        }
        None
    }

    fn accept(&self, address: String, source: ResolutionSource) -> Resolution {
        info!(address = %address, source = ?source, "Resolved device address");
        self.cache.write(&address);
        Resolution { address, source }
    }
}

#[async_trait]
impl Discover for DiscoveryEngine {
    async fn discover(&self, request: DiscoveryRequest) -> Option<Resolution> {
        self.resolve(request).await
    }
}
