//! Parallel ping sweep of a bounded offset range

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::subnet::SubnetPrefix;

/// A basic "is anything there" check for one address
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self, ip: Ipv4Addr, timeout: Duration) -> bool;
}

/// ICMP echo through the system `ping` tool
#[derive(Debug, Clone, Copy, Default)]
pub struct PingProbe;

#[async_trait]
impl Reachability for PingProbe {
    async fn is_reachable(&self, ip: Ipv4Addr, timeout: Duration) -> bool {
        // -W is milliseconds on macOS and whole seconds elsewhere
        let wait = if cfg!(target_os = "macos") {
            timeout.as_millis().max(1).to_string()
        } else {
            timeout.as_secs().max(1).to_string()
        };

        let child = tokio::process::Command::new("ping")
            .args(["-c", "1", "-W", &wait, &ip.to_string()])
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout + Duration::from_secs(1), child).await {
            Ok(Ok(output)) => output.status.success(),
            _ => false,
        }
    }
}

/// Sweeps addresses with a bounded number of concurrent probes
#[derive(Clone)]
pub struct NetworkScanner {
    prober: Arc<dyn Reachability>,
    workers: usize,
    probe_timeout: Duration,
}

impl NetworkScanner {
    pub fn new(prober: Arc<dyn Reachability>, workers: usize, probe_timeout: Duration) -> Self {
        Self {
            prober,
            workers: workers.max(1),
            probe_timeout,
        }
    }

    /// Probe every offset in `offsets` and return the addresses that answered.
    ///
    /// A miss is final for this sweep; there are no retries. Results come back
    /// in completion order, so sort them if order matters.
    pub async fn sweep(&self, prefix: SubnetPrefix, offsets: Range<u8>) -> Vec<Ipv4Addr> {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for offset in offsets.clone() {
            let ip = prefix.host(offset);
            let permits = permits.clone();
            let prober = self.prober.clone();
            let probe_timeout = self.probe_timeout;

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                if prober.is_reachable(ip, probe_timeout).await {
                    Some(ip)
                } else {
                    None
                }
            });
        }

        let mut responsive = Vec::new();
        while let Some(result) = tasks.join_next().await {
            if let Ok(Some(ip)) = result {
                debug!(ip = %ip, "Host responded");
                responsive.push(ip);
            }
        }

        info!(
            prefix = %prefix,
            start = offsets.start,
            end = offsets.end,
            found = responsive.len(),
            "Sweep complete"
        );
        responsive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers for a fixed set of addresses and tracks concurrency
    struct FakeNetwork {
        alive: HashSet<Ipv4Addr>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeNetwork {
        fn new(alive: impl IntoIterator<Item = Ipv4Addr>) -> Self {
            Self {
                alive: alive.into_iter().collect(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Reachability for FakeNetwork {
        async fn is_reachable(&self, ip: Ipv4Addr, _timeout: Duration) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.alive.contains(&ip)
        }
    }

    #[tokio::test]
    async fn test_sweep_never_reports_outside_range() {
        let prefix = SubnetPrefix::new(192, 168, 1);
        // Every address on the subnet answers
        let network = Arc::new(FakeNetwork::new((0..=255).map(|o| prefix.host(o))));
        let scanner = NetworkScanner::new(network.clone(), 48, Duration::from_millis(10));

        let mut found = scanner.sweep(prefix, 20..60).await;
        found.sort();

        let expected: Vec<Ipv4Addr> = (20..60).map(|o| prefix.host(o)).collect();
        assert_eq!(found, expected);
        assert_eq!(network.calls.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn test_sweep_reports_only_responders() {
        let prefix = SubnetPrefix::new(192, 168, 1);
        let network = Arc::new(FakeNetwork::new([prefix.host(46), prefix.host(70)]));
        let scanner = NetworkScanner::new(network, 8, Duration::from_millis(10));

        let found = scanner.sweep(prefix, 20..60).await;
        assert_eq!(found, vec![Ipv4Addr::new(192, 168, 1, 46)]);
    }

    #[tokio::test]
    async fn test_sweep_respects_worker_bound() {
        let prefix = SubnetPrefix::new(10, 0, 0);
        let network = Arc::new(FakeNetwork::new([]));
        let scanner = NetworkScanner::new(network.clone(), 4, Duration::from_millis(10));

        assert!(scanner.sweep(prefix, 1..41).await.is_empty());
        assert!(network.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(network.calls.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn test_empty_range() {
        let prefix = SubnetPrefix::new(10, 0, 0);
        let network = Arc::new(FakeNetwork::new([prefix.host(5)]));
        let scanner = NetworkScanner::new(network, 4, Duration::from_millis(10));
        assert!(scanner.sweep(prefix, 60..20).await.is_empty());
    }
}
