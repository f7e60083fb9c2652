//! Ordered, de-duplicated candidate addresses for one dispatch

use fortune_core::{AddressCandidate, DeviceSettings};
use fortune_discovery::{Resolution, ResolutionSource};
use std::collections::VecDeque;

/// Addresses to try, consumed front to back
#[derive(Debug, Clone, Default)]
pub struct CandidateQueue {
    pending: VecDeque<AddressCandidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the queue: explicit address, environment default, cached host, then
    /// the fixed fallback.
    ///
    /// An explicit address equal to the placeholder counts as not given.
    pub fn build(explicit: Option<&str>, device: &DeviceSettings, cached: Option<String>) -> Self {
        let mut queue = Self::new();

        if let Some(explicit) = explicit.map(str::trim) {
            if explicit != device.placeholder() {
                queue.push(explicit);
            }
        }
        if let Some(env_host) = device.env_host.as_deref() {
            queue.push(env_host);
        }
        if let Some(cached) = cached.as_deref() {
            queue.push(cached);
        }
        queue.push(&device.fallback_host);

        queue
    }

    /// Append an address unless it is empty or already queued
    pub fn push(&mut self, address: &str) -> bool {
        self.enqueue(AddressCandidate::new(address))
    }

    /// Append a rediscovered address unless it is queued or is the host that just failed.
    ///
    /// An address found through a well-known hostname keeps that name.
    pub fn offer(&mut self, found: &Resolution, current: &str) -> bool {
        let mut candidate = AddressCandidate::new(&found.address);
        if candidate.is_same_address(current) {
            return false;
        }
        if let ResolutionSource::Hostname(name) = &found.source {
            candidate = candidate.with_hostname(name.as_str());
        }
        self.enqueue(candidate)
    }

    fn enqueue(&mut self, candidate: AddressCandidate) -> bool {
        if candidate.address.is_empty() || self.contains(&candidate.address) {
            return false;
        }
        self.pending.push_back(candidate);
        true
    }

    pub fn pop(&mut self) -> Option<AddressCandidate> {
        self.pending.pop_front()
    }

    pub fn front(&self) -> Option<&AddressCandidate> {
        self.pending.front()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.pending.iter().any(|c| c.is_same_address(address))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.pending.iter().map(|c| c.address.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fortune_core::settings::FALLBACK_HOST;

    #[test]
    fn test_build_order() {
        let device = DeviceSettings {
            env_host: Some("10.0.0.2".to_string()),
            ..Default::default()
        };
        let queue = CandidateQueue::build(Some("10.0.0.1"), &device, Some("10.0.0.3".into()));
        assert_eq!(
            queue.addresses(),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", FALLBACK_HOST]
        );
    }

    #[test]
    fn test_build_skips_placeholder_and_duplicates() {
        let device = DeviceSettings::default();
        let queue =
            CandidateQueue::build(Some(FALLBACK_HOST), &device, Some(format!(" {} \n", FALLBACK_HOST)));
        assert_eq!(queue.addresses(), vec![FALLBACK_HOST]);
    }

    #[test]
    fn test_build_without_anything_yields_fallback() {
        let queue = CandidateQueue::build(None, &DeviceSettings::default(), None);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.front().unwrap().address, FALLBACK_HOST);
    }

    #[test]
    fn test_push_ignores_empty() {
        let mut queue = CandidateQueue::new();
        assert!(!queue.push("   "));
        assert!(queue.is_empty());
    }

    fn scanned(address: &str) -> Resolution {
        Resolution {
            address: address.to_string(),
            source: ResolutionSource::Scan,
        }
    }

    #[test]
    fn test_offer_rejects_current_and_queued() {
        let mut queue = CandidateQueue::new();
        queue.push("10.0.0.5");
        assert!(!queue.offer(&scanned("10.0.0.5"), "10.0.0.1"));
        assert!(!queue.offer(&scanned(" 10.0.0.1"), "10.0.0.1"));
        assert!(queue.offer(&scanned("10.0.0.9"), "10.0.0.1"));
        assert_eq!(queue.addresses(), vec!["10.0.0.5", "10.0.0.9"]);
        assert_eq!(queue.pop().unwrap().address, "10.0.0.5");
    }

    #[test]
    fn test_offer_keeps_well_known_hostname() {
        let mut queue = CandidateQueue::new();
        let found = Resolution {
            address: "10.0.0.9".to_string(),
            source: ResolutionSource::Hostname("death-fortune-teller.local".to_string()),
        };
        assert!(queue.offer(&found, "10.0.0.1"));
        assert!(queue.offer(&scanned("10.0.0.10"), "10.0.0.1"));

        let named = queue.pop().unwrap();
        assert_eq!(named.hostname.as_deref(), Some("death-fortune-teller.local"));
        assert_eq!(named.to_string(), "10.0.0.9 (death-fortune-teller.local)");
        assert_eq!(queue.pop().unwrap().hostname, None);
    }
}
