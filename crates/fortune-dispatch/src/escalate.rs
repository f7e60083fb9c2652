//! Rediscovery escalation after a host stops answering

use fortune_discovery::{Discover, DiscoveryMode, DiscoveryRequest, Resolution};
use tracing::{debug, info};

/// Tracks which rediscovery modes have been spent.
///
/// Fast runs first, full only when enabled; each runs at most once until
/// `reset` is called.
#[derive(Debug, Clone)]
pub struct Escalation {
    auto_discover: bool,
    full_discovery: bool,
    fast_attempted: bool,
    full_attempted: bool,
}

impl Escalation {
    pub fn new(auto_discover: bool, full_discovery: bool) -> Self {
        Self {
            auto_discover,
            full_discovery,
            fast_attempted: false,
            full_attempted: false,
        }
    }

    /// Make both modes available again
    pub fn reset(&mut self) {
        self.fast_attempted = false;
        self.full_attempted = false;
    }

    fn next_mode(&mut self) -> Option<DiscoveryMode> {
        if !self.auto_discover {
            return None;
        }
        if !self.fast_attempted {
            self.fast_attempted = true;
            return Some(DiscoveryMode::Fast);
        }
        if self.full_discovery && !self.full_attempted {
            self.full_attempted = true;
            return Some(DiscoveryMode::Full);
        }
        None
    }

    /// Run the remaining modes in order until one yields a resolution `accept` takes
    pub async fn rediscover<F>(
        &mut self,
        discovery: &dyn Discover,
        mut accept: F,
    ) -> Option<Resolution>
    where
        F: FnMut(&Resolution) -> bool,
    {
        while let Some(mode) = self.next_mode() {
            let request = DiscoveryRequest {
                explicit: None,
                mode,
            };
            match discovery.discover(request).await {
                Some(found) if accept(&found) => {
                    info!(address = %found.address, mode = ?mode, "Rediscovered device");
                    return Some(found);
                }
                Some(found) => {
                    debug!(address = %found.address, mode = ?mode, "Rediscovery gave no new address");
                }
                None => debug!(mode = ?mode, "Rediscovery found nothing"),
            }
        }
        None
    }
}
