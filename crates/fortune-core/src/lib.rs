//! Fortune Core - Core types, settings and host cache
//!
//! This crate provides the foundational types shared by the Fortune tools:
//! - Settings constructed once per invocation and handed to every component
//! - Address candidates, probe results and device status
//! - The ordered classification policy that turns probe observations into a status
//! - The single-slot host cache holding the last known good address

pub mod cache;
pub mod classify;
pub mod device;
pub mod lookup;
pub mod settings;

pub use cache::{CacheError, HostCache};
pub use classify::{ClassificationPolicy, Condition, Rule};
pub use device::{AddressCandidate, DeviceStatus, ProbeResult};
pub use lookup::Lookup;
pub use settings::{
    CacheSettings, DeviceSettings, DiscoverySettings, DispatchSettings, Settings, StreamSettings,
};
