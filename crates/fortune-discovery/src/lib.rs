//! Fortune Discovery - Finding the device on the local network
//!
//! This crate provides the resolution chain used to find a live address:
//! - Cached host and well-known hostnames, confirmed with a quick liveness probe
//! - Ping sweep of a bounded offset range of the local subnet
//! - Protocol probing (control-channel banner, update-channel invitation) and
//!   classification of every responsive address

pub mod engine;
pub mod hostname;
pub mod probe;
pub mod scanner;
pub mod subnet;

pub use engine::{
    Discover, DiscoveryEngine, DiscoveryMode, DiscoveryRequest, Liveness, Resolution,
    ResolutionSource, SurveyEntry, SurveyReport, TcpLiveness,
};
pub use probe::{Diagnose, DiagnosticProbe};
pub use scanner::{NetworkScanner, PingProbe, Reachability};
pub use subnet::SubnetPrefix;
