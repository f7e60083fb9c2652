//! Device types for tracking a candidate device during discovery

use serde::{Deserialize, Serialize};

/// An address believed to reach the device, not yet confirmed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressCandidate {
    /// Network address (IP literal or resolvable name), always trimmed
    pub address: String,
    /// Hostname associated with the address, if known
    pub hostname: Option<String>,
}

impl AddressCandidate {
    /// Create a candidate from a raw address string
    pub fn new(address: &str) -> Self {
        Self {
            address: address.trim().to_string(),
            hostname: None,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Candidates are identified by their trimmed textual address only
    pub fn is_same_address(&self, other: &str) -> bool {
        self.address == other.trim()
    }
}

impl PartialEq for AddressCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for AddressCandidate {}

impl std::fmt::Display for AddressCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.hostname {
            Some(name) => write!(f, "{} ({})", self.address, name),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Readiness classification of a probed address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// The device is up and speaking its control or update protocol
    Active,
    /// Recognized as the device family, but the control channel is closed
    RecognizedNoControlChannel,
    /// Something answers on the control port, but nothing identifies it
    ControlChannelOnly,
    /// Nothing identifying was observed
    #[default]
    Unknown,
}

impl DeviceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "ACTIVE",
            DeviceStatus::RecognizedNoControlChannel => "RECOGNIZED",
            DeviceStatus::ControlChannelOnly => "CONTROL",
            DeviceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Observations gathered by one diagnostic probe of one address.
///
/// Produced fresh per probe and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub address: String,
    /// Reverse-resolved hostname, if any
    pub hostname: Option<String>,
    /// The control-channel TCP port accepted a connection
    pub control_channel_reachable: bool,
    /// Everything read from the control channel during the handshake
    pub banner_text: String,
    /// The banner matched a firmware signature marker
    pub banner_recognized: bool,
    /// The update port answered the invitation with OK or AUTH
    pub update_port_ready: bool,
}

impl ProbeResult {
    /// A result for an address where nothing could be observed
    pub fn unreachable(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }
}
