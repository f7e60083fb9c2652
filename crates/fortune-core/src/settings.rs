//! Settings built once per invocation and passed to every component

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::classify::{ClassificationPolicy, DEVICE_HOSTNAME};

/// Control-channel (telnet) port
pub const CONTROL_PORT: u16 = 23;

/// Update-channel (OTA invitation) port
pub const UPDATE_PORT: u16 = 3232;

/// Address used when nothing better is known
pub const FALLBACK_HOST: &str = "192.168.86.29";

/// Environment variable holding the caller's default address
pub const HOST_ENV: &str = "DEATH_FORTUNE_HOST";

/// Environment variable holding the control-channel secret
pub const SECRET_ENV: &str = "ESP32_TELNET_PASSWORD";

/// Complete settings for one invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub classification: ClassificationPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Fixed fallback address, last entry of every candidate queue
    #[serde(default = "default_fallback_host")]
    pub fallback_host: String,
    /// Address taken from the environment; never read from the file
    #[serde(skip)]
    pub env_host: Option<String>,
    /// Control-channel TCP port
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// Update-channel UDP port
    #[serde(default = "default_update_port")]
    pub update_port: u16,
    /// Secret sent when the control channel asks for one
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            fallback_host: default_fallback_host(),
            env_host: None,
            control_port: default_control_port(),
            update_port: default_update_port(),
            secret: None,
        }
    }
}

impl DeviceSettings {
    /// The address a caller gets when they did not pick one.
    ///
    /// An explicit address equal to this is treated as "not given".
    pub fn placeholder(&self) -> &str {
        self.env_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(&self.fallback_host)
    }
}

fn default_fallback_host() -> String {
    FALLBACK_HOST.to_string()
}

fn default_control_port() -> u16 {
    CONTROL_PORT
}

fn default_update_port() -> u16 {
    UPDATE_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// File holding the last known good address
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".pio/death_fortune_host")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Connection cycles per host; -1 retries forever, 0 still makes one attempt
    #[serde(default = "default_retries")]
    pub retries: i32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Pause after the handshake write, before draining its reply
    #[serde(default = "default_handshake_delay_ms")]
    pub handshake_delay_ms: u64,
    /// Pause after sending the command, before reading the response
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Run fast rediscovery once a host is exhausted
    #[serde(default)]
    pub auto_discover: bool,
    /// Allow a full subnet scan after fast rediscovery
    #[serde(default)]
    pub full_discovery: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            handshake_delay_ms: default_handshake_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            auto_discover: false,
            full_discovery: false,
        }
    }
}

impl DispatchSettings {
    /// Attempt budget per host, `None` when unbounded
    pub fn max_attempts(&self) -> Option<u32> {
        if self.retries < 0 {
            None
        } else {
            Some(self.retries.max(1) as u32)
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_retries() -> i32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_read_timeout_ms() -> u64 {
    4000
}

fn default_handshake_delay_ms() -> u64 {
    500
}

fn default_settle_delay_ms() -> u64 {
    1500
}

/// Settings for the continuous log stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Reconnect attempts; -1 reconnects forever
    #[serde(default = "default_stream_retries")]
    pub retries: i32,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Quiet period that ends the drain before the log command is sent
    #[serde(default = "default_stream_poll_ms")]
    pub poll_ms: u64,
    /// Command that switches the device into log output
    #[serde(default = "default_stream_command")]
    pub command: String,
    #[serde(default)]
    pub auto_discover: bool,
    #[serde(default)]
    pub full_discovery: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            retries: default_stream_retries(),
            delay_ms: default_retry_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            poll_ms: default_stream_poll_ms(),
            command: default_stream_command(),
            auto_discover: false,
            full_discovery: false,
        }
    }
}

impl StreamSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

fn default_stream_retries() -> i32 {
    -1
}

fn default_stream_poll_ms() -> u64 {
    1000
}

fn default_stream_command() -> String {
    "log".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Fixed subnet prefix (e.g. "192.168.1."); detected from the default route when unset
    #[serde(default)]
    pub subnet_prefix: Option<String>,
    /// Prefix used when detection fails
    #[serde(default = "default_fallback_prefix")]
    pub fallback_prefix: String,
    /// First host offset swept (inclusive)
    #[serde(default = "default_scan_start")]
    pub scan_start: u8,
    /// Last host offset swept (exclusive)
    #[serde(default = "default_scan_end")]
    pub scan_end: u8,
    /// Concurrent reachability probes
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// Connect timeout for the quick liveness probe
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,
    /// Connect timeout for the diagnostic control-channel handshake
    #[serde(default = "default_probe_connect_timeout_ms")]
    pub probe_connect_timeout_ms: u64,
    /// Read timeout while collecting a banner
    #[serde(default = "default_banner_timeout_ms")]
    pub banner_timeout_ms: u64,
    /// Pause between the wake byte and the second banner read
    #[serde(default = "default_wake_delay_ms")]
    pub wake_delay_ms: u64,
    #[serde(default = "default_update_timeout_ms")]
    pub update_timeout_ms: u64,
    /// Reverse-resolve hostnames of responsive addresses
    #[serde(default = "default_true")]
    pub resolve_hostnames: bool,
    /// Names tried during fast discovery
    #[serde(default = "default_well_known_hosts")]
    pub well_known_hosts: Vec<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            subnet_prefix: None,
            fallback_prefix: default_fallback_prefix(),
            scan_start: default_scan_start(),
            scan_end: default_scan_end(),
            workers: default_workers(),
            ping_timeout_ms: default_ping_timeout_ms(),
            liveness_timeout_ms: default_liveness_timeout_ms(),
            probe_connect_timeout_ms: default_probe_connect_timeout_ms(),
            banner_timeout_ms: default_banner_timeout_ms(),
            wake_delay_ms: default_wake_delay_ms(),
            update_timeout_ms: default_update_timeout_ms(),
            resolve_hostnames: true,
            well_known_hosts: default_well_known_hosts(),
        }
    }
}

impl DiscoverySettings {
    pub fn scan_range(&self) -> std::ops::Range<u8> {
        self.scan_start..self.scan_end
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn probe_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_connect_timeout_ms)
    }

    pub fn banner_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_timeout_ms)
    }

    pub fn wake_delay(&self) -> Duration {
        Duration::from_millis(self.wake_delay_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }
}

fn default_fallback_prefix() -> String {
    "192.168.86.".to_string()
}

fn default_scan_start() -> u8 {
    20
}

fn default_scan_end() -> u8 {
    60
}

fn default_workers() -> usize {
    48
}

fn default_ping_timeout_ms() -> u64 {
    1000
}

fn default_liveness_timeout_ms() -> u64 {
    600
}

fn default_probe_connect_timeout_ms() -> u64 {
    2000
}

fn default_banner_timeout_ms() -> u64 {
    500
}

fn default_wake_delay_ms() -> u64 {
    200
}

fn default_update_timeout_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_well_known_hosts() -> Vec<String> {
    vec![
        format!("{}.local", DEVICE_HOSTNAME),
        DEVICE_HOSTNAME.to_string(),
        format!("{}.lan", DEVICE_HOSTNAME),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attempts() {
        let mut dispatch = DispatchSettings::default();
        assert_eq!(dispatch.max_attempts(), Some(3));
        dispatch.retries = 0;
        assert_eq!(dispatch.max_attempts(), Some(1));
        dispatch.retries = -1;
        assert_eq!(dispatch.max_attempts(), None);
    }

    #[test]
    fn test_placeholder_prefers_environment() {
        let mut device = DeviceSettings::default();
        assert_eq!(device.placeholder(), FALLBACK_HOST);
        device.env_host = Some(" 10.1.1.9 ".to_string());
        assert_eq!(device.placeholder(), "10.1.1.9");
        device.env_host = Some("   ".to_string());
        assert_eq!(device.placeholder(), FALLBACK_HOST);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [dispatch]
            retries = 5
            auto_discover = true

            [discovery]
            scan_start = 100
        "#;
        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings.dispatch.retries, 5);
        assert!(settings.dispatch.auto_discover);
        assert_eq!(settings.dispatch.read_timeout_ms, 4000);
        assert_eq!(settings.discovery.scan_range(), 100..60);
        assert_eq!(settings.device.control_port, CONTROL_PORT);
        assert_eq!(settings.discovery.well_known_hosts.len(), 3);
    }
}
