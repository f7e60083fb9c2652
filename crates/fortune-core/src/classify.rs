//! Ordered classification rules turning probe observations into a device status
//!
//! The policy is a plain table: the first rule whose conditions all hold wins.
//! New firmware variants are supported by adding markers or rules in the config
//! file, without touching discovery or dispatch code.
//!
//! The default table trusts a hostname match above everything else, even
//! though a hostname is the weakest evidence of the three signals. Reorder the
//! rules in `[classification]` to change that.

use serde::{Deserialize, Deserializer, Serialize};

use crate::device::{DeviceStatus, ProbeResult};

/// Hostname fragment the device announces itself with
pub const DEVICE_HOSTNAME: &str = "death-fortune-teller";

/// Hostname fragment assigned by the Wi-Fi module vendor when no name is set
pub const VENDOR_HOSTNAME: &str = "espressif";

/// A single observation a rule can test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Condition {
    /// Hostname contains the given fragment (case-insensitive)
    HostnameContains(String),
    /// Banner matched a firmware signature marker
    BannerRecognized,
    /// Update port answered the invitation
    UpdateReady,
    /// Control-channel TCP port accepted a connection
    ControlChannelOpen,
    /// Control-channel TCP port did not accept a connection
    ControlChannelClosed,
}

impl Condition {
    fn holds(&self, result: &ProbeResult) -> bool {
        match self {
            Condition::HostnameContains(fragment) => result
                .hostname
                .as_deref()
                .map(|h| h.to_lowercase().contains(&fragment.to_lowercase()))
                .unwrap_or(false),
            Condition::BannerRecognized => result.banner_recognized,
            Condition::UpdateReady => result.update_port_ready,
            Condition::ControlChannelOpen => result.control_channel_reachable,
            Condition::ControlChannelClosed => !result.control_channel_reachable,
        }
    }
}

/// One row of the policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// All conditions must hold; an empty list always matches
    pub when: Vec<Condition>,
    pub status: DeviceStatus,
}

impl Rule {
    pub fn new(when: Vec<Condition>, status: DeviceStatus) -> Self {
        Self { when, status }
    }

    fn matches(&self, result: &ProbeResult) -> bool {
        self.when.iter().all(|c| c.holds(result))
    }
}

/// Firmware signature markers plus the ordered rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationPolicy {
    /// Case-insensitive substrings identifying the device firmware in a banner.
    /// Blank entries are dropped on load; they would match any banner.
    #[serde(default = "default_markers", deserialize_with = "non_blank_markers")]
    pub markers: Vec<String>,
    /// Evaluated top to bottom; the first match decides
    #[serde(default = "default_rules")]
    pub rules: Vec<Rule>,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            markers: default_markers(),
            rules: default_rules(),
        }
    }
}

fn default_markers() -> Vec<String> {
    ["remotedebug", "wifi:", "🛜", "log buffer"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn non_blank_markers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let markers = Vec::<String>::deserialize(deserializer)?;
    Ok(markers
        .into_iter()
        .filter(|marker| !marker.trim().is_empty())
        .collect())
}

fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            vec![Condition::HostnameContains(DEVICE_HOSTNAME.to_string())],
            DeviceStatus::Active,
        ),
        Rule::new(vec![Condition::BannerRecognized], DeviceStatus::Active),
        Rule::new(vec![Condition::UpdateReady], DeviceStatus::Active),
        Rule::new(
            vec![
                Condition::HostnameContains(VENDOR_HOSTNAME.to_string()),
                Condition::ControlChannelClosed,
            ],
            DeviceStatus::RecognizedNoControlChannel,
        ),
        Rule::new(
            vec![Condition::ControlChannelOpen],
            DeviceStatus::ControlChannelOnly,
        ),
    ]
}

impl ClassificationPolicy {
    /// Check banner text against the firmware signature markers
    pub fn banner_recognized(&self, banner: &str) -> bool {
        let banner = banner.to_lowercase();
        self.markers
            .iter()
            .filter(|marker| !marker.trim().is_empty())
            .any(|marker| banner.contains(&marker.to_lowercase()))
    }

    /// Classify a probe result; falls through to `Unknown` when no rule matches
    pub fn classify(&self, result: &ProbeResult) -> DeviceStatus {
        self.rules
            .iter()
            .find(|rule| rule.matches(result))
            .map(|rule| rule.status)
            .unwrap_or(DeviceStatus::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(hostname: Option<&str>, banner: bool, update: bool, open: bool) -> ProbeResult {
        ProbeResult {
            address: "192.168.1.46".to_string(),
            hostname: hostname.map(str::to_string),
            control_channel_reachable: open,
            banner_text: String::new(),
            banner_recognized: banner,
            update_port_ready: update,
        }
    }

    #[test]
    fn test_hostname_match_wins() {
        let policy = ClassificationPolicy::default();
        let result = observed(Some("Death-Fortune-Teller.lan"), false, false, false);
        assert_eq!(policy.classify(&result), DeviceStatus::Active);
    }

    #[test]
    fn test_banner_then_update_then_open() {
        let policy = ClassificationPolicy::default();
        assert_eq!(policy.classify(&observed(None, true, false, true)), DeviceStatus::Active);
        assert_eq!(policy.classify(&observed(None, false, true, false)), DeviceStatus::Active);
        assert_eq!(
            policy.classify(&observed(None, false, false, true)),
            DeviceStatus::ControlChannelOnly
        );
        assert_eq!(policy.classify(&observed(None, false, false, false)), DeviceStatus::Unknown);
    }

    #[test]
    fn test_vendor_hostname_without_control_channel() {
        let policy = ClassificationPolicy::default();
        let closed = observed(Some("espressif.lan"), false, false, false);
        assert_eq!(policy.classify(&closed), DeviceStatus::RecognizedNoControlChannel);

        let open = observed(Some("espressif.lan"), false, false, true);
        assert_eq!(policy.classify(&open), DeviceStatus::ControlChannelOnly);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let policy = ClassificationPolicy::default();
        for hostname in [None, Some("death-fortune-teller"), Some("espressif"), Some("printer")] {
            for banner in [false, true] {
                for update in [false, true] {
                    for open in [false, true] {
                        let result = observed(hostname, banner, update, open);
                        let first = policy.classify(&result);
                        let again = policy.classify(&result.clone());
                        assert_eq!(first, again);
                    }
                }
            }
        }
    }

    #[test]
    fn test_banner_markers_case_insensitive() {
        let policy = ClassificationPolicy::default();
        assert!(policy.banner_recognized("🛜 REMOTEDEBUG connected"));
        assert!(policy.banner_recognized("🛜 Log buffer: 12/200 entries"));
        assert!(policy.banner_recognized("WiFi: connected"));
        assert!(!policy.banner_recognized("Ubuntu 24.04 login:"));
        assert!(!policy.banner_recognized(""));
    }

    #[test]
    fn test_reordered_policy_demotes_hostname() {
        let policy = ClassificationPolicy {
            markers: default_markers(),
            rules: vec![
                Rule::new(vec![Condition::BannerRecognized], DeviceStatus::Active),
                Rule::new(
                    vec![Condition::HostnameContains(DEVICE_HOSTNAME.into())],
                    DeviceStatus::ControlChannelOnly,
                ),
            ],
        };
        let spoofed = observed(Some("death-fortune-teller"), false, false, false);
        assert_eq!(policy.classify(&spoofed), DeviceStatus::ControlChannelOnly);
    }

    #[test]
    fn test_policy_from_toml() {
        let text = r#"
            markers = ["skull-os"]

            [[rules]]
            status = "active"
            when = [{ kind = "banner_recognized" }]

            [[rules]]
            status = "control_channel_only"
            when = [{ kind = "hostname_contains", value = "skull" }]
        "#;
        let policy: ClassificationPolicy = toml::from_str(text).unwrap();
        assert!(policy.banner_recognized("Welcome to SKULL-OS"));
        assert_eq!(policy.rules.len(), 2);
        assert_eq!(
            policy.rules[1].when,
            vec![Condition::HostnameContains("skull".to_string())]
        );
    }

    #[test]
    fn test_blank_markers_are_dropped() {
        let policy: ClassificationPolicy =
            toml::from_str(r#"markers = ["", "  ", "remotedebug"]"#).unwrap();
        assert_eq!(policy.markers, vec!["remotedebug".to_string()]);
        assert!(!policy.banner_recognized(""));
        assert!(!policy.banner_recognized("Ubuntu 24.04 login:"));
        assert!(policy.banner_recognized("RemoteDebug ready"));

        // A closed port with a blank marker set in code still reads as unknown
        let built = ClassificationPolicy {
            markers: vec![String::new()],
            ..Default::default()
        };
        assert!(!built.banner_recognized(""));
        assert_eq!(
            built.classify(&observed(None, built.banner_recognized(""), false, false)),
            DeviceStatus::Unknown
        );
    }
}
