//! Local subnet prefix detection

use anyhow::Result;
use fortune_core::DiscoverySettings;
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use std::net::Ipv4Addr;
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, warn};

/// The first three octets of a /24, written as `a.b.c.`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    pub fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// Prefix of the /24 containing `ip`
    pub fn of(ip: Ipv4Addr) -> Self {
        let [a, b, c, _] = ip.octets();
        Self([a, b, c])
    }

    /// Address at `offset` within this prefix
    pub fn host(&self, offset: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, offset)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        Self::of(ip) == *self
    }
}

impl std::fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}.{}.{}.", a, b, c)
    }
}

impl FromStr for SubnetPrefix {
    type Err = anyhow::Error;

    /// Accepts `192.168.1.`, `192.168.1` or a full address such as `192.168.1.0`
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('.');
        let octets: Vec<&str> = trimmed.split('.').collect();
        if octets.len() != 3 && octets.len() != 4 {
            anyhow::bail!("Invalid subnet prefix: {}", s);
        }
        let parsed = octets
            .iter()
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| anyhow::anyhow!("Invalid subnet prefix: {}", s))?;
        Ok(Self([parsed[0], parsed[1], parsed[2]]))
    }
}

/// Pick the prefix to sweep: configured, then detected, then the fallback
pub fn resolve_prefix(settings: &DiscoverySettings) -> SubnetPrefix {
    if let Some(configured) = settings.subnet_prefix.as_deref() {
        match configured.parse() {
            Ok(prefix) => return prefix,
            Err(e) => warn!(prefix = %configured, error = %e, "Ignoring configured subnet prefix"),
        }
    }

    if let Some(prefix) = detect_prefix() {
        return prefix;
    }

    settings.fallback_prefix.parse().unwrap_or_else(|e| {
        warn!(prefix = %settings.fallback_prefix, error = %e, "Invalid fallback prefix");
        SubnetPrefix::new(192, 168, 86)
    })
}

/// Prefix of the default-route interface, or of the first LAN interface
pub fn detect_prefix() -> Option<SubnetPrefix> {
    let by_route = default_route_interface().and_then(|iface| interface_ipv4(&iface));
    let ip = by_route.or_else(first_lan_ipv4)?;
    let prefix = SubnetPrefix::of(ip);
    debug!(ip = %ip, prefix = %prefix, "Detected local subnet");
    Some(prefix)
}

/// Name of the interface carrying the default route
pub fn default_route_interface() -> Option<String> {
    // Linux: `ip route show default`
    if let Ok(output) = Command::new("ip").args(["route", "show", "default"]).output() {
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(iface) = stdout.lines().find_map(parse_ip_route_line) {
                return Some(iface);
            }
        }
    }

    // macOS/BSD: `route -n get default`
    if let Ok(output) = Command::new("route").args(["-n", "get", "default"]).output() {
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return parse_route_get(&stdout);
        }
    }

    None
}

/// Parse a line from `ip route show default`
fn parse_ip_route_line(line: &str) -> Option<String> {
    // Format: "default via 192.168.1.1 dev wlan0 proto dhcp metric 600"
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.first() != Some(&"default") {
        return None;
    }
    let dev_idx = parts.iter().position(|&p| p == "dev")?;
    parts.get(dev_idx + 1).map(|s| s.to_string())
}

/// Parse the output of `route -n get default`
fn parse_route_get(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() == "interface" {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

/// First non-loopback IPv4 address of the named interface
fn interface_ipv4(name: &str) -> Option<Ipv4Addr> {
    NetworkInterface::show()
        .ok()?
        .into_iter()
        .filter(|iface| iface.name == name)
        .flat_map(|iface| iface.addr)
        .find_map(|addr| match addr {
            network_interface::Addr::V4(v4) if !v4.ip.is_loopback() => Some(v4.ip),
            _ => None,
        })
}

/// First IPv4 address on an interface that looks like a LAN link
fn first_lan_ipv4() -> Option<Ipv4Addr> {
    NetworkInterface::show()
        .ok()?
        .into_iter()
        .filter(|iface| {
            !iface.name.starts_with("lo")
                && !iface.name.starts_with("docker")
                && !iface.name.starts_with("br-")
                && !iface.name.starts_with("veth")
        })
        .flat_map(|iface| iface.addr)
        .find_map(|addr| match addr {
            network_interface::Addr::V4(v4) if !v4.ip.is_loopback() && !v4.ip.is_link_local() => {
                Some(v4.ip)
            }
            _ => None,
        })
}
