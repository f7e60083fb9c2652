//! Best-effort hostname resolution

use fortune_core::Lookup;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::trace;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Reverse-resolve an address with the system `nslookup` tool
pub async fn reverse_lookup(ip: Ipv4Addr) -> Lookup<String> {
    let child = tokio::process::Command::new("nslookup")
        .arg(ip.to_string())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(LOOKUP_TIMEOUT, child).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let name = parse_nslookup(&stdout);
            trace!(ip = %ip, hostname = ?name, "Reverse lookup");
            name.into()
        }
        Ok(Err(e)) => Lookup::Failed(e.to_string()),
        Err(_elapsed) => Lookup::Failed("nslookup timed out".to_string()),
    }
}

/// Extract the PTR name from `nslookup` output
fn parse_nslookup(output: &str) -> Option<String> {
    // Format: "46.1.168.192.in-addr.arpa\tname = death-fortune-teller.lan."
    output.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if !key.to_lowercase().contains("name") {
            return None;
        }
        let name = value.trim().trim_end_matches('.');
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    })
}

/// Forward-resolve a name to its first IPv4 address
pub async fn resolve_name(name: &str) -> Lookup<Ipv4Addr> {
    let lookup = tokio::net::lookup_host((name, 0));
    match tokio::time::timeout(LOOKUP_TIMEOUT, lookup).await {
        Ok(Ok(addrs)) => addrs
            .filter_map(|addr| match addr.ip() {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .next()
            .into(),
        // Unknown names are the normal "not here" answer
        Ok(Err(e)) => {
            trace!(name = %name, error = %e, "Name did not resolve");
            Lookup::Absent
        }
        Err(_elapsed) => Lookup::Failed(format!("resolving {} timed out", name)),
    }
}
