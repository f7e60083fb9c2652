//! Terminal reports for the `discover` and `status` commands

use fortune_core::DeviceStatus;
use fortune_discovery::{SurveyEntry, SurveyReport};
use std::fmt::{self, Write};

fn status_icon(status: DeviceStatus) -> &'static str {
    match status {
        DeviceStatus::Active => "🟢",
        DeviceStatus::RecognizedNoControlChannel | DeviceStatus::ControlChannelOnly => "🟡",
        DeviceStatus::Unknown => "🔴",
    }
}

fn check(flag: bool) -> &'static str {
    if flag {
        "✅"
    } else {
        "❌"
    }
}

fn survey_row(entry: &SurveyEntry) -> String {
    let result = &entry.result;
    format!(
        "{} {:<15} {:<25} {:<12} Control:{} Update:{}",
        status_icon(entry.status),
        result.address,
        result.hostname.as_deref().unwrap_or("Unknown"),
        entry.status.label(),
        check(result.control_channel_reachable),
        check(result.update_port_ready),
    )
}

/// Table of every responsive address followed by the verdict
pub fn render_survey(report: &SurveyReport) -> String {
    let mut out = String::new();
    if report.entries.is_empty() {
        let _ = writeln!(out, "❌ No devices responded on {}0/24", report.prefix);
        return out;
    }

    let _ = writeln!(out, "📋 Device status on {}0/24", report.prefix);
    let _ = writeln!(out, "{}", "-".repeat(72));
    for entry in &report.entries {
        let _ = writeln!(out, "{}", survey_row(entry));
    }

    match report.active() {
        Some(active) => {
            let _ = writeln!(out, "\n✅ Active device found: {}", active.result.address);
            let _ = writeln!(out, "💡 Set: export DEATH_FORTUNE_HOST={}", active.result.address);
        }
        None => {
            let _ = writeln!(out, "\n⚠️  No active device found");
        }
    }
    out
}

/// Summary printed by `fortune status`
#[derive(Debug, Clone)]
pub struct StatusDashboard {
    pub host: String,
    pub port: u16,
    pub wifi: Option<String>,
    pub update: Option<String>,
    pub detail: Option<String>,
}

impl fmt::Display for StatusDashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "💀 Death Fortune Teller - System Status")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "🎯 Target: {}", self.host)?;
        writeln!(f, "✅ Control channel reachable on port {}", self.port)?;
        writeln!(f)?;
        writeln!(f, "🛜 WiFi: {}", self.wifi.as_deref().unwrap_or("Unknown"))?;
        writeln!(f, "🔄 OTA: {}", self.update.as_deref().unwrap_or("Unknown"))?;
        if let Some(detail) = &self.detail {
            writeln!(f, "\n📋 Detailed Status:")?;
            writeln!(f, "{}", detail)?;
        }
        writeln!(f, "\n💡 Commands:")?;
        writeln!(f, "   telnet {} {}", self.host, self.port)?;
        writeln!(f, "   fortune send status --host {}", self.host)?;
        write!(f, "   fortune stream --host {}", self.host)
    }
}
