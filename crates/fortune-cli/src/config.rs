//! Configuration loading and environment overrides

use anyhow::{Context, Result};
use fortune_core::settings::{HOST_ENV, SECRET_ENV};
use fortune_core::Settings;
use std::path::Path;
use tracing::info;

/// Load settings from a TOML file, falling back to defaults when it is missing
pub fn load_settings(path: &Path) -> Result<Settings> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(settings)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Settings::default())
    }
}

/// Fold environment variables into `settings`.
///
/// `var` is `std::env::var` in the binary; tests pass a fixed map.
pub fn apply_env<F>(settings: &mut Settings, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = var(HOST_ENV)
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
    {
        settings.device.env_host = Some(host);
    }
    if let Some(secret) = var(SECRET_ENV).filter(|s| !s.is_empty()) {
        settings.device.secret = Some(secret);
    }
}

/// Fractional seconds from the command line to whole milliseconds
pub fn secs_to_ms(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = load_settings(Path::new("/nonexistent/fortune.toml")).unwrap();
        assert_eq!(settings.dispatch.retries, 3);
        assert_eq!(settings.device.control_port, 23);
    }

    #[test]
    fn test_file_values_are_loaded() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[device]\nfallback_host = \"10.1.1.1\"\n\n[stream]\ncommand = \"tail\"\n"
        )
        .unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.device.fallback_host, "10.1.1.1");
        assert_eq!(settings.stream.command, "tail");
        assert_eq!(settings.stream.retries, -1);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[dispatch]\nretries = \"many\"").unwrap();
        assert!(load_settings(file.path()).is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(HOST_ENV, " 10.0.0.9 "), (SECRET_ENV, "hunter2")]);
        let mut settings = Settings::default();
        apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.device.env_host.as_deref(), Some("10.0.0.9"));
        assert_eq!(settings.device.placeholder(), "10.0.0.9");
        assert_eq!(settings.device.secret.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_blank_environment_is_ignored() {
        let mut settings = Settings::default();
        apply_env(&mut settings, |_| Some("  ".to_string()));
        assert_eq!(settings.device.env_host, None);
        // A blank secret is still a value the user chose
        assert_eq!(settings.device.secret.as_deref(), Some("  "));
    }

    #[test]
    fn test_secs_to_ms() {
        assert_eq!(secs_to_ms(1.5), 1500);
        assert_eq!(secs_to_ms(0.0), 0);
        assert_eq!(secs_to_ms(-2.0), 0);
    }
}
