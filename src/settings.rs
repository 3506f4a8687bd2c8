// ABOUTME: Application settings: worker location, poll interval and request timeout
// ABOUTME: Layered as defaults, then optional TOML file, then DIAGSYNC_* environment variables

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_WORKER_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_WORKER_URL: &str = "DIAGSYNC_WORKER_URL";
const ENV_POLL_INTERVAL: &str = "DIAGSYNC_POLL_INTERVAL_SECS";
const ENV_REQUEST_TIMEOUT: &str = "DIAGSYNC_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub worker_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            worker_url: DEFAULT_WORKER_URL.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Defaults, overlaid with `path` when given, then with the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_WORKER_URL) {
            self.worker_url = url;
        }
        if let Some(secs) = lookup(ENV_POLL_INTERVAL) {
            self.poll_interval_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_POLL_INTERVAL))?;
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT) {
            self.request_timeout_secs = secs.trim().parse().with_context(|| {
                format!("{} must be a whole number of seconds", ENV_REQUEST_TIMEOUT)
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_url.trim().is_empty() {
            bail!("Worker URL must not be empty");
        }
        if self.poll_interval_secs == 0 {
            bail!("Poll interval must be at least 1 second");
        }
        if self.request_timeout_secs == 0 {
            bail!("Request timeout must be at least 1 second");
        }
        Ok(())
    }

    pub fn worker_url(&self) -> &str {
        self.worker_url.trim().trim_end_matches('/')
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.worker_url(), "http://localhost:8000");
        assert_eq!(settings.poll_interval(), Duration::from_secs(10));
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "worker_url = \"http://worker.internal:9000/\"").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.worker_url(), "http://worker.internal:9000");
        assert_eq!(settings.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval = 5").unwrap();
        assert!(Settings::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_WORKER_URL, "http://10.0.0.5:8000"),
            (ENV_POLL_INTERVAL, " 3 "),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.worker_url(), "http://10.0.0.5:8000");
        assert_eq!(settings.poll_interval_secs, 3);
        assert_eq!(settings.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(|key| (key == ENV_REQUEST_TIMEOUT).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_REQUEST_TIMEOUT));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = Settings {
            poll_interval_secs: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
