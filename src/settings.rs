//! Layered configuration.
//!
//! Settings are resolved from built-in defaults, then an optional TOML file,
//! then `LEDGERWATCH_*` environment variables. Command-line flags are applied
//! on top by the binary.
//!
//! ```toml
//! api_url = "https://dashboard.example.org"
//! method = "post"
//! environment = "beta"
//! refresh = "30s"
//! timeout = "10s"
//! redact_addresses = true
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::source::RequestMethod;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Resolved dashboard settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Base URL of the metrics backend.
    pub api_url: String,
    /// Method for `/get_metrics`.
    pub method: RequestMethod,
    /// Network environment sent with POST requests.
    pub environment: Option<String>,
    /// Refresh interval, e.g. "30s".
    pub refresh: String,
    /// Per-request timeout, e.g. "10s".
    pub timeout: String,
    /// Show addresses as `a.X.X.d`.
    pub redact_addresses: bool,
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("method", "get")?
            .set_default("refresh", "30s")?
            .set_default("timeout", "10s")?
            .set_default("redact_addresses", true)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(Environment::with_prefix("LEDGERWATCH").try_parsing(true))
            .build()
            .context("failed to load configuration")?;

        let settings: Settings = config.try_deserialize().context("invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that duration fields parse and are non-zero.
    pub fn validate(&self) -> Result<()> {
        let refresh = self.refresh_interval()?;
        let timeout = self.request_timeout()?;
        if refresh.is_zero() {
            anyhow::bail!("refresh interval must be greater than zero");
        }
        if timeout.is_zero() {
            anyhow::bail!("timeout must be greater than zero");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Result<Duration> {
        parse_duration(&self.refresh).with_context(|| format!("invalid refresh: {}", self.refresh))
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout).with_context(|| format!("invalid timeout: {}", self.timeout))
    }
}
