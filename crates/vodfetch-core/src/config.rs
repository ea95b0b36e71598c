use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::session::Stream;

/// Upper bound for any configured delay (pacing, stagger, backoff step).
pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Retry policy parameters (optional section in config.toml).
///
/// Steps are expressed in time units (see `VodConfig::time_unit_ms`); the
/// backoff before retry `n` (0-based) is `(n + 1) * step`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per chunk (including the first).
    pub max_attempts: u32,
    /// Backoff step when the device reports it is busy.
    pub busy_step_units: f64,
    /// Backoff step for every other failure.
    pub retry_step_units: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            busy_step_units: 5.0,
            retry_step_units: 2.0,
        }
    }
}

/// URL scheme used to reach the device CGI endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Global configuration loaded from `~/.config/vodfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VodConfig {
    /// Device address (IP or hostname, optionally with port).
    #[serde(default)]
    pub host: Option<String>,
    /// Login user name.
    pub username: String,
    /// Login password. Prefer REOLINK_PASSWORD over storing it here.
    #[serde(default)]
    pub password: Option<String>,
    /// Camera channel on an NVR (0 for standalone cameras).
    pub channel: u8,
    /// Recording stream to download: "main" (high quality) or "sub" (low quality).
    pub stream: Stream,
    #[serde(default)]
    pub scheme: Scheme,
    /// Accept self-signed device certificates when `scheme = "https"`.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    /// Number of parallel workers; each holds its own login session.
    pub workers: usize,
    /// Length of each downloaded chunk in minutes.
    pub chunk_minutes: u32,
    /// Directory receiving one file per chunk.
    pub output_dir: PathBuf,
    /// Length of one time unit in milliseconds; all delays below scale with it.
    pub time_unit_ms: u64,
    /// Pause between two tasks of the same worker.
    pub pacing_units: f64,
    /// Delay between worker starts so logins do not arrive all at once.
    pub stagger_units: f64,
    /// Per-request timeout in seconds (listing and chunk download).
    pub request_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_true() -> bool {
    true
}

impl Default for VodConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: "admin".to_string(),
            password: None,
            channel: 0,
            stream: Stream::Main,
            scheme: Scheme::Http,
            accept_invalid_certs: true,
            workers: 2,
            chunk_minutes: 5,
            output_dir: PathBuf::from("./downloads"),
            time_unit_ms: 1000,
            pacing_units: 0.3,
            stagger_units: 1.0,
            request_timeout_secs: 600,
            retry: None,
        }
    }
}

impl VodConfig {
    /// Duration of one time unit.
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    /// Scale a number of time units into a duration.
    ///
    /// Negative (and NaN) values clamp to zero, anything beyond `MAX_DELAY`
    /// (including infinity) clamps to `MAX_DELAY`.
    pub fn units(&self, n: f64) -> Duration {
        let secs = self.time_unit().as_secs_f64() * n.max(0.0);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY)
    }

    pub fn pacing(&self) -> Duration {
        self.units(self.pacing_units)
    }

    pub fn stagger(&self) -> Duration {
        self.units(self.stagger_units)
    }

    pub fn chunk_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.chunk_minutes))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy built from the `[retry]` section (or defaults) and the time unit.
    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            busy_step: self.units(retry.busy_step_units),
            retry_step: self.units(retry.retry_step_units),
        }
    }

    /// Copy that is safe to log or print: the password is masked.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.password.is_some() {
            cfg.password = Some("********".to_string());
        }
        cfg
    }

    /// Apply `REOLINK_*` environment variables on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Like `apply_env` but with an injectable lookup (used by tests).
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(host) = get("REOLINK_HOST") {
            self.host = Some(host);
        }
        if let Some(user) = get("REOLINK_USERNAME") {
            self.username = user;
        }
        if let Some(password) = get("REOLINK_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(channel) = get("REOLINK_CHANNEL") {
            self.channel = channel
                .trim()
                .parse()
                .with_context(|| format!("REOLINK_CHANNEL is not a channel number: {channel}"))?;
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vodfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VodConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as `load_or_init` for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<VodConfig> {
    if !path.exists() {
        let default_cfg = VodConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("failed to write default config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: VodConfig =
        toml::from_str(&data).with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}
