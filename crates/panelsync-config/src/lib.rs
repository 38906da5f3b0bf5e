//! Configuration for the panelsync service.
//!
//! Layered loading (built-in defaults, then the TOML file, then the
//! environment), validation, and translation to
//! `panelsync_core::ServiceConfig`. Nothing here is written back to disk.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use panelsync_api::{Rgb, TransitionTime};
use panelsync_core::{
    DeviceConfig, EntitySpec, FeedConfig, Palette, PanelState, ServiceConfig,
};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PANELSYNC_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {field}")]
    Missing { field: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn missing(field: &str) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration as read from file and environment.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedSection,

    #[serde(default)]
    pub device: DeviceSection,

    #[serde(default)]
    pub palette: PaletteSection,

    /// Delay after any absorbed failure.
    #[serde(default = "default_backoff")]
    pub backoff: Span,

    /// Tracked entities, in reconciliation order.
    #[serde(default)]
    pub entities: Vec<EntityEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedSection::default(),
            device: DeviceSection::default(),
            palette: PaletteSection::default(),
            backoff: default_backoff(),
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FeedSection {
    /// Event stream URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Span,

    /// Reconnect after this much silence. `0` disables the check.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Span,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout: default_connect_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct DeviceSection {
    /// Controller base URL (e.g., "http://192.168.1.20:16021").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Controller auth token (prefer `NANOLEAF_AUTH_TOKEN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: Span,

    #[serde(default)]
    pub transition: TransitionSection,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            request_timeout: default_request_timeout(),
            transition: TransitionSection::default(),
        }
    }
}

impl fmt::Debug for DeviceSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSection")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .field("transition", &self.transition)
            .finish()
    }
}

/// Effect transition range, in tenths of a second.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TransitionSection {
    pub min_value: u32,
    pub max_value: u32,
}

impl Default for TransitionSection {
    fn default() -> Self {
        let TransitionTime {
            min_value,
            max_value,
        } = TransitionTime::default();
        Self {
            min_value,
            max_value,
        }
    }
}

/// Colours as `[r, g, b]` triples.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PaletteSection {
    pub idle: Rgb,
    pub active: Rgb,
}

impl Default for PaletteSection {
    fn default() -> Self {
        let Palette { idle, active } = Palette::default();
        Self { idle, active }
    }
}

/// One `[[entities]]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntityEntry {
    /// Application name as it appears in the feed.
    pub id: String,
    pub panel_id: u32,
    #[serde(default)]
    pub default_state: PanelState,
}

/// A duration given as whole seconds or a humantime string ("250ms", "1m 30s").
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Span {
    Seconds(u64),
    Text(String),
}

impl Span {
    pub fn resolve(&self, field: &str) -> Result<Duration, ConfigError> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            Self::Text(text) if text.trim() == "0" => Ok(Duration::ZERO),
            Self::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| ConfigError::invalid(field, format!("'{text}': {e}"))),
        }
    }
}

fn default_backoff() -> Span {
    Span::Text("1s".into())
}
fn default_connect_timeout() -> Span {
    Span::Text("10s".into())
}
fn default_idle_timeout() -> Span {
    Span::Text("90s".into())
}
fn default_request_timeout() -> Span {
    Span::Text("10s".into())
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `$PANELSYNC_CONFIG`, else the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    ProjectDirs::from("org", "panelsync", "panelsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("panelsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Device settings read from the environment verbatim, lowest precedence
/// first. figment's `Env` would parse `00123` as a number.
const VERBATIM_ENV: [(&str, &str); 4] = [
    ("NANOLEAF_BASE_URL", "device.base_url"),
    ("NANOLEAF_AUTH_TOKEN", "device.auth_token"),
    ("PANELSYNC_DEVICE__BASE_URL", "device.base_url"),
    ("PANELSYNC_DEVICE__AUTH_TOKEN", "device.auth_token"),
];

/// The provider stack, lowest precedence first. A missing file is skipped.
pub fn figment() -> Figment {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_path()))
        .merge(
            Env::prefixed("PANELSYNC_")
                .ignore(&["config", "device__base_url", "device__auth_token"])
                .split("__"),
        );

    VERBATIM_ENV
        .into_iter()
        .fold(figment, |figment, (var, key)| match std::env::var(var) {
            Ok(value) => figment.merge(Serialized::default(key, value)),
            Err(_) => figment,
        })
}

/// Load the raw Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let config: Config = figment().extract()?;
    Ok(config)
}

/// Load, validate and translate in one step.
pub fn load_service_config() -> Result<ServiceConfig, ConfigError> {
    load_config()?.into_service_config()
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Check every required setting and build the runtime config.
    pub fn into_service_config(self) -> Result<ServiceConfig, ConfigError> {
        let feed_url = self
            .feed
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::missing("feed.url"))?;
        let feed_url = parse_http_url("feed.url", feed_url)?;

        let base_url = self
            .device
            .base_url
            .as_deref()
            .ok_or_else(|| ConfigError::missing("device.base_url"))?;
        let base_url = parse_http_url("device.base_url", base_url)?;

        let auth_token = self
            .device
            .auth_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::missing("device.auth_token"))?;

        let idle_timeout = self.feed.idle_timeout.resolve("feed.idle_timeout")?;
        let TransitionSection {
            min_value,
            max_value,
        } = self.device.transition;
        if min_value > max_value {
            return Err(ConfigError::invalid(
                "device.transition",
                format!("min_value {min_value} exceeds max_value {max_value}"),
            ));
        }

        Ok(ServiceConfig {
            feed: FeedConfig {
                url: feed_url,
                connect_timeout: self.feed.connect_timeout.resolve("feed.connect_timeout")?,
                idle_timeout: (!idle_timeout.is_zero()).then_some(idle_timeout),
            },
            device: DeviceConfig {
                base_url,
                auth_token: SecretString::from(auth_token),
                request_timeout: self
                    .device
                    .request_timeout
                    .resolve("device.request_timeout")?,
                transition: TransitionTime {
                    min_value,
                    max_value,
                },
            },
            palette: Palette {
                idle: self.palette.idle,
                active: self.palette.active,
            },
            backoff: self.backoff.resolve("backoff")?,
            entities: validate_entities(self.entities)?,
        })
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw
        .parse()
        .map_err(|_| ConfigError::invalid(field, format!("invalid URL: {raw}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::invalid(
            field,
            format!("expected an http or https URL, got scheme '{other}'"),
        )),
    }
}

fn validate_entities(entries: Vec<EntityEntry>) -> Result<Vec<EntitySpec>, ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::missing("entities"));
    }

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .map(|entry| {
            if entry.id.trim().is_empty() {
                return Err(ConfigError::invalid("entities", "entity id is empty"));
            }
            if !seen.insert(entry.id.clone()) {
                return Err(ConfigError::invalid(
                    "entities",
                    format!("duplicate entity id '{}'", entry.id),
                ));
            }
            Ok(EntitySpec {
                id: entry.id.into(),
                panel_id: entry.panel_id,
                default_state: entry.default_state,
            })
        })
        .collect()
}
