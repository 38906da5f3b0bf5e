// ── Runtime service configuration ──
//
// These types describe *what* to watch and *where* to send commands.
// They carry credential data and timing, but never touch disk or the
// environment: `panelsync-config` builds a `ServiceConfig` and hands it in.

use std::time::Duration;

use panelsync_api::{Rgb, TransitionTime};
use secrecy::SecretString;
use url::Url;

use crate::model::{EntityId, PanelState};

/// Default delay after any absorbed failure.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Default read-idle window before a silent feed is considered stalled.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Where the counter feed lives.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: Url,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Reconnect when no bytes arrive for this long. `None` = wait forever.
    pub idle_timeout: Option<Duration>,
}

/// The panel controller endpoint.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub base_url: Url,
    /// Opaque controller token, sent as a path segment.
    pub auth_token: SecretString,
    /// Whole-request timeout for a single effect write.
    pub request_timeout: Duration,
    pub transition: TransitionTime,
}

/// Colour shown for each [`PanelState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub idle: Rgb,
    pub active: Rgb,
}

impl Palette {
    pub const fn color_for(&self, state: PanelState) -> Rgb {
        match state {
            PanelState::Idle => self.idle,
            PanelState::Active => self.active,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            idle: Rgb::new(51, 51, 255),
            active: Rgb::new(255, 51, 153),
        }
    }
}

/// Static description of one tracked entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpec {
    pub id: EntityId,
    pub panel_id: u32,
    /// State the panel is assumed to show at startup.
    pub default_state: PanelState,
}

/// Everything the reconciliation service needs to run.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub feed: FeedConfig,
    pub device: DeviceConfig,
    pub palette: Palette,
    /// Fixed delay applied after every absorbed failure.
    pub backoff: Duration,
    /// Tracked entities, in reconciliation order.
    pub entities: Vec<EntitySpec>,
}
