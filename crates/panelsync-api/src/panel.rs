// Light panel controller client
//
// One request shape: `PUT {base}/api/v1/{token}/effects` writing a static
// single-panel colour. The auth token is a path segment, so URLs built here
// are never logged.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::{ParseError, Url};

use crate::error::Error;
use crate::transport::TransportConfig;

// ── Rgb ──────────────────────────────────────────────────────────────

/// An 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([red, green, blue]: [u8; 3]) -> Self {
        Self { red, green, blue }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.red, c.green, c.blue]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

// ── Effect payload ───────────────────────────────────────────────────

/// Transition time range, in tenths of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionTime {
    pub min_value: u32,
    pub max_value: u32,
}

impl Default for TransitionTime {
    fn default() -> Self {
        Self {
            min_value: 50,
            max_value: 100,
        }
    }
}

/// A `write` effect as accepted by the panel controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub command: &'static str,
    pub anim_type: &'static str,
    pub anim_data: String,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub palette: Vec<serde_json::Value>,
    pub trans_time: TransitionTime,
}

impl Effect {
    /// Static colour on a single panel.
    ///
    /// `animData` is `"<numPanels> <panelId> <numFrames> <r> <g> <b> <w> <t>"`.
    pub fn static_color(panel_id: u32, color: Rgb, transition: TransitionTime) -> Self {
        Self {
            command: "display",
            anim_type: "static",
            anim_data: format!(
                "1 {panel_id} 1 {} {} {} 0 0",
                color.red, color.green, color.blue
            ),
            looping: false,
            palette: Vec::new(),
            trans_time: transition,
        }
    }
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    write: &'a Effect,
}

// ── PanelClient ──────────────────────────────────────────────────────

/// HTTP client for the panel controller's effects endpoint.
pub struct PanelClient {
    http: reqwest::Client,
    base_url: Url,
    auth_token: SecretString,
    transition: TransitionTime,
}

impl PanelClient {
    pub fn new(
        base_url: Url,
        auth_token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, auth_token))
    }

    /// Create a panel client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, auth_token: SecretString) -> Self {
        Self {
            http,
            base_url,
            auth_token,
            transition: TransitionTime::default(),
        }
    }

    /// Transition time sent with every effect.
    pub fn with_transition(mut self, transition: TransitionTime) -> Self {
        self.transition = transition;
        self
    }

    /// `{base}/api/v1/{token}/effects`, with the token percent-encoded as a
    /// single path segment. Any path on the base URL is replaced.
    fn effects_url(&self) -> Result<Url, Error> {
        let mut target = self.base_url.clone();
        target.set_query(None);
        target.set_fragment(None);
        target
            .path_segments_mut()
            .map_err(|()| Error::InvalidUrl(ParseError::RelativeUrlWithCannotBeABaseBase))?
            .clear()
            .extend(["api", "v1", self.auth_token.expose_secret(), "effects"]);
        Ok(target)
    }

    /// Show `color` on `panel_id`. Repeating the call is harmless.
    pub async fn set_color(&self, panel_id: u32, color: Rgb) -> Result<(), Error> {
        let effect = Effect::static_color(panel_id, color, self.transition);
        self.write_effect(&effect).await
    }

    /// Send an arbitrary `write` effect.
    pub async fn write_effect(&self, effect: &Effect) -> Result<(), Error> {
        debug!(anim_data = %effect.anim_data, "PUT effects");

        let resp = self
            .http
            .put(self.effects_url()?)
            .json(&WriteRequest { write: effect })
            .send()
            .await
            .map_err(|e| Error::Transport(e.without_url()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::DeviceRejected {
            status: status.as_u16(),
            body,
        })
    }
}
