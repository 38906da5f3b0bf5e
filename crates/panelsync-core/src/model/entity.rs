// ── Entity identity and device state ──

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── EntityId ────────────────────────────────────────────────────────

/// Stable identifier of one tracked counter (an application name in the feed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── PanelState ──────────────────────────────────────────────────────

/// Target condition of a panel.
///
/// Two-valued on purpose: "the counter did not move" versus "the counter
/// moved in either direction since the previous snapshot".
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PanelState {
    #[default]
    Idle,
    Active,
}

impl PanelState {
    /// Classify a count delta. Zero is `Idle`, anything else (including a
    /// decrease) is `Active`.
    pub const fn classify(diff: i128) -> Self {
        if diff == 0 { Self::Idle } else { Self::Active }
    }
}

// ── DeviceCommand ───────────────────────────────────────────────────

/// "Put panel `target` into `desired`". Issuing it twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    /// Entity the command was derived from (for logging).
    pub entity: EntityId,
    /// Panel identifier on the controller.
    pub target: u32,
    pub desired: PanelState,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn classify_zero_is_idle() {
        assert_eq!(PanelState::classify(0), PanelState::Idle);
    }

    #[test]
    fn classify_increase_and_decrease_are_active() {
        assert_eq!(PanelState::classify(3), PanelState::Active);
        assert_eq!(PanelState::classify(-1), PanelState::Active);
        assert_eq!(PanelState::classify(i128::from(u64::MAX)), PanelState::Active);
        assert_eq!(PanelState::classify(-i128::from(u64::MAX)), PanelState::Active);
    }

    #[test]
    fn classify_matches_count_equality() {
        let counts = [0_u64, 1, 2, 7, 1_000, u64::MAX];
        for new in counts {
            for last in counts {
                let diff = i128::from(new) - i128::from(last);
                let expected = if new == last {
                    PanelState::Idle
                } else {
                    PanelState::Active
                };
                assert_eq!(PanelState::classify(diff), expected, "{new} vs {last}");
            }
        }
    }

    #[test]
    fn panel_state_parses_and_displays_snake_case() {
        assert_eq!(PanelState::from_str("active"), Ok(PanelState::Active));
        assert_eq!(PanelState::Idle.to_string(), "idle");
        let state: PanelState = serde_json::from_str("\"idle\"").unwrap();
        assert_eq!(state, PanelState::Idle);
    }
}
