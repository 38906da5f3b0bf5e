// ── Core error types ──
//
// The reconciliation taxonomy. Consumers never see HTTP status codes or
// reqwest errors directly: the `From<panelsync_api::Error>` impl translates
// transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Stream errors ────────────────────────────────────────────────
    #[error("Event stream unavailable at {url}: {reason}")]
    StreamUnavailable { url: String, reason: String },

    #[error("Event stream stalled: no data for {idle_secs}s")]
    StreamStalled { idle_secs: u64 },

    // ── Payload errors ───────────────────────────────────────────────
    #[error("Malformed counter payload: {reason}")]
    MalformedPayload {
        reason: String,
        /// The raw `data` field, kept for diagnostics.
        payload: String,
    },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Command for entity {entity} failed: {reason}")]
    CommandDispatchFailed { entity: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Missing configuration: {field}")]
    ConfigMissing { field: String },

    #[error("Invalid configuration for {field}: {reason}")]
    Config { field: String, reason: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<panelsync_api::Error> for CoreError {
    fn from(err: panelsync_api::Error) -> Self {
        match err {
            panelsync_api::Error::Transport(e) => CoreError::StreamUnavailable {
                url: e
                    .url()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "<unknown>".into()),
                reason: e.to_string(),
            },
            panelsync_api::Error::InvalidUrl(e) => CoreError::Config {
                field: "url".into(),
                reason: e.to_string(),
            },
            panelsync_api::Error::StreamUnavailable { url, reason } => {
                CoreError::StreamUnavailable { url, reason }
            }
            panelsync_api::Error::StreamStalled { idle_secs } => {
                CoreError::StreamStalled { idle_secs }
            }
            err @ panelsync_api::Error::RecordTooLarge { .. } => CoreError::StreamUnavailable {
                url: "<unknown>".into(),
                reason: err.to_string(),
            },
            panelsync_api::Error::DeviceRejected { status, body } => {
                CoreError::CommandDispatchFailed {
                    entity: "<unknown>".into(),
                    reason: format!("HTTP {status}: {body}"),
                }
            }
        }
    }
}
