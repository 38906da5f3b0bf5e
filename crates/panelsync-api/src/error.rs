use thiserror::Error;

/// Top-level error type for the `panelsync-api` crate.
///
/// Covers every failure mode of the two HTTP surfaces: the streaming
/// counter feed and the panel controller's effects endpoint.
/// `panelsync-core` maps these into the reconciliation taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, body read, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Event stream ────────────────────────────────────────────────
    /// The feed could not be opened (connect failure or non-2xx status).
    #[error("Event stream unavailable at {url}: {reason}")]
    StreamUnavailable { url: String, reason: String },

    /// No bytes arrived within the read-idle window.
    #[error("Event stream stalled: no data for {idle_secs}s")]
    StreamStalled { idle_secs: u64 },

    /// A record grew past the reader's limit without a terminator.
    #[error("Event stream record exceeds {limit} bytes without a terminator")]
    RecordTooLarge { limit: usize },

    // ── Panel controller ────────────────────────────────────────────
    /// The panel controller answered with a non-success status.
    #[error("Panel controller rejected the effect (HTTP {status}): {body}")]
    DeviceRejected { status: u16, body: String },
}
