//! Reconciliation core between `panelsync-api` and the `panelsync` binary.
//!
//! - **[`Reconciler`]**: the long-running loop. Opens the counter feed,
//!   applies each frame to the [`EntityRegistry`], dispatches
//!   [`DeviceCommand`]s for entities whose desired state changed, and
//!   reconnects after any failure with a fixed backoff.
//!
//! - **[`EntityRegistry`]**: ordered, process-lifetime record of the last
//!   observed count and last applied state of every tracked entity.
//!
//! - **[`FeedSource`] / [`CommandSink`]**: the two seams of the loop.
//!   `FeedClient` and [`PanelSink`] implement them over HTTP; tests
//!   substitute scripted fakes.
//!
//! - **Domain model** ([`model`]): [`EntityId`], [`PanelState`],
//!   [`CounterSnapshot`] and [`DeviceCommand`].

pub mod config;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod sink;
pub mod source;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DeviceConfig, EntitySpec, FeedConfig, Palette, ServiceConfig};
pub use error::CoreError;
pub use model::{CounterSnapshot, DeviceCommand, EntityId, PanelState};
pub use reconcile::{EntityAction, EntityOutcome, FrameOutcome, Reconciler};
pub use registry::{EntityRecord, EntityRegistry};
pub use sink::{CommandSink, PanelSink};
pub use source::{FeedSource, FrameStream};
