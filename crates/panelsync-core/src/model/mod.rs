// ── Domain model ──
//
// Canonical types shared by the registry, the reconciler and the sinks.

mod entity;
mod snapshot;

pub use entity::{DeviceCommand, EntityId, PanelState};
pub use snapshot::CounterSnapshot;
