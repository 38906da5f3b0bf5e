// ── Entity registry ──
//
// The only mutable state of the service. Built once from configuration,
// owned by the `Reconciler`, never reset while the process lives.

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::config::EntitySpec;
use crate::error::CoreError;
use crate::model::{EntityId, PanelState};

/// Last observed count and last applied state of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    /// Panel identifier on the controller.
    pub panel_id: u32,
    pub last_count: u64,
    pub last_state: PanelState,
}

impl EntityRecord {
    fn new(panel_id: u32, state: PanelState) -> Self {
        Self {
            panel_id,
            last_count: 0,
            last_state: state,
        }
    }

    /// Record `new_count` as the baseline and return the delta against the
    /// previous one. Decreases are accepted as-is.
    pub fn observe(&mut self, new_count: u64) -> i128 {
        let diff = i128::from(new_count) - i128::from(self.last_count);
        self.last_count = new_count;
        diff
    }
}

/// Ordered map of tracked entities. Iteration follows configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRegistry {
    entries: IndexMap<EntityId, EntityRecord>,
}

impl EntityRegistry {
    /// Build the registry from entity specs, rejecting duplicate ids.
    pub fn from_specs(specs: impl IntoIterator<Item = EntitySpec>) -> Result<Self, CoreError> {
        let mut entries = IndexMap::new();

        for spec in specs {
            match entries.entry(spec.id) {
                Entry::Occupied(e) => {
                    return Err(CoreError::Config {
                        field: "entities".into(),
                        reason: format!("duplicate entity id '{}'", e.key()),
                    });
                }
                Entry::Vacant(e) => {
                    e.insert(EntityRecord::new(spec.panel_id, spec.default_state));
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &EntityRecord)> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut EntityRecord)> {
        self.entries.iter_mut()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spec(id: &str, panel_id: u32) -> EntitySpec {
        EntitySpec {
            id: id.into(),
            panel_id,
            default_state: PanelState::Idle,
        }
    }

    #[test]
    fn preserves_configuration_order() {
        let registry =
            EntityRegistry::from_specs([spec("zeta", 1), spec("alpha", 2), spec("mid", 3)])
                .unwrap();

        let ids: Vec<&str> = registry.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["zeta", "alpha", "mid"]);
        assert_eq!(registry.get("alpha").unwrap().panel_id, 2);
        assert_eq!(registry.get("alpha").unwrap().last_count, 0);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = EntityRegistry::from_specs([spec("a", 1), spec("a", 2)]).unwrap_err();
        assert!(err.to_string().contains("duplicate entity id 'a'"));
    }

    #[test]
    fn observe_tracks_baseline_including_decreases() {
        let mut record = EntityRecord::new(1, PanelState::Idle);
        assert_eq!(record.observe(5), 5);
        assert_eq!(record.observe(5), 0);
        assert_eq!(record.observe(2), -3);
        assert_eq!(record.last_count, 2);
    }
}
