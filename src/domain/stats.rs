use std::collections::BTreeMap;

use serde::Serialize;

use super::entity::Entity;

/// Record counts gathered while loading
///
/// `entities` counts records acknowledged by every destination;
/// `destinations` counts per destination, so a batch that landed in only
/// one store shows up as a difference between the two.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    entities: BTreeMap<Entity, u64>,
    destinations: BTreeMap<String, BTreeMap<Entity, u64>>,
}

impl LoadStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` records of `entity` acknowledged by every destination
    pub fn record_entity(&mut self, entity: Entity, count: u64) {
        *self.entities.entry(entity).or_default() += count;
    }

    /// Record a write acknowledged by a single destination
    pub fn record_destination(&mut self, entity: Entity, destination: &str, count: u64) {
        *self
            .destinations
            .entry(destination.to_string())
            .or_default()
            .entry(entity)
            .or_default() += count;
    }

    /// Records of `entity` written to every destination
    pub fn entity_total(&self, entity: Entity) -> u64 {
        self.entities.get(&entity).copied().unwrap_or(0)
    }

    /// Records of `entity` written to `destination`
    pub fn destination_total(&self, destination: &str, entity: Entity) -> u64 {
        self.destinations
            .get(destination)
            .and_then(|counts| counts.get(&entity))
            .copied()
            .unwrap_or(0)
    }
}
