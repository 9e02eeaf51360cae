//! What a guard currently knows about the entities around it.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::Vec3;

/// Category assigned to an entity when it is spawned, so the sensing path
/// never has to downcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensedKind {
    /// A player-side entity guards hunt.
    Hostile,
    /// Another guard.
    Peer,
    /// Anything else that can show up in the sensed set.
    Other,
}

/// Sensed-set changes delivered by the sensing collaborator and not yet
/// processed. Consumed on the guard's next sensing tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stimuli(pub Vec<Entity>);

impl Stimuli {
    pub fn push(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.0.extend(entities);
    }

    pub fn take(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.0)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Perception state of one guard.
///
/// An entity is never in both the known-hostile and out-of-sight sets; the
/// mutators below move entities between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Perception {
    known_hostiles: Vec<Entity>,
    out_of_sight: Vec<Entity>,
    guess_location: Option<Vec3>,
    target: Option<Entity>,
    last_suspicious: Option<Entity>,
}

impl Perception {
    pub fn known_hostiles(&self) -> &[Entity] {
        &self.known_hostiles
    }

    pub fn out_of_sight(&self) -> &[Entity] {
        &self.out_of_sight
    }

    pub fn is_known(&self, entity: Entity) -> bool {
        self.known_hostiles.contains(&entity)
    }

    pub fn is_out_of_sight(&self, entity: Entity) -> bool {
        self.out_of_sight.contains(&entity)
    }

    pub fn has_visible_hostile(&self) -> bool {
        !self.known_hostiles.is_empty()
    }

    pub fn guess_location(&self) -> Option<Vec3> {
        self.guess_location
    }

    pub fn target(&self) -> Option<Entity> {
        self.target
    }

    pub fn last_suspicious(&self) -> Option<Entity> {
        self.last_suspicious
    }

    /// A hostile entered vision at `location`.
    pub fn sight(&mut self, hostile: Entity, location: Vec3) {
        self.out_of_sight.retain(|e| *e != hostile);
        if !self.known_hostiles.contains(&hostile) {
            self.known_hostiles.push(hostile);
        }
        self.guess_location = Some(location);
        self.target = Some(hostile);
    }

    /// A known hostile left vision; `guess` is where it probably went.
    pub fn lose(&mut self, hostile: Entity, guess: Vec3) {
        self.known_hostiles.retain(|e| *e != hostile);
        if !self.out_of_sight.contains(&hostile) {
            self.out_of_sight.push(hostile);
        }
        self.guess_location = Some(guess);
    }

    /// Refresh the guess while a known hostile stays in view.
    pub fn track(&mut self, location: Vec3) {
        self.guess_location = Some(location);
    }

    pub fn note_suspicious(&mut self, entity: Entity) {
        self.last_suspicious = Some(entity);
    }

    /// Drop every reference to a despawned entity.
    pub fn forget(&mut self, entity: Entity) {
        self.known_hostiles.retain(|e| *e != entity);
        self.out_of_sight.retain(|e| *e != entity);
        if self.target == Some(entity) {
            self.target = None;
        }
        if self.last_suspicious == Some(entity) {
            self.last_suspicious = None;
        }
    }
}
