//! Named values published for the decision-tree collaborator.

use std::collections::HashMap;

use hecs::Entity;
use vigil_logic::lod::Tier;

use super::Vec3;

/// Key names the decision tree reads.
pub mod keys {
    pub const HEALTH: &str = "Health";
    pub const FEAR: &str = "Fear";
    pub const CONFIDENCE: &str = "Confidence";
    pub const SUSPICION: &str = "Suspicion";
    pub const TIME_SINCE_DESTROY: &str = "Time Since Destroy";
    pub const CONTROLLER_STATUS: &str = "Controller Status";
    pub const TARGET_HOSTILE: &str = "Target Hostile";
    pub const GUESS_LOCATION: &str = "Guess Location";
    pub const RESPOND_LOCATION: &str = "Respond Location";
    pub const SEARCH_MODE: &str = "Search Mode";
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlackboardValue {
    Float(f32),
    Vector(Vec3),
    Entity(Entity),
    Tier(Tier),
    Name(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blackboard {
    values: HashMap<&'static str, BlackboardValue>,
}

impl Blackboard {
    pub fn set(&mut self, key: &'static str, value: BlackboardValue) {
        self.values.insert(key, value);
    }

    pub fn set_float(&mut self, key: &'static str, value: f32) {
        self.set(key, BlackboardValue::Float(value));
    }

    pub fn clear(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<BlackboardValue> {
        self.values.get(key).copied()
    }

    pub fn float(&self, key: &str) -> Option<f32> {
        match self.get(key)? {
            BlackboardValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn vector(&self, key: &str) -> Option<Vec3> {
        match self.get(key)? {
            BlackboardValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn entity(&self, key: &str) -> Option<Entity> {
        match self.get(key)? {
            BlackboardValue::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn tier(&self, key: &str) -> Option<Tier> {
        match self.get(key)? {
            BlackboardValue::Tier(t) => Some(t),
            _ => None,
        }
    }

    pub fn name(&self, key: &str) -> Option<&'static str> {
        match self.get(key)? {
            BlackboardValue::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
