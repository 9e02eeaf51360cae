//! Systems - logic that operates on components

mod blackboard;
mod locomotion;
mod perception;
mod tasks;

pub use blackboard::*;
pub use locomotion::*;
pub use perception::*;
pub use tasks::*;
