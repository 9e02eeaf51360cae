//! Error types for the core engine.

use thiserror::Error;
use vigil_logic::config::ConfigError;

use crate::components::AgentId;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("scheduler thread is already running")]
    AlreadyRunning,
    #[error("scheduler is unavailable")]
    Unavailable,
    #[error("scheduler thread panicked")]
    Panicked,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),
    #[error("entity {0:?} does not exist")]
    UnknownEntity(hecs::Entity),
}
