//! Vigil Core - Guard Cognition Scheduling Engine
//!
//! Decides how much simulation detail each guard deserves and runs the
//! perception and suspicion model for the guards that are allowed to think.
//!
//! # Architecture
//!
//! A background thread ranks every registered guard by distance to the
//! player's viewpoint and publishes tier and render commands into a
//! mutex-guarded [`scheduler::CommandQueue`]. Once per frame the
//! [`scheduler::TickApplier`] drains bounded slices of that queue, and the ECS
//! systems (via `hecs`) run sensing and suspicion only for thinking guards:
//! - **Entities**: Guards, hostiles, props
//! - **Components**: Pure data attached to entities (Position, Perception, Suspicion, etc.)
//! - **Systems**: Logic that queries and updates components
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil_core::prelude::*;
//! use vigil_logic::config::VigilConfig;
//!
//! let mut engine = SimulationEngine::builder(VigilConfig::default())
//!     .build()
//!     .expect("default config is valid");
//! engine.spawn_guard(Vec3::new(300.0, 0.0, 0.0), "east gate");
//! engine.start_scheduler().expect("scheduler thread");
//!
//! // Run simulation
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//! }
//! ```

pub mod collaborators;
pub mod components;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod systems;
pub mod telemetry;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::collaborators::{DecisionTree, InMemoryDecisionTree, OpenSpace, SpatialProbe};
    pub use crate::components::*;
    pub use crate::engine::{EngineBuilder, SimulationEngine};
    pub use crate::error::{EngineError, SchedulerError};
    pub use crate::telemetry::{LogTelemetry, RecordingTelemetry, Telemetry, TelemetryEvent};
    pub use vigil_logic::lod::Tier;
}
