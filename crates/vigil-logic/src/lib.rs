//! Pure scheduling and alertness logic for Vigil.
//!
//! This crate contains the rules that are independent of threads, the ECS
//! world, or any engine. Functions take plain data and return results, making
//! them unit-testable and reusable from the frame loop, the background
//! scheduler, and headless tools alike.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`behavior`] | Behavior modes shared with the decision tree, respond-to planning |
//! | [`config`] | Construction-time configuration tree and validation |
//! | [`lod`] | Cognition tiers, distance ranking, per-agent directives |
//! | [`suspicion`] | Clamped alertness score, distance bands, growth and decay |
//! | [`vitals`] | Health/fear/confidence bounds and the terminal-state clock |

pub mod behavior;
pub mod config;
pub mod lod;
pub mod suspicion;
pub mod vitals;
