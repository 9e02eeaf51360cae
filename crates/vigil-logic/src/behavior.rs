//! Behavioral modes shared with the decision-tree collaborator.
//!
//! The decision tree itself lives outside Vigil. These types are the
//! vocabulary both sides agree on: which top-level mode a guard is in, which
//! search sub-mode the perception engine asks for, and how an external
//! "respond to this location" request maps onto them.

use serde::{Deserialize, Serialize};

/// Top-level behavior of a guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorMode {
    #[default]
    Patrol,
    Search,
    /// Terminal state: the guard is engaging to kill. Perception stops
    /// recording suspicious contacts while here.
    Destroy,
}

impl BehaviorMode {
    pub fn is_terminal(self) -> bool {
        self == BehaviorMode::Destroy
    }
}

/// Sub-mode of [`BehaviorMode::Search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchMode {
    /// A hostile is in view; chase its live position.
    Tracking,
    /// Head to a reported location.
    Responding,
}

impl SearchMode {
    pub fn name(self) -> &'static str {
        match self {
            SearchMode::Tracking => "Tracking",
            SearchMode::Responding => "Responding",
        }
    }
}

/// What a guard should do with a respond-to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePlan {
    /// Enter search/responding and raise suspicion so search doesn't exit
    /// immediately.
    EnterSearch,
    /// Already searching: switch the sub-mode to responding.
    Redirect,
    Ignore,
}

/// Decide how a guard in `mode` reacts to a respond-to request.
pub fn plan_response(mode: BehaviorMode, hostile_visible: bool) -> ResponsePlan {
    match mode {
        BehaviorMode::Patrol => ResponsePlan::EnterSearch,
        BehaviorMode::Search if !hostile_visible => ResponsePlan::Redirect,
        BehaviorMode::Search | BehaviorMode::Destroy => ResponsePlan::Ignore,
    }
}
