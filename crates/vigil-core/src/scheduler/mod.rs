//! Distance-based cognition scheduling.
//!
//! | Piece | Thread | Role |
//! |-------|--------|------|
//! | [`SchedulerCore`] | scheduler | ranks the pool, publishes commands with `try_lock` |
//! | [`CommandQueue`] | shared | five deduplicated queues behind one mutex |
//! | [`TickApplier`] | frame | drains the queues under budget, applies flags |
//! | [`SchedulerLink`] | frame | registration mailbox into the pool |

mod applier;
mod commands;
mod pool;
mod worker;

pub use applier::{AppliedBatch, TickApplier};
pub use commands::{CommandQueue, PendingCounts, Publish};
pub use pool::{AgentPool, PoolRequest};
pub use worker::{CycleReport, Scheduler, SchedulerCore, SchedulerLink, SchedulerStats};
