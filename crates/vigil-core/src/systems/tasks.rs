//! Deferred frame-thread timers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hecs::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Check whether a dead guard's ragdoll has come to rest.
    SettleRagdoll(Entity),
    /// Despawn a dead guard.
    Destroy(Entity),
}

#[derive(Debug)]
struct Scheduled {
    fire_at: f64,
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the max-heap pops the earliest task first; equal fire
    // times pop in scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .total_cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of tasks keyed by simulation time.
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: f64, delay: f32, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled {
            fire_at: now + f64::from(delay.max(0.0)),
            seq,
            task,
        });
    }

    /// Pop the next task due at or before `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<Task> {
        if self.heap.peek()?.fire_at > now {
            return None;
        }
        self.heap.pop().map(|s| s.task)
    }

    pub fn next_fire_time(&self) -> Option<f64> {
        self.heap.peek().map(|s| s.fire_at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
