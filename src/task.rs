//! Frame-driven task primitives
//!
//! Everything in the view advances from the frame loop, so "wait for X"
//! becomes a value the caller polls:
//! - `Completion` - shared flag resolved when a one-shot action finishes
//! - `ScheduledTask` - cancellable countdown that fires once per schedule

use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Done,
    Cancelled,
}

/// Completion signal shared between the producer and any number of waiters.
///
/// Clones observe the same state. Once resolved or cancelled the state
/// never changes again.
#[derive(Debug, Clone)]
pub struct Completion(Rc<Cell<TaskState>>);

impl Completion {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(TaskState::Pending)))
    }

    /// An already-finished completion
    pub fn done() -> Self {
        Self(Rc::new(Cell::new(TaskState::Done)))
    }

    pub fn resolve(&self) {
        if self.0.get() == TaskState::Pending {
            self.0.set(TaskState::Done);
        }
    }

    pub fn cancel(&self) {
        if self.0.get() == TaskState::Pending {
            self.0.set(TaskState::Cancelled);
        }
    }

    pub fn state(&self) -> TaskState {
        self.0.get()
    }

    pub fn is_pending(&self) -> bool {
        self.0.get() == TaskState::Pending
    }

    pub fn is_done(&self) -> bool {
        self.0.get() == TaskState::Done
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot countdown. `tick` returns true exactly once, when it elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduledTask {
    remaining: f32,
    active: bool,
}

impl ScheduledTask {
    pub fn new(delay: f32) -> Self {
        Self {
            remaining: delay.max(0.0),
            active: true,
        }
    }

    /// A task that is not scheduled
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay: f32) {
        *self = Self::new(delay);
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.remaining = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.active {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.active = false;
            self.remaining = 0.0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_is_shared_and_final() {
        let c = Completion::new();
        let waiter = c.clone();
        assert!(waiter.is_pending());
        c.resolve();
        assert!(waiter.is_done());
        c.cancel();
        assert_eq!(waiter.state(), TaskState::Done);
    }

    #[test]
    fn test_cancelled_completion_stays_cancelled() {
        let c = Completion::new();
        c.cancel();
        c.resolve();
        assert_eq!(c.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_scheduled_task_fires_once() {
        let mut t = ScheduledTask::new(1.0);
        assert!(!t.tick(0.6));
        assert!(t.tick(0.6));
        assert!(!t.tick(10.0));
        assert!(!t.is_active());
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let mut t = ScheduledTask::new(0.5);
        t.cancel();
        assert!(!t.tick(1.0));
        assert!(!ScheduledTask::idle().tick(1.0));
    }
}
