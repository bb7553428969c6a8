//! Scheduler abstraction for deferred work.
//!
//! The core is single-threaded and cooperative: deferred work (notification
//! flush, destroy finalization) lives in explicit queues inside the tree, and
//! the scheduler is only a wake-request sink. The embedder calls
//! [`crate::VTree::tick`] on its next scheduling slot after a wake request.
//! Operations issued within one synchronous call stack complete in program
//! order before any tick work runs.

use std::cell::Cell;
use std::rc::Rc;

pub trait Scheduler {
    /// Ask the embedder to run a tick soon. May be called repeatedly within
    /// one call stack; one tick satisfies all outstanding requests.
    fn request_tick(&mut self);
}

/// Discards wake requests; for trees driven by an unconditional tick loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullScheduler;

impl Scheduler for NullScheduler {
    fn request_tick(&mut self) {}
}

/// Records wake requests for manual draining; the test-double scheduler.
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    requested: Rc<Cell<bool>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the request flag, for handing the scheduler to the tree
    /// while keeping a reader on the caller's side.
    pub fn handle(&self) -> ManualScheduler {
        self.clone()
    }

    /// True if a tick was requested since the last take.
    pub fn take_requested(&self) -> bool {
        self.requested.replace(false)
    }
}

impl Scheduler for ManualScheduler {
    fn request_tick(&mut self) {
        self.requested.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_scheduler_latches_requests() {
        let scheduler = ManualScheduler::new();
        let mut handle = scheduler.handle();
        assert!(!scheduler.take_requested());
        handle.request_tick();
        handle.request_tick();
        assert!(scheduler.take_requested(), "expected latched wake request");
        assert!(!scheduler.take_requested());
    }
}
