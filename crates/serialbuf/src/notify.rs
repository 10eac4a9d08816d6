//! Edge-triggered refill marker.
//!
//! Readiness signals can arrive from an interrupt-like context at any rate.
//! The marker lets exactly one of them win the right to schedule a refill;
//! the rest are coalesced until the refill pass disarms it.
//!
//! Invariants
//! - `armed` flips to `true` only through a successful [`RefillMarker::arm_with`]
//!   and back to `false` only through [`RefillMarker::begin_pass`].
//! - The recorded task id is written under the same lock `begin_pass` takes,
//!   so a pass that starts before its scheduler finished recording still
//!   clears the id it belongs to.
//! - While a pass is draining the source, guard releases inside that pass do
//!   not arm a follow-up; the pass loop re-checks readability itself.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::source::TaskId;

#[derive(Debug, Default)]
pub(crate) struct RefillMarker {
    armed: AtomicBool,
    draining: AtomicBool,
    scheduled: Mutex<Option<TaskId>>,
}

impl RefillMarker {
    /// Schedule a refill through `schedule` unless one is already pending.
    ///
    /// Losers return `None` without blocking. The winner keeps the id slot
    /// locked while `schedule` runs, which must therefore not run the task
    /// inline.
    pub(crate) fn arm_with(&self, schedule: impl FnOnce() -> TaskId) -> Option<TaskId> {
        if self
            .armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let mut slot = self.scheduled.lock();
        let id = schedule();
        *slot = Some(id);
        Some(id)
    }

    /// Called on refill-pass entry: clear the pending task and start draining.
    pub(crate) fn begin_pass(&self) {
        let mut slot = self.scheduled.lock();
        *slot = None;
        self.draining.store(true, Ordering::Release);
        self.armed.store(false, Ordering::Release);
    }

    /// Stop suppressing re-arms from guard releases.
    pub(crate) fn end_drain(&self) {
        self.draining.store(false, Ordering::Release);
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub(crate) fn pending(&self) -> Option<TaskId> {
        if !self.armed.load(Ordering::Acquire) {
            return None;
        }
        *self.scheduled.lock()
    }
}
