//! A serialized work queue usable as the handler's execution context.
//!
//! `EventQueue` is a cloneable handle. Any thread may schedule; whichever
//! thread calls one of the `dispatch_*` methods runs the tasks, one at a time
//! and in submission order. Tasks never run inside [`Executor::schedule`].

use core::time::Duration;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use parking_lot::{Condvar, Mutex};

use crate::source::{Executor, Task, TaskId};

#[derive(Default)]
struct Shared {
    tasks: Mutex<VecDeque<(TaskId, Task)>>,
    ready: Condvar,
    next_id: AtomicU64,
}

/// Cloneable handle to a FIFO task queue.
#[derive(Clone, Default)]
pub struct EventQueue {
    shared: Arc<Shared>,
}

impl core::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.len())
            .finish_non_exhaustive()
    }
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.tasks.lock().len()
    }

    /// Whether no tasks are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pop(&self) -> Option<(TaskId, Task)> {
        self.shared.tasks.lock().pop_front()
    }

    fn run(id: TaskId, task: Task) {
        tracing::trace!(%id, "dispatching");
        task();
    }

    /// Run the oldest waiting task, if any. Returns whether one ran.
    pub fn dispatch_once(&self) -> bool {
        match self.pop() {
            Some((id, task)) => {
                Self::run(id, task);
                true
            }
            None => false,
        }
    }

    /// Run the tasks that were waiting when the call started.
    ///
    /// Tasks scheduled by those tasks stay queued for the next dispatch, so a
    /// task that keeps rescheduling itself cannot spin this call forever.
    pub fn dispatch_pending(&self) -> usize {
        let waiting = self.len();
        let mut ran = 0;
        while ran < waiting && self.dispatch_once() {
            ran += 1;
        }
        ran
    }

    /// Run tasks as they arrive until `duration` has elapsed.
    ///
    /// Returns the number of tasks run.
    pub fn dispatch_for(&self, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut ran = 0;
        loop {
            let next = {
                let mut tasks = self.shared.tasks.lock();
                loop {
                    if let Some(next) = tasks.pop_front() {
                        break Some(next);
                    }
                    if self.shared.ready.wait_until(&mut tasks, deadline).timed_out() {
                        break tasks.pop_front();
                    }
                }
            };
            match next {
                Some((id, task)) => {
                    Self::run(id, task);
                    ran += 1;
                }
                None => return ran,
            }
            if Instant::now() >= deadline {
                return ran;
            }
        }
    }
}

impl Executor for EventQueue {
    fn schedule(&self, task: Task) -> TaskId {
        let raw = self.shared.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let id = TaskId::from_counter(raw);
        self.shared.tasks.lock().push_back((id, task));
        self.shared.ready.notify_one();
        tracing::trace!(%id, "scheduled");
        id
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, thread};

    use rstest::rstest;

    use super::*;

    #[test]
    fn tasks_run_in_submission_order() {
        let queue = EventQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.schedule(Box::new(move || log.lock().push(i)));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dispatch_pending(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn schedule_never_runs_inline() {
        let queue = EventQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        queue.schedule(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(queue.dispatch_once());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!queue.dispatch_once());
    }

    #[test]
    fn task_ids_are_distinct() {
        let queue = EventQueue::new();
        let a = queue.schedule(Box::new(|| {}));
        let b = queue.schedule(Box::new(|| {}));
        assert_ne!(a, b);
    }

    #[test]
    fn dispatch_pending_leaves_follow_up_tasks_queued() {
        let queue = EventQueue::new();
        let inner = queue.clone();
        queue.schedule(Box::new(move || {
            inner.schedule(Box::new(|| {}));
        }));
        assert_eq!(queue.dispatch_pending(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[rstest]
    #[timeout(Duration::from_millis(2_000))]
    fn dispatch_for_picks_up_tasks_from_other_threads() {
        let queue = EventQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let producer = {
            let queue = queue.clone();
            let hits = Arc::clone(&hits);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5));
                queue.schedule(Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }));
            })
        };
        let ran = queue.dispatch_for(Duration::from_millis(500));
        producer.join().unwrap();
        assert!(ran >= 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_for_returns_when_idle() {
        let queue = EventQueue::new();
        let start = Instant::now();
        assert_eq!(queue.dispatch_for(Duration::from_millis(20)), 0);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
