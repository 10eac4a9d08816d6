//! Seams to the collaborators the handler is bound to: the byte source, the
//! execution context refills run on, and the monotonic clock.

use core::{fmt, num::NonZeroU64, time::Duration};
use std::{io, sync::Arc, time::Instant};

/// Callback a [`ByteSource`] invokes when bytes may have become readable.
///
/// May be called from an interrupt-like context; it only schedules work and
/// never blocks.
pub type ReadinessNotifier = Arc<dyn Fn() + Send + Sync>;

/// Unit of work submitted to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Token identifying a task accepted by an [`Executor`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(NonZeroU64);

impl TaskId {
    /// Wrap a raw token. Returns `None` for zero, which is reserved for "no
    /// task".
    #[must_use]
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub(crate) fn from_counter(raw: u64) -> Self {
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// A readable, pollable byte stream such as a UART.
///
/// Methods take `&self`: the refill path and the readiness notifier share the
/// source, and implementations are expected to synchronize internally the way
/// hardware drivers do.
pub trait ByteSource: Send + Sync {
    /// Switch the source between blocking and non-blocking reads.
    fn set_non_blocking(&self, non_blocking: bool);

    /// Install the callback invoked whenever the source may have data.
    ///
    /// Replaces any previously registered notifier.
    fn register_readiness_notifier(&self, notifier: ReadinessNotifier);

    /// Wait up to `timeout` for the source to become readable.
    ///
    /// A zero timeout must return immediately.
    fn poll_readable(&self, timeout: Duration) -> bool;

    /// Read available bytes into `buf`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Any I/O error from the underlying device. Callers treat errors the
    /// same as an empty read.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Non-blocking readability check.
    fn readable(&self) -> bool {
        self.poll_readable(Duration::ZERO)
    }
}

/// A serialized execution context.
///
/// Tasks run later, one at a time, in submission order, and never
/// synchronously inside [`Executor::schedule`].
pub trait Executor: Send + Sync {
    /// Queue `task` for later execution.
    fn schedule(&self, task: Task) -> TaskId;
}

/// Source of monotonic timestamps.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Copy, Clone, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Arc<T> {
    fn set_non_blocking(&self, non_blocking: bool) {
        (**self).set_non_blocking(non_blocking);
    }

    fn register_readiness_notifier(&self, notifier: ReadinessNotifier) {
        (**self).register_readiness_notifier(notifier);
    }

    fn poll_readable(&self, timeout: Duration) -> bool {
        (**self).poll_readable(timeout)
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn readable(&self) -> bool {
        (**self).readable()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
