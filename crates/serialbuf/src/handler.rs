//! The staging buffer handler.
//!
//! Overview
//! - A [`ByteSource`] signals readiness through the notifier the handler
//!   registers at construction. The signal only schedules a refill pass on
//!   the [`Executor`]; it never touches the store itself.
//! - A refill pass drains the source into the fixed-capacity store, waiting
//!   at most the inactivity window after the last activity, then invokes the
//!   completion handler once.
//! - The consumer reads, peeks and seeks relative to the read cursor. Every
//!   operation that consumes bytes compacts the store afterwards, so the
//!   unread span always starts at offset zero between operations.
//!
//! Locking
//! - The store lives behind a mutex. Acquiring it through [`StoreGuard`]
//!   stamps the activity time, and releasing it re-checks the source: if
//!   bytes are waiting, a refill is (re)scheduled. Scheduling is
//!   de-duplicated, so this never piles up passes. Releases made by a pass
//!   while it drains the source skip the check; the pass polls again anyway.
//! - `poll_readable` is always called without the store locked.
//! - The completion handler is never invoked with any handler lock held, so
//!   it may call straight back into the consumer API.

use core::{fmt, time::Duration};
use std::{
    ops::{Deref, DerefMut},
    sync::{Arc, Weak},
    time::Instant,
};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    deadline::poll_budget,
    error::BufferError,
    notify::RefillMarker,
    options::BufferOptions,
    source::{ByteSource, Clock, Executor, MonotonicClock, TaskId},
    store::Store,
};

type CompletionHandler = Arc<dyn Fn() + Send + Sync>;

/// Fixed-capacity staging buffer fed by an interrupt-driven [`ByteSource`].
///
/// The handler is bound to one source and one execution context for its
/// whole life and is deliberately not `Clone`: the staging buffer is an
/// exclusively owned resource. Dropping it turns the registered readiness
/// notifier and any already-scheduled refill into no-ops.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use serialbuf::{BufferHandler, BufferOptions, EventQueue, mock::ScriptedSource};
///
/// let source = Arc::new(ScriptedSource::new());
/// let queue = EventQueue::new();
/// let handler = BufferHandler::new(Arc::clone(&source), queue.clone(), BufferOptions::default())?;
///
/// source.push(b"+OK\r\n");
/// queue.dispatch_pending();
///
/// assert_eq!(handler.seek_to_sequence(b"OK"), 4);
/// let mut frame = [0u8; 2];
/// assert_eq!(handler.read_bytes(&mut frame), 2);
/// assert_eq!(&frame, b"OK");
/// # Ok::<(), serialbuf::BufferError>(())
/// ```
pub struct BufferHandler<S, X, C = MonotonicClock>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    inner: Arc<Inner<S, X, C>>,
}

struct Inner<S, X, C>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    source: S,
    executor: X,
    clock: C,
    store: Mutex<Store>,
    last_activity: Mutex<Instant>,
    timeout: Mutex<Duration>,
    on_complete: Mutex<Option<CompletionHandler>>,
    refill: RefillMarker,
    this: Weak<Self>,
}

/// Exclusive access to the store.
///
/// Acquisition counts as activity; release re-evaluates whether a refill
/// needs scheduling.
struct StoreGuard<'a, S, X, C>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    inner: &'a Inner<S, X, C>,
    store: MutexGuard<'a, Store>,
}

impl<S, X, C> Deref for StoreGuard<'_, S, X, C>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl<S, X, C> DerefMut for StoreGuard<'_, S, X, C>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    fn deref_mut(&mut self) -> &mut Store {
        &mut self.store
    }
}

impl<S, X, C> Drop for StoreGuard<'_, S, X, C>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    fn drop(&mut self) {
        // A draining pass polls the source again before it finishes.
        if !self.inner.refill.is_draining() && self.inner.source.readable() {
            self.inner.signal_readiness();
        }
    }
}

impl<S, X> BufferHandler<S, X>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
{
    /// Bind a new handler to `source`, scheduling refills on `executor`.
    ///
    /// The source is switched to non-blocking mode and the handler's
    /// readiness notifier is registered with it.
    ///
    /// # Errors
    ///
    /// [`BufferError::ZeroCapacity`] if `options.capacity` is zero.
    pub fn new(source: S, executor: X, options: BufferOptions) -> Result<Self, BufferError> {
        Self::with_clock(source, executor, MonotonicClock, options)
    }
}

impl<S, X, C> BufferHandler<S, X, C>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    /// Like [`BufferHandler::new`], with an explicit clock for deadline
    /// arithmetic.
    ///
    /// # Errors
    ///
    /// [`BufferError::ZeroCapacity`] if `options.capacity` is zero.
    pub fn with_clock(
        source: S,
        executor: X,
        clock: C,
        options: BufferOptions,
    ) -> Result<Self, BufferError> {
        options.validate()?;

        let started = clock.now();
        let inner = Arc::new_cyclic(|this| Inner {
            source,
            executor,
            clock,
            store: Mutex::new(Store::new(options.capacity)),
            last_activity: Mutex::new(started),
            timeout: Mutex::new(options.timeout),
            on_complete: Mutex::new(None),
            refill: RefillMarker::default(),
            this: this.clone(),
        });

        inner.source.set_non_blocking(true);
        let weak = Arc::downgrade(&inner);
        inner
            .source
            .register_readiness_notifier(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.signal_readiness();
                }
            }));

        tracing::debug!(
            capacity = options.capacity,
            timeout = ?options.timeout,
            "buffer handler bound to source"
        );
        Ok(Self { inner })
    }

    /// Install the completion handler and the inactivity window.
    ///
    /// `on_complete` runs on the execution context at the end of every
    /// refill pass that found work to do. It replaces any previous handler.
    pub fn attach<F>(&self, on_complete: F, timeout: Duration)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.on_complete.lock() = Some(Arc::new(on_complete));
        *self.inner.timeout.lock() = timeout;
    }

    /// The inactivity window.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        *self.inner.timeout.lock()
    }

    /// Total staging capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.store.lock().capacity()
    }

    /// Token of the refill pass currently scheduled, if any.
    #[must_use]
    pub fn pending_refill(&self) -> Option<TaskId> {
        self.inner.refill.pending()
    }

    /// Schedule a refill pass unless one is already pending.
    ///
    /// Never blocks; safe to call from any thread, any number of times.
    pub fn signal_readiness(&self) {
        self.inner.signal_readiness();
    }

    /// Drain the source into the store, then notify the completion handler.
    ///
    /// This is what scheduled refills run. Calling it directly is fine for
    /// consumers that poll instead of relying on readiness signals.
    pub fn run_refill_pass(&self) {
        self.inner.run_refill_pass();
    }

    /// One guarded fill attempt; `true` if any bytes were appended.
    ///
    /// With `wait_for_timeout` the poll may block for the remainder of the
    /// inactivity window; without it the poll is non-blocking.
    pub fn fill_once(&self, wait_for_timeout: bool) -> bool {
        self.inner.fill_once(wait_for_timeout)
    }

    /// How long the next fill attempt may block.
    #[must_use]
    pub fn poll_timeout(&self, wait_for_timeout: bool) -> Duration {
        self.inner.poll_timeout(wait_for_timeout)
    }

    /// Discard everything staged and everything the source can deliver
    /// without waiting.
    pub fn flush(&self) {
        self.inner.lock().reset();
        while self.inner.fill_once(false) {
            self.inner.lock().reset();
        }
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn available_bytes(&self) -> usize {
        self.inner.store.lock().available()
    }

    /// The unread byte at `index`, counted from the read cursor.
    ///
    /// # Errors
    ///
    /// [`BufferError::IndexOutOfRange`] if `index >= available_bytes()`.
    pub fn peek_byte(&self, index: usize) -> Result<u8, BufferError> {
        let store = self.inner.store.lock();
        store.peek(index).ok_or(BufferError::IndexOutOfRange {
            index,
            available: store.available(),
        })
    }

    /// Run `f` over the unread bytes without copying them.
    ///
    /// The store stays locked while `f` runs; `f` must not call back into
    /// this handler.
    pub fn with_unread<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.inner.store.lock().unread())
    }

    /// Copy up to `dest.len()` unread bytes into `dest`, consuming them.
    ///
    /// Returns the number copied; zero, with no side effect, when `dest` is
    /// empty or nothing is staged.
    pub fn read_bytes(&self, dest: &mut [u8]) -> usize {
        if dest.is_empty() || self.available_bytes() == 0 {
            return 0;
        }
        let mut store = self.inner.lock();
        let copied = store.take_into(dest);
        store.compact();
        copied
    }

    /// Skip unread bytes up to the first `target`, or all of them if there is
    /// none. Returns the unread count afterwards, `target` included.
    pub fn seek_to_byte(&self, target: u8) -> usize {
        let mut store = self.inner.lock();
        store.skip_to_byte(target);
        store.compact();
        store.available()
    }

    /// Skip unread bytes up to the first occurrence of `pattern`, or all of
    /// them if it is not staged in full. Returns the unread count afterwards,
    /// the pattern included.
    ///
    /// Only unread bytes are searched. An empty pattern changes nothing.
    pub fn seek_to_sequence(&self, pattern: &[u8]) -> usize {
        let mut store = self.inner.lock();
        store.skip_to_sequence(pattern);
        store.compact();
        store.available()
    }

    /// `(read_cursor, filled_len)` of the staging store, for invariant checks.
    #[cfg(any(test, feature = "fuzzing"))]
    #[must_use]
    pub fn store_layout(&self) -> (usize, usize) {
        let store = self.inner.store.lock();
        (store.read_cursor(), store.filled_len())
    }
}

impl<S, X, C> fmt::Debug for BufferHandler<S, X, C>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (capacity, read_cursor, filled_len) = {
            let store = self.inner.store.lock();
            (store.capacity(), store.read_cursor(), store.filled_len())
        };
        f.debug_struct("BufferHandler")
            .field("capacity", &capacity)
            .field("read_cursor", &read_cursor)
            .field("filled_len", &filled_len)
            .field("timeout", &self.timeout())
            .field("pending_refill", &self.pending_refill())
            .finish_non_exhaustive()
    }
}

impl<S, X, C> Inner<S, X, C>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    fn lock(&self) -> StoreGuard<'_, S, X, C> {
        let store = self.store.lock();
        self.touch();
        StoreGuard { inner: self, store }
    }

    fn touch(&self) {
        *self.last_activity.lock() = self.clock.now();
    }

    fn poll_timeout(&self, wait: bool) -> Duration {
        let last_activity = *self.last_activity.lock();
        let window = *self.timeout.lock();
        poll_budget(wait, self.clock.now(), last_activity, window)
    }

    fn signal_readiness(&self) {
        let scheduled = self.refill.arm_with(|| {
            let this = self.this.clone();
            self.executor.schedule(Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    inner.run_refill_pass();
                }
            }))
        });
        match scheduled {
            Some(id) => tracing::trace!(%id, "refill scheduled"),
            None => tracing::trace!("refill already pending"),
        }
    }

    fn has_work(&self) -> bool {
        self.source.readable() || self.store.lock().available() > 0
    }

    fn run_refill_pass(&self) {
        // Disarm first: a signal landing mid-pass must schedule a fresh pass,
        // not be swallowed by this one.
        self.refill.begin_pass();

        if !self.has_work() {
            self.refill.end_drain();
            return;
        }

        let mut fills = 0usize;
        while self.has_work() && self.fill_once(true) {
            self.touch();
            fills += 1;
        }
        self.refill.end_drain();
        tracing::trace!(fills, "refill pass finished");

        let on_complete = self.on_complete.lock().clone();
        if let Some(on_complete) = on_complete {
            on_complete();
        }
    }

    fn fill_once(&self, wait: bool) -> bool {
        {
            let mut store = self.store.lock();
            if store.is_full() {
                tracing::warn!(
                    capacity = store.capacity(),
                    "staging buffer overflow, discarding staged bytes"
                );
                store.reset();
            }
        }

        let budget = self.poll_timeout(wait);
        if !self.source.poll_readable(budget) {
            return false;
        }

        let mut store = self.lock();
        let spare = store.spare_mut();
        let room = spare.len();
        match self.source.read(spare) {
            Ok(0) => false,
            Ok(len) => {
                store.commit(len.min(room));
                true
            }
            Err(err) => {
                tracing::debug!(error = %err, "source read failed, treating as no data");
                false
            }
        }
    }
}
