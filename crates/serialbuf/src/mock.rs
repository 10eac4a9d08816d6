//! In-memory stand-ins for the handler's collaborators.
//!
//! These are meant for exercising code built on top of
//! [`BufferHandler`](crate::BufferHandler) without hardware: a
//! [`ScriptedSource`] whose bytes are pushed by the test, and a
//! [`ManualClock`] that only moves when told to.
//!
//! Compiled only with the `mock` feature (implied by `fuzzing`).

use core::time::Duration;
use std::{collections::VecDeque, io, sync::Arc, time::Instant};

use parking_lot::Mutex;

use crate::source::{ByteSource, Clock, ReadinessNotifier};

/// A [`Clock`] that advances only through [`ManualClock::advance`].
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// A clock frozen at the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset = offset.saturating_add(by);
    }

    /// Time elapsed since construction.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

#[derive(Default)]
struct Script {
    pending: VecDeque<u8>,
    chunk_limit: Option<usize>,
    fail_next_read: Option<io::ErrorKind>,
    notifier: Option<ReadinessNotifier>,
    non_blocking: bool,
    polls: Vec<Duration>,
}

/// A [`ByteSource`] fed from the test side.
///
/// Polling an empty source with a [`ManualClock`] attached advances that
/// clock by the full poll timeout, as if the poll had really waited.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<Script>,
    clock: Option<Arc<ManualClock>>,
}

impl core::fmt::Debug for ScriptedSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let script = self.script.lock();
        f.debug_struct("ScriptedSource")
            .field("pending", &script.pending.len())
            .field("non_blocking", &script.non_blocking)
            .finish_non_exhaustive()
    }
}

impl ScriptedSource {
    /// A source with no clock; empty polls return immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose empty polls advance `clock` by the poll timeout.
    #[must_use]
    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        Self {
            script: Mutex::default(),
            clock: Some(clock),
        }
    }

    /// Queue bytes and fire the readiness notifier, like an RX interrupt.
    pub fn push(&self, bytes: &[u8]) {
        let notifier = {
            let mut script = self.script.lock();
            script.pending.extend(bytes);
            script.notifier.clone()
        };
        if let Some(notify) = notifier {
            notify();
        }
    }

    /// Queue bytes without signalling readiness.
    pub fn push_quiet(&self, bytes: &[u8]) {
        self.script.lock().pending.extend(bytes);
    }

    /// Cap the number of bytes a single read returns, like a small hardware
    /// FIFO. `None` removes the cap.
    pub fn set_chunk_limit(&self, limit: Option<usize>) {
        self.script.lock().chunk_limit = limit;
    }

    /// Make the next read fail with `kind`.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.script.lock().fail_next_read = Some(kind);
    }

    /// Bytes queued but not yet read.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.script.lock().pending.len()
    }

    /// Timeouts passed to [`ByteSource::poll_readable`], oldest first.
    /// Readiness checks through [`ByteSource::readable`] are not recorded.
    #[must_use]
    pub fn poll_log(&self) -> Vec<Duration> {
        self.script.lock().polls.clone()
    }

    /// Whether the source was switched to non-blocking mode.
    #[must_use]
    pub fn is_non_blocking(&self) -> bool {
        self.script.lock().non_blocking
    }

    /// Whether a readiness notifier is registered.
    #[must_use]
    pub fn has_notifier(&self) -> bool {
        self.script.lock().notifier.is_some()
    }
}

impl ByteSource for ScriptedSource {
    fn set_non_blocking(&self, non_blocking: bool) {
        self.script.lock().non_blocking = non_blocking;
    }

    fn register_readiness_notifier(&self, notifier: ReadinessNotifier) {
        self.script.lock().notifier = Some(notifier);
    }

    fn poll_readable(&self, timeout: Duration) -> bool {
        let readable = {
            let mut script = self.script.lock();
            script.polls.push(timeout);
            !script.pending.is_empty()
        };
        if !readable {
            if let Some(clock) = &self.clock {
                clock.advance(timeout);
            }
        }
        readable
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.script.lock();
        if let Some(kind) = script.fail_next_read.take() {
            return Err(io::Error::from(kind));
        }
        let limit = script.chunk_limit.unwrap_or(usize::MAX);
        let len = buf.len().min(script.pending.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(script.pending.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }

    fn readable(&self) -> bool {
        !self.script.lock().pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::from_millis(3));
        assert_eq!(clock.now() - t0, Duration::from_millis(3));
        assert_eq!(clock.elapsed(), Duration::from_millis(3));
    }

    #[test]
    fn empty_poll_advances_attached_clock() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::with_clock(Arc::clone(&clock));
        assert!(!source.poll_readable(Duration::from_millis(7)));
        assert_eq!(clock.elapsed(), Duration::from_millis(7));

        source.push_quiet(b"x");
        assert!(source.poll_readable(Duration::from_millis(7)));
        assert_eq!(clock.elapsed(), Duration::from_millis(7));
        assert_eq!(
            source.poll_log(),
            vec![Duration::from_millis(7), Duration::from_millis(7)]
        );
    }

    #[test]
    fn reads_respect_chunk_limit() {
        let source = ScriptedSource::new();
        source.push_quiet(b"abcdef");
        source.set_chunk_limit(Some(4));
        let mut buf = [0u8; 8];
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(source.pending_len(), 2);
    }

    #[test]
    fn injected_failure_hits_one_read() {
        let source = ScriptedSource::new();
        source.push_quiet(b"ab");
        source.fail_next_read(io::ErrorKind::Interrupted);
        let mut buf = [0u8; 2];
        assert_eq!(
            source.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::Interrupted
        );
        assert_eq!(source.read(&mut buf).unwrap(), 2);
    }

    #[test]
    fn push_fires_notifier() {
        let source = ScriptedSource::new();
        let hits = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hits);
        source.register_readiness_notifier(Arc::new(move || *h.lock() += 1));
        source.push(b"a");
        source.push_quiet(b"b");
        assert_eq!(*hits.lock(), 1);
    }
}
