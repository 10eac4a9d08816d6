//! A fixed-capacity staging buffer between an interrupt-driven byte source
//! (typically a serial line) and a consumer that reads framed or delimited
//! data synchronously.
//!
//! - Bytes arrive asynchronously; the source only *signals* readiness, and
//!   the [`BufferHandler`] schedules at most one refill pass at a time on an
//!   [`Executor`].
//! - A refill pass appends into a fixed staging area and waits for further
//!   bytes for at most an inactivity window measured from the last arrival.
//! - The consumer peeks, reads and seeks (to a byte or a delimiter sequence)
//!   relative to the read cursor, without intermediate copies.
//!
//! ```rust
//! use std::{sync::Arc, time::Duration};
//!
//! use serialbuf::{BufferHandler, BufferOptions, EventQueue, mock::ScriptedSource};
//!
//! let uart = Arc::new(ScriptedSource::new());
//! let queue = EventQueue::new();
//! let rx = BufferHandler::new(Arc::clone(&uart), queue.clone(), BufferOptions::default())?;
//! rx.attach(|| {}, Duration::from_millis(20));
//!
//! uart.push(b"noise$GPGGA,...\r\n");
//! queue.dispatch_pending();
//!
//! assert_eq!(rx.seek_to_byte(b'$'), 12);
//! assert_eq!(rx.peek_byte(0)?, b'$');
//! # Ok::<(), serialbuf::BufferError>(())
//! ```

mod error;
mod handler;
mod notify;
mod options;
mod queue;
mod source;
mod store;

pub mod deadline;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::BufferError;
pub use handler::BufferHandler;
pub use options::BufferOptions;
pub use queue::EventQueue;
pub use source::{ByteSource, Clock, Executor, MonotonicClock, ReadinessNotifier, Task, TaskId};
