use thiserror::Error;

/// Errors surfaced by the fallible parts of the [`BufferHandler`] API.
///
/// Transient conditions on the refill path (overflow, source read failures)
/// are not errors; they are reported through `tracing` and the refill loop
/// carries on.
///
/// [`BufferHandler`]: crate::BufferHandler
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The staging buffer was configured with a capacity of zero bytes.
    #[error("staging buffer capacity must be non-zero")]
    ZeroCapacity,
    /// A peek addressed a byte past the end of the unread region.
    #[error("index {index} out of range for {available} unread bytes")]
    IndexOutOfRange {
        /// Requested offset, relative to the read cursor.
        index: usize,
        /// Unread bytes at the time of the request.
        available: usize,
    },
}
