use core::time::Duration;

use crate::error::BufferError;

/// Configuration for a [`BufferHandler`](crate::BufferHandler).
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use serialbuf::BufferOptions;
///
/// let options = BufferOptions {
///     capacity: 1024,
///     timeout: Duration::from_millis(50),
/// };
/// assert!(options.validate().is_ok());
/// ```
///
/// # Default
///
/// 256 bytes of staging, 10 ms inactivity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BufferOptions {
    /// Size of the staging buffer in bytes. Fixed for the lifetime of the
    /// handler; the buffer never grows.
    ///
    /// # Default
    ///
    /// `256`
    pub capacity: usize,

    /// Inactivity window: the longest a refill attempt waits for more bytes,
    /// measured from the last time bytes arrived (or the store was locked),
    /// not from the start of the attempt.
    ///
    /// A consumer that receives the first byte of a frame therefore gets the
    /// full window again for each subsequent byte.
    ///
    /// # Default
    ///
    /// 10 ms, roughly one character time at 1200 baud.
    pub timeout: Duration,
}

impl BufferOptions {
    /// Default staging capacity in bytes.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Default inactivity window.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10);

    /// Check that the options describe a usable buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::ZeroCapacity`] when `capacity` is zero.
    pub fn validate(&self) -> Result<(), BufferError> {
        if self.capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}
