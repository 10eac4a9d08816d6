//! Fixed-capacity staging storage with read-cursor bookkeeping.
//!
//! The store is a plain byte array plus two offsets:
//!
//! ```text
//! 0            read_cursor           filled_len              capacity
//! |  consumed  |       unread        |          spare           |
//! ```
//!
//! Bytes are appended into the spare tail and consumed from the unread span.
//! Consumed bytes are reclaimed by [`Store::compact`], which slides the unread
//! span back to offset zero. The store never grows and never wraps; when the
//! spare tail is exhausted the owner decides what to do (the handler resets).
//!
//! The store itself is not synchronized. The handler keeps it behind its
//! guard, so every method here runs with exclusive access.

use bstr::ByteSlice;

#[derive(Debug)]
pub(crate) struct Store {
    data: Box<[u8]>,
    read_cursor: usize,
    filled_len: usize,
}

impl Store {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            read_cursor: 0,
            filled_len: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub(crate) fn filled_len(&self) -> usize {
        self.filled_len
    }

    /// Number of unread bytes.
    pub(crate) fn available(&self) -> usize {
        self.filled_len - self.read_cursor
    }

    pub(crate) fn is_full(&self) -> bool {
        self.filled_len == self.data.len()
    }

    pub(crate) fn unread(&self) -> &[u8] {
        &self.data[self.read_cursor..self.filled_len]
    }

    /// The writable tail `[filled_len, capacity)`.
    pub(crate) fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.filled_len..]
    }

    /// Mark `len` bytes of the spare tail as filled.
    ///
    /// Counts larger than the spare tail are clamped; a misbehaving source
    /// cannot push `filled_len` past the capacity.
    pub(crate) fn commit(&mut self, len: usize) {
        debug_assert!(len <= self.data.len() - self.filled_len);
        self.filled_len = (self.filled_len + len).min(self.data.len());
    }

    /// Copy bytes into the spare tail, returning how many fit.
    #[cfg(test)]
    pub(crate) fn append(&mut self, bytes: &[u8]) -> usize {
        let spare = self.spare_mut();
        let len = bytes.len().min(spare.len());
        spare[..len].copy_from_slice(&bytes[..len]);
        self.commit(len);
        len
    }

    pub(crate) fn peek(&self, index: usize) -> Option<u8> {
        self.unread().get(index).copied()
    }

    /// Copy up to `dest.len()` unread bytes into `dest` and consume them.
    pub(crate) fn take_into(&mut self, dest: &mut [u8]) -> usize {
        let len = dest.len().min(self.available());
        dest[..len].copy_from_slice(&self.data[self.read_cursor..self.read_cursor + len]);
        self.read_cursor += len;
        len
    }

    /// Move the cursor onto the first unread `target`, or past everything if
    /// there is none.
    pub(crate) fn skip_to_byte(&mut self, target: u8) {
        match self.unread().find_byte(target) {
            Some(offset) => self.read_cursor += offset,
            None => self.skip_all(),
        }
    }

    /// Move the cursor onto the first unread occurrence of `pattern`, or past
    /// everything if there is none. An empty pattern leaves the cursor alone.
    pub(crate) fn skip_to_sequence(&mut self, pattern: &[u8]) {
        if pattern.is_empty() {
            return;
        }
        match self.unread().find(pattern) {
            Some(offset) => self.read_cursor += offset,
            None => self.skip_all(),
        }
    }

    pub(crate) fn skip_all(&mut self) {
        self.read_cursor = self.filled_len;
    }

    /// Slide the unread span down to offset zero.
    ///
    /// Returns whether anything moved. A second call without an intervening
    /// consume is always a no-op.
    pub(crate) fn compact(&mut self) -> bool {
        if self.read_cursor == 0 || self.filled_len < self.read_cursor {
            return false;
        }
        self.data.copy_within(self.read_cursor..self.filled_len, 0);
        self.filled_len -= self.read_cursor;
        self.read_cursor = 0;
        true
    }

    /// Discard everything staged.
    pub(crate) fn reset(&mut self) {
        self.read_cursor = 0;
        self.filled_len = 0;
    }
}
