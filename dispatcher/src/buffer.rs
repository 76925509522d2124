//! # Read Buffer
//!
//! A single fixed-capacity arena, allocated when the dispatcher is built and
//! reused by every drain loop for the dispatcher's lifetime. Reads land
//! directly in the arena; the filled prefix is then handed to the framer
//! without an intermediate copy.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              ReadBuffer (capacity)            │
//! ├──────────────────────┬────────────────────────┤
//! │   filled (last read) │   stale / unused       │
//! └──────────────────────┴────────────────────────┘
//! ▲                      ▲
//! 0                    filled
//! ```

use crate::stream::InputStream;

/// Outcome of a single bounded read into the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    /// `n` bytes now occupy the front of the arena
    Filled(usize),
    /// The handle returned a negative count
    Failed,
}

/// Reusable arena for bounded reads
#[derive(Debug)]
pub struct ReadBuffer {
    data: Box<[u8]>,
    filled: usize,
}

impl ReadBuffer {
    /// Allocate an arena of `capacity` bytes (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            filled: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes produced by the most recent successful read
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Perform one read of up to `capacity` bytes from `stream`
    ///
    /// Counts larger than the arena are clamped.
    pub fn read_from<S: InputStream + ?Sized>(&mut self, stream: &mut S) -> ReadResult {
        let n = stream.read(&mut self.data);
        if n < 0 {
            self.filled = 0;
            return ReadResult::Failed;
        }
        self.filled = (n as usize).min(self.data.len());
        ReadResult::Filled(self.filled)
    }

    /// Forget the last read
    pub fn clear(&mut self) {
        self.filled = 0;
    }
}
