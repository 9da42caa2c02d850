//! Growable sink for encoded output.

use crate::constants::ENCODED_BUFFER_INITIAL_SIZE;

/// Accumulates codestream bytes produced by an encoder. The storage grows as
/// needed, so `open` only sets the initial reservation.
#[derive(Debug, Clone, Default)]
pub struct EncodedBuffer {
    data: Vec<u8>,
}

impl EncodedBuffer {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(ENCODED_BUFFER_INITIAL_SIZE),
        }
    }

    /// Discards previous content and reserves `initial_size` bytes.
    pub fn open(&mut self, initial_size: usize) {
        self.data.clear();
        self.data.reserve(initial_size);
    }

    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.data.extend_from_slice(bytes);
        bytes.len()
    }

    /// Number of bytes written so far.
    pub fn tell(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}
