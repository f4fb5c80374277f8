//! OneDrive quickXorHash
//!
//! The algorithm works on a 160-bit hash state. Each input byte is XOR-ed
//! into the state at the current bit position, which then advances by 11
//! bits (mod 160). The total input length, as a little-endian `u64`, is
//! XOR-ed into the last 8 bytes of the final state. The provider reports
//! the 20-byte result Base64-encoded.

use base64::Engine;

const WIDTH_BYTES: usize = 20;
const WIDTH_BITS: usize = WIDTH_BYTES * 8;
const SHIFT_STEP: usize = 11;

/// Incremental quickXorHash state
#[derive(Debug, Clone)]
pub struct QuickXorHash {
    data: [u8; WIDTH_BYTES],
    shift: usize,
    length: u64,
}

impl QuickXorHash {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: [0u8; WIDTH_BYTES],
            shift: 0,
            length: 0,
        }
    }

    /// Feeds more input
    pub fn update(&mut self, input: &[u8]) {
        for &byte in input {
            let byte_pos = self.shift / 8;
            let bit_offset = self.shift % 8;

            self.data[byte_pos % WIDTH_BYTES] ^= byte << bit_offset;
            if bit_offset > 0 {
                self.data[(byte_pos + 1) % WIDTH_BYTES] ^= byte >> (8 - bit_offset);
            }

            self.shift = (self.shift + SHIFT_STEP) % WIDTH_BITS;
        }
        self.length += input.len() as u64;
    }

    /// Raw 20-byte digest
    #[must_use]
    pub fn finalize(mut self) -> [u8; WIDTH_BYTES] {
        let tail = &mut self.data[WIDTH_BYTES - 8..];
        for (slot, lb) in tail.iter_mut().zip(self.length.to_le_bytes()) {
            *slot ^= lb;
        }
        self.data
    }

    /// Digest in the provider's Base64 encoding
    #[must_use]
    pub fn finalize_base64(self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.finalize())
    }
}

impl Default for QuickXorHash {
    fn default() -> Self {
        Self::new()
    }
}
