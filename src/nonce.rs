//! AEAD nonce layout and the per-message counter.

/// AEAD nonce size in bytes (96 bits).
pub(crate) const NONCE_SIZE: usize = 12;

/// A 96-bit ChaCha20-Poly1305 nonce in the little-endian layout BOLT 8
/// prescribes: the message counter occupies bytes 4..6 as a little-endian
/// u16, every other byte stays zero.
///
/// The handshake only ever uses counter values 0 and 1; the transport
/// increments the counter once per AEAD use and resets it on key rotation,
/// so it never exceeds the rotation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MessageNonce([u8; NONCE_SIZE]);

impl MessageNonce {
    /// All-zero nonce (counter = 0).
    pub const fn zero() -> Self {
        Self([0u8; NONCE_SIZE])
    }

    /// Nonce with the given counter value.
    pub fn with_counter(counter: u16) -> Self {
        let mut nonce = Self::zero();
        nonce.set_counter(counter);
        nonce
    }

    /// Current counter value (little-endian u16 at bytes 4..6).
    pub fn counter(&self) -> u16 {
        u16::from_le_bytes([self.0[4], self.0[5]])
    }

    fn set_counter(&mut self, counter: u16) {
        self.0[4..6].copy_from_slice(&counter.to_le_bytes());
    }

    /// Advances the counter by one and returns the post-increment value,
    /// which the transport compares against the rotation interval.
    pub fn increment(&mut self) -> u16 {
        let next = self.counter().wrapping_add(1);
        self.set_counter(next);
        next
    }

    /// Resets the counter to zero (after a key rotation).
    pub fn reset(&mut self) {
        self.0 = [0u8; NONCE_SIZE];
    }

    /// Raw nonce bytes for the AEAD.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}
