//! Post-handshake transport encryption and the shared AEAD/HKDF helpers.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::NoiseError;
use crate::nonce::MessageNonce;

/// Poly1305 authentication tag size in bytes.
pub const MAC_SIZE: usize = 16;

/// Size of the encrypted length prefix: 2-byte big-endian length plus MAC.
pub const ENCRYPTED_LENGTH_SIZE: usize = 2 + MAC_SIZE;

/// Maximum plaintext message size (2-byte length prefix limit).
pub const MAX_MESSAGE_SIZE: usize = 65535;

/// Number of AEAD uses after which a directional key is rotated.
const KEY_ROTATION_INTERVAL: u16 = 1000;

/// `HKDF-SHA256(salt, ikm)` with empty info, returning the two 32-byte
/// halves of the 64-byte output.
pub(crate) fn hkdf_two_keys(salt: &[u8; 32], ikm: &[u8]) -> ([u8; 32], [u8; 32]) {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; 64];
    hkdf.expand(&[], &mut okm)
        .expect("64 bytes is a valid HKDF-SHA256 output length");

    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    first.copy_from_slice(&okm[..32]);
    second.copy_from_slice(&okm[32..]);
    okm.zeroize();
    (first, second)
}

/// ChaCha20-Poly1305 encryption with associated data.
///
/// Returns `ciphertext || tag` (plaintext length + 16 bytes).
pub(crate) fn encrypt_with_ad(
    key: &[u8; 32],
    nonce: &MessageNonce,
    ad: &[u8],
    plaintext: &[u8],
) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad: ad,
            },
        )
        .expect("ChaCha20-Poly1305 encryption into a Vec cannot fail")
}

/// ChaCha20-Poly1305 decryption with associated data.
///
/// # Errors
///
/// Returns the AEAD error if the tag does not authenticate.
pub(crate) fn decrypt_with_ad(
    key: &[u8; 32],
    nonce: &MessageNonce,
    ad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, chacha20poly1305::aead::Error> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher.decrypt(
        Nonce::from_slice(nonce.as_bytes()),
        Payload {
            msg: ciphertext,
            aad: ad,
        },
    )
}

/// Sending half of the transport cipher: the send key, its own copy of the
/// chaining key for rotation, and the send nonce.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct NoiseSender {
    key: [u8; 32],
    ck: [u8; 32],
    #[zeroize(skip)]
    nonce: MessageNonce,
}

impl NoiseSender {
    fn new(key: [u8; 32], ck: [u8; 32]) -> Self {
        Self {
            key,
            ck,
            nonce: MessageNonce::zero(),
        }
    }

    /// Encrypts one message into a complete transport frame: the 18-byte
    /// encrypted length prefix followed by `msg.len() + 16` bytes of
    /// ciphertext and tag.
    ///
    /// # Panics
    ///
    /// Panics if `msg` exceeds [`MAX_MESSAGE_SIZE`].
    #[must_use]
    pub fn encrypt(&mut self, msg: &[u8]) -> Vec<u8> {
        assert!(
            msg.len() <= MAX_MESSAGE_SIZE,
            "message exceeds {MAX_MESSAGE_SIZE} bytes"
        );
        #[allow(clippy::cast_possible_truncation)] // Bounded by the assert above
        let len = (msg.len() as u16).to_be_bytes();

        let mut frame = Vec::with_capacity(ENCRYPTED_LENGTH_SIZE + msg.len() + MAC_SIZE);
        frame.extend_from_slice(&encrypt_with_ad(&self.key, &self.nonce, &[], &len));
        self.advance();
        frame.extend_from_slice(&encrypt_with_ad(&self.key, &self.nonce, &[], msg));
        self.advance();
        frame
    }

    /// Bumps the send nonce after an AEAD use, rotating the key once the
    /// post-increment counter reaches the rotation interval.
    fn advance(&mut self) {
        if self.nonce.increment() >= KEY_ROTATION_INTERVAL {
            let (ck, key) = hkdf_two_keys(&self.ck, &self.key);
            self.ck = ck;
            self.key = key;
            self.nonce.reset();
        }
    }

    #[cfg(test)]
    pub(crate) fn key(&self) -> &[u8; 32] {
        &self.key
    }
}

// Key material stays out of Debug output.
impl std::fmt::Debug for NoiseSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSender")
            .field("nonce", &self.nonce.counter())
            .finish_non_exhaustive()
    }
}

/// Receiving half of the transport cipher: the receive key, its own copy of
/// the chaining key for rotation, and the receive nonce.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct NoiseReceiver {
    key: [u8; 32],
    ck: [u8; 32],
    #[zeroize(skip)]
    nonce: MessageNonce,
}

impl NoiseReceiver {
    fn new(key: [u8; 32], ck: [u8; 32]) -> Self {
        Self {
            key,
            ck,
            nonce: MessageNonce::zero(),
        }
    }

    /// Decrypts the 18-byte length prefix and returns the body plaintext
    /// length.
    ///
    /// Must strictly alternate with [`decrypt_message`]: each frame is one
    /// length decrypt followed by one body decrypt. Calling out of order
    /// desynchronizes the receive nonce and every later decrypt fails
    /// authentication.
    ///
    /// # Errors
    ///
    /// Returns `TRANSPORT_BAD_TAG` if the prefix does not authenticate.
    ///
    /// [`decrypt_message`]: NoiseReceiver::decrypt_message
    pub fn decrypt_length(
        &mut self,
        ciphertext: &[u8; ENCRYPTED_LENGTH_SIZE],
    ) -> Result<u16, NoiseError> {
        let plaintext = decrypt_with_ad(&self.key, &self.nonce, &[], ciphertext)
            .map_err(|_| NoiseError::TransportBadTag)?;
        self.advance();
        Ok(u16::from_be_bytes([plaintext[0], plaintext[1]]))
    }

    /// Decrypts a message body (`length + 16` bytes of ciphertext and tag).
    ///
    /// # Errors
    ///
    /// Returns `TRANSPORT_BAD_TAG` if the body does not authenticate.
    pub fn decrypt_message(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, NoiseError> {
        let plaintext = decrypt_with_ad(&self.key, &self.nonce, &[], ciphertext)
            .map_err(|_| NoiseError::TransportBadTag)?;
        self.advance();
        Ok(plaintext)
    }

    /// Bumps the receive nonce after an AEAD use, rotating the key once the
    /// post-increment counter reaches the rotation interval.
    fn advance(&mut self) {
        if self.nonce.increment() >= KEY_ROTATION_INTERVAL {
            let (ck, key) = hkdf_two_keys(&self.ck, &self.key);
            self.ck = ck;
            self.key = key;
            self.nonce.reset();
        }
    }

    #[cfg(test)]
    pub(crate) fn key(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for NoiseReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseReceiver")
            .field("nonce", &self.nonce.counter())
            .finish_non_exhaustive()
    }
}

/// Bidirectional transport cipher produced by a completed handshake.
///
/// The two directions are fully independent: each owns its key, nonce, and
/// chaining-key copy, and rotates on its own schedule.
pub struct NoiseCipher {
    pub(crate) sender: NoiseSender,
    pub(crate) receiver: NoiseReceiver,
}

impl NoiseCipher {
    /// Builds the transport cipher from the final handshake keys. Both
    /// directions seed their rotation from the same final chaining key.
    pub(crate) fn new(send_key: [u8; 32], recv_key: [u8; 32], ck: [u8; 32]) -> Self {
        Self {
            sender: NoiseSender::new(send_key, ck),
            receiver: NoiseReceiver::new(recv_key, ck),
        }
    }

    /// Encrypts one message into a complete transport frame.
    ///
    /// # Panics
    ///
    /// Panics if `msg` exceeds [`MAX_MESSAGE_SIZE`].
    #[must_use]
    pub fn encrypt(&mut self, msg: &[u8]) -> Vec<u8> {
        self.sender.encrypt(msg)
    }

    /// Decrypts the 18-byte length prefix of the next frame.
    ///
    /// # Errors
    ///
    /// Returns `TRANSPORT_BAD_TAG` if the prefix does not authenticate.
    pub fn decrypt_length(
        &mut self,
        ciphertext: &[u8; ENCRYPTED_LENGTH_SIZE],
    ) -> Result<u16, NoiseError> {
        self.receiver.decrypt_length(ciphertext)
    }

    /// Decrypts the body of the frame whose length prefix was just decrypted.
    ///
    /// # Errors
    ///
    /// Returns `TRANSPORT_BAD_TAG` if the body does not authenticate.
    pub fn decrypt_message(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, NoiseError> {
        self.receiver.decrypt_message(ciphertext)
    }

    /// Splits into independently owned send and receive halves so a reader
    /// task and a writer task can each own their direction.
    #[must_use]
    pub fn split(self) -> (NoiseSender, NoiseReceiver) {
        (self.sender, self.receiver)
    }
}

impl std::fmt::Debug for NoiseCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseCipher")
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .finish()
    }
}
