//! Symmetric handshake state: the rolling transcript hash and chaining key.

use secp256k1::PublicKey;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::cipher::{decrypt_with_ad, encrypt_with_ad, hkdf_two_keys};
use crate::nonce::MessageNonce;

/// Protocol name hashed into the initial handshake state.
pub(crate) const PROTOCOL_NAME: &[u8] = b"Noise_XK_secp256k1_ChaChaPoly_SHA256";

/// Prologue mixed into the handshake hash after the protocol name.
pub(crate) const PROLOGUE: &[u8] = b"lightning";

/// The symmetric half of the handshake: the transcript hash `h` covering
/// every handshake byte, and the chaining key `ck` accumulating every ECDH
/// output. Both are carried from act to act and zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SymmetricState {
    h: [u8; 32],
    ck: [u8; 32],
}

impl SymmetricState {
    /// Initializes the state per BOLT 8:
    /// `ck = h = SHA256(protocol_name)`, then `h = SHA256(h || prologue)`,
    /// then `h = SHA256(h || seed_pub)` where `seed_pub` is the responder's
    /// static key for both roles.
    pub fn new(seed_pub: &PublicKey) -> Self {
        let ck: [u8; 32] = Sha256::digest(PROTOCOL_NAME).into();
        let mut state = Self { h: ck, ck };
        state.mix_hash(PROLOGUE);
        state.mix_hash(&seed_pub.serialize());
        state
    }

    /// `h = SHA256(h || data)`
    pub fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h = hasher.finalize().into();
    }

    /// `ck, temp_k = HKDF(ck, secret)`; updates `ck` and returns `temp_k`.
    pub fn mix_key(&mut self, secret: &[u8]) -> Zeroizing<[u8; 32]> {
        let (ck, temp_k) = hkdf_two_keys(&self.ck, secret);
        self.ck = ck;
        Zeroizing::new(temp_k)
    }

    /// Encrypts `plaintext` with the current `h` as associated data, then
    /// mixes the ciphertext into `h`.
    pub fn encrypt_and_hash(
        &mut self,
        key: &[u8; 32],
        nonce: &MessageNonce,
        plaintext: &[u8],
    ) -> Vec<u8> {
        let ciphertext = encrypt_with_ad(key, nonce, &self.h, plaintext);
        self.mix_hash(&ciphertext);
        ciphertext
    }

    /// Decrypts and authenticates `ciphertext` with the current `h` as
    /// associated data, then mixes the ciphertext into `h`.
    ///
    /// # Errors
    ///
    /// Returns the AEAD error on authentication failure; `h` is left
    /// unchanged in that case.
    pub fn decrypt_and_hash(
        &mut self,
        key: &[u8; 32],
        nonce: &MessageNonce,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, chacha20poly1305::aead::Error> {
        let plaintext = decrypt_with_ad(key, nonce, &self.h, ciphertext)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Current transcript hash, for the final Act Three tag which is
    /// authenticated against `h` without being mixed back in.
    pub fn hash(&self) -> &[u8; 32] {
        &self.h
    }

    /// Current chaining key, for the final transport key derivation.
    pub fn chaining_key(&self) -> &[u8; 32] {
        &self.ck
    }
}
