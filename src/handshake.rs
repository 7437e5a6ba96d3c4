//! The three-act Noise_XK handshake, one state machine per role.
//!
//! The initiator knows the responder's static public key beforehand and
//! proves its own identity in Act Three; the responder's identity is never
//! transmitted. Each role's acts must run in their fixed order, and any
//! failure (including an out-of-order call) leaves the state machine
//! terminated.

use std::mem;

use secp256k1::ecdh::SharedSecret;
use secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::cipher::{NoiseCipher, decrypt_with_ad, encrypt_with_ad, hkdf_two_keys};
use crate::error::NoiseError;
use crate::nonce::MessageNonce;
use crate::symmetric::SymmetricState;

/// Handshake version byte (0 = no deviation from BOLT 8).
const VERSION: u8 = 0;

/// Act One message size: 1 (version) + 33 (pubkey) + 16 (MAC)
pub const ACT_ONE_SIZE: usize = 50;

/// Act Two message size: 1 (version) + 33 (pubkey) + 16 (MAC)
pub const ACT_TWO_SIZE: usize = 50;

/// Act Three message size: 1 (version) + 33 + 16 (encrypted pubkey) + 16 (MAC)
pub const ACT_THREE_SIZE: usize = 66;

/// BOLT 8 ECDH: SHA-256 of the compressed shared point, which is exactly
/// what [`SharedSecret`] computes.
fn ecdh(secret: &SecretKey, public: &PublicKey) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(SharedSecret::new(public, secret).secret_bytes())
}

enum InitiatorState {
    SendActOne,
    ReadActTwo {
        symmetric: SymmetricState,
    },
    SendActThree {
        symmetric: SymmetricState,
        remote_ephemeral: PublicKey,
        temp_k2: Zeroizing<[u8; 32]>,
    },
    Complete {
        cipher: NoiseCipher,
    },
    Failed,
}

/// Initiator side of the handshake.
///
/// Call order: [`act_one`], [`process_act_two`], [`act_three`], then
/// [`into_cipher`].
///
/// [`act_one`]: Initiator::act_one
/// [`process_act_two`]: Initiator::process_act_two
/// [`act_three`]: Initiator::act_three
/// [`into_cipher`]: Initiator::into_cipher
pub struct Initiator {
    local_static: SecretKey,
    local_ephemeral: SecretKey,
    remote_static: PublicKey,
    secp: Secp256k1<All>,
    state: InitiatorState,
}

impl Initiator {
    /// Creates a new handshake as the initiator.
    ///
    /// # Arguments
    /// - `local_static` - Our static private key (node identity)
    /// - `local_ephemeral` - Our ephemeral private key (must be fresh and
    ///   random for each connection)
    /// - `remote_static` - The responder's known static public key
    #[must_use]
    pub fn new(
        local_static: SecretKey,
        local_ephemeral: SecretKey,
        remote_static: PublicKey,
    ) -> Self {
        Self {
            local_static,
            local_ephemeral,
            remote_static,
            secp: Secp256k1::new(),
            state: InitiatorState::SendActOne,
        }
    }

    /// Generates the 50-byte Act One message:
    /// `version || ephemeral_pubkey || MAC`.
    ///
    /// # Errors
    ///
    /// Returns `OUT_OF_SEQUENCE` if Act One was already generated.
    pub fn act_one(&mut self) -> Result<[u8; ACT_ONE_SIZE], NoiseError> {
        match mem::replace(&mut self.state, InitiatorState::Failed) {
            InitiatorState::SendActOne => {}
            _ => return Err(NoiseError::OutOfSequence),
        }

        let mut symmetric = SymmetricState::new(&self.remote_static);
        let epk = PublicKey::from_secret_key(&self.secp, &self.local_ephemeral);

        // h = SHA256(h || e.pub)
        symmetric.mix_hash(&epk.serialize());

        // es = ECDH(e.priv, rs)
        let es = ecdh(&self.local_ephemeral, &self.remote_static);

        // ck, temp_k1 = HKDF(ck, es)
        let temp_k1 = symmetric.mix_key(&es[..]);

        // c = encryptWithAD(temp_k1, 0, h, empty); h = SHA256(h || c)
        let c = symmetric.encrypt_and_hash(&temp_k1, &MessageNonce::zero(), &[]);

        let mut msg = [0u8; ACT_ONE_SIZE];
        msg[0] = VERSION;
        msg[1..34].copy_from_slice(&epk.serialize());
        msg[34..].copy_from_slice(&c);

        self.state = InitiatorState::ReadActTwo { symmetric };
        Ok(msg)
    }

    /// Consumes the 50-byte Act Two message from the responder.
    ///
    /// # Errors
    ///
    /// Returns `ACT2_READ_FAILED` on a wrong length, `ACT2_BAD_VERSION` on a
    /// nonzero version byte, `ACT2_BAD_PUBKEY` on a malformed ephemeral key,
    /// `ACT2_BAD_TAG` on MAC failure, or `OUT_OF_SEQUENCE` when invoked out
    /// of order. Any failure terminates the handshake.
    pub fn process_act_two(&mut self, act_two: &[u8]) -> Result<(), NoiseError> {
        let mut symmetric = match mem::replace(&mut self.state, InitiatorState::Failed) {
            InitiatorState::ReadActTwo { symmetric } => symmetric,
            _ => return Err(NoiseError::OutOfSequence),
        };

        let act_two: &[u8; ACT_TWO_SIZE] = act_two
            .try_into()
            .map_err(|_| NoiseError::ActTwoReadFailed(act_two.len()))?;

        // Parse: version || re || c
        let version = act_two[0];
        let re_bytes = &act_two[1..34];
        let c = &act_two[34..];

        if version != VERSION {
            return Err(NoiseError::ActTwoBadVersion(version));
        }
        let remote_ephemeral =
            PublicKey::from_slice(re_bytes).map_err(|_| NoiseError::ActTwoBadPubkey)?;

        // h = SHA256(h || re)
        symmetric.mix_hash(re_bytes);

        // ee = ECDH(e.priv, re)
        let ee = ecdh(&self.local_ephemeral, &remote_ephemeral);

        // ck, temp_k2 = HKDF(ck, ee)
        let temp_k2 = symmetric.mix_key(&ee[..]);

        // Authenticate the empty payload; h = SHA256(h || c)
        symmetric
            .decrypt_and_hash(&temp_k2, &MessageNonce::zero(), c)
            .map_err(|_| NoiseError::ActTwoBadTag)?;

        self.state = InitiatorState::SendActThree {
            symmetric,
            remote_ephemeral,
            temp_k2,
        };
        Ok(())
    }

    /// Generates the 66-byte Act Three message and derives the transport
    /// keys: `sk` from the first HKDF half, `rk` from the second.
    ///
    /// # Errors
    ///
    /// Returns `OUT_OF_SEQUENCE` unless Act Two was just processed.
    pub fn act_three(&mut self) -> Result<[u8; ACT_THREE_SIZE], NoiseError> {
        let (mut symmetric, remote_ephemeral, temp_k2) =
            match mem::replace(&mut self.state, InitiatorState::Failed) {
                InitiatorState::SendActThree {
                    symmetric,
                    remote_ephemeral,
                    temp_k2,
                } => (symmetric, remote_ephemeral, temp_k2),
                _ => return Err(NoiseError::OutOfSequence),
            };

        let spk = PublicKey::from_secret_key(&self.secp, &self.local_static);

        // c = encryptWithAD(temp_k2, 1, h, s.pub); h = SHA256(h || c)
        let c = symmetric.encrypt_and_hash(
            &temp_k2,
            &MessageNonce::with_counter(1),
            &spk.serialize(),
        );

        // se = ECDH(s.priv, re)
        let se = ecdh(&self.local_static, &remote_ephemeral);

        // ck, temp_k3 = HKDF(ck, se)
        let temp_k3 = symmetric.mix_key(&se[..]);

        // t = encryptWithAD(temp_k3, 0, h, empty); nothing more is mixed
        let t = encrypt_with_ad(&temp_k3, &MessageNonce::zero(), symmetric.hash(), &[]);

        // sk, rk = HKDF(ck, empty); the initiator sends under the first half
        let (sk, rk) = hkdf_two_keys(symmetric.chaining_key(), &[]);
        let cipher = NoiseCipher::new(sk, rk, *symmetric.chaining_key());

        let mut msg = [0u8; ACT_THREE_SIZE];
        msg[0] = VERSION;
        msg[1..50].copy_from_slice(&c);
        msg[50..].copy_from_slice(&t);

        self.state = InitiatorState::Complete { cipher };
        Ok(msg)
    }

    /// Extracts the transport cipher once the handshake has completed.
    ///
    /// # Errors
    ///
    /// Returns `OUT_OF_SEQUENCE` if Act Three has not completed.
    pub fn into_cipher(self) -> Result<NoiseCipher, NoiseError> {
        match self.state {
            InitiatorState::Complete { cipher } => Ok(cipher),
            _ => Err(NoiseError::OutOfSequence),
        }
    }
}

enum ResponderState {
    ReadActOne,
    SendActTwo {
        symmetric: SymmetricState,
        remote_ephemeral: PublicKey,
    },
    ReadActThree {
        symmetric: SymmetricState,
        temp_k2: Zeroizing<[u8; 32]>,
    },
    Complete {
        cipher: NoiseCipher,
        remote_static: PublicKey,
    },
    Failed,
}

/// Responder side of the handshake.
///
/// Call order: [`process_act_one`], [`act_two`], [`process_act_three`],
/// then [`into_cipher`]. The initiator's static key is learned (and
/// authenticated) in Act Three.
///
/// [`process_act_one`]: Responder::process_act_one
/// [`act_two`]: Responder::act_two
/// [`process_act_three`]: Responder::process_act_three
/// [`into_cipher`]: Responder::into_cipher
pub struct Responder {
    local_static: SecretKey,
    local_ephemeral: SecretKey,
    secp: Secp256k1<All>,
    state: ResponderState,
}

impl Responder {
    /// Creates a new handshake as the responder.
    ///
    /// # Arguments
    /// - `local_static` - Our static private key (node identity)
    /// - `local_ephemeral` - Our ephemeral private key (must be fresh and
    ///   random for each connection)
    #[must_use]
    pub fn new(local_static: SecretKey, local_ephemeral: SecretKey) -> Self {
        Self {
            local_static,
            local_ephemeral,
            secp: Secp256k1::new(),
            state: ResponderState::ReadActOne,
        }
    }

    /// Consumes the 50-byte Act One message from the initiator.
    ///
    /// # Errors
    ///
    /// Returns `ACT1_READ_FAILED` on a wrong length, `ACT1_BAD_VERSION` on a
    /// nonzero version byte, `ACT1_BAD_PUBKEY` on a malformed ephemeral key,
    /// `ACT1_BAD_TAG` on MAC failure, or `OUT_OF_SEQUENCE` when invoked out
    /// of order. Any failure terminates the handshake.
    pub fn process_act_one(&mut self, act_one: &[u8]) -> Result<(), NoiseError> {
        match mem::replace(&mut self.state, ResponderState::Failed) {
            ResponderState::ReadActOne => {}
            _ => return Err(NoiseError::OutOfSequence),
        }

        let act_one: &[u8; ACT_ONE_SIZE] = act_one
            .try_into()
            .map_err(|_| NoiseError::ActOneReadFailed(act_one.len()))?;

        // Parse: version || re || c
        let version = act_one[0];
        let re_bytes = &act_one[1..34];
        let c = &act_one[34..];

        if version != VERSION {
            return Err(NoiseError::ActOneBadVersion(version));
        }
        let remote_ephemeral =
            PublicKey::from_slice(re_bytes).map_err(|_| NoiseError::ActOneBadPubkey)?;

        // The responder seeds the handshake hash with its own static key.
        let local_static_pub = PublicKey::from_secret_key(&self.secp, &self.local_static);
        let mut symmetric = SymmetricState::new(&local_static_pub);

        // h = SHA256(h || re)
        symmetric.mix_hash(re_bytes);

        // es = ECDH(s.priv, re)
        let es = ecdh(&self.local_static, &remote_ephemeral);

        // ck, temp_k1 = HKDF(ck, es)
        let temp_k1 = symmetric.mix_key(&es[..]);

        // Authenticate the empty payload; h = SHA256(h || c)
        symmetric
            .decrypt_and_hash(&temp_k1, &MessageNonce::zero(), c)
            .map_err(|_| NoiseError::ActOneBadTag)?;

        self.state = ResponderState::SendActTwo {
            symmetric,
            remote_ephemeral,
        };
        Ok(())
    }

    /// Generates the 50-byte Act Two message:
    /// `version || ephemeral_pubkey || MAC`.
    ///
    /// # Errors
    ///
    /// Returns `OUT_OF_SEQUENCE` unless Act One was just processed.
    pub fn act_two(&mut self) -> Result<[u8; ACT_TWO_SIZE], NoiseError> {
        let (mut symmetric, remote_ephemeral) =
            match mem::replace(&mut self.state, ResponderState::Failed) {
                ResponderState::SendActTwo {
                    symmetric,
                    remote_ephemeral,
                } => (symmetric, remote_ephemeral),
                _ => return Err(NoiseError::OutOfSequence),
            };

        let epk = PublicKey::from_secret_key(&self.secp, &self.local_ephemeral);

        // h = SHA256(h || e.pub)
        symmetric.mix_hash(&epk.serialize());

        // ee = ECDH(e.priv, re)
        let ee = ecdh(&self.local_ephemeral, &remote_ephemeral);

        // ck, temp_k2 = HKDF(ck, ee)
        let temp_k2 = symmetric.mix_key(&ee[..]);

        // c = encryptWithAD(temp_k2, 0, h, empty); h = SHA256(h || c)
        let c = symmetric.encrypt_and_hash(&temp_k2, &MessageNonce::zero(), &[]);

        let mut msg = [0u8; ACT_TWO_SIZE];
        msg[0] = VERSION;
        msg[1..34].copy_from_slice(&epk.serialize());
        msg[34..].copy_from_slice(&c);

        self.state = ResponderState::ReadActThree { symmetric, temp_k2 };
        Ok(msg)
    }

    /// Consumes the 66-byte Act Three message, authenticating and returning
    /// the initiator's static public key. Derives the transport keys with
    /// the mirrored split: `rk` from the first HKDF half, `sk` from the
    /// second, so our send key is the initiator's receive key.
    ///
    /// # Errors
    ///
    /// Returns `ACT3_READ_FAILED` on a wrong length, `ACT3_BAD_VERSION` on a
    /// nonzero version byte, `ACT3_BAD_CIPHERTEXT` if the encrypted static
    /// key fails authentication, `ACT3_BAD_PUBKEY` if it decrypts to a
    /// malformed key, `ACT3_BAD_TAG` on final MAC failure, or
    /// `OUT_OF_SEQUENCE` when invoked out of order. Any failure terminates
    /// the handshake.
    pub fn process_act_three(&mut self, act_three: &[u8]) -> Result<PublicKey, NoiseError> {
        let (mut symmetric, temp_k2) =
            match mem::replace(&mut self.state, ResponderState::Failed) {
                ResponderState::ReadActThree { symmetric, temp_k2 } => (symmetric, temp_k2),
                _ => return Err(NoiseError::OutOfSequence),
            };

        let act_three: &[u8; ACT_THREE_SIZE] = act_three
            .try_into()
            .map_err(|_| NoiseError::ActThreeReadFailed(act_three.len()))?;

        // Parse: version || c || t
        let version = act_three[0];
        let c = &act_three[1..50];
        let t = &act_three[50..];

        if version != VERSION {
            return Err(NoiseError::ActThreeBadVersion(version));
        }

        // rs = decryptWithAD(temp_k2, 1, h, c); h = SHA256(h || c)
        let rs_bytes = symmetric
            .decrypt_and_hash(&temp_k2, &MessageNonce::with_counter(1), c)
            .map_err(|_| NoiseError::ActThreeBadCiphertext)?;
        let remote_static =
            PublicKey::from_slice(&rs_bytes).map_err(|_| NoiseError::ActThreeBadPubkey)?;

        // se = ECDH(e.priv, rs)
        let se = ecdh(&self.local_ephemeral, &remote_static);

        // ck, temp_k3 = HKDF(ck, se)
        let temp_k3 = symmetric.mix_key(&se[..]);

        // Verify the final tag; nothing more is mixed into h
        decrypt_with_ad(&temp_k3, &MessageNonce::zero(), symmetric.hash(), t)
            .map_err(|_| NoiseError::ActThreeBadTag)?;

        // rk, sk = HKDF(ck, empty) - mirrored relative to the initiator
        let (rk, sk) = hkdf_two_keys(symmetric.chaining_key(), &[]);
        let cipher = NoiseCipher::new(sk, rk, *symmetric.chaining_key());

        self.state = ResponderState::Complete {
            cipher,
            remote_static,
        };
        Ok(remote_static)
    }

    /// The initiator's authenticated static public key, or `None` until Act
    /// Three has completed.
    #[must_use]
    pub fn remote_static(&self) -> Option<PublicKey> {
        match &self.state {
            ResponderState::Complete { remote_static, .. } => Some(*remote_static),
            _ => None,
        }
    }

    /// Extracts the transport cipher once the handshake has completed.
    ///
    /// # Errors
    ///
    /// Returns `OUT_OF_SEQUENCE` if Act Three has not completed.
    pub fn into_cipher(self) -> Result<NoiseCipher, NoiseError> {
        match self.state {
            ResponderState::Complete { cipher, .. } => Ok(cipher),
            _ => Err(NoiseError::OutOfSequence),
        }
    }
}
