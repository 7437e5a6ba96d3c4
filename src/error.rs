//! Error types for the Noise handshake and transport.

/// Errors that can occur during the Noise handshake or encrypted transport.
///
/// Every variant is terminal: the handshake state machine does not recover,
/// and the owning connection must be dropped. There is no retry, resync, or
/// downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseError {
    /// Act One input was not exactly 50 bytes (actual length attached)
    ActOneReadFailed(usize),
    /// Act One version byte was not zero
    ActOneBadVersion(u8),
    /// Act One ephemeral key is not a valid compressed secp256k1 point
    ActOneBadPubkey,
    /// Act One MAC verification failed
    ActOneBadTag,
    /// Act Two input was not exactly 50 bytes
    ActTwoReadFailed(usize),
    /// Act Two version byte was not zero
    ActTwoBadVersion(u8),
    /// Act Two ephemeral key is not a valid compressed secp256k1 point
    ActTwoBadPubkey,
    /// Act Two MAC verification failed
    ActTwoBadTag,
    /// Act Three input was not exactly 66 bytes
    ActThreeReadFailed(usize),
    /// Act Three version byte was not zero
    ActThreeBadVersion(u8),
    /// Act Three encrypted static key failed authentication
    ActThreeBadCiphertext,
    /// Act Three static key is not a valid compressed secp256k1 point
    ActThreeBadPubkey,
    /// Act Three final MAC verification failed
    ActThreeBadTag,
    /// Transport frame (length prefix or body) failed authentication
    TransportBadTag,
    /// Outgoing message exceeds the 65535-byte transport limit
    MessageTooLarge(usize),
    /// Handshake method invoked out of order for the role
    OutOfSequence,
}

impl std::fmt::Display for NoiseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActOneReadFailed(len) => write!(f, "ACT1_READ_FAILED {len}"),
            Self::ActOneBadVersion(v) => write!(f, "ACT1_BAD_VERSION {v}"),
            Self::ActOneBadPubkey => write!(f, "ACT1_BAD_PUBKEY"),
            Self::ActOneBadTag => write!(f, "ACT1_BAD_TAG"),
            Self::ActTwoReadFailed(len) => write!(f, "ACT2_READ_FAILED {len}"),
            Self::ActTwoBadVersion(v) => write!(f, "ACT2_BAD_VERSION {v}"),
            Self::ActTwoBadPubkey => write!(f, "ACT2_BAD_PUBKEY"),
            Self::ActTwoBadTag => write!(f, "ACT2_BAD_TAG"),
            Self::ActThreeReadFailed(len) => write!(f, "ACT3_READ_FAILED {len}"),
            Self::ActThreeBadVersion(v) => write!(f, "ACT3_BAD_VERSION {v}"),
            Self::ActThreeBadCiphertext => write!(f, "ACT3_BAD_CIPHERTEXT"),
            Self::ActThreeBadPubkey => write!(f, "ACT3_BAD_PUBKEY"),
            Self::ActThreeBadTag => write!(f, "ACT3_BAD_TAG"),
            Self::TransportBadTag => write!(f, "TRANSPORT_BAD_TAG"),
            Self::MessageTooLarge(len) => write!(f, "MESSAGE_TOO_LARGE {len}"),
            Self::OutOfSequence => write!(f, "OUT_OF_SEQUENCE"),
        }
    }
}

impl std::error::Error for NoiseError {}
