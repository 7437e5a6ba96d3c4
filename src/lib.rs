//! BOLT 8 Noise protocol transport for Lightning Network peers.
//!
//! Implements the `Noise_XK_secp256k1_ChaChaPoly_SHA256` handshake and the
//! encrypted transport that follows it: length-prefixed ChaCha20-Poly1305
//! frames with per-direction key rotation every 1000 messages.
//!
//! The handshake authenticates the remote party against a known static
//! public key and derives forward-secret session keys from three ephemeral
//! ECDH exchanges. [`Initiator`] and [`Responder`] drive the three acts for
//! their role and produce a [`NoiseCipher`]; [`NoiseConnection`] runs the
//! whole exchange over a TCP stream.

mod cipher;
mod connection;
mod error;
mod handshake;
mod nonce;
mod symmetric;

pub use cipher::{
    ENCRYPTED_LENGTH_SIZE, MAC_SIZE, MAX_MESSAGE_SIZE, NoiseCipher, NoiseReceiver, NoiseSender,
};
pub use connection::{ConnectionError, NoiseConnection, NoiseRecvHalf, NoiseSendHalf};
pub use error::NoiseError;
pub use handshake::{ACT_ONE_SIZE, ACT_THREE_SIZE, ACT_TWO_SIZE, Initiator, Responder};
