//! High-level encrypted connection for Lightning Network peers.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use secp256k1::{PublicKey, SecretKey};

use crate::cipher::{
    ENCRYPTED_LENGTH_SIZE, MAC_SIZE, MAX_MESSAGE_SIZE, NoiseCipher, NoiseReceiver, NoiseSender,
};
use crate::error::NoiseError;
use crate::handshake::{ACT_ONE_SIZE, ACT_THREE_SIZE, ACT_TWO_SIZE, Initiator, Responder};

/// A Noise-encrypted connection to a Lightning Network peer.
///
/// Wraps a TCP stream and provides encrypted message sending and receiving
/// using the BOLT 8 Noise protocol.
pub struct NoiseConnection {
    stream: TcpStream,
    cipher: NoiseCipher,
    remote_static: PublicKey,
}

impl NoiseConnection {
    /// Connects to a remote Lightning node and performs the Noise handshake
    /// as initiator.
    ///
    /// # Arguments
    /// - `addr` - The socket address of the remote node
    /// - `remote_pubkey` - The remote node's static public key (node ID)
    /// - `local_static` - Our static private key
    /// - `local_ephemeral` - Our ephemeral private key (must be random for security)
    /// - `timeout` - Timeout for connection and individual read/write operations
    ///
    /// # Errors
    ///
    /// Returns an error if TCP connection or Noise handshake fails.
    pub fn connect(
        addr: SocketAddr,
        remote_pubkey: PublicKey,
        local_static: SecretKey,
        local_ephemeral: SecretKey,
        timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let mut stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut handshake = Initiator::new(local_static, local_ephemeral, remote_pubkey);

        let act_one = handshake.act_one()?;
        stream.write_all(&act_one)?;

        let mut act_two = [0u8; ACT_TWO_SIZE];
        stream.read_exact(&mut act_two)?;
        handshake.process_act_two(&act_two)?;

        let act_three = handshake.act_three()?;
        stream.write_all(&act_three)?;

        let cipher = handshake.into_cipher()?;
        log::debug!("noise handshake complete with {remote_pubkey}");

        Ok(Self {
            stream,
            cipher,
            remote_static: remote_pubkey,
        })
    }

    /// Performs the Noise handshake as responder on an accepted stream.
    ///
    /// The initiator's static key is learned and authenticated in Act Three;
    /// it is available afterwards via [`remote_static`].
    ///
    /// # Errors
    ///
    /// Returns an error if stream configuration or the Noise handshake fails.
    ///
    /// [`remote_static`]: NoiseConnection::remote_static
    pub fn accept(
        mut stream: TcpStream,
        local_static: SecretKey,
        local_ephemeral: SecretKey,
        timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut handshake = Responder::new(local_static, local_ephemeral);

        let mut act_one = [0u8; ACT_ONE_SIZE];
        stream.read_exact(&mut act_one)?;
        handshake.process_act_one(&act_one)?;

        let act_two = handshake.act_two()?;
        stream.write_all(&act_two)?;

        let mut act_three = [0u8; ACT_THREE_SIZE];
        stream.read_exact(&mut act_three)?;
        let remote_static = handshake.process_act_three(&act_three)?;

        let cipher = handshake.into_cipher()?;
        log::debug!("noise handshake accepted from {remote_static}");

        Ok(Self {
            stream,
            cipher,
            remote_static,
        })
    }

    /// The peer's authenticated static public key (node ID).
    #[must_use]
    pub fn remote_static(&self) -> PublicKey {
        self.remote_static
    }

    /// Sends an encrypted message to the peer.
    ///
    /// # Errors
    ///
    /// Returns `MESSAGE_TOO_LARGE` if the message exceeds
    /// `MAX_MESSAGE_SIZE`, or an IO error if writing fails.
    pub fn send_message(&mut self, msg: &[u8]) -> Result<(), ConnectionError> {
        write_frame(&mut self.stream, &mut self.cipher.sender, msg)
    }

    /// Receives and decrypts a message from the peer.
    ///
    /// # Errors
    ///
    /// Returns an IO error if reading fails, or a Noise error if decryption fails.
    pub fn recv_message(&mut self) -> Result<Vec<u8>, ConnectionError> {
        read_frame(&mut self.stream, &mut self.cipher.receiver)
    }

    /// Splits into independently owned send and receive halves so a reader
    /// task and a writer task can each own their direction.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the underlying stream cannot be cloned.
    pub fn into_split(self) -> io::Result<(NoiseSendHalf, NoiseRecvHalf)> {
        let read_stream = self.stream.try_clone()?;
        let (sender, receiver) = self.cipher.split();
        Ok((
            NoiseSendHalf {
                stream: self.stream,
                sender,
            },
            NoiseRecvHalf {
                stream: read_stream,
                receiver,
            },
        ))
    }
}

/// Owned sending half of a split [`NoiseConnection`].
pub struct NoiseSendHalf {
    stream: TcpStream,
    sender: NoiseSender,
}

impl NoiseSendHalf {
    /// Sends an encrypted message to the peer.
    ///
    /// # Errors
    ///
    /// Returns `MESSAGE_TOO_LARGE` if the message exceeds
    /// `MAX_MESSAGE_SIZE`, or an IO error if writing fails.
    pub fn send_message(&mut self, msg: &[u8]) -> Result<(), ConnectionError> {
        write_frame(&mut self.stream, &mut self.sender, msg)
    }
}

/// Owned receiving half of a split [`NoiseConnection`].
pub struct NoiseRecvHalf {
    stream: TcpStream,
    receiver: NoiseReceiver,
}

impl NoiseRecvHalf {
    /// Receives and decrypts a message from the peer.
    ///
    /// # Errors
    ///
    /// Returns an IO error if reading fails, or a Noise error if decryption fails.
    pub fn recv_message(&mut self) -> Result<Vec<u8>, ConnectionError> {
        read_frame(&mut self.stream, &mut self.receiver)
    }
}

/// Encrypts and writes one message as a single transport frame.
fn write_frame<W: Write>(
    stream: &mut W,
    sender: &mut NoiseSender,
    msg: &[u8],
) -> Result<(), ConnectionError> {
    if msg.len() > MAX_MESSAGE_SIZE {
        return Err(NoiseError::MessageTooLarge(msg.len()).into());
    }
    let encrypted = sender.encrypt(msg);
    stream.write_all(&encrypted)?;
    log::trace!("sent {} byte message", msg.len());
    Ok(())
}

/// Reads one frame: 18 bytes of encrypted length, then the body. One atomic
/// step on the receive nonce per frame.
fn read_frame<R: Read>(
    stream: &mut R,
    receiver: &mut NoiseReceiver,
) -> Result<Vec<u8>, ConnectionError> {
    let mut encrypted_len = [0u8; ENCRYPTED_LENGTH_SIZE];
    stream.read_exact(&mut encrypted_len)?;
    let msg_len = receiver.decrypt_length(&encrypted_len)?;

    let mut encrypted_msg = vec![0u8; usize::from(msg_len) + MAC_SIZE];
    stream.read_exact(&mut encrypted_msg)?;
    let msg = receiver.decrypt_message(&encrypted_msg)?;
    log::trace!("received {} byte message", msg.len());

    Ok(msg)
}

/// Errors that can occur during connection operations.
///
/// Everything the Noise state machine can report (handshake failures,
/// transport authentication failures, the message size limit) arrives as
/// [`Noise`]; [`Io`] covers the stream itself. Either way the connection is
/// unusable and must be dropped.
///
/// [`Noise`]: ConnectionError::Noise
/// [`Io`]: ConnectionError::Io
#[derive(Debug)]
pub enum ConnectionError {
    /// The underlying stream failed (connect, read, write, clone)
    Io(io::Error),
    /// The Noise state machine rejected the exchange
    Noise(NoiseError),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "connection IO failed: {e}"),
            Self::Noise(e) => write!(f, "noise protocol failed: {e}"),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Noise(e) => Some(e),
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<NoiseError> for ConnectionError {
    fn from(e: NoiseError) -> Self {
        Self::Noise(e)
    }
}
