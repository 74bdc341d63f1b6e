use bytes::{BufMut, BytesMut};

use crate::core::Envelope;

/// The protocol header.
///
/// Always present at the start of a frame; the bytes are the ASCII
/// representation of the header which simplifies identifying the protocol on
/// the wire.
const PROTO_HEADER: [u8; 3] = [b'U', b'N', b'D'];

/// The protocol version.
///
/// A frame with any other version is considered invalid. The version only
/// changes when the protocol changes in a way that is not backwards
/// compatible.
const PROTO_VERSION: u8 = 0x01;

/// The minimum buffer size required to read a frame.
const MIN_BUFFER_SIZE: usize = PROTO_HEADER.len()
    + std::mem::size_of::<u8>()
    + std::mem::size_of::<u16>()
    + std::mem::size_of::<u16>()
    + 2;

/// The maximum payload size.
///
/// Bounds the size of a single datagram; a full plan specification has to
/// fit.
const MAX_PAYLOAD_SIZE: usize = 8_192;

/// The maximum size of an encoded frame.
pub const MAX_FRAME_SIZE: usize = MIN_BUFFER_SIZE + MAX_PAYLOAD_SIZE;

pub enum FrameError {
    FrameTooSmall,
    InvalidHeader,
    VersionMismatch(u8),
    ExcessivePayloadLength(usize),
    InvalidPadding,
    KindMismatch(u16, u16),
    Codec(serde_json::Error),
}

impl std::error::Error for FrameError {}

impl std::fmt::Debug for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::FrameTooSmall => write!(f, "FrameTooSmall"),
            Self::InvalidHeader => write!(f, "InvalidHeader"),
            Self::VersionMismatch(got) => write!(f, "VersionMismatch({})", got),
            Self::ExcessivePayloadLength(len) => write!(f, "ExcessivePayloadLength({})", len),
            Self::InvalidPadding => write!(f, "InvalidPadding"),
            Self::KindMismatch(frame, body) => write!(f, "KindMismatch({}, {})", frame, body),
            Self::Codec(e) => write!(f, "Codec({})", e),
        }
    }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::FrameTooSmall => write!(f, "frame too small"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::VersionMismatch(got) => write!(f, "version mismatch: {}", got),
            Self::ExcessivePayloadLength(len) => write!(f, "excessive payload length: {}", len),
            Self::InvalidPadding => write!(f, "invalid padding"),
            Self::KindMismatch(frame, body) => {
                write!(f, "frame kind {} does not match payload kind {}", frame, body)
            }
            Self::Codec(e) => write!(f, "{}", e),
        }
    }
}

/// Encode an envelope into a single wire frame.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(envelope).map_err(FrameError::Codec)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::ExcessivePayloadLength(payload.len()));
    }

    let mut buffer = BytesMut::with_capacity(MIN_BUFFER_SIZE + payload.len());

    buffer.put(&PROTO_HEADER[..]);
    buffer.put_u8(PROTO_VERSION);
    buffer.put_u16(envelope.body.kind());
    buffer.put_u16(payload.len() as u16);
    buffer.put(&[0u8; 2][..]);
    buffer.put(&payload[..]);

    Ok(buffer.to_vec())
}

/// Decode a wire frame back into an envelope.
pub fn decode(buffer: &[u8]) -> Result<Envelope, FrameError> {
    if buffer.len() < MIN_BUFFER_SIZE {
        Err(FrameError::FrameTooSmall)?
    }

    // Check header
    if buffer[0..3] != PROTO_HEADER[..] {
        Err(FrameError::InvalidHeader)?
    }

    // Check protocol version
    let version = buffer[3];
    if version != PROTO_VERSION {
        Err(FrameError::VersionMismatch(version))?
    }

    let kind = u16::from_be_bytes([buffer[4], buffer[5]]);

    let payload_length = u16::from_be_bytes([buffer[6], buffer[7]]) as usize;
    if payload_length > MAX_PAYLOAD_SIZE || MIN_BUFFER_SIZE + payload_length > buffer.len() {
        Err(FrameError::ExcessivePayloadLength(payload_length))?
    }

    // Check padding
    if buffer[8..10] != [0u8; 2] {
        Err(FrameError::InvalidPadding)?
    }

    let payload = &buffer[MIN_BUFFER_SIZE..MIN_BUFFER_SIZE + payload_length];
    let envelope: Envelope = serde_json::from_slice(payload).map_err(FrameError::Codec)?;

    if envelope.body.kind() != kind {
        Err(FrameError::KindMismatch(kind, envelope.body.kind()))?
    }

    Ok(envelope)
}
