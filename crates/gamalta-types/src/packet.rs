//! Wire framing for Gamalta commands and notifications.
//!
//! Every frame, in both directions, has the same layout:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | Header, always `0xA5` |
//! | 1 | Sequence byte |
//! | 2 | Opcode |
//! | 3 | Payload length or bit mask (command-defined) |
//! | 4.. | Payload |
//!
//! Frames must fit in one ATT write; there is no fragmentation.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ParseError, ParseResult};

/// Header byte opening every frame.
pub const HEADER: u8 = 0xA5;

/// Size of the fixed frame prefix (header, sequence, opcode, meta).
pub const HEADER_LEN: usize = 4;

/// Largest frame the negotiated MTU allows.
pub const MAX_FRAME_LEN: usize = 23;

/// Largest payload that fits in a single frame.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - HEADER_LEN;

/// One protocol frame.
///
/// The meta byte is carried verbatim: some commands put the payload length
/// there, others a bit mask.
///
/// # Examples
///
/// ```
/// use gamalta_types::Packet;
///
/// let packet = Packet::new(0x2A, 0x52, 0x01, vec![80]);
/// assert_eq!(packet.encode().as_ref(), &[0xA5, 0x2A, 0x52, 0x01, 80]);
///
/// let decoded = Packet::decode(&[0xA5, 0x2A, 0x53, 0x01, 80]).unwrap();
/// assert_eq!(decoded.command, 0x53);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    /// Sequence byte.
    pub sequence: u8,
    /// Opcode.
    pub command: u8,
    /// Payload length or mask.
    pub meta: u8,
    /// Payload bytes after the fixed prefix.
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet.
    pub fn new(sequence: u8, command: u8, meta: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            command,
            meta,
            payload: payload.into(),
        }
    }

    /// The header byte, always [`HEADER`].
    #[must_use]
    pub const fn header(&self) -> u8 {
        HEADER
    }

    /// Total encoded size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Frames always carry the fixed prefix, so they are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the encoded frame fits in a single write.
    #[must_use]
    pub fn fits_mtu(&self) -> bool {
        self.len() <= MAX_FRAME_LEN
    }

    /// Encode to wire bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.put_u8(HEADER);
        buf.put_u8(self.sequence);
        buf.put_u8(self.command);
        buf.put_u8(self.meta);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode wire bytes.
    ///
    /// Only the frame structure is checked; payload contents are left to the
    /// response decoder.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedFrame`] if the buffer is shorter than the
    /// fixed prefix or does not start with [`HEADER`].
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(ParseError::malformed(format!(
                "frame requires at least {} bytes, got {}",
                HEADER_LEN,
                data.len()
            )));
        }
        if data[0] != HEADER {
            return Err(ParseError::malformed(format!(
                "bad header 0x{:02X}, expected 0x{:02X}",
                data[0], HEADER
            )));
        }

        Ok(Self {
            sequence: data[1],
            command: data[2],
            meta: data[3],
            payload: Bytes::copy_from_slice(&data[HEADER_LEN..]),
        })
    }
}

/// Render bytes as space-separated hex for log lines.
#[must_use]
pub fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
