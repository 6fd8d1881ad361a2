//! # Packet Framing
//!
//! Every command is wrapped in a small frame. Two layouts have been observed
//! on printers that otherwise look identical, so the layout is a strategy
//! object carried by each printer profile rather than a constant.
//!
//! ## Variant A (CRC-8, terminated)
//!
//! ```text
//! ┌──────┬──────┬────────┬──────┬───────┬──────┬─────────┬───────────────┬──────┐
//! │ 0x51 │ 0x78 │ opcode │ 0x00 │ len   │ 0x00 │ payload │ crc8(payload) │ 0xFF │
//! └──────┴──────┴────────┴──────┴───────┴──────┴─────────┴───────────────┴──────┘
//! ```
//!
//! ## Variant B (XOR, unterminated)
//!
//! ```text
//! ┌──────┬──────┬────────┬──────┬────────┬────────┬─────────┬──────────────────────┐
//! │ 0x51 │ 0x78 │ opcode │ 0x00 │ len lo │ len hi │ payload │ xor(all bytes before) │
//! └──────┴──────┴────────┴──────┴────────┴────────┴─────────┴──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use catprint::protocol::framing::FramingStrategy;
//!
//! let packet = FramingStrategy::VARIANT_A.frame(0xA1, &[0x01, 0x00]);
//! assert_eq!(packet.bytes, vec![0x51, 0x78, 0xA1, 0x00, 0x02, 0x00, 0x01, 0x00, 0x15, 0xFF]);
//!
//! let decoded = FramingStrategy::VARIANT_A.decode(&packet.bytes).unwrap();
//! assert_eq!(decoded.opcode, 0xA1);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::checksum::Checksum;

/// Magic bytes opening every frame.
pub const FRAME_HEADER: [u8; 2] = [0x51, 0x78];

/// Trailing byte of Variant A frames.
pub const FRAME_TERMINATOR: u8 = 0xFF;

/// Direction flag for host-to-printer frames.
pub const FLAG_FROM_HOST: u8 = 0x00;

/// Errors from [`FramingStrategy::decode`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("bad header: {0:02x?}")]
    BadHeader(Vec<u8>),

    #[error("length field says {expected} payload bytes, frame holds {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("checksum mismatch: expected {expected:#04x}, found {found:#04x}")]
    Checksum { expected: u8, found: u8 },

    #[error("missing terminator, found {0:#04x}")]
    Terminator(u8),
}

/// Width of the length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthField {
    /// Low byte followed by a zero byte
    LowByte,
    /// Little-endian u16
    U16Le,
}

/// A framed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub opcode: u8,
    pub payload: Vec<u8>,
    pub checksum: u8,
    /// The complete frame as written to the wire
    pub bytes: Vec<u8>,
}

impl CommandPacket {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Frame layout for one printer profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramingStrategy {
    pub header: [u8; 2],
    pub flag: u8,
    pub length: LengthField,
    pub checksum: Checksum,
    pub terminator: Option<u8>,
}

impl FramingStrategy {
    /// CRC-8 over payload, one-byte length, 0xFF terminator.
    pub const VARIANT_A: Self = Self {
        header: FRAME_HEADER,
        flag: FLAG_FROM_HOST,
        length: LengthField::LowByte,
        checksum: Checksum::Crc8Payload,
        terminator: Some(FRAME_TERMINATOR),
    };

    /// XOR over the whole frame, u16 length, no terminator.
    pub const VARIANT_B: Self = Self {
        header: FRAME_HEADER,
        flag: FLAG_FROM_HOST,
        length: LengthField::U16Le,
        checksum: Checksum::XorAll,
        terminator: None,
    };

    /// Bytes before the payload: header, opcode, flag, length.
    pub const fn prefix_len(&self) -> usize {
        self.header.len() + 4
    }

    /// Frame an opcode and payload.
    ///
    /// A one-byte length field only holds the low byte of the payload length;
    /// draw payloads never exceed 50 bytes.
    pub fn frame(&self, opcode: u8, payload: &[u8]) -> CommandPacket {
        let len = payload.len();
        let mut bytes = Vec::with_capacity(self.prefix_len() + len + 2);
        bytes.extend_from_slice(&self.header);
        bytes.push(opcode);
        bytes.push(self.flag);
        match self.length {
            LengthField::LowByte => bytes.extend_from_slice(&[(len & 0xFF) as u8, 0x00]),
            LengthField::U16Le => bytes.extend_from_slice(&(len as u16).to_le_bytes()),
        }
        bytes.extend_from_slice(payload);

        let checksum = self.checksum.compute(&bytes, payload);
        bytes.push(checksum);
        if let Some(term) = self.terminator {
            bytes.push(term);
        }

        CommandPacket {
            opcode,
            payload: payload.to_vec(),
            checksum,
            bytes,
        }
    }

    /// Parse a frame and verify its header, length, checksum and terminator.
    pub fn decode(&self, bytes: &[u8]) -> Result<CommandPacket, FrameError> {
        let trailer = 1 + usize::from(self.terminator.is_some());
        let prefix = self.prefix_len();
        if bytes.len() < prefix + trailer {
            return Err(FrameError::TooShort(bytes.len()));
        }
        if bytes[..2] != self.header || bytes[3] != self.flag {
            return Err(FrameError::BadHeader(bytes[..prefix].to_vec()));
        }

        let declared = match self.length {
            LengthField::LowByte => bytes[4] as usize,
            LengthField::U16Le => u16::from_le_bytes([bytes[4], bytes[5]]) as usize,
        };
        let actual = bytes.len() - prefix - trailer;
        if declared != actual {
            return Err(FrameError::LengthMismatch {
                expected: declared,
                actual,
            });
        }

        let payload = &bytes[prefix..prefix + actual];
        let found = bytes[prefix + actual];
        let expected = self.checksum.compute(&bytes[..prefix + actual], payload);
        if found != expected {
            return Err(FrameError::Checksum { expected, found });
        }

        if let Some(term) = self.terminator {
            let last = bytes[bytes.len() - 1];
            if last != term {
                return Err(FrameError::Terminator(last));
            }
        }

        Ok(CommandPacket {
            opcode: bytes[2],
            payload: payload.to_vec(),
            checksum: found,
            bytes: bytes.to_vec(),
        })
    }
}
