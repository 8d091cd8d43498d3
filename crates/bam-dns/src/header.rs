//! DNS header encoding/decoding
//!
//! The header is a fixed 12 bytes:
//! - id: 2 bytes
//! - flags: 2 bytes (QR, Opcode, AA, TC, RD, RA, Z, RCODE)
//! - qdcount, ancount, nscount, arcount: 2 bytes each
//!
//! All fields are big-endian.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::WireError;

/// Size of the DNS header in bytes
pub const HEADER_SIZE: usize = 12;

const QR_MASK: u16 = 0x8000;
const OPCODE_SHIFT: u16 = 11;
const AA_MASK: u16 = 0x0400;
const TC_MASK: u16 = 0x0200;
const RD_MASK: u16 = 0x0100;
const RA_MASK: u16 = 0x0080;
const RCODE_MASK: u16 = 0x000F;

/// Kind of query carried by a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Standard query
    Query,
    /// Anything else (inverse query, status, notify, update, ...)
    Other(u8),
}

impl Opcode {
    /// Decode from the 4-bit opcode field
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Opcode::Query,
            other => Opcode::Other(other),
        }
    }

    /// Encode as the 4-bit opcode field
    pub fn as_u8(&self) -> u8 {
        match self {
            Opcode::Query => 0,
            Opcode::Other(v) => *v & 0x0F,
        }
    }
}

/// Response code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rcode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Other(u8),
}

impl Rcode {
    /// Decode from the 4-bit rcode field
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Rcode::NoError,
            1 => Rcode::FormatError,
            2 => Rcode::ServerFailure,
            3 => Rcode::NameError,
            4 => Rcode::NotImplemented,
            5 => Rcode::Refused,
            other => Rcode::Other(other),
        }
    }

    /// Encode as the 4-bit rcode field
    pub fn as_u8(&self) -> u8 {
        match self {
            Rcode::NoError => 0,
            Rcode::FormatError => 1,
            Rcode::ServerFailure => 2,
            Rcode::NameError => 3,
            Rcode::NotImplemented => 4,
            Rcode::Refused => 5,
            Rcode::Other(v) => *v & 0x0F,
        }
    }
}

/// DNS message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Query identifier, echoed in the reply
    pub id: u16,
    /// Set on responses
    pub response: bool,
    pub opcode: Opcode,
    /// Authoritative answer
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: Rcode,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl Header {
    /// Create a header for a standard query
    pub fn query(id: u16) -> Self {
        Self {
            id,
            response: false,
            opcode: Opcode::Query,
            authoritative: false,
            truncated: false,
            recursion_desired: true,
            recursion_available: false,
            rcode: Rcode::NoError,
            question_count: 0,
            answer_count: 0,
            authority_count: 0,
            additional_count: 0,
        }
    }

    /// Read only the query id from a raw packet
    ///
    /// Used to answer packets whose body is malformed.
    pub fn peek_id(packet: &[u8]) -> Option<u16> {
        if packet.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([packet[0], packet[1]]))
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u16(self.id);

        let mut flags = (self.opcode.as_u8() as u16) << OPCODE_SHIFT;
        flags |= self.rcode.as_u8() as u16;
        if self.response {
            flags |= QR_MASK;
        }
        if self.authoritative {
            flags |= AA_MASK;
        }
        if self.truncated {
            flags |= TC_MASK;
        }
        if self.recursion_desired {
            flags |= RD_MASK;
        }
        if self.recursion_available {
            flags |= RA_MASK;
        }
        dst.put_u16(flags);

        dst.put_u16(self.question_count);
        dst.put_u16(self.answer_count);
        dst.put_u16(self.authority_count);
        dst.put_u16(self.additional_count);
    }

    /// Decode a header from the start of a packet
    pub fn decode(packet: &[u8]) -> Result<Self, WireError> {
        if packet.len() < HEADER_SIZE {
            return Err(WireError::Truncated {
                offset: 0,
                needed: HEADER_SIZE,
            });
        }

        let mut src = &packet[..HEADER_SIZE];
        let id = src.get_u16();
        let flags = src.get_u16();

        Ok(Self {
            id,
            response: flags & QR_MASK != 0,
            opcode: Opcode::from_u8(((flags >> OPCODE_SHIFT) & 0x0F) as u8),
            authoritative: flags & AA_MASK != 0,
            truncated: flags & TC_MASK != 0,
            recursion_desired: flags & RD_MASK != 0,
            recursion_available: flags & RA_MASK != 0,
            rcode: Rcode::from_u8((flags & RCODE_MASK) as u8),
            question_count: src.get_u16(),
            answer_count: src.get_u16(),
            authority_count: src.get_u16(),
            additional_count: src.get_u16(),
        })
    }
}
