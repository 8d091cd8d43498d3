//! Wire format error types

use thiserror::Error;

/// Errors that can occur while decoding a DNS packet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Packet ended before a complete field could be read
    #[error("Truncated packet: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// A label length byte used the reserved 0b01/0b10 prefixes
    #[error("Invalid label type: {0:#04x}")]
    InvalidLabelType(u8),

    /// A name exceeds 255 bytes on the wire
    #[error("Name too long")]
    NameTooLong,

    /// Compression pointers formed a cycle
    #[error("Compression pointer loop")]
    PointerLoop,
}
