//! bam-dns: DNS wire format for the bam local resolver
//!
//! This crate holds the minimal subset of RFC 1035 that bam needs to answer
//! A/AAAA queries for its local top-level domain, plus the pure
//! [`LocalZone`] responder that decides the reply for each query. It does no
//! I/O; the UDP server lives in `bam-server`.

pub mod error;
pub mod header;
pub mod message;
pub mod zone;

pub use error::WireError;
pub use header::{Header, Opcode, Rcode, HEADER_SIZE};
pub use message::{Message, Question, RData, Record, RecordType, CLASS_IN};
pub use zone::{LocalZone, DEFAULT_TTL};
