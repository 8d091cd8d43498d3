//! DNS message: header, question section and answer records
//!
//! Only what a loopback responder needs is modelled. Authority and
//! additional sections (EDNS OPT records from `dig`, for instance) are
//! skipped on decode and never emitted.

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::WireError;
use crate::header::{Header, Opcode, Rcode, HEADER_SIZE};

/// The Internet class
pub const CLASS_IN: u16 = 1;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_JUMPS: usize = 16;
const POINTER_TAG: u8 = 0xC0;

/// Resource record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A,
    Aaaa,
    Other(u16),
}

impl RecordType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            28 => RecordType::Aaaa,
            other => RecordType::Other(other),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Aaaa => 28,
            RecordType::Other(v) => *v,
        }
    }
}

/// A single entry of the question section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Fully qualified name, always ending with `.`
    pub name: String,
    pub qtype: RecordType,
    pub qclass: u16,
}

impl Question {
    /// Create an IN-class question
    pub fn new(name: impl Into<String>, qtype: RecordType) -> Self {
        Self {
            name: fqdn(&name.into()),
            qtype,
            qclass: CLASS_IN,
        }
    }
}

/// Record payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Raw(Bytes),
}

/// A resource record of the answer section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub rtype: RecordType,
    pub class: u16,
    pub ttl: u32,
    pub data: RData,
}

/// A DNS message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
}

impl Message {
    /// Build a standard query for a single name
    pub fn query(id: u16, name: &str, qtype: RecordType) -> Self {
        Self {
            header: Header::query(id),
            questions: vec![Question::new(name, qtype)],
            answers: Vec::new(),
        }
    }

    /// Build an empty successful reply to `request`
    ///
    /// Copies the id, opcode and RD bit, and the first question if any.
    pub fn reply_to(request: &Message) -> Self {
        let mut header = Header::query(request.header.id);
        header.response = true;
        header.opcode = request.header.opcode;
        header.recursion_desired = request.header.recursion_desired;

        Self {
            header,
            questions: request.questions.iter().take(1).cloned().collect(),
            answers: Vec::new(),
        }
    }

    /// Build a reply to `request` carrying the given response code
    pub fn reply_with_rcode(request: &Message, rcode: Rcode) -> Self {
        let mut reply = Self::reply_to(request);
        reply.header.rcode = rcode;
        reply
    }

    /// Build a bare error reply for a packet whose body could not be decoded
    pub fn format_error(id: u16) -> Self {
        let mut header = Header::query(id);
        header.response = true;
        header.recursion_desired = false;
        header.rcode = Rcode::FormatError;
        Self {
            header,
            questions: Vec::new(),
            answers: Vec::new(),
        }
    }

    pub fn rcode(&self) -> Rcode {
        self.header.rcode
    }

    pub fn opcode(&self) -> Opcode {
        self.header.opcode
    }

    /// Decode a message from a raw UDP payload
    pub fn decode(packet: &[u8]) -> Result<Self, WireError> {
        let header = Header::decode(packet)?;
        let mut reader = Reader::new(packet, HEADER_SIZE);

        let mut questions = Vec::with_capacity(header.question_count.min(8) as usize);
        for _ in 0..header.question_count {
            let name = reader.read_name()?;
            let qtype = RecordType::from_u16(reader.read_u16()?);
            let qclass = reader.read_u16()?;
            questions.push(Question {
                name,
                qtype,
                qclass,
            });
        }

        let mut answers = Vec::with_capacity(header.answer_count.min(8) as usize);
        for _ in 0..header.answer_count {
            answers.push(reader.read_record()?);
        }

        Ok(Self {
            header,
            questions,
            answers,
        })
    }

    /// Encode the message into a byte buffer
    ///
    /// Section counts in the header are derived from the message contents.
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut header = self.header;
        header.question_count = self.questions.len() as u16;
        header.answer_count = self.answers.len() as u16;
        header.authority_count = 0;
        header.additional_count = 0;
        header.encode(dst);

        for question in &self.questions {
            put_name(dst, &question.name);
            dst.put_u16(question.qtype.as_u16());
            dst.put_u16(question.qclass);
        }

        for record in &self.answers {
            put_name(dst, &record.name);
            dst.put_u16(record.rtype.as_u16());
            dst.put_u16(record.class);
            dst.put_u32(record.ttl);
            match &record.data {
                RData::A(addr) => {
                    dst.put_u16(4);
                    dst.put_slice(&addr.octets());
                }
                RData::Aaaa(addr) => {
                    dst.put_u16(16);
                    dst.put_slice(&addr.octets());
                }
                RData::Raw(bytes) => {
                    dst.put_u16(bytes.len() as u16);
                    dst.put_slice(bytes);
                }
            }
        }
    }

    /// Encode into a freshly allocated buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(512);
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Normalise a name to its fully qualified form (trailing dot)
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

fn put_name(dst: &mut BytesMut, name: &str) {
    for label in name.split('.').filter(|l| !l.is_empty()) {
        let bytes = label.as_bytes();
        let len = bytes.len().min(MAX_LABEL_LEN);
        dst.put_u8(len as u8);
        dst.put_slice(&bytes[..len]);
    }
    dst.put_u8(0);
}

/// Cursor over a whole packet, so compression pointers can jump backwards
struct Reader<'a> {
    packet: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(packet: &'a [u8], pos: usize) -> Self {
        Self { packet, pos }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos + n;
        if end > self.packet.len() {
            return Err(WireError::Truncated {
                offset: self.pos,
                needed: n,
            });
        }
        let slice = &self.packet[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_name(&mut self) -> Result<String, WireError> {
        let mut labels: Vec<String> = Vec::new();
        let mut wire_len = 0usize;
        let mut jumps = 0usize;
        // Position to resume at once the first pointer has been followed
        let mut resume: Option<usize> = None;

        loop {
            let len = self.read_u8()?;
            match len & POINTER_TAG {
                0x00 => {
                    if len == 0 {
                        break;
                    }
                    let len = len as usize;
                    wire_len += len + 1;
                    if wire_len > MAX_NAME_LEN {
                        return Err(WireError::NameTooLong);
                    }
                    let label = self.take(len)?;
                    labels.push(String::from_utf8_lossy(label).into_owned());
                }
                POINTER_TAG => {
                    let low = self.read_u8()?;
                    jumps += 1;
                    if jumps > MAX_POINTER_JUMPS {
                        return Err(WireError::PointerLoop);
                    }
                    if resume.is_none() {
                        resume = Some(self.pos);
                    }
                    self.pos = (((len & !POINTER_TAG) as usize) << 8) | low as usize;
                }
                _ => return Err(WireError::InvalidLabelType(len)),
            }
        }

        if let Some(pos) = resume {
            self.pos = pos;
        }

        if labels.is_empty() {
            Ok(".".to_string())
        } else {
            Ok(format!("{}.", labels.join(".")))
        }
    }

    fn read_record(&mut self) -> Result<Record, WireError> {
        let name = self.read_name()?;
        let rtype = RecordType::from_u16(self.read_u16()?);
        let class = self.read_u16()?;
        let ttl = self.read_u32()?;
        let rdlength = self.read_u16()? as usize;
        let raw = self.take(rdlength)?;

        let data = match (rtype, rdlength) {
            (RecordType::A, 4) => RData::A(Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3])),
            (RecordType::Aaaa, 16) => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(raw);
                RData::Aaaa(Ipv6Addr::from(octets))
            }
            _ => RData::Raw(Bytes::copy_from_slice(raw)),
        };

        Ok(Record {
            name,
            rtype,
            class,
            ttl,
            data,
        })
    }
}
