//! Wire-level tests for the loopback zone
//!
//! Feeds raw query bytes through decode, respond and encode, the way the
//! UDP server does.

use std::net::{Ipv4Addr, Ipv6Addr};

use bam_dns::{LocalZone, Message, RData, Rcode, RecordType, WireError};

/// Encode a single-question query by hand
fn raw_query(id: u16, name: &str, qtype: u16, qclass: u16) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&id.to_be_bytes());
    raw.extend_from_slice(&[0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        raw.push(label.len() as u8);
        raw.extend_from_slice(label.as_bytes());
    }
    raw.push(0);
    raw.extend_from_slice(&qtype.to_be_bytes());
    raw.extend_from_slice(&qclass.to_be_bytes());
    raw
}

fn exchange(zone: &LocalZone, raw: &[u8]) -> Message {
    let query = Message::decode(raw).unwrap();
    let reply = zone.respond(&query).to_bytes();
    Message::decode(&reply).unwrap()
}

#[test]
fn test_a_and_aaaa_resolve_to_loopback() {
    let zone = LocalZone::new("app");

    let reply = exchange(&zone, &raw_query(0x0101, "www.myapp.app", 1, 1));
    assert_eq!(reply.header.id, 0x0101);
    assert!(reply.header.response);
    assert!(reply.header.recursion_desired);
    assert_eq!(reply.questions[0].name, "www.myapp.app.");
    assert_eq!(reply.answers[0].data, RData::A(Ipv4Addr::LOCALHOST));

    let reply = exchange(&zone, &raw_query(0x0102, "myapp.app", 28, 1));
    assert_eq!(reply.answers[0].rtype, RecordType::Aaaa);
    assert_eq!(reply.answers[0].data, RData::Aaaa(Ipv6Addr::LOCALHOST));
}

#[test]
fn test_custom_tld() {
    let zone = LocalZone::new("dev");

    let reply = exchange(&zone, &raw_query(1, "MyApp.DEV", 1, 1));
    assert_eq!(reply.rcode(), Rcode::NoError);
    assert_eq!(reply.answers[0].name, "MyApp.DEV.");

    let reply = exchange(&zone, &raw_query(2, "myapp.app", 1, 1));
    assert_eq!(reply.rcode(), Rcode::NameError);
}

#[test]
fn test_unsupported_queries() {
    let zone = LocalZone::new("app");

    // MX
    let reply = exchange(&zone, &raw_query(3, "myapp.app", 15, 1));
    assert_eq!(reply.rcode(), Rcode::ServerFailure);
    assert!(reply.answers.is_empty());

    // CHAOS class
    let reply = exchange(&zone, &raw_query(4, "myapp.app", 1, 3));
    assert_eq!(reply.rcode(), Rcode::ServerFailure);
}

#[test]
fn test_oversized_label_is_rejected() {
    // 64 does not fit the 6-bit length field and reads as a reserved label type
    let long = "a".repeat(64);
    let mut raw = raw_query(5, "x.app", 1, 1);
    raw.truncate(12);
    raw.push(64);
    raw.extend_from_slice(long.as_bytes());
    raw.extend_from_slice(&[0, 0, 1, 0, 1]);

    assert_eq!(Message::decode(&raw), Err(WireError::InvalidLabelType(64)));
}
