//! Loopback zone for the local top-level domain
//!
//! Every A/AAAA name under the zone resolves to loopback. The zone does not
//! know which apps exist: the proxy decides which backend a name reaches.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::header::{Opcode, Rcode};
use crate::message::{Message, RData, Record, RecordType, CLASS_IN};

/// TTL of every answer, in seconds
pub const DEFAULT_TTL: u32 = 30;

/// Answers queries for `*.<tld>.` with loopback addresses
#[derive(Debug, Clone)]
pub struct LocalZone {
    /// Qualified suffix in the form `.tld.`, lowercase
    suffix: String,
    ttl: u32,
}

impl LocalZone {
    /// Create a zone for `tld` (`app`, `.app` and `app.` are equivalent)
    pub fn new(tld: &str) -> Self {
        let tld = tld.trim_matches('.').to_ascii_lowercase();
        Self {
            suffix: format!(".{}.", tld),
            ttl: DEFAULT_TTL,
        }
    }

    /// The qualified suffix, e.g. `.app.`
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether `name` lies under the zone
    pub fn contains(&self, name: &str) -> bool {
        let mut name = name.to_ascii_lowercase();
        if !name.ends_with('.') {
            name.push('.');
        }
        name.ends_with(&self.suffix)
    }

    /// Compute the reply for a decoded query
    pub fn respond(&self, query: &Message) -> Message {
        if query.opcode() != Opcode::Query || query.questions.len() != 1 {
            tracing::debug!(
                "Rejecting query {}: opcode {:?}, {} questions",
                query.header.id,
                query.opcode(),
                query.questions.len()
            );
            return Message::reply_with_rcode(query, Rcode::ServerFailure);
        }

        let question = &query.questions[0];
        let supported = matches!(question.qtype, RecordType::A | RecordType::Aaaa);
        if question.qclass != CLASS_IN || !supported {
            tracing::debug!(
                "Rejecting query for {}: type {:?}, class {}",
                question.name,
                question.qtype,
                question.qclass
            );
            return Message::reply_with_rcode(query, Rcode::ServerFailure);
        }

        if !self.contains(&question.name) {
            tracing::debug!("{} is outside {}", question.name, self.suffix);
            return Message::reply_with_rcode(query, Rcode::NameError);
        }

        let data = match question.qtype {
            RecordType::A => RData::A(Ipv4Addr::LOCALHOST),
            _ => RData::Aaaa(Ipv6Addr::LOCALHOST),
        };

        let mut reply = Message::reply_to(query);
        reply.header.authoritative = true;
        reply.answers.push(Record {
            name: question.name.clone(),
            rtype: question.qtype,
            class: CLASS_IN,
            ttl: self.ttl,
            data,
        });
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Question;

    fn zone() -> LocalZone {
        LocalZone::new("app")
    }

    #[test]
    fn test_a_query_answers_ipv4_loopback() {
        let query = Message::query(1, "anything.myapp.app.", RecordType::A);
        let reply = zone().respond(&query);

        assert_eq!(reply.rcode(), Rcode::NoError);
        assert!(reply.header.response);
        assert!(reply.header.authoritative);
        assert_eq!(reply.answers.len(), 1);
        assert_eq!(reply.answers[0].name, "anything.myapp.app.");
        assert_eq!(reply.answers[0].ttl, DEFAULT_TTL);
        assert_eq!(reply.answers[0].data, RData::A(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_aaaa_query_answers_ipv6_loopback() {
        let query = Message::query(2, "myapp.app", RecordType::Aaaa);
        let reply = zone().respond(&query);

        assert_eq!(reply.rcode(), Rcode::NoError);
        assert_eq!(reply.answers[0].rtype, RecordType::Aaaa);
        assert_eq!(reply.answers[0].data, RData::Aaaa(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_answer_ignores_subdomain_depth() {
        for name in ["a.app.", "b.a.app.", "x.y.z.a.app."] {
            let reply = zone().respond(&Message::query(3, name, RecordType::A));
            assert_eq!(reply.answers.len(), 1, "{}", name);
        }
    }

    #[test]
    fn test_wrong_tld_is_nxdomain() {
        let reply = zone().respond(&Message::query(4, "myapp.other.", RecordType::A));
        assert_eq!(reply.rcode(), Rcode::NameError);
        assert!(reply.answers.is_empty());
        assert_eq!(reply.questions.len(), 1);
    }

    #[test]
    fn test_bare_tld_and_lookalike_are_nxdomain() {
        assert!(!zone().contains("app."));
        assert!(!zone().contains("myapp."));
        assert!(!zone().contains("foo.happ."));
    }

    #[test]
    fn test_case_insensitive_match() {
        assert!(zone().contains("MyApp.APP."));
        assert!(LocalZone::new(".Dev.").contains("site.dev"));
    }

    #[test]
    fn test_unsupported_type_is_servfail() {
        let query = Message::query(5, "myapp.app.", RecordType::Other(15));
        assert_eq!(zone().respond(&query).rcode(), Rcode::ServerFailure);
    }

    #[test]
    fn test_non_in_class_is_servfail() {
        let mut query = Message::query(6, "myapp.app.", RecordType::A);
        query.questions[0].qclass = 3;
        assert_eq!(zone().respond(&query).rcode(), Rcode::ServerFailure);
    }

    #[test]
    fn test_question_count_must_be_one() {
        let mut empty = Message::query(7, "myapp.app.", RecordType::A);
        empty.questions.clear();
        assert_eq!(zone().respond(&empty).rcode(), Rcode::ServerFailure);

        let mut two = Message::query(8, "myapp.app.", RecordType::A);
        two.questions.push(Question::new("other.app.", RecordType::A));
        assert_eq!(zone().respond(&two).rcode(), Rcode::ServerFailure);
    }

    #[test]
    fn test_non_query_opcode_is_servfail() {
        let mut query = Message::query(9, "myapp.app.", RecordType::A);
        query.header.opcode = Opcode::Other(4);
        let reply = zone().respond(&query);
        assert_eq!(reply.rcode(), Rcode::ServerFailure);
        assert_eq!(reply.opcode(), Opcode::Other(4));
    }
}
