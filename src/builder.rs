//! Packet builder: assembles collectd parts into a datagram.
//!
//! Used by tests, benchmarks and the fuzz corpus. It writes exactly what it is told, so
//! it can also produce deliberately broken parts ([`PacketBuilder::raw_part`],
//! [`PacketBuilder::values_with_count`]).

use crate::codec::{ENCRYPTION_IV_LEN, SIGNATURE_DIGEST_LEN};
use crate::part::{encode_part_header, PartType, PART_HEADER_LEN};
use crate::value::{Severity, Value};
use byteorder::{BigEndian, WriteBytesExt};

#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    buf: Vec<u8>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part with the given body. The declared length saturates at `u16::MAX`.
    pub fn raw_part(mut self, part_type: PartType, body: &[u8]) -> Self {
        let len = (body.len() + PART_HEADER_LEN).min(u16::MAX as usize) as u16;
        self.buf.extend_from_slice(&encode_part_header(part_type, len));
        self.buf.extend_from_slice(body);
        self
    }

    /// Append bytes verbatim.
    pub fn raw_bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn string(self, part_type: PartType, s: &str) -> Self {
        let mut body = Vec::with_capacity(s.len() + 1);
        body.extend_from_slice(s.as_bytes());
        body.push(0);
        self.raw_part(part_type, &body)
    }

    fn integer(self, part_type: PartType, v: u64) -> Self {
        self.raw_part(part_type, &v.to_be_bytes())
    }

    pub fn host(self, s: &str) -> Self {
        self.string(PartType::Host, s)
    }

    pub fn plugin(self, s: &str) -> Self {
        self.string(PartType::Plugin, s)
    }

    pub fn plugin_instance(self, s: &str) -> Self {
        self.string(PartType::PluginInstance, s)
    }

    pub fn type_name(self, s: &str) -> Self {
        self.string(PartType::Type, s)
    }

    pub fn type_instance(self, s: &str) -> Self {
        self.string(PartType::TypeInstance, s)
    }

    pub fn message(self, s: &str) -> Self {
        self.string(PartType::Message, s)
    }

    /// Legacy TIME part, whole seconds.
    pub fn time(self, secs: u64) -> Self {
        self.integer(PartType::Time, secs)
    }

    /// TIME_HR part from a raw 2^-30 s count.
    pub fn time_hr(self, raw: u64) -> Self {
        self.integer(PartType::TimeHr, raw)
    }

    pub fn interval(self, secs: u64) -> Self {
        self.integer(PartType::Interval, secs)
    }

    pub fn interval_hr(self, raw: u64) -> Self {
        self.integer(PartType::IntervalHr, raw)
    }

    pub fn severity(self, s: Severity) -> Self {
        self.integer(PartType::Severity, s.as_u64())
    }

    /// VALUES part with a count matching `values`.
    pub fn values(self, values: &[Value]) -> Self {
        let n = values.len().min(u16::MAX as usize) as u16;
        self.values_with_count(n, values)
    }

    /// VALUES part with an arbitrary declared count.
    pub fn values_with_count(self, count: u16, values: &[Value]) -> Self {
        let mut body = Vec::with_capacity(2 + values.len() * 9);
        body.extend_from_slice(&count.to_be_bytes());
        body.extend(values.iter().map(Value::kind));
        for v in values {
            body.extend_from_slice(&v.to_wire());
        }
        self.raw_part(PartType::Values, &body)
    }

    pub fn signature(self, digest: &[u8; SIGNATURE_DIGEST_LEN], username: &str) -> Self {
        let mut body = Vec::with_capacity(SIGNATURE_DIGEST_LEN + username.len());
        body.extend_from_slice(digest);
        body.extend_from_slice(username.as_bytes());
        self.raw_part(PartType::SignSha256, &body)
    }

    pub fn encrypted(self, username: &str, iv: &[u8; ENCRYPTION_IV_LEN], ciphertext: &[u8]) -> Self {
        let mut body = Vec::with_capacity(2 + username.len() + ENCRYPTION_IV_LEN + ciphertext.len());
        let name_len = username.len().min(u16::MAX as usize);
        // Writing into a Vec cannot fail.
        let _ = body.write_u16::<BigEndian>(name_len as u16);
        body.extend_from_slice(&username.as_bytes()[..name_len]);
        body.extend_from_slice(iv);
        body.extend_from_slice(ciphertext);
        self.raw_part(PartType::EncrAes256, &body)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}
