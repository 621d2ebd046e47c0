//! Part body decoding: interprets the bytes after a validated [`PartHeader`].
//!
//! Each part kind has its own layout check, shared with the counts-only
//! [walk](crate::walk) so both paths accept and reject exactly the same input:
//!
//! | Part | Body |
//! |------|------|
//! | HOST, PLUGIN, PLUGIN_INSTANCE, TYPE, TYPE_INSTANCE, MESSAGE | string, at least 1 byte (NUL optional) |
//! | TIME, TIME_HR, INTERVAL, INTERVAL_HR, SEVERITY | exactly 8 bytes, big-endian u64 |
//! | VALUES | `count: u16`, `n` kind bytes, `n` 8-byte payloads, `n = (len - 2) / 9` |
//! | SIGNATURE | 32-byte HMAC-SHA-256 digest + username, at least 36 bytes |
//! | ENCRYPTED_DATA | `username_len: u16`, username, 16-byte IV, ciphertext |
//! | anything else | skipped, counted as unknown |
//!
//! Signatures are not verified and encrypted payloads are not decrypted.

use crate::config::DecoderConfig;
use crate::cursor::ByteCursor;
use crate::part::{PartHeader, PartType, PART_HEADER_LEN};
use crate::value::{
    CdTime, Severity, Value, VALUE_KIND_ABSOLUTE, VALUE_KIND_COUNTER, VALUE_KIND_DERIVE, VALUE_KIND_GAUGE,
};
use std::borrow::Cow;
use std::fmt;

/// Declared length of every integer/time part (header + u64).
pub const INTEGER_PART_LEN: usize = PART_HEADER_LEN + 8;
/// Value count prefix of a VALUES body.
pub const VALUE_COUNT_LEN: usize = 2;
/// One value: kind byte + 8 payload bytes.
pub const VALUE_ENTRY_LEN: usize = 9;
/// Smallest VALUES body: the count plus one value.
pub const VALUES_BODY_MIN_LEN: usize = VALUE_COUNT_LEN + VALUE_ENTRY_LEN;
pub const SIGNATURE_DIGEST_LEN: usize = 32;
/// Digest plus at least 4 bytes of identity.
pub const SIGNATURE_BODY_MIN_LEN: usize = SIGNATURE_DIGEST_LEN + 4;
pub const ENCRYPTION_IV_LEN: usize = 16;
/// Header, username length, IV and the 20-byte encrypted checksum.
pub const ENCRYPTED_PART_MIN_LEN: usize = 42;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Too short: needed {needed} bytes, {remaining} remaining")]
    TooShort { needed: usize, remaining: usize },
    /// A declared length disagrees with the bound it was checked against (bytes left
    /// in the packet, the fixed width of the part, or its minimum size).
    #[error("Length mismatch: declared {declared}, available {available}")]
    LengthMismatch { declared: usize, available: usize },
    /// Not fatal: unknown parts are skipped.
    #[error("Unknown part type {tag:#06x}")]
    UnknownType { tag: u16 },
    /// Not fatal: the signature is reported but never checked.
    #[error("Signature of {identity:?} not verified")]
    ChecksumMismatch { identity: String },
    #[error("Malformed: {reason}")]
    Malformed { reason: String },
    #[error("Packet too large: {len} bytes exceeds maximum {max}")]
    PacketTooLarge { len: usize, max: usize },
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::Malformed { reason: reason.into() }
    }

    /// Short tag for summaries and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::TooShort { .. } => "too-short",
            DecodeError::LengthMismatch { .. } => "length-mismatch",
            DecodeError::UnknownType { .. } => "unknown-type",
            DecodeError::ChecksumMismatch { .. } => "checksum-mismatch",
            DecodeError::Malformed { .. } => "malformed",
            DecodeError::PacketTooLarge { .. } => "packet-too-large",
        }
    }
}

/// A non-fatal anomaly; decoding continued past it.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub offset: usize,
    pub error: DecodeError,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}: {}", self.offset, self.error)
    }
}

/// Decoded body of one part.
#[derive(Debug, Clone, PartialEq)]
pub enum PartBody {
    Text(String),
    Time(CdTime),
    Interval(CdTime),
    Severity(Severity),
    Values { declared_count: u16, values: Vec<Value> },
    Signature { digest: [u8; SIGNATURE_DIGEST_LEN], identity: String },
    Encrypted { username: String, iv: [u8; ENCRYPTION_IV_LEN], ciphertext: Vec<u8> },
    Unknown(Vec<u8>),
}

/// One fully decoded part (tree mode).
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub header: PartHeader,
    pub body: PartBody,
}

impl Part {
    pub fn part_type(&self) -> PartType {
        self.header.part_type
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            PartBody::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn values(&self) -> Option<&[Value]> {
        match &self.body {
            PartBody::Values { values, .. } => Some(values),
            _ => None,
        }
    }
}

/// String body: visible text ends at the first NUL; length comes from the header.
pub(crate) fn text_payload<'a>(header: &PartHeader, body: &'a [u8]) -> Result<Cow<'a, str>, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::malformed(format!("empty {} string part", header.part_type)));
    }
    Ok(text_until_nul(body))
}

pub(crate) fn text_until_nul(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

pub(crate) fn integer_payload(header: &PartHeader, body: &[u8]) -> Result<u64, DecodeError> {
    if header.declared_length as usize != INTEGER_PART_LEN {
        return Err(DecodeError::LengthMismatch {
            declared: header.declared_length as usize,
            available: INTEGER_PART_LEN,
        });
    }
    ByteCursor::new(body).read_u64()
}

pub(crate) struct ValuesLayout<'a> {
    pub declared_count: u16,
    pub kinds: &'a [u8],
    pub payloads: &'a [u8],
}

/// Check a VALUES body and split it into kinds and payloads.
///
/// The value count is derived from the body length. A declared count that disagrees
/// is recorded once as a warning (or rejected when `strict_value_count` is set).
pub(crate) fn values_layout<'a>(
    header: &PartHeader,
    body: &'a [u8],
    config: &DecoderConfig,
    warnings: &mut Vec<Warning>,
) -> Result<ValuesLayout<'a>, DecodeError> {
    let len = body.len();
    if len < VALUES_BODY_MIN_LEN || (len - VALUE_COUNT_LEN) % VALUE_ENTRY_LEN != 0 {
        return Err(DecodeError::malformed(format!(
            "values part body of {} bytes is not a count followed by whole 9-byte values",
            len
        )));
    }
    let n = (len - VALUE_COUNT_LEN) / VALUE_ENTRY_LEN;
    let mut r = ByteCursor::new(body);
    let declared_count = r.read_u16()?;
    if declared_count as usize != n {
        if config.strict_value_count {
            return Err(DecodeError::malformed(format!(
                "value count {} disagrees with part length ({} values)",
                declared_count, n
            )));
        }
        warnings.push(Warning {
            offset: header.body_offset(),
            error: DecodeError::LengthMismatch { declared: declared_count as usize, available: n },
        });
    }
    let kinds = r.read_bytes(n)?;
    let payloads = r.read_bytes(n * 8)?;
    Ok(ValuesLayout { declared_count, kinds, payloads })
}

pub fn decode_value(kind: u8, r: &mut ByteCursor<'_>) -> Result<Value, DecodeError> {
    Ok(match kind {
        VALUE_KIND_COUNTER => Value::Counter(r.read_u64()?),
        VALUE_KIND_GAUGE => Value::Gauge(r.read_f64_le()?),
        VALUE_KIND_DERIVE => Value::Derive(r.read_i64()?),
        VALUE_KIND_ABSOLUTE => Value::Absolute(r.read_u64()?),
        other => Value::Unknown { kind: other, raw: r.read_u64()? },
    })
}

pub(crate) struct SignatureView<'a> {
    pub digest: &'a [u8],
    pub identity: Cow<'a, str>,
}

pub(crate) fn signature_view<'a>(
    header: &PartHeader,
    body: &'a [u8],
    warnings: &mut Vec<Warning>,
) -> Result<SignatureView<'a>, DecodeError> {
    if body.len() < SIGNATURE_BODY_MIN_LEN {
        return Err(DecodeError::LengthMismatch {
            declared: header.declared_length as usize,
            available: PART_HEADER_LEN + SIGNATURE_BODY_MIN_LEN,
        });
    }
    let mut r = ByteCursor::new(body);
    let digest = r.read_bytes(SIGNATURE_DIGEST_LEN)?;
    let identity = text_until_nul(r.rest());
    warnings.push(Warning {
        offset: header.offset,
        error: DecodeError::ChecksumMismatch { identity: identity.to_string() },
    });
    Ok(SignatureView { digest, identity })
}

pub(crate) struct EncryptedView<'a> {
    pub username: &'a [u8],
    pub iv: &'a [u8],
    pub ciphertext: &'a [u8],
}

pub(crate) fn encrypted_view<'a>(header: &PartHeader, body: &'a [u8]) -> Result<EncryptedView<'a>, DecodeError> {
    let declared = header.declared_length as usize;
    if declared < ENCRYPTED_PART_MIN_LEN {
        return Err(DecodeError::LengthMismatch { declared, available: ENCRYPTED_PART_MIN_LEN });
    }
    let mut r = ByteCursor::new(body);
    let username_len = r.read_u16()? as usize;
    if username_len > declared - ENCRYPTED_PART_MIN_LEN {
        return Err(DecodeError::malformed(format!(
            "username length {} exceeds encrypted part of {} bytes",
            username_len, declared
        )));
    }
    let username = r.read_bytes(username_len)?;
    let iv = r.read_bytes(ENCRYPTION_IV_LEN)?;
    Ok(EncryptedView { username, iv, ciphertext: r.rest() })
}

pub(crate) fn unknown_part(header: &PartHeader, warnings: &mut Vec<Warning>) {
    warnings.push(Warning {
        offset: header.offset,
        error: DecodeError::UnknownType { tag: header.raw_type() },
    });
}

/// Decode the body of one part. A `body` that is not exactly `header.body_length()`
/// bytes is rejected with `LengthMismatch`.
pub fn decode_part_body(
    header: &PartHeader,
    body: &[u8],
    config: &DecoderConfig,
    warnings: &mut Vec<Warning>,
) -> Result<PartBody, DecodeError> {
    if body.len() != header.body_length() || header.declared_length < PART_HEADER_LEN as u16 {
        return Err(DecodeError::LengthMismatch {
            declared: header.declared_length as usize,
            available: body.len() + PART_HEADER_LEN,
        });
    }
    match header.part_type {
        PartType::Host
        | PartType::Plugin
        | PartType::PluginInstance
        | PartType::Type
        | PartType::TypeInstance
        | PartType::Message => Ok(PartBody::Text(text_payload(header, body)?.into_owned())),
        PartType::Time => Ok(PartBody::Time(CdTime::from_legacy_seconds(integer_payload(header, body)?))),
        PartType::TimeHr => Ok(PartBody::Time(CdTime::from_raw(integer_payload(header, body)?))),
        PartType::Interval => Ok(PartBody::Interval(CdTime::from_legacy_seconds(integer_payload(header, body)?))),
        PartType::IntervalHr => Ok(PartBody::Interval(CdTime::from_raw(integer_payload(header, body)?))),
        PartType::Severity => Ok(PartBody::Severity(Severity::from(integer_payload(header, body)?))),
        PartType::Values => {
            let layout = values_layout(header, body, config, warnings)?;
            let mut r = ByteCursor::new(layout.payloads);
            let values = layout
                .kinds
                .iter()
                .map(|&kind| decode_value(kind, &mut r))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PartBody::Values { declared_count: layout.declared_count, values })
        }
        PartType::SignSha256 => {
            let view = signature_view(header, body, warnings)?;
            let mut digest = [0u8; SIGNATURE_DIGEST_LEN];
            digest.copy_from_slice(view.digest);
            Ok(PartBody::Signature { digest, identity: view.identity.into_owned() })
        }
        PartType::EncrAes256 => {
            let view = encrypted_view(header, body)?;
            let mut iv = [0u8; ENCRYPTION_IV_LEN];
            iv.copy_from_slice(view.iv);
            Ok(PartBody::Encrypted {
                username: text_until_nul(view.username).into_owned(),
                iv,
                ciphertext: view.ciphertext.to_vec(),
            })
        }
        PartType::Unknown(_) => {
            unknown_part(header, warnings);
            Ok(PartBody::Unknown(body.to_vec()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(part_type: PartType, body_len: usize) -> PartHeader {
        PartHeader { part_type, declared_length: (body_len + PART_HEADER_LEN) as u16, offset: 0 }
    }

    fn decode(part_type: PartType, body: &[u8]) -> (Result<PartBody, DecodeError>, Vec<Warning>) {
        let mut warnings = Vec::new();
        let r = decode_part_body(&header(part_type, body.len()), body, &DecoderConfig::default(), &mut warnings);
        (r, warnings)
    }

    #[test]
    fn string_stops_at_nul_but_length_is_from_header() {
        let (r, _) = decode(PartType::Host, b"web01\0junk");
        assert_eq!(r.unwrap(), PartBody::Text("web01".to_string()));
        let (r, _) = decode(PartType::Plugin, b"cpu");
        assert_eq!(r.unwrap(), PartBody::Text("cpu".to_string()));
    }

    #[test]
    fn empty_string_is_malformed() {
        let (r, _) = decode(PartType::Type, b"");
        assert!(matches!(r, Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn integer_width_must_be_eight() {
        let (r, _) = decode(PartType::TimeHr, &[0; 7]);
        assert_eq!(r, Err(DecodeError::LengthMismatch { declared: 11, available: 12 }));
        let (r, _) = decode(PartType::Severity, &[0, 0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(r.unwrap(), PartBody::Severity(Severity::Warning));
    }

    #[test]
    fn legacy_time_is_whole_seconds() {
        let (r, _) = decode(PartType::Time, &1_700_000_000u64.to_be_bytes());
        assert_eq!(r.unwrap(), PartBody::Time(CdTime { secs: 1_700_000_000, nanos: 0 }));
        let (r, _) = decode(PartType::IntervalHr, &(10u64 << 30).to_be_bytes());
        assert_eq!(r.unwrap(), PartBody::Interval(CdTime { secs: 10, nanos: 0 }));
    }

    #[test]
    fn values_kinds_precede_payloads() {
        let mut body = vec![0x00, 0x02, VALUE_KIND_GAUGE, VALUE_KIND_DERIVE];
        body.extend_from_slice(&2.25f64.to_le_bytes());
        body.extend_from_slice(&(-7i64).to_be_bytes());
        let (r, w) = decode(PartType::Values, &body);
        assert_eq!(
            r.unwrap(),
            PartBody::Values { declared_count: 2, values: vec![Value::Gauge(2.25), Value::Derive(-7)] }
        );
        assert!(w.is_empty());
    }

    #[test]
    fn unknown_value_kind_is_kept() {
        let mut body = vec![0x00, 0x01, 0x7f];
        body.extend_from_slice(&0x2au64.to_be_bytes());
        let (r, _) = decode(PartType::Values, &body);
        assert_eq!(
            r.unwrap(),
            PartBody::Values { declared_count: 1, values: vec![Value::Unknown { kind: 0x7f, raw: 0x2a }] }
        );
    }

    #[test]
    fn strict_value_count_rejects_mismatch() {
        let mut body = vec![0x00, 0x05, VALUE_KIND_COUNTER];
        body.extend_from_slice(&1u64.to_be_bytes());
        let mut warnings = Vec::new();
        let cfg = DecoderConfig::default().with_strict_value_count(true);
        let r = decode_part_body(&header(PartType::Values, body.len()), &body, &cfg, &mut warnings);
        assert!(matches!(r, Err(DecodeError::Malformed { .. })));
        assert!(warnings.is_empty());
    }

    #[test]
    fn signature_needs_thirty_six_bytes() {
        let (r, _) = decode(PartType::SignSha256, &[0u8; 35]);
        assert_eq!(r, Err(DecodeError::LengthMismatch { declared: 39, available: 40 }));
        let mut body = vec![0xab; 32];
        body.extend_from_slice(b"admin");
        let (r, w) = decode(PartType::SignSha256, &body);
        match r.unwrap() {
            PartBody::Signature { digest, identity } => {
                assert_eq!(digest, [0xab; 32]);
                assert_eq!(identity, "admin");
            }
            other => panic!("unexpected body {:?}", other),
        }
        assert_eq!(w[0].error, DecodeError::ChecksumMismatch { identity: "admin".to_string() });
    }

    #[test]
    fn encrypted_part_layout() {
        let mut body = vec![0x00, 0x03];
        body.extend_from_slice(b"bob");
        body.extend_from_slice(&[0x11; 16]);
        body.extend_from_slice(&[0x22; 20]);
        let (r, _) = decode(PartType::EncrAes256, &body);
        match r.unwrap() {
            PartBody::Encrypted { username, iv, ciphertext } => {
                assert_eq!(username, "bob");
                assert_eq!(iv, [0x11; 16]);
                assert_eq!(ciphertext, vec![0x22; 20]);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn encrypted_username_cannot_exceed_part() {
        let mut body = vec![0x00, 0x09];
        body.extend_from_slice(&[0u8; 36]);
        let (r, _) = decode(PartType::EncrAes256, &body);
        assert!(matches!(r, Err(DecodeError::Malformed { .. })));
        let (r, _) = decode(PartType::EncrAes256, &[0u8; 30]);
        assert_eq!(r, Err(DecodeError::LengthMismatch { declared: 34, available: 42 }));
    }

    #[test]
    fn unknown_part_is_kept_with_warning() {
        let (r, w) = decode(PartType::Unknown(0x4242), &[1, 2, 3]);
        assert_eq!(r.unwrap(), PartBody::Unknown(vec![1, 2, 3]));
        assert_eq!(w, vec![Warning { offset: 0, error: DecodeError::UnknownType { tag: 0x4242 } }]);
    }

    #[test]
    fn body_not_matching_header_is_rejected() {
        let mut warnings = Vec::new();
        let h = PartHeader { part_type: PartType::Host, declared_length: 8, offset: 0 };
        let r = decode_part_body(&h, b"ab", &DecoderConfig::default(), &mut warnings);
        assert_eq!(r, Err(DecodeError::LengthMismatch { declared: 8, available: 6 }));

        let h = PartHeader { part_type: PartType::Values, declared_length: 4, offset: 0 };
        let r = decode_part_body(&h, &[0u8; 11], &DecoderConfig::default(), &mut warnings);
        assert_eq!(r, Err(DecodeError::LengthMismatch { declared: 4, available: 15 }));

        let h = PartHeader { part_type: PartType::Host, declared_length: 2, offset: 0 };
        let r = decode_part_body(&h, &[], &DecoderConfig::default(), &mut warnings);
        assert_eq!(r, Err(DecodeError::LengthMismatch { declared: 2, available: 4 }));
        assert!(warnings.is_empty());
    }
}
