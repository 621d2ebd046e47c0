//! Part header: the 4-byte `{type: u16, length: u16}` prefix of every collectd part.
//!
//! ```text
//! Packet := Part*
//! Part   := type:u16(BE) length:u16(BE) body:u8[length-4]
//! ```
//!
//! The declared length covers the header itself, so the smallest legal part is 4 bytes
//! with an empty body.

use crate::codec::DecodeError;
use crate::cursor::ByteCursor;
use std::fmt;

/// Size of the type + length header.
pub const PART_HEADER_LEN: usize = 4;

/// Part type tags understood by this decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartType {
    Host,
    Time,
    Plugin,
    PluginInstance,
    Type,
    TypeInstance,
    Values,
    Interval,
    TimeHr,
    IntervalHr,
    Message,
    Severity,
    SignSha256,
    EncrAes256,
    Unknown(u16),
}

impl PartType {
    pub fn from_u16(raw: u16) -> Self {
        match raw {
            0x0000 => PartType::Host,
            0x0001 => PartType::Time,
            0x0002 => PartType::Plugin,
            0x0003 => PartType::PluginInstance,
            0x0004 => PartType::Type,
            0x0005 => PartType::TypeInstance,
            0x0006 => PartType::Values,
            0x0007 => PartType::Interval,
            0x0008 => PartType::TimeHr,
            0x0009 => PartType::IntervalHr,
            0x0100 => PartType::Message,
            0x0101 => PartType::Severity,
            0x0200 => PartType::SignSha256,
            0x0210 => PartType::EncrAes256,
            other => PartType::Unknown(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            PartType::Host => 0x0000,
            PartType::Time => 0x0001,
            PartType::Plugin => 0x0002,
            PartType::PluginInstance => 0x0003,
            PartType::Type => 0x0004,
            PartType::TypeInstance => 0x0005,
            PartType::Values => 0x0006,
            PartType::Interval => 0x0007,
            PartType::TimeHr => 0x0008,
            PartType::IntervalHr => 0x0009,
            PartType::Message => 0x0100,
            PartType::Severity => 0x0101,
            PartType::SignSha256 => 0x0200,
            PartType::EncrAes256 => 0x0210,
            PartType::Unknown(raw) => raw,
        }
    }

    /// Name as shown in the tree view.
    pub fn name(self) -> &'static str {
        match self {
            PartType::Host => "HOST",
            PartType::Time => "TIME",
            PartType::Plugin => "PLUGIN",
            PartType::PluginInstance => "PLUGIN_INSTANCE",
            PartType::Type => "TYPE",
            PartType::TypeInstance => "TYPE_INSTANCE",
            PartType::Values => "VALUES",
            PartType::Interval => "INTERVAL",
            PartType::TimeHr => "TIME_HR",
            PartType::IntervalHr => "INTERVAL_HR",
            PartType::Message => "MESSAGE",
            PartType::Severity => "SEVERITY",
            PartType::SignSha256 => "SIGNATURE",
            PartType::EncrAes256 => "ENCRYPTED_DATA",
            PartType::Unknown(_) => "UNKNOWN",
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, PartType::Unknown(_))
    }

    /// Parts whose body is a string.
    pub fn is_string(self) -> bool {
        matches!(
            self,
            PartType::Host
                | PartType::Plugin
                | PartType::PluginInstance
                | PartType::Type
                | PartType::TypeInstance
                | PartType::Message
        )
    }

    /// Parts whose body is a single 64-bit integer.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            PartType::Time | PartType::TimeHr | PartType::Interval | PartType::IntervalHr | PartType::Severity
        )
    }

    /// Parts that complete a record (a metric or a notification).
    pub fn is_terminal(self) -> bool {
        matches!(self, PartType::Values | PartType::Message)
    }
}

impl From<u16> for PartType {
    fn from(raw: u16) -> Self {
        PartType::from_u16(raw)
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated part header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartHeader {
    pub part_type: PartType,
    /// Length as declared on the wire, header included.
    pub declared_length: u16,
    /// Offset of the header's first byte within the packet.
    pub offset: usize,
}

impl PartHeader {
    pub fn raw_type(&self) -> u16 {
        self.part_type.to_u16()
    }

    /// Zero for a hand-built header whose length cannot even cover itself.
    pub fn body_length(&self) -> usize {
        (self.declared_length as usize).saturating_sub(PART_HEADER_LEN)
    }

    /// Offset of the first body byte within the packet.
    pub fn body_offset(&self) -> usize {
        self.offset + PART_HEADER_LEN
    }
}

/// Decode and validate the header at the cursor.
///
/// On success the cursor sits at the start of the body (exactly 4 bytes consumed). On
/// failure nothing is consumed.
pub fn decode_part_header(cursor: &mut ByteCursor<'_>) -> Result<PartHeader, DecodeError> {
    let offset = cursor.position();
    let remaining = cursor.remaining();
    if remaining < PART_HEADER_LEN {
        return Err(DecodeError::TooShort { needed: PART_HEADER_LEN, remaining });
    }
    let raw_type = cursor.peek_u16()?;
    let declared_length = cursor.peek_u16_at(2)?;
    // `remaining` counts the header too, so this is `declared > 4 + body bytes left`.
    if (declared_length as usize) < PART_HEADER_LEN || declared_length as usize > remaining {
        return Err(DecodeError::LengthMismatch {
            declared: declared_length as usize,
            available: remaining,
        });
    }
    cursor.skip(PART_HEADER_LEN)?;
    Ok(PartHeader {
        part_type: PartType::from_u16(raw_type),
        declared_length,
        offset,
    })
}

/// Encode a part header; the inverse of [`decode_part_header`].
pub fn encode_part_header(part_type: PartType, declared_length: u16) -> [u8; PART_HEADER_LEN] {
    let t = part_type.to_u16().to_be_bytes();
    let l = declared_length.to_be_bytes();
    [t[0], t[1], l[0], l[1]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_leaves_cursor_at_body() {
        let data = [0x00, 0x02, 0x00, 0x08, b'c', b'p', b'u', 0x00];
        let mut c = ByteCursor::new(&data);
        let h = decode_part_header(&mut c).unwrap();
        assert_eq!(h.part_type, PartType::Plugin);
        assert_eq!(h.declared_length, 8);
        assert_eq!(h.body_length(), 4);
        assert_eq!(h.body_offset(), 4);
        assert_eq!(c.position(), 4);
    }

    #[test]
    fn declared_length_below_header_is_rejected() {
        let data = [0x00, 0x00, 0x00, 0x03, 0xff];
        let mut c = ByteCursor::new(&data);
        assert_eq!(
            decode_part_header(&mut c),
            Err(DecodeError::LengthMismatch { declared: 3, available: 5 })
        );
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn declared_length_beyond_buffer_is_rejected() {
        let data = [0x00, 0x00, 0x00, 0x09, b'a', b'b'];
        let mut c = ByteCursor::new(&data);
        assert!(matches!(
            decode_part_header(&mut c),
            Err(DecodeError::LengthMismatch { declared: 9, available: 6 })
        ));
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn empty_body_is_legal_at_header_level() {
        let data = [0x12, 0x34, 0x00, 0x04];
        let mut c = ByteCursor::new(&data);
        let h = decode_part_header(&mut c).unwrap();
        assert_eq!(h.part_type, PartType::Unknown(0x1234));
        assert_eq!(h.body_length(), 0);
        assert!(c.is_empty());
    }

    #[test]
    fn undersized_declared_length_has_empty_body() {
        let h = PartHeader { part_type: PartType::Host, declared_length: 2, offset: 10 };
        assert_eq!(h.body_length(), 0);
    }

    #[test]
    fn fewer_than_four_bytes_is_too_short() {
        let mut c = ByteCursor::new(&[0x00, 0x06, 0x00]);
        assert_eq!(
            decode_part_header(&mut c),
            Err(DecodeError::TooShort { needed: 4, remaining: 3 })
        );
    }

    #[test]
    fn type_tags_round_trip() {
        for raw in [0x0000u16, 0x0001, 0x0006, 0x0009, 0x0100, 0x0101, 0x0200, 0x0210, 0x7777] {
            assert_eq!(PartType::from_u16(raw).to_u16(), raw);
        }
        assert_eq!(encode_part_header(PartType::Values, 15), [0x00, 0x06, 0x00, 0x0f]);
        assert_eq!(PartType::SignSha256.to_string(), "SIGNATURE");
    }
}
