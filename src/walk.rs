//! Zero-copy, structure-only walk over a collectd packet.
//!
//! The walker follows part headers and checks each body against the same layout rules as
//! the [codec](crate::codec), but never builds values, parts or records. It only borrows
//! the string bodies it needs for the summary and statistics.
//!
//! | Use case | Prefer |
//! |----------|--------|
//! | Counts, summary, statistics for many packets | [`walk_packet`] |
//! | Custom loops over raw part slices | [`PartWalker`] |
//! | Full decode for inspection/display | [`decode_tree`](crate::frame::decode_tree) |
//!
//! For any input, [`walk_packet`] reports the same counts, summary, statistics, warnings
//! and terminating error as a tree decode of the same bytes.

use crate::codec::{
    encrypted_view, integer_payload, signature_view, text_payload, unknown_part, values_layout, DecodeError,
    Warning,
};
use crate::config::{DecodeMode, DecoderConfig};
use crate::cursor::ByteCursor;
use crate::frame::{read_part, PacketDecodeResult, PartError};
use crate::part::{PartHeader, PartType};
use crate::stats::Tally;
use std::borrow::Cow;

/// One part as seen by the walker: its header and borrowed body.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkedPart<'a> {
    pub header: PartHeader,
    pub body: &'a [u8],
    /// Visible text of string parts.
    pub text: Option<Cow<'a, str>>,
}

/// Iterator over the parts of one packet. Stops after the first error.
pub struct PartWalker<'a> {
    cursor: ByteCursor<'a>,
    config: &'a DecoderConfig,
    warnings: Vec<Warning>,
    done: bool,
}

impl<'a> PartWalker<'a> {
    pub fn new(data: &'a [u8], config: &'a DecoderConfig) -> Self {
        PartWalker { cursor: ByteCursor::new(data), config, warnings: Vec::new(), done: false }
    }

    /// Offset of the next part header.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Bytes not yet walked.
    pub fn remaining(&self) -> &'a [u8] {
        self.cursor.rest()
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    fn step(&mut self) -> Result<WalkedPart<'a>, PartError> {
        let (header, body) = read_part(&mut self.cursor)?;
        let text = check_body(&header, body, self.config, &mut self.warnings).map_err(|error| PartError {
            offset: header.offset,
            part_type: Some(header.part_type),
            error,
        })?;
        Ok(WalkedPart { header, body, text })
    }
}

impl<'a> Iterator for PartWalker<'a> {
    type Item = Result<WalkedPart<'a>, PartError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor.is_empty() {
            return None;
        }
        let item = self.step();
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

/// Validate one body without decoding it; returns the text of string parts.
fn check_body<'a>(
    header: &PartHeader,
    body: &'a [u8],
    config: &DecoderConfig,
    warnings: &mut Vec<Warning>,
) -> Result<Option<Cow<'a, str>>, DecodeError> {
    match header.part_type {
        t if t.is_string() => text_payload(header, body).map(Some),
        t if t.is_integer() => integer_payload(header, body).map(|_| None),
        PartType::Values => values_layout(header, body, config, warnings).map(|_| None),
        PartType::SignSha256 => signature_view(header, body, warnings).map(|_| None),
        PartType::EncrAes256 => encrypted_view(header, body).map(|_| None),
        _ => {
            unknown_part(header, warnings);
            Ok(None)
        }
    }
}

/// Counts-mode decode of one packet.
pub fn walk_packet(bytes: &[u8], config: &DecoderConfig) -> PacketDecodeResult {
    let mut result = PacketDecodeResult::new(DecodeMode::Counts, bytes.len());
    let mut tally = Tally::default();
    let mut walker = PartWalker::new(bytes, config);

    for item in walker.by_ref() {
        match item {
            Ok(part) => {
                tally.observe(part.header.part_type, part.text.as_deref());
                result.accept(part.header.part_type);
            }
            Err(e) => result.fail(e),
        }
    }
    result.warnings = walker.into_warnings();
    result.finish(tally);
    result
}

/// Number of leading bytes covered by well-formed parts.
pub fn packet_extent(bytes: &[u8], config: &DecoderConfig) -> usize {
    let mut walker = PartWalker::new(bytes, config);
    let mut end = 0;
    for item in walker.by_ref() {
        match item {
            Ok(part) => end = part.header.offset + part.header.declared_length as usize,
            Err(_) => break,
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DecoderConfig {
        DecoderConfig::default()
    }

    #[test]
    fn walker_yields_borrowed_parts() {
        let bytes = [0x00, 0x00, 0x00, 0x07, b'a', b'b', 0x00, 0x42, 0x42, 0x00, 0x05, 0xff];
        let config = cfg();
        let parts: Vec<_> = PartWalker::new(&bytes, &config).collect();
        assert_eq!(parts.len(), 2);
        let host = parts[0].as_ref().unwrap();
        assert_eq!(host.header.part_type, PartType::Host);
        assert_eq!(host.text.as_deref(), Some("ab"));
        let unknown = parts[1].as_ref().unwrap();
        assert_eq!(unknown.header.part_type, PartType::Unknown(0x4242));
        assert_eq!(unknown.body, &[0xff]);
    }

    #[test]
    fn walker_stops_after_error() {
        let bytes = [0x00, 0x02, 0x00, 0x02, 0x00, 0x00, 0x00, 0x05, b'x'];
        let config = cfg();
        let mut walker = PartWalker::new(&bytes, &config);
        let first = walker.next().unwrap().unwrap_err();
        assert_eq!(first.offset, 0);
        assert_eq!(first.part_type, Some(PartType::Plugin));
        assert!(walker.next().is_none());
        assert_eq!(walker.position(), 0);
    }

    #[test]
    fn walk_counts_without_parts() {
        let bytes = [0x00, 0x00, 0x00, 0x07, b'a', b'b', 0x00];
        let r = walk_packet(&bytes, &cfg());
        assert_eq!(r.mode, DecodeMode::Counts);
        assert_eq!(r.counts.parts_ok, 1);
        assert!(r.parts.is_empty());
        assert_eq!(r.summary.host.as_deref(), Some("ab"));
    }

    #[test]
    fn extent_stops_at_bad_part() {
        let bytes = [0x00, 0x00, 0x00, 0x05, b'a', 0x00, 0x06, 0x00, 0x08, 0xab, 0xcd, 0xef, 0x01];
        assert_eq!(packet_extent(&bytes, &cfg()), 5);
        assert_eq!(packet_extent(&bytes[..5], &cfg()), 5);
        assert_eq!(packet_extent(&[], &cfg()), 0);
    }
}
