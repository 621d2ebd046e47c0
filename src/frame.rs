//! Packet loop: decode one datagram as a sequence of parts.
//!
//! Each iteration reads a part header, then hands the body to the dispatcher. The first
//! structural failure ends the packet: once a length field is wrong there is no safe way
//! to find the next part boundary, so nothing after it is trusted. Unknown part types
//! and non-fatal anomalies do not stop the loop.
//!
//! [`DecodeMode::Tree`] keeps every decoded part and assembled record;
//! [`DecodeMode::Counts`] runs the structure-only [walk](crate::walk) and keeps only the
//! counters. Both report the same counts, summary, statistics and warnings.

use crate::codec::{decode_part_body, DecodeError, Part, Warning};
use crate::config::{ConfigError, DecodeMode, DecoderConfig};
use crate::cursor::ByteCursor;
use crate::dispatch::{Aggregator, Record};
use crate::part::{decode_part_header, PartHeader, PartType};
use crate::stats::{PacketStats, PacketSummary, Tally};
use crate::walk::walk_packet;
use std::fmt;

/// Per-packet part tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketCounts {
    pub parts_ok: u64,
    pub parts_error: u64,
    pub parts_unknown: u64,
    pub records_emitted: u64,
}

impl PacketCounts {
    pub fn merge(&mut self, other: &PacketCounts) {
        self.parts_ok += other.parts_ok;
        self.parts_error += other.parts_error;
        self.parts_unknown += other.parts_unknown;
        self.records_emitted += other.records_emitted;
    }
}

/// The failure that ended a packet.
#[derive(Debug, Clone, PartialEq)]
pub struct PartError {
    /// Offset of the offending part's header.
    pub offset: usize,
    /// Type of the offending part, when at least its tag could be read.
    pub part_type: Option<PartType>,
    pub error: DecodeError,
}

impl fmt::Display for PartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.part_type {
            Some(t) => write!(f, "{} part at offset {}: {}", t, self.offset, self.error),
            None => write!(f, "offset {}: {}", self.offset, self.error),
        }
    }
}

impl std::error::Error for PartError {}

/// Outcome of decoding one packet. Partial results survive a fatal part error.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketDecodeResult {
    pub mode: DecodeMode,
    /// Length of the input buffer.
    pub len: usize,
    pub counts: PacketCounts,
    pub summary: PacketSummary,
    pub stats: PacketStats,
    pub warnings: Vec<Warning>,
    pub error: Option<PartError>,
    /// Decoded parts, in wire order (tree mode only).
    pub parts: Vec<Part>,
    /// Assembled metrics and notifications, in wire order (tree mode only).
    pub records: Vec<Record>,
}

impl PacketDecodeResult {
    pub(crate) fn new(mode: DecodeMode, len: usize) -> Self {
        PacketDecodeResult {
            mode,
            len,
            counts: PacketCounts::default(),
            summary: PacketSummary::default(),
            stats: PacketStats::default(),
            warnings: Vec::new(),
            error: None,
            parts: Vec::new(),
            records: Vec::new(),
        }
    }

    /// True when every byte of the packet was consumed without a fatal error.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn accept(&mut self, part_type: PartType) {
        if part_type.is_known() {
            self.counts.parts_ok += 1;
        } else {
            self.counts.parts_unknown += 1;
        }
        if part_type.is_terminal() {
            self.counts.records_emitted += 1;
        }
    }

    pub(crate) fn fail(&mut self, err: PartError) {
        tracing::debug!(
            offset = err.offset,
            part_type = ?err.part_type,
            error = %err.error,
            "collectd part rejected, dropping rest of packet"
        );
        self.counts.parts_error += 1;
        self.error = Some(err);
    }

    pub(crate) fn finish(&mut self, tally: Tally) {
        self.summary = tally.summary;
        self.stats = tally.stats;
        for w in &self.warnings {
            tracing::debug!(offset = w.offset, kind = w.error.kind(), "{}", w.error);
        }
        tracing::trace!(
            mode = %self.mode,
            len = self.len,
            parts_ok = self.counts.parts_ok,
            parts_unknown = self.counts.parts_unknown,
            parts_error = self.counts.parts_error,
            warnings = self.warnings.len(),
            "collectd packet decoded"
        );
    }
}

/// Read the next header and borrow its body, leaving the cursor after the part.
pub(crate) fn read_part<'a>(cursor: &mut ByteCursor<'a>) -> Result<(PartHeader, &'a [u8]), PartError> {
    let offset = cursor.position();
    let header = decode_part_header(cursor).map_err(|error| PartError {
        offset,
        part_type: cursor.peek_u16().ok().map(PartType::from_u16),
        error,
    })?;
    let body = cursor.read_bytes(header.body_length()).map_err(|error| PartError {
        offset,
        part_type: Some(header.part_type),
        error,
    })?;
    Ok((header, body))
}

/// Full decode of one packet.
pub fn decode_tree(bytes: &[u8], config: &DecoderConfig) -> PacketDecodeResult {
    let mut result = PacketDecodeResult::new(DecodeMode::Tree, bytes.len());
    let mut cursor = ByteCursor::new(bytes);
    let mut aggregator = Aggregator::new();
    let mut tally = Tally::default();

    while !cursor.is_empty() {
        let (header, body) = match read_part(&mut cursor) {
            Ok(p) => p,
            Err(e) => {
                result.fail(e);
                break;
            }
        };
        tracing::trace!(offset = header.offset, part_type = %header.part_type, len = header.declared_length, "part");
        match decode_part_body(&header, body, config, &mut result.warnings) {
            Ok(body) => {
                let part = Part { header, body };
                tally.observe(header.part_type, part.text());
                result.accept(header.part_type);
                if let Some(record) = aggregator.apply(&part) {
                    result.records.push(record);
                }
                result.parts.push(part);
            }
            Err(error) => {
                result.fail(PartError { offset: header.offset, part_type: Some(header.part_type), error });
                break;
            }
        }
    }
    result.finish(tally);
    result
}

/// Packet decoder holding a validated configuration. Cheap to share across threads.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Decoder { config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode in the configured mode.
    pub fn decode(&self, bytes: &[u8]) -> Result<PacketDecodeResult, DecodeError> {
        match self.config.mode {
            DecodeMode::Tree => self.decode_tree(bytes),
            DecodeMode::Counts => self.decode_counts(bytes),
        }
    }

    pub fn decode_tree(&self, bytes: &[u8]) -> Result<PacketDecodeResult, DecodeError> {
        self.check_len(bytes)?;
        Ok(decode_tree(bytes, &self.config))
    }

    pub fn decode_counts(&self, bytes: &[u8]) -> Result<PacketDecodeResult, DecodeError> {
        self.check_len(bytes)?;
        Ok(walk_packet(bytes, &self.config))
    }

    fn check_len(&self, bytes: &[u8]) -> Result<(), DecodeError> {
        if bytes.len() > self.config.max_packet_len {
            return Err(DecodeError::PacketTooLarge { len: bytes.len(), max: self.config.max_packet_len });
        }
        Ok(())
    }
}

/// Decode one packet with the default configuration (tree mode).
pub fn decode_packet(bytes: &[u8]) -> Result<PacketDecodeResult, DecodeError> {
    Decoder::default().decode(bytes)
}
