//! Decoder configuration.

use std::fmt;
use std::str::FromStr;

/// Registered collectd network plugin port.
pub const COLLECTD_UDP_PORT: u16 = 25826;

/// Largest buffer accepted by [`Decoder::decode`](crate::Decoder::decode) by default.
pub const DEFAULT_MAX_PACKET_LEN: usize = 65_535;

/// How much work a decode pass does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Full decode: parts, assembled records, counts.
    #[default]
    Tree,
    /// Structure-only walk: counts, summary and statistics, no decoded parts.
    Counts,
}

impl FromStr for DecodeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tree" => Ok(DecodeMode::Tree),
            "counts" | "count" => Ok(DecodeMode::Counts),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecodeMode::Tree => "tree",
            DecodeMode::Counts => "counts",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max packet length {0} is smaller than one part header")]
    MaxPacketLenTooSmall(usize),
    #[error("UDP port must be non-zero")]
    ZeroPort,
    #[error("unknown decode mode {0:?} (expected tree or counts)")]
    UnknownMode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    pub mode: DecodeMode,
    /// Port whose UDP payloads are treated as collectd traffic (capture reading only).
    pub udp_port: u16,
    pub max_packet_len: usize,
    /// Reject VALUES parts whose declared count disagrees with their length, instead of
    /// warning and trusting the length.
    pub strict_value_count: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            mode: DecodeMode::Tree,
            udp_port: COLLECTD_UDP_PORT,
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
            strict_value_count: false,
        }
    }
}

impl DecoderConfig {
    pub fn with_mode(mut self, mode: DecodeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_udp_port(mut self, port: u16) -> Self {
        self.udp_port = port;
        self
    }

    pub fn with_max_packet_len(mut self, len: usize) -> Self {
        self.max_packet_len = len;
        self
    }

    pub fn with_strict_value_count(mut self, strict: bool) -> Self {
        self.strict_value_count = strict;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_packet_len < crate::part::PART_HEADER_LEN {
            return Err(ConfigError::MaxPacketLenTooSmall(self.max_packet_len));
        }
        if self.udp_port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        Ok(())
    }
}
