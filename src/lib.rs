//! # collectd-dissect: collectd network protocol decoder
//!
//! Decodes the binary network protocol spoken by collectd's `network` plugin: a UDP
//! datagram carrying a flat sequence of type-length-value *parts*.
//!
//! ## Wire format
//!
//! ```text
//! Packet := Part*
//! Part   := type:u16(BE) length:u16(BE) body:u8[length-4]
//! ```
//!
//! String parts (HOST, PLUGIN, TYPE, MESSAGE, ...) set *sticky* fields; a VALUES part
//! completes a metric from whatever fields were set last, a MESSAGE part completes a
//! notification the same way. Signed (HMAC-SHA-256) and encrypted (AES-256) parts are
//! decoded structurally but never verified or decrypted.
//!
//! ## Decode modes
//!
//! - **Tree** ([`frame::decode_tree`]): every part, value and assembled record.
//! - **Counts** ([`walk::walk_packet`]): a zero-copy walk that only validates layout and
//!   tallies counts, summary and statistics.
//!
//! Both modes agree on counts, summary, statistics and warnings for any input.
//!
//! ## Usage
//!
//! ```
//! use collectd_dissect::{Decoder, DecoderConfig, PacketBuilder, Value};
//!
//! let packet = PacketBuilder::new()
//!     .host("web01")
//!     .plugin("cpu")
//!     .type_name("cpu")
//!     .values(&[Value::Derive(42)])
//!     .build();
//! let decoder = Decoder::new(DecoderConfig::default()).unwrap();
//! let result = decoder.decode(&packet).unwrap();
//! assert_eq!(result.counts.parts_ok, 4);
//! assert_eq!(result.records.len(), 1);
//! ```

pub mod builder;
pub mod capture;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod dump;
pub mod frame;
pub mod part;
pub mod stats;
pub mod value;
pub mod walk;

pub use builder::PacketBuilder;
pub use codec::{decode_part_body, DecodeError, Part, PartBody, Warning};
pub use config::{ConfigError, DecodeMode, DecoderConfig, COLLECTD_UDP_PORT};
pub use cursor::ByteCursor;
pub use dispatch::{Aggregator, AssembledMetric, AssembledNotification, Record};
pub use frame::{decode_packet, Decoder, PacketCounts, PacketDecodeResult, PartError};
pub use part::{decode_part_header, encode_part_header, PartHeader, PartType, PART_HEADER_LEN};
pub use stats::{PacketStats, PacketSummary};
pub use value::{CdTime, Severity, Value};
pub use walk::{packet_extent, walk_packet, PartWalker, WalkedPart};
