//! Per-packet summary and statistics tallies (values by host, plugin and type).
//!
//! Both decode modes feed the same [`Tally`], so tree and counts passes agree on every
//! number reported here.
//!
//! Only parts that decode successfully are tallied: a VALUES part that fails adds nothing
//! to the value count or the host/plugin/type pivots. Wireshark's collectd stats tree
//! ticks those before the part is validated, so its numbers can be higher on bad input.

use crate::part::PartType;
use std::collections::BTreeMap;

/// Label tallied when a sticky field was never set.
pub const NULL_LABEL: &str = "(null)";

/// The numbers behind the one-line packet summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketSummary {
    /// First HOST seen in the packet.
    pub host: Option<String>,
    pub values: u64,
    pub plugins: u64,
    pub messages: u64,
}

/// Value-list tallies; merge across packets for capture-wide statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketStats {
    pub values_num: u64,
    pub hosts: BTreeMap<String, u64>,
    pub plugins: BTreeMap<String, u64>,
    pub types: BTreeMap<String, u64>,
}

impl PacketStats {
    pub fn account(&mut self, host: Option<&str>, plugin: Option<&str>, type_name: Option<&str>) {
        self.values_num += 1;
        *self.hosts.entry(host.unwrap_or(NULL_LABEL).to_string()).or_insert(0) += 1;
        *self.plugins.entry(plugin.unwrap_or(NULL_LABEL).to_string()).or_insert(0) += 1;
        *self.types.entry(type_name.unwrap_or(NULL_LABEL).to_string()).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &PacketStats) {
        self.values_num += other.values_num;
        for (dst, src) in [
            (&mut self.hosts, &other.hosts),
            (&mut self.plugins, &other.plugins),
            (&mut self.types, &other.types),
        ] {
            for (k, n) in src {
                *dst.entry(k.clone()).or_insert(0) += n;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values_num == 0
    }
}

/// Running tally for one packet.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub summary: PacketSummary,
    pub stats: PacketStats,
    host: Option<String>,
    plugin: Option<String>,
    type_name: Option<String>,
}

impl Tally {
    /// Record one successfully decoded part. `text` is the string body, if any.
    pub fn observe(&mut self, part_type: PartType, text: Option<&str>) {
        match part_type {
            PartType::Host => {
                if self.summary.host.is_none() {
                    self.summary.host = text.map(str::to_string);
                }
                self.host = text.map(str::to_string);
            }
            PartType::Plugin => {
                self.plugin = text.map(str::to_string);
                self.summary.plugins += 1;
            }
            PartType::Type => self.type_name = text.map(str::to_string),
            PartType::Values => {
                self.summary.values += 1;
                self.stats
                    .account(self.host.as_deref(), self.plugin.as_deref(), self.type_name.as_deref());
            }
            PartType::Message => self.summary.messages += 1,
            _ => {}
        }
    }
}
