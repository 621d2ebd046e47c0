//! Text rendering of decoded packets: the per-part tree, the one-line summary and hex dumps.

use crate::codec::{DecodeError, Part, PartBody};
use crate::dispatch::{AssembledMetric, AssembledNotification, Record};
use crate::frame::{PacketDecodeResult, PartError};
use crate::stats::NULL_LABEL;
use std::fmt::Write as _;
use std::io::{self, Write};

fn plural<'a>(n: u64, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

/// One-line packet summary, e.g. `Host=web01,  2 values for 1 plugin,  0 messages`.
pub fn summary_line(result: &PacketDecodeResult) -> String {
    let s = &result.summary;
    let errors = result.counts.parts_error;
    let unknown = result.counts.parts_unknown;
    let mut line = format!(
        "Host={}, {:2} value{} for {} plugin{} {} message",
        s.host.as_deref().unwrap_or(NULL_LABEL),
        s.values,
        plural(s.values, " ", "s"),
        s.plugins,
        plural(s.plugins, ", ", "s,"),
        s.messages,
    );
    if errors == 0 && unknown == 0 {
        line.push_str(plural(s.messages, "", "s"));
        return line;
    }
    line.push_str(plural(s.messages, ", ", "s,"));
    if unknown > 0 {
        let _ = write!(line, " {} unknown", unknown);
        if errors > 0 {
            line.push(',');
        }
    }
    if errors > 0 {
        let _ = write!(line, " {} error{}", errors, plural(errors, "", "s"));
    }
    line
}

fn part_line(part: &Part) -> String {
    let name = part.part_type().name();
    match &part.body {
        PartBody::Text(s) => format!("collectd {} segment: {:?}", name, s),
        PartBody::Time(t) | PartBody::Interval(t) => format!("collectd {} segment: {}", name, t),
        PartBody::Severity(s) => format!("collectd {} segment: {}", name, s),
        PartBody::Values { declared_count, values } => {
            let n = *declared_count as u64;
            if values.len() as u64 != n {
                format!(
                    "collectd {} segment: {} ({}) value{} <BAD>",
                    name,
                    declared_count,
                    values.len(),
                    plural(n, "", "s")
                )
            } else {
                format!("collectd {} segment: {} value{}", name, declared_count, plural(n, "", "s"))
            }
        }
        PartBody::Signature { identity, .. } => {
            format!("collectd {} segment: HMAC-SHA-256 (username {:?})", name, identity)
        }
        PartBody::Encrypted { username, ciphertext, .. } => format!(
            "collectd {} segment: AES-256 (username {:?}, {} encrypted bytes)",
            name,
            username,
            ciphertext.len()
        ),
        PartBody::Unknown(bytes) => format!(
            "collectd {} ({:#06x}) segment: {} bytes",
            name,
            part.header.raw_type(),
            bytes.len()
        ),
    }
}

fn error_line(err: &PartError) -> String {
    match (&err.error, err.part_type) {
        (DecodeError::TooShort { remaining, .. }, _) => {
            format!("Garbage at end of packet: Length = {} <BAD>", remaining)
        }
        (e, Some(t)) => format!("collectd {} segment: <BAD> {}", t.name(), e),
        (e, None) => format!("collectd segment: <BAD> {}", e),
    }
}

fn push_metric(out: &mut String, m: &AssembledMetric) {
    let _ = writeln!(out, "  Assembled metric: {}", m.identifier());
    if let Some(t) = &m.time {
        let _ = writeln!(out, "    time: {}", t);
    }
    if let Some(i) = &m.interval {
        let _ = writeln!(out, "    interval: {}", i);
    }
}

fn push_notification(out: &mut String, n: &AssembledNotification) {
    let _ = writeln!(out, "  Assembled notification:");
    let _ = writeln!(out, "    host: {}", n.host.as_deref().unwrap_or(NULL_LABEL));
    if let Some(t) = &n.time {
        let _ = writeln!(out, "    time: {}", t);
    }
    if let Some(s) = &n.severity {
        let _ = writeln!(out, "    severity: {}", s);
    }
    let _ = writeln!(out, "    message: {:?}", n.message);
}

/// Render one packet as a tree: a line per part, nested values and assembled records,
/// then the terminating error and any warnings.
pub fn render_tree(result: &PacketDecodeResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary_line(result));
    let mut records = result.records.iter();
    for part in &result.parts {
        let _ = writeln!(out, "{}", part_line(part));
        if let Some(values) = part.values() {
            for v in values {
                let _ = writeln!(out, "    {}", v);
            }
        }
        if part.part_type().is_terminal() {
            match records.next() {
                Some(Record::Metric(m)) => push_metric(&mut out, m),
                Some(Record::Notification(n)) => push_notification(&mut out, n),
                None => {}
            }
        }
    }
    if let Some(err) = &result.error {
        let _ = writeln!(out, "{}", error_line(err));
    }
    for w in &result.warnings {
        let _ = writeln!(out, "  [{}] {}", w.error.kind(), w);
    }
    out
}

/// Hex dump, 16 bytes per line, offsets relative to the start of `bytes`.
pub fn write_hex(w: &mut dyn Write, bytes: &[u8]) -> io::Result<()> {
    const COLS: usize = 16;
    for (i, chunk) in bytes.chunks(COLS).enumerate() {
        let hex_line = chunk.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ");
        writeln!(w, "  offset {:4}: {}", i * COLS, hex_line)?;
    }
    Ok(())
}
