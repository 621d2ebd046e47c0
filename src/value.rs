//! Decoded field values: value-part entries, collectd high-resolution time, severities.

use std::fmt;

/// Fixed-point divisor of collectd's high-resolution time format (2^30 units per second).
pub const CDTIME_UNITS_PER_SECOND: u64 = 1 << 30;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Value-kind byte inside a VALUES part.
pub const VALUE_KIND_COUNTER: u8 = 0x00;
pub const VALUE_KIND_GAUGE: u8 = 0x01;
pub const VALUE_KIND_DERIVE: u8 = 0x02;
pub const VALUE_KIND_ABSOLUTE: u8 = 0x03;

/// A single entry of a VALUES part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Counter(u64),
    /// Little-endian on the wire, unlike every other field.
    Gauge(f64),
    Derive(i64),
    Absolute(u64),
    /// Unrecognized kind byte; payload kept as big-endian u64.
    Unknown { kind: u8, raw: u64 },
}

impl Value {
    pub fn kind(&self) -> u8 {
        match self {
            Value::Counter(_) => VALUE_KIND_COUNTER,
            Value::Gauge(_) => VALUE_KIND_GAUGE,
            Value::Derive(_) => VALUE_KIND_DERIVE,
            Value::Absolute(_) => VALUE_KIND_ABSOLUTE,
            Value::Unknown { kind, .. } => *kind,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Counter(_) => "COUNTER",
            Value::Gauge(_) => "GAUGE",
            Value::Derive(_) => "DERIVE",
            Value::Absolute(_) => "ABSOLUTE",
            Value::Unknown { .. } => "UNKNOWN",
        }
    }

    /// The 8 payload bytes exactly as they appear on the wire.
    pub fn to_wire(&self) -> [u8; 8] {
        match self {
            Value::Counter(x) | Value::Absolute(x) => x.to_be_bytes(),
            Value::Gauge(x) => x.to_le_bytes(),
            Value::Derive(x) => x.to_be_bytes(),
            Value::Unknown { raw, .. } => raw.to_be_bytes(),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter(x) | Value::Absolute(x) => Some(*x),
            Value::Unknown { raw, .. } => Some(*raw),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Derive(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Gauge(x) => Some(*x),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Counter(x) => write!(f, "Counter: {}", x),
            Value::Gauge(x) => write!(f, "Gauge: {}", x),
            Value::Derive(x) => write!(f, "Derive: {}", x),
            Value::Absolute(x) => write!(f, "Absolute: {}", x),
            Value::Unknown { raw, .. } => write!(f, "Unknown: {:x}", raw),
        }
    }
}

/// A point in time (or a duration) decoded from collectd's 2^30 fixed-point format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CdTime {
    pub secs: u64,
    /// Always below one second.
    pub nanos: u32,
}

impl CdTime {
    /// Convert a high-resolution (2^30 fixed-point) value.
    ///
    /// `secs = t / 2^30`, `nanos = round((t mod 2^30) * 1e9 / 2^30)`. The fractional
    /// part is below 2^30, so the product stays below 2^60 and the rounded result
    /// stays below 1e9.
    pub fn from_raw(t: u64) -> Self {
        let secs = t / CDTIME_UNITS_PER_SECOND;
        let frac = t % CDTIME_UNITS_PER_SECOND;
        let nanos = (frac * NANOS_PER_SECOND + CDTIME_UNITS_PER_SECOND / 2) / CDTIME_UNITS_PER_SECOND;
        CdTime { secs, nanos: nanos as u32 }
    }

    /// Convert a legacy whole-seconds value (TIME / INTERVAL parts).
    ///
    /// The value is first scaled into the high-resolution format with wrapping
    /// multiplication, as collectd itself does.
    pub fn from_legacy_seconds(secs: u64) -> Self {
        Self::from_raw(Self::legacy_to_raw(secs))
    }

    pub fn legacy_to_raw(secs: u64) -> u64 {
        secs.wrapping_mul(CDTIME_UNITS_PER_SECOND)
    }

    /// Seconds as a float, for display and arithmetic on intervals.
    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.nanos as f64 / NANOS_PER_SECOND as f64
    }
}

impl fmt::Display for CdTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

/// Notification severity (SEVERITY part).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Failure,
    Warning,
    Okay,
    Other(u64),
}

impl Severity {
    pub fn as_u64(&self) -> u64 {
        match self {
            Severity::Failure => 1,
            Severity::Warning => 2,
            Severity::Okay => 4,
            Severity::Other(x) => *x,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Severity::Failure => "FAILURE",
            Severity::Warning => "WARNING",
            Severity::Okay => "OKAY",
            Severity::Other(_) => "UNKNOWN",
        }
    }
}

impl From<u64> for Severity {
    fn from(raw: u64) -> Self {
        match raw {
            1 => Severity::Failure,
            2 => Severity::Warning,
            4 => Severity::Okay,
            x => Severity::Other(x),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u64())
    }
}
