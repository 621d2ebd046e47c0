//! Sticky-field aggregation: assembles metrics and notifications from consecutive parts.
//!
//! collectd does not repeat host/plugin/type/time for every value list; a sender sets
//! them once and each later VALUES part reuses whatever was set last in the same packet.
//! MESSAGE parts are completed the same way from the notification fields.

use crate::codec::{Part, PartBody};
use crate::part::PartType;
use crate::value::{CdTime, Severity, Value};

/// Most recent metric-related fields seen in the packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueDispatch {
    pub host: Option<String>,
    pub plugin: Option<String>,
    pub plugin_instance: Option<String>,
    pub type_name: Option<String>,
    pub type_instance: Option<String>,
    pub time: Option<CdTime>,
    pub interval: Option<CdTime>,
}

/// Most recent notification-related fields seen in the packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotifyDispatch {
    pub host: Option<String>,
    pub time: Option<CdTime>,
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledMetric {
    pub host: Option<String>,
    pub plugin: Option<String>,
    pub plugin_instance: Option<String>,
    pub type_name: Option<String>,
    pub type_instance: Option<String>,
    pub time: Option<CdTime>,
    pub interval: Option<CdTime>,
    pub values: Vec<Value>,
}

impl AssembledMetric {
    /// `host/plugin[-instance]/type[-instance]`, the usual collectd identifier.
    pub fn identifier(&self) -> String {
        fn with_instance(base: Option<&str>, inst: Option<&str>) -> String {
            let base = base.unwrap_or(crate::stats::NULL_LABEL);
            match inst {
                Some(i) if !i.is_empty() => format!("{}-{}", base, i),
                _ => base.to_string(),
            }
        }
        format!(
            "{}/{}/{}",
            self.host.as_deref().unwrap_or(crate::stats::NULL_LABEL),
            with_instance(self.plugin.as_deref(), self.plugin_instance.as_deref()),
            with_instance(self.type_name.as_deref(), self.type_instance.as_deref()),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledNotification {
    pub host: Option<String>,
    pub time: Option<CdTime>,
    pub severity: Option<Severity>,
    pub message: String,
}

/// A complete logical record, ready once a terminal part is decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Metric(AssembledMetric),
    Notification(AssembledNotification),
}

/// Per-packet accumulator. Starts empty; lives exactly as long as one decode call.
#[derive(Debug, Default)]
pub struct Aggregator {
    values: ValueDispatch,
    notify: NotifyDispatch,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value_dispatch(&self) -> &ValueDispatch {
        &self.values
    }

    pub fn notify_dispatch(&self) -> &NotifyDispatch {
        &self.notify
    }

    /// Fold one successfully decoded part in; returns a record for VALUES and MESSAGE parts.
    pub fn apply(&mut self, part: &Part) -> Option<Record> {
        match (part.part_type(), &part.body) {
            (PartType::Host, PartBody::Text(s)) => {
                self.values.host = Some(s.clone());
                self.notify.host = Some(s.clone());
                None
            }
            (PartType::Plugin, PartBody::Text(s)) => {
                self.values.plugin = Some(s.clone());
                None
            }
            (PartType::PluginInstance, PartBody::Text(s)) => {
                self.values.plugin_instance = Some(s.clone());
                None
            }
            (PartType::Type, PartBody::Text(s)) => {
                self.values.type_name = Some(s.clone());
                None
            }
            (PartType::TypeInstance, PartBody::Text(s)) => {
                self.values.type_instance = Some(s.clone());
                None
            }
            (_, PartBody::Time(t)) => {
                self.values.time = Some(*t);
                self.notify.time = Some(*t);
                None
            }
            (_, PartBody::Interval(t)) => {
                self.values.interval = Some(*t);
                None
            }
            (_, PartBody::Severity(s)) => {
                self.notify.severity = Some(*s);
                None
            }
            (PartType::Values, PartBody::Values { values, .. }) => Some(Record::Metric(AssembledMetric {
                host: self.values.host.clone(),
                plugin: self.values.plugin.clone(),
                plugin_instance: self.values.plugin_instance.clone(),
                type_name: self.values.type_name.clone(),
                type_instance: self.values.type_instance.clone(),
                time: self.values.time,
                interval: self.values.interval,
                values: values.clone(),
            })),
            (PartType::Message, PartBody::Text(s)) => Some(Record::Notification(AssembledNotification {
                host: self.notify.host.clone(),
                time: self.notify.time,
                severity: self.notify.severity,
                message: s.clone(),
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::PartHeader;

    fn part(part_type: PartType, body: PartBody) -> Part {
        Part { header: PartHeader { part_type, declared_length: 4, offset: 0 }, body }
    }

    fn text(part_type: PartType, s: &str) -> Part {
        part(part_type, PartBody::Text(s.to_string()))
    }

    #[test]
    fn values_reuse_sticky_fields() {
        let mut agg = Aggregator::new();
        assert!(agg.apply(&text(PartType::Host, "web01")).is_none());
        assert!(agg.apply(&text(PartType::Plugin, "cpu")).is_none());
        assert!(agg.apply(&text(PartType::Type, "cpu")).is_none());
        agg.apply(&part(PartType::TimeHr, PartBody::Time(CdTime { secs: 5, nanos: 0 })));
        let first = agg.apply(&part(PartType::Values, PartBody::Values { declared_count: 1, values: vec![Value::Counter(1)] }));
        agg.apply(&text(PartType::TypeInstance, "idle"));
        let second = agg.apply(&part(PartType::Values, PartBody::Values { declared_count: 1, values: vec![Value::Counter(2)] }));

        let (Some(Record::Metric(a)), Some(Record::Metric(b))) = (first, second) else {
            panic!("expected two metrics");
        };
        assert_eq!(a.host.as_deref(), Some("web01"));
        assert_eq!(a.type_instance, None);
        assert_eq!(a.time, Some(CdTime { secs: 5, nanos: 0 }));
        assert_eq!(b.type_instance.as_deref(), Some("idle"));
        assert_eq!(b.values, vec![Value::Counter(2)]);
        assert_eq!(b.identifier(), "web01/cpu/cpu-idle");
    }

    #[test]
    fn message_assembles_notification() {
        let mut agg = Aggregator::new();
        agg.apply(&text(PartType::Host, "db1"));
        agg.apply(&part(PartType::Severity, PartBody::Severity(Severity::Failure)));
        agg.apply(&text(PartType::Plugin, "disk"));
        match agg.apply(&text(PartType::Message, "disk full")) {
            Some(Record::Notification(n)) => {
                assert_eq!(n.host.as_deref(), Some("db1"));
                assert_eq!(n.severity, Some(Severity::Failure));
                assert_eq!(n.message, "disk full");
                assert_eq!(n.time, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(agg.notify_dispatch().host.as_deref(), Some("db1"));
        assert_eq!(agg.value_dispatch().plugin.as_deref(), Some("disk"));
    }

    #[test]
    fn identifier_with_missing_fields() {
        let m = AssembledMetric {
            host: None,
            plugin: Some("load".into()),
            plugin_instance: Some(String::new()),
            type_name: None,
            type_instance: None,
            time: None,
            interval: None,
            values: vec![],
        };
        assert_eq!(m.identifier(), "(null)/load/(null)");
    }
}
