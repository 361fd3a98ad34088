//! Turns metric samples into the JSON documents indexed by Elasticsearch.
//!
//! Every document starts with the same three fields, in this order:
//! the timestamp (field name configurable), `@name` and `hostname`.
//! Kind-specific fields follow in a fixed order so output is reproducible.

pub mod hostname;

use crate::core::{
    Epoch, GaugeValue, HistogramSnapshot, MeterRates, MetricIdentity, MetricSample, Result,
    TimerSnapshot,
};
use crate::monitoring::RuntimeStats;
use crate::predicate::{replace_special_chars, sanitize_name};
use chrono::SecondsFormat;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

pub use hostname::resolve_hostname;

/// Name of the synthetic runtime statistics document
pub const RUNTIME_DOCUMENT_NAME: &str = "runtime";

/// A single JSON field value, keeping the width it was produced with.
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Int(i64),
    UInt(u64),
    Double(f64),
    Float(f32),
    Text(String),
    Bool(bool),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Int(v) => serializer.serialize_i64(*v),
            FieldValue::UInt(v) => serializer.serialize_u64(*v),
            FieldValue::Double(v) => serializer.serialize_f64(*v),
            FieldValue::Float(v) => serializer.serialize_f32(*v),
            FieldValue::Text(v) => serializer.serialize_str(v),
            FieldValue::Bool(v) => serializer.serialize_bool(*v),
        }
    }
}

/// Ordered JSON object under construction. Lives for one encode call.
#[derive(Debug, Default)]
struct Document {
    fields: Vec<(String, FieldValue)>,
}

impl Document {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    fn field(&mut self, name: impl Into<String>, value: FieldValue) -> &mut Self {
        self.fields.push((name.into(), value));
        self
    }

    fn double(&mut self, name: &str, value: f64) -> &mut Self {
        self.field(name, FieldValue::Double(value))
    }

    fn finish(self) -> Result<String> {
        Ok(serde_json::to_string(&self)?)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Encodes samples into documents for one reporting host.
#[derive(Debug, Clone)]
pub struct DocumentEncoder {
    timestamp_field: String,
    hostname: String,
}

impl DocumentEncoder {
    /// Create an encoder. The hostname is sanitized once here.
    pub fn new(timestamp_field: impl Into<String>, hostname: &str) -> Self {
        Self {
            timestamp_field: timestamp_field.into(),
            hostname: replace_special_chars(hostname),
        }
    }

    /// Hostname written into every document
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Encode a registry metric under its dotted name.
    ///
    /// Returns `Ok(None)` for gauges without a value or with an unsupported value type.
    pub fn encode(
        &self,
        identity: &MetricIdentity,
        sample: &MetricSample,
        epoch: &Epoch,
    ) -> Result<Option<String>> {
        self.encode_named(&sanitize_name(identity), sample, epoch)
    }

    /// Encode a sample under a literal name.
    pub fn encode_named(
        &self,
        name: &str,
        sample: &MetricSample,
        epoch: &Epoch,
    ) -> Result<Option<String>> {
        let mut doc = self.header(name, epoch);
        match sample {
            MetricSample::Counter(count) => {
                doc.field("count", FieldValue::Int(*count));
            },
            MetricSample::Gauge(value) => match value.as_ref().and_then(gauge_field) {
                Some((field, value)) => {
                    doc.field(field, value);
                },
                None => return Ok(None),
            },
            MetricSample::Meter(rates) => {
                write_rates(&mut doc, rates);
                doc.field("count", FieldValue::UInt(rates.count));
            },
            MetricSample::Histogram(snapshot) => {
                write_distribution(&mut doc, snapshot);
                doc.double("sum", snapshot.sum);
            },
            MetricSample::Timer(TimerSnapshot { durations, rates }) => {
                write_distribution(&mut doc, durations);
                write_rates(&mut doc, rates);
            },
        }
        doc.finish().map(Some)
    }

    /// Encode process statistics as the single runtime document.
    pub fn encode_runtime(&self, stats: &RuntimeStats, epoch: &Epoch) -> Result<String> {
        let mut doc = self.header(RUNTIME_DOCUMENT_NAME, epoch);

        doc.field("memory.resident_bytes", FieldValue::UInt(stats.resident_memory_bytes));
        doc.field("memory.virtual_bytes", FieldValue::UInt(stats.virtual_memory_bytes));
        for (pool, usage) in &stats.memory_pool_usages {
            if pool.is_empty() {
                continue;
            }
            doc.double(&format!("memory.memory_pool_usages.{}", replace_special_chars(pool)), *usage);
        }

        doc.field("thread_count", FieldValue::UInt(stats.thread_count as u64));
        doc.field("uptime", FieldValue::UInt(stats.uptime_secs));
        if let Some(fd_usage) = stats.fd_usage {
            doc.double("fd_usage", fd_usage);
        }
        for (state, share) in &stats.thread_states {
            if state.is_empty() {
                continue;
            }
            let key = replace_special_chars(&state.to_lowercase());
            doc.double(&format!("thread_states.{}", key), *share);
        }

        doc.finish()
    }

    fn header(&self, name: &str, epoch: &Epoch) -> Document {
        let mut doc = Document::with_capacity(20);
        doc.field(
            self.timestamp_field.as_str(),
            FieldValue::Text(format_timestamp(epoch)),
        )
        .field("@name", FieldValue::Text(replace_special_chars(name)))
        .field("hostname", FieldValue::Text(self.hostname.clone()));
        doc
    }
}

/// ISO-8601 with milliseconds and offset, `Z` for UTC.
pub fn format_timestamp(epoch: &Epoch) -> String {
    epoch.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn gauge_field(value: &GaugeValue) -> Option<(&'static str, FieldValue)> {
    let field = match value {
        GaugeValue::Long(v) => ("longValue", FieldValue::Int(*v)),
        GaugeValue::Integer(v) => ("integerValue", FieldValue::Int(i64::from(*v))),
        GaugeValue::Short(v) => ("shortValue", FieldValue::Int(i64::from(*v))),
        GaugeValue::Double(v) => ("doubleValue", FieldValue::Double(*v)),
        GaugeValue::Float(v) => ("floatValue", FieldValue::Float(*v)),
        GaugeValue::Text(v) => ("stringValue", FieldValue::Text(replace_special_chars(v))),
        GaugeValue::Boolean(v) => ("booleanValue", FieldValue::Bool(*v)),
        GaugeValue::Unsupported(_) => return None,
    };
    Some(field)
}

fn write_rates(doc: &mut Document, rates: &MeterRates) {
    doc.double("m1_rate", rates.m1_rate)
        .double("m5_rate", rates.m5_rate)
        .double("m15_rate", rates.m15_rate)
        .double("mean_rate", rates.mean_rate);
}

/// Shared histogram/timer fields, ending with `count`.
fn write_distribution(doc: &mut Document, snapshot: &HistogramSnapshot) {
    doc.double("max", snapshot.max)
        .double("mean", snapshot.mean)
        .double("min", snapshot.min)
        .double("stddev", snapshot.stddev)
        .double("p50", snapshot.p50)
        .double("p75", snapshot.p75)
        .double("p95", snapshot.p95)
        .double("p98", snapshot.p98)
        .double("p99", snapshot.p99)
        .double("p999", snapshot.p999)
        .field("count", FieldValue::UInt(snapshot.count));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn epoch() -> Epoch {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2016, 1, 1, 0, 0, 0)
            .unwrap()
    }

    fn encoder() -> DocumentEncoder {
        DocumentEncoder::new("@timestamp", "broker-1 host")
    }

    fn encode(sample: MetricSample) -> Option<Value> {
        encoder()
            .encode(&MetricIdentity::new("g", "t", "n"), &sample, &epoch())
            .unwrap()
            .map(|doc| serde_json::from_str(&doc).unwrap())
    }

    /// Object keys in document order; a `Value` map would sort them.
    fn keys(json: &str) -> Vec<String> {
        struct OrderedKeys(Vec<String>);

        impl<'de> serde::Deserialize<'de> for OrderedKeys {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                struct KeyVisitor;

                impl<'de> serde::de::Visitor<'de> for KeyVisitor {
                    type Value = OrderedKeys;

                    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        f.write_str("a JSON object")
                    }

                    fn visit_map<A: serde::de::MapAccess<'de>>(
                        self,
                        mut map: A,
                    ) -> std::result::Result<OrderedKeys, A::Error> {
                        let mut keys = Vec::new();
                        while let Some((key, _)) =
                            map.next_entry::<String, serde::de::IgnoredAny>()?
                        {
                            keys.push(key);
                        }
                        Ok(OrderedKeys(keys))
                    }
                }

                deserializer.deserialize_map(KeyVisitor)
            }
        }

        serde_json::from_str::<OrderedKeys>(json).unwrap().0
    }

    #[test]
    fn test_header_fields() {
        let doc = encoder()
            .encode_named("metric-Name", &MetricSample::Counter(1), &epoch())
            .unwrap()
            .unwrap();
        let value: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(value["@timestamp"], "2016-01-01T00:00:00.000+09:00");
        assert_eq!(value["@name"], "metric_Name");
        assert_eq!(value["hostname"], "broker_1_host");
        assert!(doc.starts_with("{\"@timestamp\":"));
    }

    #[test]
    fn test_custom_timestamp_field() {
        let encoder = DocumentEncoder::new("ts", "h");
        let doc = encoder
            .encode(&MetricIdentity::new("group", "type", "name"), &MetricSample::Counter(1), &epoch())
            .unwrap()
            .unwrap();
        let value: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(value["ts"], "2016-01-01T00:00:00.000+09:00");
        assert_eq!(value["@name"], "group.type.name");
    }

    #[test]
    fn test_utc_timestamp_uses_z() {
        let utc = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2016, 1, 1, 0, 0, 0)
            .unwrap();
        assert_eq!(format_timestamp(&utc), "2016-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_counter() {
        let doc = encode(MetricSample::Counter(1)).unwrap();
        assert_eq!(doc["count"], 1);
    }

    #[test]
    fn test_meter() {
        let doc = encoder()
            .encode(
                &MetricIdentity::new("g", "t", "n"),
                &MetricSample::Meter(MeterRates {
                    m1_rate: 1.0,
                    m5_rate: 5.0,
                    m15_rate: 15.0,
                    mean_rate: 10.0,
                    count: 3,
                }),
                &epoch(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            keys(&doc),
            vec!["@timestamp", "@name", "hostname", "m1_rate", "m5_rate", "m15_rate", "mean_rate", "count"]
        );
        let value: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(value["m1_rate"], 1.0);
        assert_eq!(value["m15_rate"], 15.0);
        assert_eq!(value["mean_rate"], 10.0);
        assert_eq!(value["count"], 3);
    }

    fn histogram() -> HistogramSnapshot {
        HistogramSnapshot {
            max: 100.0,
            mean: 50.0,
            min: 0.0,
            stddev: 30.0,
            p50: 50.0,
            p75: 75.0,
            p95: 95.0,
            p98: 98.0,
            p99: 99.0,
            p999: 999.0,
            count: 1,
            sum: 1000.0,
        }
    }

    #[test]
    fn test_histogram() {
        let doc = encoder()
            .encode(&MetricIdentity::new("g", "t", "n"), &MetricSample::Histogram(histogram()), &epoch())
            .unwrap()
            .unwrap();
        assert_eq!(
            keys(&doc)[3..].to_vec(),
            vec![
                "max", "mean", "min", "stddev", "p50", "p75", "p95", "p98", "p99", "p999", "count",
                "sum"
            ]
        );
        let value: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(value["max"], 100.0);
        assert_eq!(value["stddev"], 30.0);
        assert_eq!(value["p999"], 999.0);
        assert_eq!(value["count"], 1);
        assert_eq!(value["sum"], 1000.0);
    }

    #[test]
    fn test_timer_has_rates_and_no_sum() {
        let timer = TimerSnapshot {
            durations: histogram(),
            rates: MeterRates {
                m1_rate: 1.0,
                m5_rate: 5.0,
                m15_rate: 15.0,
                mean_rate: 20.0,
                count: 1,
            },
        };
        let doc = encoder()
            .encode(&MetricIdentity::new("g", "t", "n"), &MetricSample::Timer(timer), &epoch())
            .unwrap()
            .unwrap();
        assert_eq!(
            keys(&doc)[3..].to_vec(),
            vec![
                "max", "mean", "min", "stddev", "p50", "p75", "p95", "p98", "p99", "p999", "count",
                "m1_rate", "m5_rate", "m15_rate", "mean_rate"
            ]
        );
        let value: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(value["mean_rate"], 20.0);
        assert!(value.get("sum").is_none());
    }

    #[test]
    fn test_gauge_field_per_type() {
        let cases = [
            (GaugeValue::Long(1), "longValue", Value::from(1)),
            (GaugeValue::Integer(1), "integerValue", Value::from(1)),
            (GaugeValue::Short(1), "shortValue", Value::from(1)),
            (GaugeValue::Double(1.1), "doubleValue", Value::from(1.1)),
            (GaugeValue::Text("hoge".into()), "stringValue", Value::from("hoge")),
            (GaugeValue::Boolean(true), "booleanValue", Value::from(true)),
        ];
        for (gauge, field, expected) in cases {
            let doc = encode(MetricSample::Gauge(Some(gauge))).unwrap();
            let object = doc.as_object().unwrap();
            assert_eq!(object.len(), 4, "exactly one value field for {}", field);
            assert_eq!(doc[field], expected);
        }
    }

    #[test]
    fn test_float_gauge_keeps_width() {
        let doc = encoder()
            .encode(
                &MetricIdentity::new("g", "t", "n"),
                &MetricSample::Gauge(Some(GaugeValue::Float(1.1))),
                &epoch(),
            )
            .unwrap()
            .unwrap();
        assert!(doc.ends_with("\"floatValue\":1.1}"));
    }

    #[test]
    fn test_string_gauge_is_sanitized() {
        let doc = encode(MetricSample::Gauge(Some(GaugeValue::Text("up - ok".into())))).unwrap();
        assert_eq!(doc["stringValue"], "up___ok");
    }

    #[test]
    fn test_gauge_without_document() {
        assert!(encode(MetricSample::Gauge(None)).is_none());
        assert!(encode(MetricSample::Gauge(Some(GaugeValue::Unsupported("Vec<u8>".into())))).is_none());
    }

    #[test]
    fn test_runtime_document() {
        let stats = RuntimeStats {
            resident_memory_bytes: 1024,
            virtual_memory_bytes: 4096,
            memory_pool_usages: vec![("system".into(), 0.5), ("swap".into(), 0.0), (String::new(), 1.0)],
            thread_count: 4,
            thread_states: vec![("Running".into(), 0.25), ("Sleeping".into(), 0.75)],
            fd_usage: Some(0.01),
            uptime_secs: 60,
        };
        let doc = encoder().encode_runtime(&stats, &epoch()).unwrap();
        let value: Value = serde_json::from_str(&doc).unwrap();

        assert_eq!(value["@name"], "runtime");
        assert_eq!(value["memory.resident_bytes"], 1024);
        assert_eq!(value["memory.memory_pool_usages.system"], 0.5);
        assert_eq!(value["thread_count"], 4);
        assert_eq!(value["thread_states.running"], 0.25);
        assert_eq!(value["fd_usage"], 0.01);
        assert_eq!(value["uptime"], 60);
        assert!(value.get("memory.memory_pool_usages.").is_none());
    }
}
