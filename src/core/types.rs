//! Domain types shared by every stage of the reporting pipeline.

use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Wall-clock instant shared by every document of one poll cycle.
pub type Epoch = DateTime<FixedOffset>;

/// Structured identifier of a metric as registered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricIdentity {
    group: String,
    kind: String,
    name: String,
    scope: Option<String>,
}

impl MetricIdentity {
    /// Creates an identity without a scope
    pub fn new(group: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            name: name.into(),
            scope: None,
        }
    }

    /// Creates an identity with a scope
    pub fn scoped(
        group: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            name: name.into(),
            scope: Some(scope.into()),
        }
    }

    /// Returns the group
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns the kind qualifier (the `type` of the host's naming scheme)
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the scope, if any
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::predicate::sanitize_name(self))
    }
}

/// Kind tag written as `_type` on every bulk action line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Signed count
    Counter,
    /// Instantaneous value
    Gauge,
    /// Event rates
    Meter,
    /// Value distribution
    Histogram,
    /// Duration distribution with rates
    Timer,
    /// Synthetic process/runtime statistics document
    Runtime,
}

impl MetricKind {
    /// Tag used in the bulk action line
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Meter => "meter",
            MetricKind::Histogram => "histogram",
            MetricKind::Timer => "timer",
            MetricKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value read from a gauge at poll time.
#[derive(Debug, Clone, PartialEq)]
pub enum GaugeValue {
    /// Reported as `longValue`
    Long(i64),
    /// Reported as `integerValue`
    Integer(i32),
    /// Reported as `shortValue`
    Short(i16),
    /// Reported as `doubleValue`
    Double(f64),
    /// Reported as `floatValue`
    Float(f32),
    /// Reported as `stringValue`
    Text(String),
    /// Reported as `booleanValue`
    Boolean(bool),
    /// A host value of a type that has no document field; carries the type name
    Unsupported(String),
}

/// Exponentially-weighted rates plus the total event count of a meter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeterRates {
    /// One-minute rate
    pub m1_rate: f64,
    /// Five-minute rate
    pub m5_rate: f64,
    /// Fifteen-minute rate
    pub m15_rate: f64,
    /// Rate since creation
    pub mean_rate: f64,
    /// Events marked
    pub count: u64,
}

/// Distribution summary computed by the host registry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HistogramSnapshot {
    /// Smallest observation
    pub min: f64,
    /// Largest observation
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Standard deviation
    pub stddev: f64,
    /// Sum of all observations
    pub sum: f64,
    /// Number of observations
    pub count: u64,
    /// Median
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 95th percentile
    pub p95: f64,
    /// 98th percentile
    pub p98: f64,
    /// 99th percentile
    pub p99: f64,
    /// 99.9th percentile
    pub p999: f64,
}

/// A timer is a histogram of durations that also tracks its event rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimerSnapshot {
    /// Distribution of recorded durations
    pub durations: HistogramSnapshot,
    /// Rate of recorded events
    pub rates: MeterRates,
}

/// Read-only sample of one metric, taken at poll time.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSample {
    /// Current count
    Counter(i64),
    /// `None` when the gauge had no value to report
    Gauge(Option<GaugeValue>),
    /// Meter rates
    Meter(MeterRates),
    /// Histogram snapshot
    Histogram(HistogramSnapshot),
    /// Timer snapshot
    Timer(TimerSnapshot),
}

impl MetricSample {
    /// Kind tag for this sample
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSample::Counter(_) => MetricKind::Counter,
            MetricSample::Gauge(_) => MetricKind::Gauge,
            MetricSample::Meter(_) => MetricKind::Meter,
            MetricSample::Histogram(_) => MetricKind::Histogram,
            MetricSample::Timer(_) => MetricKind::Timer,
        }
    }
}
