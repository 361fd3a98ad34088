//! Boundary to the host's metrics registry.
//!
//! The host owns metric state and statistics; the reporter only asks it for
//! the identities it knows and a read-only [`MetricSample`] of each one.
//! [`InMemoryRegistry`] is a small registry for embedding and tests.

use crate::core::{
    GaugeValue, HistogramSnapshot, MeterRates, MetricIdentity, MetricSample, Result,
    TimerSnapshot,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of metric samples walked on every poll tick.
pub trait MetricsRegistry: Send + Sync {
    /// All known identities, sorted
    fn identities(&self) -> Vec<MetricIdentity>;

    /// Sample one metric. `Ok(None)` means the metric vanished since `identities` was called.
    fn sample(&self, identity: &MetricIdentity) -> Result<Option<MetricSample>>;
}

/// One registered metric.
pub trait MetricSource: Send + Sync {
    /// Read the current value
    fn sample(&self) -> Result<MetricSample>;
}

/// Monotonic-ish counter that can be incremented and decremented.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increment by `n`
    pub fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrement by one
    pub fn dec(&self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Current value
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl MetricSource for Counter {
    fn sample(&self) -> Result<MetricSample> {
        Ok(MetricSample::Counter(self.count()))
    }
}

/// Gauge whose value is read through a callback at poll time.
pub struct Gauge<F> {
    read: F,
}

impl<F> Gauge<F>
where
    F: Fn() -> Option<GaugeValue> + Send + Sync,
{
    /// Wrap a value callback
    pub fn new(read: F) -> Self {
        Self { read }
    }
}

impl<F> MetricSource for Gauge<F>
where
    F: Fn() -> Option<GaugeValue> + Send + Sync,
{
    fn sample(&self) -> Result<MetricSample> {
        Ok(MetricSample::Gauge((self.read)()))
    }
}

/// Holds the latest snapshot of a meter, histogram or timer computed by the host.
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<MetricSample>,
}

impl SnapshotCell {
    /// Cell holding a meter snapshot
    pub fn meter(rates: MeterRates) -> Self {
        Self::with(MetricSample::Meter(rates))
    }

    /// Cell holding a histogram snapshot
    pub fn histogram(snapshot: HistogramSnapshot) -> Self {
        Self::with(MetricSample::Histogram(snapshot))
    }

    /// Cell holding a timer snapshot
    pub fn timer(snapshot: TimerSnapshot) -> Self {
        Self::with(MetricSample::Timer(snapshot))
    }

    fn with(sample: MetricSample) -> Self {
        Self {
            current: RwLock::new(sample),
        }
    }

    /// Replace the held snapshot
    pub fn set(&self, sample: MetricSample) {
        *self.current.write() = sample;
    }
}

impl MetricSource for SnapshotCell {
    fn sample(&self) -> Result<MetricSample> {
        Ok(self.current.read().clone())
    }
}

/// Sorted in-process registry.
#[derive(Default)]
pub struct InMemoryRegistry {
    metrics: RwLock<BTreeMap<MetricIdentity, Arc<dyn MetricSource>>>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, replacing any previous one with the same identity
    pub fn register(&self, identity: MetricIdentity, source: Arc<dyn MetricSource>) {
        self.metrics.write().insert(identity, source);
    }

    /// Register and return a new counter
    pub fn counter(&self, identity: MetricIdentity) -> Arc<Counter> {
        let counter = Arc::new(Counter::new());
        self.register(identity, Arc::clone(&counter) as Arc<dyn MetricSource>);
        counter
    }

    /// Register a callback gauge
    pub fn gauge<F>(&self, identity: MetricIdentity, read: F)
    where
        F: Fn() -> Option<GaugeValue> + Send + Sync + 'static,
    {
        self.register(identity, Arc::new(Gauge::new(read)));
    }

    /// Register a snapshot cell and return it for later updates
    pub fn snapshot(&self, identity: MetricIdentity, cell: SnapshotCell) -> Arc<SnapshotCell> {
        let cell = Arc::new(cell);
        self.register(identity, Arc::clone(&cell) as Arc<dyn MetricSource>);
        cell
    }

    /// Remove a metric
    pub fn remove(&self, identity: &MetricIdentity) -> bool {
        self.metrics.write().remove(identity).is_some()
    }

    /// Number of registered metrics
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}

impl MetricsRegistry for InMemoryRegistry {
    fn identities(&self) -> Vec<MetricIdentity> {
        self.metrics.read().keys().cloned().collect()
    }

    fn sample(&self, identity: &MetricIdentity) -> Result<Option<MetricSample>> {
        // Clone the handle so the source runs without holding the map lock
        let source = self.metrics.read().get(identity).cloned();
        source.map(|source| source.sample()).transpose()
    }
}
