//! Common test utilities and fixtures.

#![allow(dead_code)]

use chrono::{FixedOffset, TimeZone};
use es_metrics_reporter::core::{
    Config, ConfigBuilder, Epoch, GaugeValue, HistogramSnapshot, MeterRates, MetricIdentity,
    TimerSnapshot,
};
use es_metrics_reporter::registry::{InMemoryRegistry, SnapshotCell};
use std::sync::Arc;

/// Hostname pinned in every test configuration
pub const TEST_HOST: &str = "test_host";

/// 2016-01-01T00:00:00 in UTC
pub fn epoch() -> Epoch {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2016, 1, 1, 0, 0, 0)
        .unwrap()
}

fn histogram() -> HistogramSnapshot {
    HistogramSnapshot {
        min: 1.0,
        max: 9.0,
        mean: 5.0,
        stddev: 2.0,
        sum: 15.0,
        count: 3,
        p50: 5.0,
        p75: 7.0,
        p95: 9.0,
        p98: 9.0,
        p99: 9.0,
        p999: 9.0,
    }
}

fn rates() -> MeterRates {
    MeterRates {
        m1_rate: 1.0,
        m5_rate: 2.0,
        m15_rate: 3.0,
        mean_rate: 4.0,
        count: 10,
    }
}

/// Registry holding one metric of each kind under `group.type.<kind>`.
pub fn five_kind_registry() -> Arc<InMemoryRegistry> {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.gauge(MetricIdentity::new("group", "type", "gauge"), || {
        Some(GaugeValue::Long(1))
    });
    registry.counter(MetricIdentity::new("group", "type", "counter")).inc_by(2);
    registry.snapshot(MetricIdentity::new("group", "type", "meter"), SnapshotCell::meter(rates()));
    registry.snapshot(
        MetricIdentity::new("group", "type", "histogram"),
        SnapshotCell::histogram(histogram()),
    );
    registry.snapshot(
        MetricIdentity::new("group", "type", "timer"),
        SnapshotCell::timer(TimerSnapshot {
            durations: histogram(),
            rates: rates(),
        }),
    );
    registry
}

/// Builder with a fixed hostname and no runtime document
pub fn test_config() -> ConfigBuilder {
    ConfigBuilder::new()
        .hostname(TEST_HOST)
        .include_runtime_stats(false)
}

/// Configuration pointing at the given nodes
pub fn config_for(nodes: &str) -> Config {
    test_config().nodes(nodes).build().unwrap()
}

/// A local port nothing listens on
pub fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}
