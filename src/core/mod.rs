//! Core types, configuration and error handling shared by every stage of the
//! reporting pipeline.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use error::{ReporterError, Result};
pub use logging::init_logging;
pub use types::{
    Epoch, GaugeValue, HistogramSnapshot, MeterRates, MetricIdentity, MetricKind, MetricSample,
    TimerSnapshot,
};
