//! Embedded metrics reporter for Elasticsearch.
//!
//! Periodically walks a host's metrics registry, encodes every eligible
//! metric as a JSON document and ships the batch to an Elasticsearch cluster
//! through the bulk API, rotating over the configured nodes.
//!
//! # Architecture
//!
//! - `registry`: boundary to the host's metric state
//! - `predicate`: name sanitization and exclusion filters
//! - `encoder`: metric samples to JSON documents
//! - `export`: bulk body buffer and round-robin delivery
//! - `reporter`: the poll cycle and its timer
//! - `host`: broker lifecycle adapter
//! - `core`: configuration, errors, logging and shared types
//!
//! # Example
//!
//! ```no_run
//! use es_metrics_reporter::core::{ConfigBuilder, MetricIdentity};
//! use es_metrics_reporter::registry::InMemoryRegistry;
//! use es_metrics_reporter::reporter::{PollingReporter, Reporter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(InMemoryRegistry::new());
//!     let requests = registry.counter(MetricIdentity::new("server", "requests", "count"));
//!     requests.inc();
//!
//!     let config = ConfigBuilder::new().nodes("es1:9200,es2:9200").build()?;
//!     let poller = PollingReporter::new(Reporter::from_config(&config, registry)?);
//!     poller.start(Duration::from_secs(10))?;
//!     tokio::time::sleep(Duration::from_secs(60)).await;
//!     poller.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod core;
pub mod encoder;
pub mod export;
pub mod host;
pub mod monitoring;
pub mod predicate;
pub mod registry;
pub mod reporter;

// Re-export core types for convenience
pub use crate::core::{Config, ConfigBuilder, ReporterError, Result};
pub use crate::host::MetricsReporterService;
pub use crate::reporter::{PollingReporter, Reporter};
