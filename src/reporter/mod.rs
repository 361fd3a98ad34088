//! The poll cycle: sample the registry, encode, buffer, deliver.
//!
//! A [`Reporter`] owns every piece of per-instance state (buffer, endpoint
//! cursor, resolved hostname) and runs one tick at a time through
//! [`Reporter::report_at`]. [`PollingReporter`] drives it on a timer.

pub mod scheduler;

pub use scheduler::PollingReporter;

use crate::core::{Config, Epoch, MetricIdentity, MetricKind, ReporterError, Result};
use crate::encoder::{resolve_hostname, DocumentEncoder};
use crate::export::{BulkClient, DeliveryOutcome, EndpointSet, ReportBuffer};
use crate::monitoring::RuntimeStatsCollector;
use crate::predicate::MetricPredicate;
use crate::registry::MetricsRegistry;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Where a reporter is within its poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Between ticks
    Idle,
    /// Walking the registry
    Sampling,
    /// Turning a sample into a document
    Encoding,
    /// Taking the buffer for delivery
    Draining,
    /// Posting the batch
    Sending,
}

/// Counters for one tick, returned alongside the delivery outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Documents appended to the buffer
    pub reported: usize,
    /// Metrics rejected by the predicate or without a value
    pub skipped: usize,
    /// Metrics that failed to sample or encode
    pub failed: usize,
}

/// One reporter instance.
pub struct Reporter {
    name: String,
    registry: Arc<dyn MetricsRegistry>,
    predicate: Box<dyn MetricPredicate>,
    encoder: DocumentEncoder,
    buffer: ReportBuffer,
    client: BulkClient,
    runtime: Option<RuntimeStatsCollector>,
    state: PollerState,
}

impl Reporter {
    /// Build a reporter from validated configuration.
    ///
    /// Resolves the hostname once unless the configuration overrides it.
    pub fn from_config(config: &Config, registry: Arc<dyn MetricsRegistry>) -> Result<Self> {
        config.validate()?;
        let es = &config.elasticsearch;

        let hostname = match &es.hostname {
            Some(hostname) => hostname.clone(),
            None => resolve_hostname(),
        };

        let runtime = if config.reporter.include_runtime_stats {
            match RuntimeStatsCollector::new() {
                Ok(collector) => Some(collector),
                Err(e) => {
                    tracing::warn!("Runtime statistics disabled: {}", e);
                    None
                },
            }
        } else {
            None
        };

        let client = BulkClient::new(EndpointSet::new(es.endpoints())?, es.connect_timeout)?;

        tracing::debug!(
            name = %config.reporter.name,
            nodes = %es.nodes,
            index_prefix = %es.index_prefix,
            %hostname,
            "Reporter configured"
        );

        Ok(Self {
            name: config.reporter.name.clone(),
            registry,
            predicate: config.predicate()?,
            encoder: DocumentEncoder::new(es.timestamp_field_name.as_str(), &hostname),
            buffer: ReportBuffer::new(es.index_prefix.as_str(), es.effective_ttl()),
            client,
            runtime,
            state: PollerState::Idle,
        })
    }

    /// Replace the configured predicate
    pub fn with_predicate(mut self, predicate: Box<dyn MetricPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Reporter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current phase of the poll tick
    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Pending bulk body, filled by [`Reporter::collect`]
    pub fn buffer(&self) -> &ReportBuffer {
        &self.buffer
    }

    /// Delivery client and its endpoint rotation
    pub fn client(&self) -> &BulkClient {
        &self.client
    }

    /// Hostname written into every document
    pub fn hostname(&self) -> &str {
        self.encoder.hostname()
    }

    /// Run one tick stamped with the current local time.
    pub async fn report(&mut self) -> (TickSummary, DeliveryOutcome) {
        let epoch = chrono::Local::now().fixed_offset();
        self.report_at(&epoch).await
    }

    /// Run one tick with every document stamped `epoch`.
    ///
    /// Sampling and encoding failures are logged and skipped; delivery always runs.
    pub async fn report_at(&mut self, epoch: &Epoch) -> (TickSummary, DeliveryOutcome) {
        let span = tracing::debug_span!("poll", reporter = %self.name);
        let summary = span.in_scope(|| self.collect(epoch));

        self.state = PollerState::Draining;
        let batch = self.buffer.drain();

        self.state = PollerState::Sending;
        let outcome = self.client.send(batch).await;
        self.state = PollerState::Idle;

        tracing::debug!(
            reporter = %self.name,
            reported = summary.reported,
            skipped = summary.skipped,
            failed = summary.failed,
            attempts = outcome.attempts(),
            "Poll tick complete"
        );
        (summary, outcome)
    }

    /// Sample every eligible metric and the runtime statistics into the buffer.
    ///
    /// Errors and panics raised while reporting one metric are logged and
    /// counted; the remaining metrics are still reported. Leaves the state `Idle`.
    pub fn collect(&mut self, epoch: &Epoch) -> TickSummary {
        let mut summary = TickSummary::default();

        for identity in self.registry.identities() {
            self.state = PollerState::Sampling;
            let reported = guarded(|| format!("reporting {}", identity), || {
                self.report_metric(&identity, epoch)
            });
            match reported {
                Ok(true) => summary.reported += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        metric = %identity,
                        category = e.category(),
                        "Error reporting metric: {}",
                        e
                    );
                },
            }
        }

        self.state = PollerState::Sampling;
        match guarded(|| "runtime statistics".to_string(), || self.report_runtime(epoch)) {
            Ok(true) => summary.reported += 1,
            Ok(false) => {},
            Err(e) => {
                summary.failed += 1;
                tracing::error!(category = e.category(), "Error reporting runtime statistics: {}", e);
            },
        }

        self.state = PollerState::Idle;
        summary
    }

    /// Filter, sample and encode one metric. `Ok(false)` when nothing was appended.
    ///
    /// Panics from the registry or the predicate propagate; [`Reporter::collect`] contains them.
    pub fn report_metric(&mut self, identity: &MetricIdentity, epoch: &Epoch) -> Result<bool> {
        if !self.predicate.matches(identity, None) {
            return Ok(false);
        }
        let Some(sample) = self.registry.sample(identity)? else {
            return Ok(false);
        };
        if !self.predicate.matches(identity, Some(&sample)) {
            return Ok(false);
        }

        self.state = PollerState::Encoding;
        match self.encoder.encode(identity, &sample, epoch)? {
            Some(document) => {
                self.buffer.append(sample.kind(), &document, epoch)?;
                Ok(true)
            },
            None => {
                tracing::trace!(metric = %identity, "No reportable value");
                Ok(false)
            },
        }
    }

    fn report_runtime(&mut self, epoch: &Epoch) -> Result<bool> {
        let Some(collector) = self.runtime.as_mut() else {
            return Ok(false);
        };
        let stats = collector.collect()?;
        let document = self.encoder.encode_runtime(&stats, epoch)?;
        self.buffer.append(MetricKind::Runtime, &document, epoch)?;
        Ok(true)
    }
}

/// Run one reporting step, turning a panic into a registry error.
fn guarded<T>(what: impl FnOnce() -> String, step: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(step))
        .unwrap_or_else(|_| Err(ReporterError::registry(format!("{} panicked", what()))))
}
