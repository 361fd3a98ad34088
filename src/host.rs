//! Adapter between a broker's metrics-reporter lifecycle and a [`PollingReporter`].
//!
//! The broker hands over its property map once at startup and may later start
//! or stop the reporter through its management interface.

use crate::core::{Config, ConfigBuilder, Result};
use crate::registry::MetricsRegistry;
use crate::reporter::{PollingReporter, Reporter};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Management name under which the reporter registers with the broker
pub const MBEAN_NAME: &str = "kafka:type=com.behase.kafka.KafkaGraphiteMetricsReporter";

struct Initialised {
    config: Config,
    poller: PollingReporter,
    running: bool,
}

/// Broker-facing reporter service.
pub struct MetricsReporterService {
    registry: Arc<dyn MetricsRegistry>,
    state: Mutex<Option<Initialised>>,
}

impl MetricsReporterService {
    /// Create a service reading from `registry`
    pub fn new(registry: Arc<dyn MetricsRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(None),
        }
    }

    /// Configure from broker properties and start polling if the reporter is enabled.
    ///
    /// Once initialised, later calls are ignored. A disabled reporter stays
    /// uninitialised and ignores [`start_reporter`](Self::start_reporter).
    pub fn init(&self, props: &HashMap<String, String>) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_some() {
            tracing::debug!("Metrics reporter already initialised");
            return Ok(());
        }

        let config = ConfigBuilder::new().from_properties(props)?.build()?;
        if !config.reporter.enabled {
            tracing::info!("Elasticsearch metrics reporter is disabled");
            return Ok(());
        }

        let poller = PollingReporter::new(Reporter::from_config(&config, Arc::clone(&self.registry))?);
        let period = config.reporter.polling_interval;
        *state = Some(Initialised {
            config,
            poller,
            running: false,
        });
        drop(state);

        tracing::debug!("Metrics reporter initialised");
        self.start_reporter(period)
    }

    /// Start polling every `period`; a no-op unless initialised and stopped.
    pub fn start_reporter(&self, period: Duration) -> Result<()> {
        let mut state = self.state.lock();
        let Some(initialised) = state.as_mut() else {
            return Ok(());
        };
        if initialised.running {
            return Ok(());
        }
        initialised.poller.start(period)?;
        initialised.running = true;
        tracing::info!(
            "Started Elasticsearch metrics reporter with polling period {} seconds",
            period.as_secs()
        );
        Ok(())
    }

    /// Stop polling and replace the reporter with a fresh one.
    ///
    /// The replacement starts with an empty buffer and a reset endpoint cursor.
    pub fn stop_reporter(&self) -> Result<()> {
        let mut state = self.state.lock();
        let Some(initialised) = state.as_mut() else {
            return Ok(());
        };
        if !initialised.running {
            return Ok(());
        }
        initialised.poller.stop();
        initialised.running = false;
        tracing::info!("Stopped Elasticsearch metrics reporter");

        let reporter = Reporter::from_config(&initialised.config, Arc::clone(&self.registry))?;
        initialised.poller = PollingReporter::new(reporter);
        Ok(())
    }

    /// True after a successful start and before the matching stop
    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .as_ref()
            .is_some_and(|initialised| initialised.running && initialised.poller.is_running())
    }

    /// True once enabled properties were accepted
    pub fn is_initialised(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Configuration in effect, once initialised
    pub fn config(&self) -> Option<Config> {
        self.state.lock().as_ref().map(|initialised| initialised.config.clone())
    }

    /// Management name of this reporter
    pub fn mbean_name(&self) -> &'static str {
        MBEAN_NAME
    }
}
