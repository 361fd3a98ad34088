//! Timer-driven execution of poll ticks.

use super::Reporter;
use crate::core::{ReporterError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

struct RunningTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs a [`Reporter`] every `period` on the tokio runtime.
///
/// Ticks never overlap: the next tick is scheduled only after the previous
/// one returned. Stopping prevents further ticks but lets an in-flight
/// delivery finish.
pub struct PollingReporter {
    reporter: Arc<AsyncMutex<Reporter>>,
    task: Mutex<Option<RunningTask>>,
}

impl PollingReporter {
    /// Wrap a reporter; nothing runs until [`PollingReporter::start`]
    pub fn new(reporter: Reporter) -> Self {
        Self {
            reporter: Arc::new(AsyncMutex::new(reporter)),
            task: Mutex::new(None),
        }
    }

    /// Shared handle to the reporter, for ad-hoc ticks
    pub fn reporter(&self) -> Arc<AsyncMutex<Reporter>> {
        Arc::clone(&self.reporter)
    }

    /// Start polling; the first tick fires one `period` from now.
    ///
    /// Returns `Ok(false)` when already running. Must be called from within a
    /// tokio runtime.
    pub fn start(&self, period: Duration) -> Result<bool> {
        if period.is_zero() {
            return Err(ReporterError::config("polling period must be greater than 0"));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ReporterError::config(format!("no tokio runtime to poll on: {}", e)))?;

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            tracing::debug!("Reporter already running");
            return Ok(false);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let reporter = Arc::clone(&self.reporter);
        let handle = runtime.spawn(poll_loop(reporter, period, shutdown_rx));

        *task = Some(RunningTask { shutdown, handle });
        tracing::info!(?period, "Started metrics reporter");
        Ok(true)
    }

    /// Stop polling. Returns `false` when it was not running.
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(running) => {
                let _ = running.shutdown.send(true);
                tracing::info!("Stopped metrics reporter");
                !running.handle.is_finished()
            },
            None => false,
        }
    }

    /// Stop polling and wait for an in-flight tick to complete.
    pub async fn shutdown(&self) -> Result<()> {
        let running = self.task.lock().take();
        if let Some(running) = running {
            let _ = running.shutdown.send(true);
            running.handle.await?;
            tracing::info!("Stopped metrics reporter");
        }
        Ok(())
    }

    /// True while the polling task is alive
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

impl Drop for PollingReporter {
    fn drop(&mut self) {
        if let Some(running) = self.task.get_mut().take() {
            let _ = running.shutdown.send(true);
        }
    }
}

async fn poll_loop(
    reporter: Arc<AsyncMutex<Reporter>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // The tick runs outside select! so stopping never cancels a send
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if *shutdown.borrow() {
            break;
        }

        // Own task per tick so a panic ends only that tick
        let tick = Arc::clone(&reporter);
        if let Err(e) = tokio::spawn(async move { tick.lock().await.report().await }).await {
            tracing::error!(error = %e, "Poll tick aborted");
        }
    }

    tracing::debug!("Poll loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigBuilder;
    use crate::registry::InMemoryRegistry;

    fn poller() -> PollingReporter {
        let config = ConfigBuilder::new()
            .hostname("test_host")
            .include_runtime_stats(false)
            .build()
            .unwrap();
        PollingReporter::new(Reporter::from_config(&config, Arc::new(InMemoryRegistry::new())).unwrap())
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let poller = poller();
        assert!(!poller.stop());

        assert!(poller.start(Duration::from_secs(60)).unwrap());
        assert!(!poller.start(Duration::from_secs(60)).unwrap());
        assert!(poller.is_running());

        assert!(poller.stop());
        assert!(!poller.stop());

        assert!(poller.start(Duration::from_secs(60)).unwrap());
        poller.shutdown().await.unwrap();
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        assert!(poller().start(Duration::ZERO).is_err());
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let err = poller().start(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
