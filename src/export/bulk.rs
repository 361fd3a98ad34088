//! Round-robin delivery of bulk bodies to Elasticsearch nodes.

use crate::core::{Result, ReporterError};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Path of the bulk ingest API on every node
pub const BULK_PATH: &str = "/_bulk";

/// Ordered `host:port` list with a rotation cursor that persists across sends.
#[derive(Debug)]
pub struct EndpointSet {
    nodes: Vec<String>,
    cursor: AtomicUsize,
}

impl EndpointSet {
    /// Create a set; fails when `nodes` is empty.
    pub fn new(nodes: Vec<String>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(ReporterError::config("endpoint list must not be empty"));
        }
        Ok(Self {
            nodes,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Select the endpoint under the cursor and advance the cursor by one.
    ///
    /// The read and the advance are a single atomic step, so reporters sharing
    /// a set never pick and skip the same slot inconsistently.
    pub fn advance(&self) -> &str {
        let ticket = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.nodes[ticket % self.nodes.len()]
    }

    /// Total number of selections made so far
    pub fn rotations(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Index of the endpoint the next selection will return
    pub fn position(&self) -> usize {
        self.rotations() % self.nodes.len()
    }

    /// Configured endpoints
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Number of endpoints
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; an endpoint set holds at least one node
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Nothing to send; no connection was made
    Empty,
    /// A node accepted the connection. `status` is `None` when the exchange
    /// failed after connecting.
    Delivered {
        /// Node that took the batch
        endpoint: String,
        /// HTTP status, if a response was read
        status: Option<u16>,
        /// Nodes tried, including this one
        attempts: usize,
    },
    /// Every node refused the connection; the batch is gone
    Dropped {
        /// Nodes tried
        attempts: usize,
    },
}

impl DeliveryOutcome {
    /// Endpoints tried for this batch
    pub fn attempts(&self) -> usize {
        match self {
            DeliveryOutcome::Empty => 0,
            DeliveryOutcome::Delivered { attempts, .. } | DeliveryOutcome::Dropped { attempts } => {
                *attempts
            },
        }
    }
}

/// HTTP client for the bulk API.
pub struct BulkClient {
    client: reqwest::Client,
    endpoints: EndpointSet,
}

impl BulkClient {
    /// Create a client that gives each node `connect_timeout` to accept a connection.
    pub fn new(endpoints: EndpointSet, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client, endpoints })
    }

    /// Endpoint rotation state
    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    /// Send one batch, best effort.
    ///
    /// Each node is tried at most once, starting at the shared cursor; the
    /// first node that accepts the connection ends the rotation whatever it
    /// answers. Failures are logged, never returned.
    pub async fn send(&self, batch: String) -> DeliveryOutcome {
        if batch.is_empty() {
            tracing::info!("The metrics batch is blank");
            return DeliveryOutcome::Empty;
        }
        tracing::debug!("Elasticsearch '{}' body:\n{}", BULK_PATH, batch);

        let body = Bytes::from(batch);
        let mut attempts = 0;

        for _ in 0..self.endpoints.len() {
            let endpoint = self.endpoints.advance();
            attempts += 1;

            let url = format!("http://{}{}", endpoint, BULK_PATH);
            tracing::info!(%url, "Request to Elasticsearch");

            let request = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body.clone());

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let reason = response.text().await.unwrap_or_default();
                        tracing::warn!(
                            endpoint,
                            status = status.as_u16(),
                            "Reporting returned code {}: {}",
                            status,
                            truncate(&reason, 512)
                        );
                    }
                    return DeliveryOutcome::Delivered {
                        endpoint: endpoint.to_string(),
                        status: Some(status.as_u16()),
                        attempts,
                    };
                },
                Err(e) if is_connect_failure(&e) => {
                    tracing::error!(endpoint, error = %e, "Error connecting to Elasticsearch node");
                },
                Err(e) => {
                    let err = ReporterError::from(e);
                    tracing::warn!(
                        endpoint,
                        category = err.category(),
                        "Fail! The metric reporting to Elasticsearch: {}",
                        err
                    );
                    return DeliveryOutcome::Delivered {
                        endpoint: endpoint.to_string(),
                        status: None,
                        attempts,
                    };
                },
            }
        }

        tracing::warn!(bytes = body.len(), "{}; dropping metrics batch", ReporterError::AllEndpointsFailed {
            attempts
        });
        DeliveryOutcome::Dropped { attempts }
    }
}

/// True when the request never reached an accepting node.
fn is_connect_failure(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_builder()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
