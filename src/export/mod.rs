//! Batching and delivery of encoded documents to Elasticsearch.
//!
//! [`ReportBuffer`] collects one poll cycle's bulk body; [`BulkClient`]
//! posts the drained body to one of the configured nodes.

pub mod buffer;
pub mod bulk;

pub use buffer::{ReportBuffer, INDEX_DATE_FORMAT};
pub use bulk::{BulkClient, DeliveryOutcome, EndpointSet, BULK_PATH};
