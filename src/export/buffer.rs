//! Accumulates one poll cycle's bulk request body.

use crate::core::{Epoch, MetricKind, Result};
use serde::Serialize;

/// Day-granularity suffix of every index name
pub const INDEX_DATE_FORMAT: &str = "%Y.%m.%d";

#[derive(Serialize)]
struct BulkAction<'a> {
    index: IndexAction<'a>,
}

#[derive(Serialize)]
struct IndexAction<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    kind: &'a str,
    #[serde(rename = "_ttl", skip_serializing_if = "Option::is_none")]
    ttl: Option<&'a str>,
}

/// Newline-delimited bulk body: an action line then a document line per metric.
///
/// Only the poll loop touches the buffer; [`ReportBuffer::drain`] hands the
/// accumulated text to delivery and leaves an empty buffer for the next tick.
#[derive(Debug, Clone)]
pub struct ReportBuffer {
    index_prefix: String,
    ttl: Option<String>,
    content: String,
    documents: usize,
}

impl ReportBuffer {
    /// Create an empty buffer. An empty TTL string counts as no TTL.
    pub fn new(index_prefix: impl Into<String>, ttl: Option<&str>) -> Self {
        Self {
            index_prefix: index_prefix.into(),
            ttl: ttl.filter(|ttl| !ttl.is_empty()).map(str::to_string),
            content: String::new(),
            documents: 0,
        }
    }

    /// Target index for documents stamped with `epoch`
    pub fn index_name(&self, epoch: &Epoch) -> String {
        format!("{}{}", self.index_prefix, epoch.format(INDEX_DATE_FORMAT))
    }

    /// Append one action line and one document line.
    pub fn append(&mut self, kind: MetricKind, document: &str, epoch: &Epoch) -> Result<()> {
        let index = self.index_name(epoch);
        let action = serde_json::to_string(&BulkAction {
            index: IndexAction {
                index: &index,
                kind: kind.as_str(),
                ttl: self.ttl.as_deref(),
            },
        })?;

        self.content.reserve(action.len() + document.len() + 2);
        self.content.push_str(&action);
        self.content.push('\n');
        self.content.push_str(document);
        self.content.push('\n');
        self.documents += 1;
        Ok(())
    }

    /// Take the accumulated body, leaving the buffer empty.
    pub fn drain(&mut self) -> String {
        self.documents = 0;
        std::mem::take(&mut self.content)
    }

    /// Documents appended since the last drain
    pub fn len(&self) -> usize {
        self.documents
    }

    /// True when nothing was appended since the last drain
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Accumulated body, without draining
    pub fn as_str(&self) -> &str {
        &self.content
    }
}
