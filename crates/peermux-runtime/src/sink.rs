//! Output sink seam

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

use peermux_core::Record;

/// The consumer side of the sink is gone
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Sink closed")]
pub struct SinkClosed;

/// Conduit shared by every worker. Capacity is the caller's choice.
pub trait RecordSink: Clone + Send + Sync + 'static {
    /// Deliver one record, waiting for capacity if the sink is bounded
    fn deliver(&self, record: Record) -> impl Future<Output = Result<(), SinkClosed>> + Send;
}

impl RecordSink for mpsc::Sender<Record> {
    async fn deliver(&self, record: Record) -> Result<(), SinkClosed> {
        self.send(record).await.map_err(|_| SinkClosed)
    }
}

impl RecordSink for mpsc::UnboundedSender<Record> {
    async fn deliver(&self, record: Record) -> Result<(), SinkClosed> {
        self.send(record).map_err(|_| SinkClosed)
    }
}
