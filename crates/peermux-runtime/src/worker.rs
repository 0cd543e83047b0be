//! Peer worker - connect, scan, retry until canceled

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use peermux_core::{PeerAddr, StreamOpener};

use crate::{read_once, Delay, MuxConfig, RecordSink, SessionOutcome};

/// Everything a worker needs besides its lifetime and address.
///
/// Cloned once per spawned worker; the opener and delay are shared.
pub struct WorkerContext<O, S, D> {
    pub opener: Arc<O>,
    pub sink: S,
    pub delay: Arc<D>,
    pub retry_delay: Duration,
    pub max_record_len: usize,
}

impl<O, S, D> WorkerContext<O, S, D> {
    pub fn new(opener: Arc<O>, sink: S, delay: Arc<D>, config: &MuxConfig) -> Self {
        WorkerContext {
            opener,
            sink,
            delay,
            retry_delay: config.retry_delay,
            max_record_len: config.max_record_len,
        }
    }
}

impl<O, S: Clone, D> Clone for WorkerContext<O, S, D> {
    fn clone(&self) -> Self {
        WorkerContext {
            opener: Arc::clone(&self.opener),
            sink: self.sink.clone(),
            delay: Arc::clone(&self.delay),
            retry_delay: self.retry_delay,
            max_record_len: self.max_record_len,
        }
    }
}

/// Keep reading `addr` until `lifetime` is canceled.
///
/// Any outcome other than cancellation (clean end included) waits
/// `retry_delay` and reopens the stream. The delay never grows.
pub async fn run_worker<O, S, D>(
    lifetime: CancellationToken,
    ctx: WorkerContext<O, S, D>,
    addr: PeerAddr,
) where
    O: StreamOpener,
    S: RecordSink,
    D: Delay,
{
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        match read_once(&lifetime, &*ctx.opener, &addr, &ctx.sink, ctx.max_record_len).await {
            SessionOutcome::Canceled => {
                tracing::debug!(peer = %addr, attempt, "worker canceled");
                return;
            }
            SessionOutcome::SinkClosed => {
                // Nothing can be delivered any more; idle until told to stop.
                tracing::warn!(peer = %addr, "sink closed, parking worker");
                lifetime.cancelled().await;
                return;
            }
            SessionOutcome::Ended { records } => {
                tracing::debug!(peer = %addr, attempt, records, "stream ended, reconnecting");
            }
            SessionOutcome::Failed(err) => {
                tracing::warn!(peer = %addr, attempt, error = %err, "read session failed");
            }
        }

        tokio::select! {
            biased;
            _ = lifetime.cancelled() => {
                tracing::debug!(peer = %addr, attempt, "worker canceled during retry delay");
                return;
            }
            _ = ctx.delay.sleep(ctx.retry_delay) => {}
        }
    }
}
