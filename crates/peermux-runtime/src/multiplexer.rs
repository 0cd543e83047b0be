//! Multiplexer - the blocking entry point
//!
//! Resolves peers once, starts their workers, then re-resolves and
//! reconciles on every tick until the root lifetime is canceled. Records
//! never pass through here; the loop only manages worker lifecycles.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use peermux_core::{MuxResult, PeerResolver, StreamOpener};

use crate::{
    ActiveSet, Delay, IntervalTicker, MuxConfig, RecordSink, Ticker, TokioDelay, WorkerContext,
};

/// Peer stream multiplexer
pub struct Multiplexer<R, O, S, D = TokioDelay> {
    resolver: R,
    ctx: WorkerContext<O, S, D>,
    config: MuxConfig,
}

impl<R, O, S> Multiplexer<R, O, S, TokioDelay>
where
    R: PeerResolver,
    O: StreamOpener,
    S: RecordSink,
{
    /// Create a multiplexer with the default configuration
    pub fn new(resolver: R, opener: O, sink: S) -> Self {
        let config = MuxConfig::default();
        let ctx = WorkerContext::new(Arc::new(opener), sink, Arc::new(TokioDelay), &config);
        Multiplexer {
            resolver,
            ctx,
            config,
        }
    }

    /// Create a multiplexer with a custom configuration
    pub fn with_config(resolver: R, opener: O, sink: S, config: MuxConfig) -> MuxResult<Self> {
        config.validate()?;
        let ctx = WorkerContext::new(Arc::new(opener), sink, Arc::new(TokioDelay), &config);
        Ok(Multiplexer {
            resolver,
            ctx,
            config,
        })
    }
}

impl<R, O, S, D> Multiplexer<R, O, S, D>
where
    R: PeerResolver,
    O: StreamOpener,
    S: RecordSink,
    D: Delay,
{
    /// Replace the retry delay primitive
    pub fn with_delay<D2: Delay>(self, delay: D2) -> Multiplexer<R, O, S, D2> {
        let ctx = WorkerContext::new(self.ctx.opener, self.ctx.sink, Arc::new(delay), &self.config);
        Multiplexer {
            resolver: self.resolver,
            ctx,
            config: self.config,
        }
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Run until `cancel` fires, re-resolving every `tick_interval`
    pub async fn run(&self, cancel: &CancellationToken) {
        let ticker = IntervalTicker::new(self.config.tick_interval);
        self.run_with_ticker(cancel, ticker).await;
    }

    /// Run until `cancel` fires, re-resolving on every tick of `ticker`.
    ///
    /// Workers run on child scopes of `cancel`. Unless `join_on_shutdown`
    /// is set, this returns as soon as `cancel` fires and leaves each worker
    /// to notice the cancellation at its next suspension point.
    pub async fn run_with_ticker<T: Ticker>(&self, cancel: &CancellationToken, mut ticker: T) {
        let mut active = ActiveSet::new();
        let report = active.reconcile(cancel, self.resolver.resolve(), &self.ctx);
        tracing::info!(
            peers = active.len(),
            duplicates = report.duplicates.len(),
            "multiplexer started"
        );

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    ticks += 1;
                    let report = active.reconcile(cancel, self.resolver.resolve(), &self.ctx);
                    tracing::debug!(
                        tick = ticks,
                        peers = active.len(),
                        started = report.started.len(),
                        stopped = report.stopped.len(),
                        "peers reconciled"
                    );
                }
            }
        }

        tracing::info!(peers = active.len(), ticks, "multiplexer stopping");
        if self.config.join_on_shutdown {
            active.shutdown().await;
            tracing::debug!("all peer workers joined");
        }
    }
}
