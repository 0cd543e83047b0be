//! peermux - tail newline-delimited records from a changing set of HTTP peers
//!
//! Every peer is fetched with an HTTP `GET`; each line of each response body
//! is written to stdout as it arrives. Ended or failed streams are reopened
//! after a fixed delay. With `--peers-file` the peer list is re-read every
//! tick, so peers can be added and removed while running.

mod resolver;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use peermux_core::{PeerResolver, Record, StaticPeers};
use peermux_runtime::{init_logging, LogFormat, Multiplexer, MuxConfig, DEFAULT_MAX_RECORD_LEN};
use peermux_transport::{HttpStreamOpener, UrlTemplate};

use resolver::FilePeerResolver;

/// peermux - multiplex line streams from many HTTP peers onto stdout
#[derive(Parser, Debug)]
#[command(name = "peermux")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Peer addresses, substituted into the URL template
    #[arg(required_unless_present = "peers_file")]
    peers: Vec<String>,

    /// File with one peer per line, re-read on every tick
    #[arg(long, conflicts_with = "peers")]
    peers_file: Option<PathBuf>,

    /// URL fetched for each peer; `{addr}` is replaced by the peer address
    #[arg(long, default_value = "http://{addr}/")]
    url_template: String,

    /// Peer re-resolution interval
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    tick: Duration,

    /// Delay before reconnecting to a peer whose stream ended or failed
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    retry: Duration,

    /// Records buffered between peers and stdout
    #[arg(long, default_value_t = 1024)]
    buffer: usize,

    /// Longest accepted line in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_RECORD_LEN)]
    max_record_len: usize,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (text, json)
    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

impl Cli {
    fn mux_config(&self) -> MuxConfig {
        MuxConfig {
            tick_interval: self.tick,
            retry_delay: self.retry,
            max_record_len: self.max_record_len,
            join_on_shutdown: true,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, &cli.log_level)?;
    anyhow::ensure!(cli.buffer > 0, "--buffer must be at least 1");

    let template = UrlTemplate::new(cli.url_template.clone())?;
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let opener = HttpStreamOpener::new(client, template);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
            }
            cancel.cancel();
        });
    }

    let (tx, rx) = mpsc::channel(cli.buffer);
    let writer = tokio::spawn(write_records(rx, tokio::io::stdout(), cancel.clone()));

    let config = cli.mux_config();
    match &cli.peers_file {
        Some(path) => {
            let resolver = FilePeerResolver::new(path);
            tracing::info!(path = %resolver.path().display(), "reading peers from file");
            run(resolver, opener, tx, config, &cancel).await?
        }
        None => run(StaticPeers::new(cli.peers.clone()), opener, tx, config, &cancel).await?,
    }

    let written = writer.await.context("stdout writer task failed")??;
    tracing::info!(records = written, "done");
    Ok(())
}

async fn run<R: PeerResolver>(
    resolver: R,
    opener: HttpStreamOpener<UrlTemplate>,
    sink: mpsc::Sender<Record>,
    config: MuxConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let mux = Multiplexer::with_config(resolver, opener, sink, config)?;
    mux.run(cancel).await;
    Ok(())
}

/// Drain records to `out` in arrival order, flushing whenever the channel
/// runs dry. A write failure cancels `cancel`.
async fn write_records<W>(
    mut rx: mpsc::Receiver<Record>,
    out: W,
    cancel: CancellationToken,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut out = BufWriter::new(out);
    let mut written = 0u64;

    let result: std::io::Result<()> = async {
        while let Some(record) = rx.recv().await {
            out.write_all(record.as_bytes()).await?;
            written += 1;
            while let Ok(record) = rx.try_recv() {
                out.write_all(record.as_bytes()).await?;
                written += 1;
            }
            out.flush().await?;
        }
        out.flush().await
    }
    .await;

    if let Err(err) = result {
        // Output is gone (e.g. closed pipe); nothing left to deliver to.
        cancel.cancel();
        return Err(err).context("failed to write records");
    }
    Ok(written)
}
