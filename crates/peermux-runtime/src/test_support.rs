//! Scripted collaborators for deterministic runtime tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use peermux_core::{ByteStream, MuxError, MuxResult, PeerAddr, Record, StreamOpener};

use crate::{Delay, RecordSink, SinkClosed, Ticker};

/// Upper bound for any single wait in a test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One scripted read result
#[derive(Debug)]
pub enum Step {
    Chunk(Bytes),
    Fail(MuxError),
    /// Block until the lifetime is canceled
    Hang,
}

impl Step {
    pub fn chunk(bytes: &'static [u8]) -> Self {
        Step::Chunk(Bytes::from_static(bytes))
    }
}

/// Byte stream replaying a script, then ending cleanly
pub struct ScriptedStream {
    steps: VecDeque<Step>,
    lifetime: CancellationToken,
}

impl ScriptedStream {
    pub fn new(steps: Vec<Step>) -> Self {
        Self::with_lifetime(steps, CancellationToken::new())
    }

    fn with_lifetime(steps: Vec<Step>, lifetime: CancellationToken) -> Self {
        ScriptedStream {
            steps: steps.into(),
            lifetime,
        }
    }
}

impl ByteStream for ScriptedStream {
    async fn next_chunk(&mut self) -> MuxResult<Option<Bytes>> {
        match self.steps.pop_front() {
            Some(Step::Chunk(bytes)) => Ok(Some(bytes)),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => {
                self.steps.push_front(Step::Hang);
                self.lifetime.cancelled().await;
                Err(MuxError::Canceled)
            }
            None => Ok(None),
        }
    }
}

#[derive(Default)]
struct OpenerState {
    scripts: HashMap<PeerAddr, VecDeque<MuxResult<Vec<Step>>>>,
    opens: HashMap<PeerAddr, Vec<CancellationToken>>,
}

/// Opener replaying per-peer scripts. Once a peer's scripts run out, every
/// further open yields a stream that hangs until canceled.
#[derive(Clone, Default)]
pub struct ScriptedOpener {
    state: Arc<Mutex<OpenerState>>,
    opened: Arc<Notify>,
}

impl ScriptedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the steps returned by the next unscripted open of `addr`
    pub fn push(&self, addr: &str, steps: Vec<Step>) {
        self.state
            .lock()
            .scripts
            .entry(PeerAddr::from(addr))
            .or_default()
            .push_back(Ok(steps));
    }

    pub fn push_open_error(&self, addr: &str, err: MuxError) {
        self.state
            .lock()
            .scripts
            .entry(PeerAddr::from(addr))
            .or_default()
            .push_back(Err(err));
    }

    pub fn open_count(&self, addr: &str) -> usize {
        self.state
            .lock()
            .opens
            .get(&PeerAddr::from(addr))
            .map_or(0, Vec::len)
    }

    /// Lifetimes handed to each open of `addr`, oldest first
    pub fn lifetimes(&self, addr: &str) -> Vec<CancellationToken> {
        self.state
            .lock()
            .opens
            .get(&PeerAddr::from(addr))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn wait_for_opens(&self, addr: &str, count: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            loop {
                let notified = self.opened.notified();
                if self.open_count(addr) >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for opens");
    }
}

impl StreamOpener for ScriptedOpener {
    type Stream = ScriptedStream;

    async fn open(
        &self,
        lifetime: &CancellationToken,
        addr: &PeerAddr,
    ) -> MuxResult<ScriptedStream> {
        let script = {
            let mut state = self.state.lock();
            state
                .opens
                .entry(addr.clone())
                .or_default()
                .push(lifetime.clone());
            state
                .scripts
                .get_mut(addr)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(vec![Step::Hang]))
        };
        self.opened.notify_waiters();

        script.map(|steps| ScriptedStream::with_lifetime(steps, lifetime.clone()))
    }
}

struct DelayState {
    calls: AtomicUsize,
    gate: Option<Semaphore>,
    slept: Notify,
}

/// Delay that counts calls and either returns at once or waits for
/// [`ManualDelay::release`].
#[derive(Clone)]
pub struct ManualDelay {
    state: Arc<DelayState>,
}

impl ManualDelay {
    pub fn immediate() -> Self {
        Self::build(None)
    }

    pub fn gated() -> Self {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        ManualDelay {
            state: Arc::new(DelayState {
                calls: AtomicUsize::new(0),
                gate,
                slept: Notify::new(),
            }),
        }
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self, sleeps: usize) {
        if let Some(gate) = &self.state.gate {
            gate.add_permits(sleeps);
        }
    }

    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            loop {
                let notified = self.state.slept.notified();
                if self.calls() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for delay calls");
    }
}

impl Delay for ManualDelay {
    async fn sleep(&self, _duration: Duration) {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.slept.notify_waiters();
        if let Some(gate) = &self.state.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

/// Ticker fired by hand through [`TickSender`]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

#[derive(Clone)]
pub struct TickSender(mpsc::UnboundedSender<()>);

impl TickSender {
    pub fn tick(&self) {
        let _ = self.0.send(());
    }
}

pub fn manual_ticker() -> (TickSender, ManualTicker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TickSender(tx), ManualTicker { rx })
}

impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

/// Resolver whose answer tests swap between ticks
#[derive(Clone, Default)]
pub struct SwappableResolver {
    peers: Arc<Mutex<Vec<PeerAddr>>>,
    calls: Arc<AtomicUsize>,
    resolved: Arc<Notify>,
}

impl SwappableResolver {
    pub fn new(peers: &[&str]) -> Self {
        let resolver = Self::default();
        resolver.set(peers);
        resolver
    }

    pub fn set(&self, peers: &[&str]) {
        *self.peers.lock() = peers.iter().map(|p| PeerAddr::from(*p)).collect();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            loop {
                let notified = self.resolved.notified();
                if self.calls() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for resolver calls");
    }
}

impl peermux_core::PeerResolver for SwappableResolver {
    fn resolve(&self) -> Vec<PeerAddr> {
        let peers = self.peers.lock().clone();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.resolved.notify_waiters();
        peers
    }
}

/// Bounded channel sink that counts delivery attempts, blocked ones included
#[derive(Clone)]
pub struct CountingSink {
    inner: mpsc::Sender<Record>,
    attempts: Arc<AtomicUsize>,
    attempted: Arc<Notify>,
}

impl CountingSink {
    pub fn new(inner: mpsc::Sender<Record>) -> Self {
        CountingSink {
            inner,
            attempts: Arc::new(AtomicUsize::new(0)),
            attempted: Arc::new(Notify::new()),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn wait_for_attempts(&self, count: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            loop {
                let notified = self.attempted.notified();
                if self.attempts() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for delivery attempts");
    }
}

impl RecordSink for CountingSink {
    async fn deliver(&self, record: Record) -> Result<(), SinkClosed> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempted.notify_waiters();
        self.inner.deliver(record).await
    }
}
