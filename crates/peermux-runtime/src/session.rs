//! Read session - one attempt to open a peer and forward its lines
//!
//! A session opens a fresh stream, splits it into records and forwards each
//! one to the sink. Every suspension point (open, read, deliver) is raced
//! against the lifetime, so a canceled peer stops without forwarding
//! anything further, even when the sink is full.

use bytes::BytesMut;
use tokio_util::sync::CancellationToken;

use peermux_core::{ByteStream, MuxError, MuxResult, PeerAddr, Record, StreamOpener};

use crate::RecordSink;

/// How a read session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The lifetime was canceled. Terminal for the worker.
    Canceled,
    /// Clean end of stream after forwarding `records` records
    Ended { records: u64 },
    /// Open or read failure
    Failed(MuxError),
    /// The consumer dropped its end of the sink
    SinkClosed,
}

impl SessionOutcome {
    fn from_error(err: MuxError) -> Self {
        if err.is_canceled() {
            SessionOutcome::Canceled
        } else {
            SessionOutcome::Failed(err)
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, SessionOutcome::Canceled)
    }
}

/// Splits a byte stream into newline-terminated records
pub struct LineScanner<S> {
    stream: S,
    buf: BytesMut,
    /// Bytes of `buf` already searched for a newline
    scanned: usize,
    max_record_len: usize,
    eof: bool,
}

impl<S: ByteStream> LineScanner<S> {
    pub fn new(stream: S, max_record_len: usize) -> Self {
        LineScanner {
            stream,
            buf: BytesMut::new(),
            scanned: 0,
            max_record_len,
            eof: false,
        }
    }

    /// Next record, or `None` once the stream ended cleanly.
    ///
    /// One trailing `\r` is dropped. An unterminated final line is still
    /// returned, with a newline appended.
    pub async fn next_record(&mut self) -> MuxResult<Option<Record>> {
        loop {
            if let Some(pos) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
                let end = self.scanned + pos;
                if strip_cr(&self.buf[..end]).len() > self.max_record_len {
                    return Err(MuxError::RecordTooLong {
                        limit: self.max_record_len,
                    });
                }
                self.scanned = 0;
                return Ok(Some(self.take_line(end)));
            }
            self.scanned = self.buf.len();

            // A pending `\r` may still turn out to be half of a CRLF.
            if strip_cr(&self.buf).len() > self.max_record_len {
                return Err(MuxError::RecordTooLong {
                    limit: self.max_record_len,
                });
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = self.buf.split();
                self.scanned = 0;
                return Ok(Some(Record::from_line(strip_cr(&line))));
            }

            match self.stream.next_chunk().await? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => self.eof = true,
            }
        }
    }

    /// Split off the line ending at the newline index `end`
    fn take_line(&mut self, end: usize) -> Record {
        let line = self.buf.split_to(end + 1).freeze();
        if end > 0 && line[end - 1] == b'\r' {
            Record::from_line(&line[..end - 1])
        } else {
            Record::from_terminated(line)
        }
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Run one read session against `addr`
pub async fn read_once<O, S>(
    lifetime: &CancellationToken,
    opener: &O,
    addr: &PeerAddr,
    sink: &S,
    max_record_len: usize,
) -> SessionOutcome
where
    O: StreamOpener,
    S: RecordSink,
{
    if lifetime.is_cancelled() {
        return SessionOutcome::Canceled;
    }

    let opened = tokio::select! {
        biased;
        _ = lifetime.cancelled() => return SessionOutcome::Canceled,
        opened = opener.open(lifetime, addr) => opened,
    };
    let stream = match opened {
        Ok(stream) => stream,
        Err(err) => return SessionOutcome::from_error(err),
    };

    let mut scanner = LineScanner::new(stream, max_record_len);
    let mut records = 0u64;
    loop {
        let next = tokio::select! {
            biased;
            _ = lifetime.cancelled() => return SessionOutcome::Canceled,
            next = scanner.next_record() => next,
        };
        let record = match next {
            Ok(Some(record)) => record,
            Ok(None) => return SessionOutcome::Ended { records },
            Err(err) => return SessionOutcome::from_error(err),
        };

        tokio::select! {
            biased;
            _ = lifetime.cancelled() => return SessionOutcome::Canceled,
            delivered = sink.deliver(record) => {
                if delivered.is_err() {
                    return SessionOutcome::SinkClosed;
                }
            }
        }
        records += 1;
    }
}
