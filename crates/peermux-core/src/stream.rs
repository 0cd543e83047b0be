//! Byte streams and the stream opener seam
//!
//! A [`StreamOpener`] turns a peer address into a [`ByteStream`]. Both are
//! bound to a lifetime token: once it is canceled, an in-flight or later
//! read must fail with [`MuxError::Canceled`] rather than an ordinary error,
//! otherwise a worker cannot tell "stop" from "retry".

use std::future::Future;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::{MuxError, MuxResult, PeerAddr};

/// Default read buffer for reader-backed streams
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A source of byte chunks. `Ok(None)` is a clean end of stream.
pub trait ByteStream: Send {
    fn next_chunk(&mut self) -> impl Future<Output = MuxResult<Option<Bytes>>> + Send;
}

/// Opens one byte stream for a peer
pub trait StreamOpener: Send + Sync + 'static {
    type Stream: ByteStream + 'static;

    fn open(
        &self,
        lifetime: &CancellationToken,
        addr: &PeerAddr,
    ) -> impl Future<Output = MuxResult<Self::Stream>> + Send;
}

/// [`ByteStream`] over any tokio reader, canceled with its lifetime
pub struct ReaderStream<R> {
    reader: R,
    lifetime: CancellationToken,
    chunk_size: usize,
}

impl<R> ReaderStream<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, lifetime: CancellationToken) -> Self {
        Self {
            reader,
            lifetime,
            chunk_size: READ_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R> ByteStream for ReaderStream<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> MuxResult<Option<Bytes>> {
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let read = tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => return Err(MuxError::Canceled),
            read = self.reader.read_buf(&mut buf) => read?,
        };

        if read == 0 {
            Ok(None)
        } else {
            Ok(Some(buf.freeze()))
        }
    }
}
