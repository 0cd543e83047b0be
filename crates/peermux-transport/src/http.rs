//! HTTP stream opener
//!
//! Issues a `GET` per read session and hands the response body back as the
//! byte stream. Only a `200 OK` is accepted. Both the request and every
//! body read are bound to the session lifetime.

use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use peermux_core::{ByteStream, MuxError, MuxResult, PeerAddr, StreamOpener};

/// Placeholder replaced by the peer address in a [`UrlTemplate`]
pub const ADDR_PLACEHOLDER: &str = "{addr}";

/// Maps a peer address to the URL to fetch
pub trait UrlMapper: Send + Sync + 'static {
    fn url_for(&self, addr: &PeerAddr) -> String;
}

impl<F> UrlMapper for F
where
    F: Fn(&PeerAddr) -> String + Send + Sync + 'static,
{
    fn url_for(&self, addr: &PeerAddr) -> String {
        self(addr)
    }
}

/// URL template such as `http://{addr}/stream`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> MuxResult<Self> {
        let template = template.into();
        if !template.contains(ADDR_PLACEHOLDER) {
            return Err(MuxError::InvalidConfig(format!(
                "URL template {:?} has no {} placeholder",
                template, ADDR_PLACEHOLDER
            )));
        }
        Ok(UrlTemplate(template))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UrlTemplate {
    fn default() -> Self {
        UrlTemplate(format!("http://{}/", ADDR_PLACEHOLDER))
    }
}

impl UrlMapper for UrlTemplate {
    fn url_for(&self, addr: &PeerAddr) -> String {
        self.0.replace(ADDR_PLACEHOLDER, addr.as_str())
    }
}

/// Opens peers with an HTTP `GET`
pub struct HttpStreamOpener<M> {
    client: Client,
    mapper: M,
}

impl<M: UrlMapper> HttpStreamOpener<M> {
    pub fn new(client: Client, mapper: M) -> Self {
        HttpStreamOpener { client, mapper }
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }
}

impl<M: UrlMapper> StreamOpener for HttpStreamOpener<M> {
    type Stream = HttpBodyStream;

    async fn open(
        &self,
        lifetime: &CancellationToken,
        addr: &PeerAddr,
    ) -> MuxResult<HttpBodyStream> {
        let url = self.mapper.url_for(addr);
        let request = self
            .client
            .get(&url)
            .build()
            .map_err(|e| MuxError::transport("build request", e))?;

        let response = tokio::select! {
            biased;
            _ = lifetime.cancelled() => return Err(MuxError::Canceled),
            response = self.client.execute(request) => {
                response.map_err(|e| MuxError::transport("send request", e))?
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(peer = %addr, %url, %status, "peer answered with non-200 status");
            return Err(MuxError::Status {
                status: status.as_u16(),
            });
        }

        Ok(HttpBodyStream {
            response,
            lifetime: lifetime.clone(),
        })
    }
}

/// Response body of one successful `GET`
pub struct HttpBodyStream {
    response: Response,
    lifetime: CancellationToken,
}

impl ByteStream for HttpBodyStream {
    async fn next_chunk(&mut self) -> MuxResult<Option<Bytes>> {
        tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => Err(MuxError::Canceled),
            chunk = self.response.chunk() => {
                chunk.map_err(|e| MuxError::transport("read body", e))
            }
        }
    }
}
