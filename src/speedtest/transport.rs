//! The seam between the measurement engine and the network.
//!
//! The engine only ever talks to a [`Transport`]: the HTTP client in
//! production, a scripted mock in tests.

use crate::errors::TransportError;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream};
use std::future::Future;
use std::pin::Pin;
use url::Url;

/// Body of a download, delivered frame by frame as it arrives.
pub type ChunkStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Lazily produced upload body.
pub type UploadStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync>>;

/// Payload of a single upload request.
pub enum UploadBody {
    /// Pre-generated payload, held in memory for the whole request.
    Full(Bytes),
    /// Payload generated while it is being sent.
    Streaming { len: u64, stream: UploadStream },
}

impl UploadBody {
    pub fn content_length(&self) -> u64 {
        match self {
            UploadBody::Full(bytes) => bytes.len() as u64,
            UploadBody::Streaming { len, .. } => *len,
        }
    }
}

pub trait Transport: Send + Sync + 'static {
    /// One lightweight round trip. Resolves once the full response has
    /// been received.
    fn ping(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Start a download. Resolves once the response headers are in; the
    /// body is read from the returned stream.
    fn download(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send;

    /// Send `body` and wait for the server to acknowledge it.
    fn upload(
        &self,
        url: &Url,
        body: UploadBody,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
