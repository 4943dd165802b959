//! Upstream port: opening a streaming chat-completions request.
//!
//! Same shape as the rest of the workspace's ports: a trait using RPITIT,
//! an object-safe `*Dyn` twin with boxed futures, and a `Box*` wrapper for
//! runtime dispatch.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use fencecast_types::error::RelayError;
use fencecast_types::upstream::UpstreamRequest;

/// Raw upstream body chunks, split at arbitrary byte boundaries.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send + 'static>>;

/// Opens streaming requests against an upstream text-generation API.
///
/// Implementations must resolve only after the response status is known:
/// a non-success status is returned as [`RelayError::UpstreamStatus`] and an
/// unreachable upstream as [`RelayError::Connection`], so that the caller can
/// still answer with a plain (non-SSE) error.
///
/// `cancel` must abort both the pending request and the returned stream;
/// once it fires the stream ends and the connection is released.
pub trait UpstreamClient: Send + Sync {
    fn open(
        &self,
        request: &UpstreamRequest,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<ByteStream, RelayError>> + Send;
}

/// Object-safe version of [`UpstreamClient`].
pub trait UpstreamClientDyn: Send + Sync {
    fn open_boxed<'a>(
        &'a self,
        request: &'a UpstreamRequest,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, RelayError>> + Send + 'a>>;
}

impl<T: UpstreamClient> UpstreamClientDyn for T {
    fn open_boxed<'a>(
        &'a self,
        request: &'a UpstreamRequest,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, RelayError>> + Send + 'a>> {
        Box::pin(self.open(request, cancel))
    }
}

/// Type-erased upstream client held by the HTTP state.
pub struct BoxUpstreamClient {
    inner: Box<dyn UpstreamClientDyn>,
}

impl BoxUpstreamClient {
    pub fn new<T: UpstreamClient + 'static>(client: T) -> Self {
        Self { inner: Box::new(client) }
    }

    pub async fn open(
        &self,
        request: &UpstreamRequest,
        cancel: CancellationToken,
    ) -> Result<ByteStream, RelayError> {
        self.inner.open_boxed(request, cancel).await
    }
}

impl std::fmt::Debug for BoxUpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxUpstreamClient").finish_non_exhaustive()
    }
}
