//! Streaming transport seam.
//!
//! The connection layer depends on this trait rather than on reqwest so the
//! reconnect machinery can be driven by a fake transport in tests. The
//! production implementation lives in [`http`]; [`framing`] turns the raw
//! byte stream into named event frames.

pub mod framing;
pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::TransportError;
use crate::token::Credentials;

/// Raw chunks of an open event stream. Ends (`None`) on a clean
/// server-initiated close; yields `Err` on a mid-stream transport failure.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens one authenticated streaming request to an endpoint.
#[async_trait]
pub trait EventStreamTransport: Send + Sync {
    async fn open(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<FrameStream, TransportError>;
}
