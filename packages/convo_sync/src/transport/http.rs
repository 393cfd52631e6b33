//! reqwest-based production transport.
//!
//! One GET per connection attempt, credentials attached per request (tokens
//! may rotate between reconnects), no overall request timeout since the
//! response is expected to stay open indefinitely. Only the connect phase
//! is bounded.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::TransportError;
use crate::token::Credentials;
use crate::transport::{EventStreamTransport, FrameStream};

/// Default header carrying the secondary identity token.
pub const DEFAULT_IDENTITY_HEADER: &str = "X-Identity-Token";

pub struct HttpEventStreamTransport {
    client: reqwest::Client,
    identity_header: String,
}

impl HttpEventStreamTransport {
    pub fn new(config: &SyncConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            identity_header: config.identity_header.clone(),
        })
    }
}

#[async_trait]
impl EventStreamTransport for HttpEventStreamTransport {
    async fn open(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<FrameStream, TransportError> {
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&credentials.access_token)
            .header(self.identity_header.as_str(), &credentials.identity_token)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        debug!(endpoint = %endpoint, "event stream open");
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Stream(e.to_string())));
        Ok(Box::pin(stream))
    }
}
