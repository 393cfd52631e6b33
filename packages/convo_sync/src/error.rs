//! Error types for the event channel client.
//!
//! Three boundaries, three enums: `TokenError` for the token-acquisition
//! capability, `TransportError` for the streaming transport, and
//! `ChannelError` for everything that crosses the crate's public surface.
//! Retryable transport failures never escape: they are absorbed by the
//! reconnect loop. Only authentication failures and caller mistakes
//! (bad endpoints, missing ids) surface as `ChannelError`.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Failure from the token-acquisition capability.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// The provider cannot mint a token silently; the user must complete
    /// an interactive flow.
    #[error("interactive authentication required")]
    InteractionRequired,

    /// The interactive re-authentication attempt itself failed.
    #[error("interactive authentication failed: {0}")]
    InteractionFailed(String),

    /// Any other provider-side failure.
    #[error("token acquisition failed: {0}")]
    Provider(String),
}

/// Failure from the streaming transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, TCP, TLS, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The server rejected the credentials. Not retryable.
    #[error("authentication rejected (status {status})")]
    Auth { status: u16 },

    /// Any other non-success response status.
    #[error("unexpected response status {status}")]
    Status { status: u16 },

    /// The response body errored mid-stream.
    #[error("stream error: {0}")]
    Stream(String),
}

impl TransportError {
    /// Whether the reconnect loop should absorb this failure.
    /// Everything except an authentication rejection is retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Auth { .. })
    }
}

/// Errors surfaced to callers of the channel API.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid endpoint {0:?}: expected an absolute http(s) URL")]
    InvalidEndpoint(String),

    #[error("invalid base url {0:?}: expected an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("conversation channels require a conversation id")]
    MissingConversationId,

    /// Token acquisition failed fatally (after the single interactive
    /// attempt). Callers should clear cached credentials and force a
    /// full re-authentication.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The server rejected the connection in a way the reconnect loop
    /// does not retry.
    #[error(transparent)]
    Auth(TransportError),

    /// The HTTP client could not be constructed.
    #[error("transport setup failed: {0}")]
    Setup(TransportError),
}
