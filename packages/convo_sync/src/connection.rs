//! Stream connection: one long-lived streaming request at a time, with
//! automatic reconnection on retryable failure.
//!
//! The connection owns exactly one in-flight request. `connect` aborts any
//! prior attempt before opening a new one, awaits token acquisition so a
//! fatal auth failure surfaces to the caller, and hands the open stream to a
//! reader task that decodes frames, feeds the dispatcher, and drives the
//! fixed-delay reconnect loop. `close` cancels everything, including a
//! pending reconnect timer, and is terminal until the next `connect`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::dispatch::EventDispatcher;
use crate::error::{ChannelError, Result};
use crate::token::CredentialBroker;
use crate::transport::framing::FrameDecoder;
use crate::transport::{EventStreamTransport, FrameStream};

/// Delay between reconnect attempts. Fixed, uncapped, unjittered, matching
/// the behavior UI clients have relied on so far.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Lifecycle of the underlying streaming request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

struct Inner {
    endpoint: Option<String>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

/// Owns the single streaming request for one channel.
pub struct StreamConnection {
    transport: Arc<dyn EventStreamTransport>,
    broker: CredentialBroker,
    dispatcher: Arc<EventDispatcher>,
    state_tx: watch::Sender<ConnectionState>,
    // Serializes connect/close sequences so an abort and the open that
    // follows it can never interleave with another caller's sequence.
    inner: tokio::sync::Mutex<Inner>,
}

impl StreamConnection {
    pub fn new(
        transport: Arc<dyn EventStreamTransport>,
        broker: CredentialBroker,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            broker,
            dispatcher,
            state_tx,
            inner: tokio::sync::Mutex::new(Inner {
                endpoint: None,
                cancel: CancellationToken::new(),
                reader: None,
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions (UI indicators, tests).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Open a streaming connection to `endpoint`.
    ///
    /// No-op when a live connection to the same endpoint already exists.
    /// Token acquisition happens before the request; a fatal token failure
    /// propagates out of this call and nothing is retried. A retryable
    /// transport failure on the first attempt is absorbed: the reader task
    /// starts in the reconnect loop and the call still returns `Ok`.
    pub async fn connect(&self, endpoint: &str) -> Result<()> {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ChannelError::InvalidEndpoint(endpoint.to_string()));
        }

        let mut inner = self.inner.lock().await;
        if inner.endpoint.as_deref() == Some(endpoint)
            && *self.state_tx.borrow() != ConnectionState::Disconnected
        {
            debug!(endpoint = %endpoint, "already connected; skipping");
            return Ok(());
        }

        Self::halt(&mut inner).await;
        self.state_tx.send_replace(ConnectionState::Connecting);
        inner.endpoint = Some(endpoint.to_string());
        let cancel = CancellationToken::new();
        inner.cancel = cancel.clone();

        let credentials = match self.broker.acquire().await {
            Ok(creds) => creds,
            Err(err) => {
                inner.endpoint = None;
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(err.into());
            }
        };

        let initial = match self.transport.open(endpoint, &credentials).await {
            Ok(stream) => {
                self.state_tx.send_replace(ConnectionState::Connected);
                Some(stream)
            }
            Err(err) if err.is_retryable() => {
                warn!(endpoint = %endpoint, error = %err, "connect failed; will retry");
                self.state_tx.send_replace(ConnectionState::Reconnecting);
                None
            }
            Err(err) => {
                inner.endpoint = None;
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(ChannelError::Auth(err));
            }
        };

        inner.reader = Some(tokio::spawn(Self::run(
            self.transport.clone(),
            self.broker.clone(),
            self.dispatcher.clone(),
            endpoint.to_string(),
            cancel,
            self.state_tx.clone(),
            initial,
        )));
        Ok(())
    }

    /// Abort the request, cancel any pending reconnect timer, and go
    /// `Disconnected`. Terminal until the next `connect`.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        Self::halt(&mut inner).await;
        inner.endpoint = None;
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Cancel and await the current reader task so its stream is dropped
    /// before the caller proceeds. Dispatch never spans an await point, so
    /// no handler is interrupted mid-delivery.
    async fn halt(inner: &mut Inner) {
        inner.cancel.cancel();
        if let Some(reader) = inner.reader.take() {
            reader.abort();
            let _ = reader.await;
        }
    }

    /// Reader task: pump frames into the dispatcher; on clean close or
    /// retryable error, wait the fixed delay and reconnect, forever, until
    /// cancelled. A fatal auth failure here has no caller to throw to; it
    /// is logged and the state parks in `Disconnected` for the UI to react.
    async fn run(
        transport: Arc<dyn EventStreamTransport>,
        broker: CredentialBroker,
        dispatcher: Arc<EventDispatcher>,
        endpoint: String,
        cancel: CancellationToken,
        state_tx: watch::Sender<ConnectionState>,
        mut pending: Option<FrameStream>,
    ) {
        loop {
            let mut stream = match pending.take() {
                Some(stream) => stream,
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                    let credentials = match broker.acquire().await {
                        Ok(creds) => creds,
                        Err(err) => {
                            error!(endpoint = %endpoint, error = %err,
                                "token acquisition failed during reconnect; giving up");
                            state_tx.send_replace(ConnectionState::Disconnected);
                            return;
                        }
                    };
                    if cancel.is_cancelled() {
                        return;
                    }
                    match transport.open(&endpoint, &credentials).await {
                        Ok(stream) => {
                            debug!(endpoint = %endpoint, "reconnected");
                            state_tx.send_replace(ConnectionState::Connected);
                            stream
                        }
                        Err(err) if err.is_retryable() => {
                            debug!(endpoint = %endpoint, error = %err, "reconnect attempt failed");
                            continue;
                        }
                        Err(err) => {
                            error!(endpoint = %endpoint, error = %err,
                                "authentication rejected during reconnect; giving up");
                            state_tx.send_replace(ConnectionState::Disconnected);
                            return;
                        }
                    }
                }
            };

            let mut decoder = FrameDecoder::new();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    chunk = stream.next() => match chunk {
                        Some(Ok(bytes)) => {
                            for frame in decoder.feed(&bytes) {
                                if cancel.is_cancelled() {
                                    return;
                                }
                                dispatcher.dispatch(&frame.event, &frame);
                            }
                        }
                        Some(Err(err)) => {
                            warn!(endpoint = %endpoint, error = %err, "stream error; reconnecting");
                            break;
                        }
                        None => {
                            debug!(endpoint = %endpoint, "server closed the stream; reconnecting");
                            break;
                        }
                    }
                }
            }

            if cancel.is_cancelled() {
                return;
            }
            state_tx.send_replace(ConnectionState::Reconnecting);
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_lock() {
            inner.cancel.cancel();
            if let Some(reader) = inner.reader.take() {
                reader.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TokenError, TransportError};
    use crate::token::{Credentials, TokenProvider};
    use async_trait::async_trait;

    struct NullTransport;

    #[async_trait]
    impl EventStreamTransport for NullTransport {
        async fn open(
            &self,
            _endpoint: &str,
            _credentials: &Credentials,
        ) -> std::result::Result<FrameStream, TransportError> {
            Ok(Box::pin(futures::stream::pending()))
        }
    }

    struct NullProvider;

    #[async_trait]
    impl TokenProvider for NullProvider {
        async fn access_token(&self, _force_refresh: bool) -> std::result::Result<String, TokenError> {
            Ok("a".to_string())
        }
        async fn identity_token(&self, _force_refresh: bool) -> std::result::Result<String, TokenError> {
            Ok("i".to_string())
        }
        async fn reauthenticate(&self) -> std::result::Result<(), TokenError> {
            Ok(())
        }
    }

    fn connection() -> StreamConnection {
        StreamConnection::new(
            Arc::new(NullTransport),
            CredentialBroker::new(Arc::new(NullProvider)),
            Arc::new(EventDispatcher::new()),
        )
    }

    #[tokio::test]
    async fn rejects_relative_endpoints() {
        let conn = connection();
        let err = conn.connect("events").await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidEndpoint(_)));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn rejects_empty_endpoint() {
        let conn = connection();
        assert!(conn.connect("").await.is_err());
    }

    #[tokio::test]
    async fn connect_then_close_is_terminal() {
        let conn = connection();
        conn.connect("https://sync.example.com/events").await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);

        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn close_without_connect_is_harmless() {
        let conn = connection();
        conn.close().await;
        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
