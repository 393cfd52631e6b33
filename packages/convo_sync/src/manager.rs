//! Channel managers and the per-scope-family registry.
//!
//! A [`ChannelManager`] is the single authority for one scope family: it
//! knows the current target endpoint, owns the one stream connection to it,
//! and owns the dispatcher whose subscriptions outlive every connection.
//! The [`ChannelRegistry`] hands out the per-family singletons; it lives in
//! application context rather than module-level state so tests (and
//! multi-account hosts) can construct isolated instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::connection::{ConnectionState, StreamConnection};
use crate::dispatch::{EventDispatcher, EventHandler};
use crate::error::Result;
use crate::scope::ScopeFamily;
use crate::token::{CredentialBroker, TokenProvider};
use crate::transport::EventStreamTransport;
use crate::transport::http::HttpEventStreamTransport;

/// Single authority over "what is the current target and is it connected"
/// for one scope family.
pub struct ChannelManager {
    family: ScopeFamily,
    base_url: String,
    dispatcher: Arc<EventDispatcher>,
    connection: StreamConnection,
    // Endpoint currently targeted; None when closed or never targeted.
    target: tokio::sync::Mutex<Option<String>>,
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("family", &self.family)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    fn new(
        family: ScopeFamily,
        base_url: String,
        transport: Arc<dyn EventStreamTransport>,
        provider: Arc<dyn TokenProvider>,
    ) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new());
        let connection = StreamConnection::new(
            transport,
            CredentialBroker::new(provider),
            dispatcher.clone(),
        );
        Self {
            family,
            base_url,
            dispatcher,
            connection,
            target: tokio::sync::Mutex::new(None),
        }
    }

    pub fn family(&self) -> ScopeFamily {
        self.family
    }

    /// Point this channel at a resource, connecting if the endpoint changed.
    ///
    /// Same endpoint as the current target → no-op (exactly one underlying
    /// connect for repeated calls). Different endpoint → the old connection
    /// is closed strictly before the new one opens, so no frame from the
    /// previous resource can arrive once the switch begins. Subscriptions
    /// are untouched either way.
    pub async fn update_target(&self, resource_id: Option<&str>) -> Result<()> {
        let endpoint = self.family.endpoint(&self.base_url, resource_id)?;

        let mut target = self.target.lock().await;
        if target.as_deref() == Some(endpoint.as_str()) {
            debug!(endpoint = %endpoint, "target unchanged");
            return Ok(());
        }
        if target.take().is_some() {
            self.connection.close().await;
        }
        self.connection.connect(&endpoint).await?;
        info!(endpoint = %endpoint, "channel retargeted");
        *target = Some(endpoint);
        Ok(())
    }

    /// Register `handler` for `event`. Survives reconnects and retargets.
    pub fn add_listener(&self, event: &str, handler: EventHandler) {
        self.dispatcher.subscribe(event, handler);
    }

    /// Remove a previously registered handler.
    pub fn remove_listener(&self, event: &str, handler: &EventHandler) {
        self.dispatcher.unsubscribe(event, handler);
    }

    /// Terminate the connection and forget the target. Subscriptions stay
    /// registered; a later `update_target` resumes delivery to them.
    pub async fn close(&self) {
        self.target.lock().await.take();
        self.connection.close().await;
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Watch connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }
}

/// Factory and owner of the per-scope-family channel singletons.
pub struct ChannelRegistry {
    base_url: String,
    transport: Arc<dyn EventStreamTransport>,
    provider: Arc<dyn TokenProvider>,
    channels: Mutex<HashMap<ScopeFamily, Arc<ChannelManager>>>,
}

impl ChannelRegistry {
    /// Registry backed by the production HTTP transport.
    pub fn new(config: &SyncConfig, provider: Arc<dyn TokenProvider>) -> Result<Self> {
        let transport = Arc::new(
            HttpEventStreamTransport::new(config).map_err(crate::error::ChannelError::Setup)?,
        );
        Ok(Self::with_transport(config, provider, transport))
    }

    /// Registry with a caller-supplied transport (tests, alternative stacks).
    pub fn with_transport(
        config: &SyncConfig,
        provider: Arc<dyn TokenProvider>,
        transport: Arc<dyn EventStreamTransport>,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            transport,
            provider,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// The singleton manager for a scope family, constructed lazily with
    /// its own dispatcher and no connection.
    pub fn get_or_create(&self, family: ScopeFamily) -> Arc<ChannelManager> {
        let mut channels = self.channels.lock().expect("registry lock poisoned");
        channels
            .entry(family)
            .or_insert_with(|| {
                debug!(family = ?family, "creating channel manager");
                Arc::new(ChannelManager::new(
                    family,
                    self.base_url.clone(),
                    self.transport.clone(),
                    self.provider.clone(),
                ))
            })
            .clone()
    }

    /// Fetch the family's manager and retarget it in one step. The usual
    /// entry point for UI features.
    pub async fn create_or_update(
        &self,
        family: ScopeFamily,
        resource_id: Option<&str>,
    ) -> Result<Arc<ChannelManager>> {
        let manager = self.get_or_create(family);
        manager.update_target(resource_id).await?;
        Ok(manager)
    }

    /// Close every channel. Managers (and their subscriptions) remain
    /// registered for later reuse.
    pub async fn close_all(&self) {
        let managers: Vec<Arc<ChannelManager>> = {
            let channels = self.channels.lock().expect("registry lock poisoned");
            channels.values().cloned().collect()
        };
        for manager in managers {
            manager.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TokenError, TransportError};
    use crate::token::Credentials;
    use crate::transport::FrameStream;
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
        async fn access_token(&self, _force: bool) -> std::result::Result<String, TokenError> {
            Ok("a".to_string())
        }
        async fn identity_token(&self, _force: bool) -> std::result::Result<String, TokenError> {
            Ok("i".to_string())
        }
        async fn reauthenticate(&self) -> std::result::Result<(), TokenError> {
            Ok(())
        }
    }

    fn registry() -> ChannelRegistry {
        let config = SyncConfig::from_file(&crate::config::SyncFileConfig {
            base_url: "https://sync.example.com".to_string(),
            ..Default::default()
        })
        .unwrap();
        ChannelRegistry::with_transport(&config, Arc::new(NullProvider), Arc::new(NullTransport))
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_manager_per_family() {
        let registry = registry();
        let a = registry.get_or_create(ScopeFamily::UserGlobal);
        let b = registry.get_or_create(ScopeFamily::UserGlobal);
        assert!(Arc::ptr_eq(&a, &b));

        let c = registry.get_or_create(ScopeFamily::Conversation);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn managers_start_disconnected() {
        let registry = registry();
        let manager = registry.get_or_create(ScopeFamily::Conversation);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn separate_registries_are_isolated() {
        let r1 = registry();
        let r2 = registry();
        let a = r1.get_or_create(ScopeFamily::UserGlobal);
        let b = r2.get_or_create(ScopeFamily::UserGlobal);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn conversation_target_requires_id() {
        let registry = registry();
        let manager = registry.get_or_create(ScopeFamily::Conversation);
        assert!(manager.update_target(None).await.is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn close_all_disconnects_every_family() {
        let registry = registry();
        let global = registry
            .create_or_update(ScopeFamily::UserGlobal, None)
            .await
            .unwrap();
        let convo = registry
            .create_or_update(ScopeFamily::Conversation, Some("c-1"))
            .await
            .unwrap();
        assert_eq!(global.state(), ConnectionState::Connected);
        assert_eq!(convo.state(), ConnectionState::Connected);

        registry.close_all().await;
        assert_eq!(global.state(), ConnectionState::Disconnected);
        assert_eq!(convo.state(), ConnectionState::Disconnected);
    }
}
