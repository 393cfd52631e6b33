//! # convo_sync
//!
//! Live-sync event channel client for conversation UIs. Keeps a UI process
//! synchronized with server-side state (conversation messages, participant
//! status, assistant focus requests) over a long-lived, authenticated,
//! unidirectional push channel, fanning named events out to independent
//! subscribers.
//!
//! ## Overview
//!
//! The crate is organized around four pieces:
//!
//! - [`ChannelRegistry`] / [`ChannelManager`]: one manager per scope family
//!   (user-global vs. per-conversation), owning the current target endpoint
//!   and the one live connection to it.
//! - [`StreamConnection`]: the single in-flight streaming request, with a
//!   fixed-delay reconnect loop for retryable failures.
//! - [`EventDispatcher`]: synchronous pub/sub fan-out by event name; its
//!   subscriptions outlive reconnects and retargets.
//! - [`TokenProvider`]: the capability the host's auth layer supplies;
//!   the crate never talks to an identity library directly.
//!
//! Delivery is best-effort and at-most-once: frames pushed while the
//! channel is reconnecting are gone, and catching up is the caller's
//! responsibility (typically one REST fetch keyed by the last seen id).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use convo_sync::{
//!     ChannelRegistry, ScopeFamily, SyncConfig, SyncFileConfig,
//!     dispatch::handler, protocol::events,
//! };
//! # use convo_sync::{TokenProvider, error::TokenError};
//! # struct MyTokens;
//! # #[async_trait::async_trait]
//! # impl TokenProvider for MyTokens {
//! #     async fn access_token(&self, _f: bool) -> Result<String, TokenError> { todo!() }
//! #     async fn identity_token(&self, _f: bool) -> Result<String, TokenError> { todo!() }
//! #     async fn reauthenticate(&self) -> Result<(), TokenError> { todo!() }
//! # }
//!
//! # async fn example() -> convo_sync::Result<()> {
//! let config = SyncConfig::from_file(&SyncFileConfig {
//!     base_url: "https://sync.example.com".to_string(),
//!     ..Default::default()
//! })?;
//! let registry = ChannelRegistry::new(&config, Arc::new(MyTokens))?;
//!
//! // Bind the conversation channel and subscribe before (or after)
//! // connecting; subscriptions survive reconnects and retargets.
//! let channel = registry
//!     .create_or_update(ScopeFamily::Conversation, Some("conv-42"))
//!     .await?;
//! channel.add_listener(
//!     events::CONVERSATION_MESSAGE,
//!     handler(|frame| {
//!         // decode frame.data, update local cache; keep it quick
//!         let _ = frame;
//!     }),
//! );
//!
//! // Later, the user opens another conversation:
//! channel.update_target(Some("conv-43")).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod scope;
pub mod token;
pub mod transport;

pub use config::{SyncConfig, SyncFileConfig, load_config};
pub use connection::{ConnectionState, RECONNECT_DELAY, StreamConnection};
pub use dispatch::{EventDispatcher, EventHandler};
pub use error::{ChannelError, Result, TokenError, TransportError};
pub use manager::{ChannelManager, ChannelRegistry};
pub use protocol::{ConversationMessage, EventFrame, FocusRequest, ParticipantStatus};
pub use scope::ScopeFamily;
pub use token::{CredentialBroker, Credentials, TokenProvider};
pub use transport::{EventStreamTransport, FrameStream, http::HttpEventStreamTransport};
