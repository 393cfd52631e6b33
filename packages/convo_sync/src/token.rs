//! Token-acquisition boundary.
//!
//! The stream connection never talks to an identity library directly; it
//! consumes the [`TokenProvider`] capability and leaves the concrete flow
//! (cache, refresh, interactive login) to the host application. The
//! [`CredentialBroker`] implements the per-attempt policy on top: cached
//! tokens first, then a silent refresh, then exactly one interactive
//! re-authentication, then the failure is fatal for the attempt.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::TokenError;

/// The token pair attached to every streaming request.
#[derive(Clone)]
pub struct Credentials {
    pub access_token: String,
    pub identity_token: String,
}

impl fmt::Debug for Credentials {
    // Token material stays out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("identity_token", &"<redacted>")
            .finish()
    }
}

/// Capability supplied by the host application's auth layer.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer access token. `force_refresh` bypasses any cache.
    async fn access_token(&self, force_refresh: bool) -> Result<String, TokenError>;

    /// Current identity token. `force_refresh` bypasses any cache.
    async fn identity_token(&self, force_refresh: bool) -> Result<String, TokenError>;

    /// Run one interactive re-authentication (popup, redirect, device code).
    async fn reauthenticate(&self) -> Result<(), TokenError>;
}

/// Applies the acquisition policy for a single connect attempt.
#[derive(Clone)]
pub struct CredentialBroker {
    provider: Arc<dyn TokenProvider>,
}

impl CredentialBroker {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }

    /// Acquire both tokens for one connect attempt.
    ///
    /// Cached tokens → silent refresh → one interactive re-authentication.
    /// Any failure past the interactive attempt is fatal and propagates to
    /// the caller of `connect()`; the transport loop never retries it.
    pub async fn acquire(&self) -> Result<Credentials, TokenError> {
        match self.acquire_once(false).await {
            Ok(creds) => Ok(creds),
            Err(TokenError::InteractionRequired) => {
                debug!("cached tokens unusable; attempting silent refresh");
                match self.acquire_once(true).await {
                    Ok(creds) => return Ok(creds),
                    Err(TokenError::InteractionRequired) => {}
                    Err(err) => return Err(err),
                }
                debug!("silent refresh requires interaction; running interactive flow");
                self.provider.reauthenticate().await?;
                self.acquire_once(true).await
            }
            Err(err) => Err(err),
        }
    }

    async fn acquire_once(&self, force_refresh: bool) -> Result<Credentials, TokenError> {
        let access_token = self.provider.access_token(force_refresh).await?;
        let identity_token = self.provider.identity_token(force_refresh).await?;
        Ok(Credentials {
            access_token,
            identity_token,
        })
    }
}
