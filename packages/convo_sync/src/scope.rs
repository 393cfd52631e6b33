//! Channel scope families and endpoint resolution.
//!
//! A scope family is the *class* of channel a UI feature binds to, not a
//! specific resource: the conversation family is a single channel that gets
//! retargeted across conversation ids as the user switches, while the
//! user-global family carries presence, focus requests, and conversation
//! lifecycle events for the whole account.

use crate::error::ChannelError;

/// The class of push channel a UI feature can bind to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeFamily {
    /// Account-wide events, independent of any open conversation.
    UserGlobal,
    /// Events for the currently targeted conversation.
    Conversation,
}

impl ScopeFamily {
    /// Resolve the streaming endpoint for this family.
    ///
    /// `UserGlobal` ignores `resource_id`; `Conversation` requires a
    /// non-empty conversation id.
    pub fn endpoint(
        &self,
        base_url: &str,
        resource_id: Option<&str>,
    ) -> Result<String, ChannelError> {
        let base = base_url.trim_end_matches('/');
        match self {
            ScopeFamily::UserGlobal => Ok(format!("{base}/events")),
            ScopeFamily::Conversation => {
                let id = resource_id
                    .filter(|id| !id.is_empty())
                    .ok_or(ChannelError::MissingConversationId)?;
                Ok(format!("{base}/conversations/{id}/events"))
            }
        }
    }
}
