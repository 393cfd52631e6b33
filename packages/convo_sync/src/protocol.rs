//! Event frames and well-known wire payloads.
//!
//! The core treats every frame payload as an opaque JSON string; subscribers
//! that want typed access decode through [`EventFrame::payload`] using the
//! structs below. Unknown event names flow through the dispatcher untouched,
//! so new server-side events need no client release to be subscribable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Event names the service currently pushes.
pub mod events {
    /// A message was appended to a conversation.
    pub const CONVERSATION_MESSAGE: &str = "conversation.message";
    /// A participant's online status changed.
    pub const PARTICIPANT_STATUS: &str = "participant.status";
    /// The assistant requested focus on a conversation.
    pub const ASSISTANT_FOCUS: &str = "assistant.focus";
}

/// One server-pushed, named message unit within the stream.
///
/// Frames are transient: they exist only for the duration of a dispatch and
/// are never persisted. The stream itself carries no server clock, so frames
/// are stamped with the local receive time; server-side timestamps ride
/// inside the payloads (`created_at`, `requested_at`).
#[derive(Debug, Clone)]
pub struct EventFrame {
    /// Event name the frame was published under.
    pub event: String,
    /// Opaque payload, conventionally JSON.
    pub data: String,
    /// Server-assigned frame id, when present.
    pub id: Option<String>,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>, id: Option<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id,
            received_at: Utc::now(),
        }
    }

    /// Decode the payload as JSON into a typed struct.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Payload of [`events::CONVERSATION_MESSAGE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub display_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Payload of [`events::PARTICIPANT_STATUS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantStatus {
    pub user_id: String,
    pub display_name: String,
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Payload of [`events::ASSISTANT_FOCUS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusRequest {
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
}
