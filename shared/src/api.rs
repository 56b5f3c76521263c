use serde::{Deserialize, Serialize};

// ============================================================================
// Messaging webhook payloads
// ============================================================================

/// Body of a broadcast request to the messaging API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub messages: Vec<OutgoingMessage>,
}

impl BroadcastRequest {
    /// A broadcast carrying a single text message
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![OutgoingMessage::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Text { text: String },
}
