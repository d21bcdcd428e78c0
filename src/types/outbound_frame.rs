use serde::{Deserialize, Serialize};

/// The single outbound frame shape on the streaming chat socket.
///
/// The protocol is fire-and-forget: one `{"message": ...}` frame per
/// exchange, with correlation handled out-of-band via trace ids on the
/// inbound side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// The user's message text, already trimmed.
    pub message: String,
}

impl OutboundFrame {
    /// Creates a new outbound frame.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Serializes the frame for the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"message\":\"\"}"))
    }
}
