use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Reserved id carried by the in-progress assistant placeholder.
///
/// Finalized messages are never assigned this id, so callers can always
/// distinguish a message that is still streaming from one that is done.
pub const STREAMING_MESSAGE_ID: &str = "streaming";

/// The author of a chat message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// A message typed by the operator.
    User,

    /// A message produced by the agent backend.
    Assistant,

    /// A message injected by the deck itself.
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Error returned when parsing an invalid message role string.
#[derive(Debug)]
pub struct MessageRoleParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for MessageRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown message role: {}", self.invalid_value)
    }
}

impl std::error::Error for MessageRoleParseError {}

impl FromStr for MessageRole {
    type Err = MessageRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            _ => Err(MessageRoleParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// One message in a chat history.
///
/// User and system messages are created complete and never mutated.
/// Assistant messages begin life as the streaming placeholder (id
/// [`STREAMING_MESSAGE_ID`], empty content), grow by appending fragments,
/// and are frozen exactly once when the terminal stream signal arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable unique identifier; the placeholder uses the reserved sentinel.
    pub id: String,

    /// Who authored the message.
    pub role: MessageRole,

    /// The message text.
    pub content: String,

    /// Correlation identifier for the streamed exchange that produced this
    /// message, when the backend supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// When the message record was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl ChatMessage {
    /// Creates a finalized user message.
    pub fn user(id: impl Into<String>, content: impl Into<String>, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            role: MessageRole::User,
            content: content.into(),
            trace_id: None,
            created_at,
        }
    }

    /// Creates a finalized system message.
    pub fn system(
        id: impl Into<String>,
        content: impl Into<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            role: MessageRole::System,
            content: content.into(),
            trace_id: None,
            created_at,
        }
    }

    /// Creates the empty assistant placeholder that accumulates fragments
    /// while a response streams in.
    pub fn placeholder(created_at: OffsetDateTime) -> Self {
        Self {
            id: STREAMING_MESSAGE_ID.to_string(),
            role: MessageRole::Assistant,
            content: String::new(),
            trace_id: None,
            created_at,
        }
    }

    /// Returns true if this message is the streaming placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.id == STREAMING_MESSAGE_ID
    }

    /// Appends a fragment to the message content verbatim.
    ///
    /// Only meaningful while the message is the placeholder; finalized
    /// messages are frozen and must not be appended to.
    pub fn append(&mut self, fragment: &str) {
        self.content.push_str(fragment);
    }

    /// Freezes the placeholder with its permanent identity.
    pub fn finalize(&mut self, id: impl Into<String>, trace_id: Option<String>) {
        self.id = id.into();
        self.trace_id = trace_id;
    }
}
