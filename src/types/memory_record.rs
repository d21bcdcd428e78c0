use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The kind of record the agent committed to its memory store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Internal reasoning the agent chose to record.
    Thought,

    /// Something the agent observed about its environment.
    Observation,

    /// A decision the agent committed to.
    Decision,

    /// An action the agent took.
    Action,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Thought => write!(f, "thought"),
            MemoryKind::Observation => write!(f, "observation"),
            MemoryKind::Decision => write!(f, "decision"),
            MemoryKind::Action => write!(f, "action"),
        }
    }
}

/// Error returned when parsing an invalid memory kind string.
#[derive(Debug)]
pub struct MemoryKindParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for MemoryKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown memory kind: {}", self.invalid_value)
    }
}

impl std::error::Error for MemoryKindParseError {}

impl FromStr for MemoryKind {
    type Err = MemoryKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thought" => Ok(MemoryKind::Thought),
            "observation" => Ok(MemoryKind::Observation),
            "decision" => Ok(MemoryKind::Decision),
            "action" => Ok(MemoryKind::Action),
            _ => Err(MemoryKindParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// One record from the agent's memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Stable identifier assigned by the backend.
    pub id: String,

    /// The recorded text.
    pub content: String,

    /// What kind of record this is.
    #[serde(rename = "type")]
    pub kind: MemoryKind,

    /// When the record was committed.
    #[serde(with = "crate::utils::time")]
    pub timestamp: OffsetDateTime,

    /// Free-form structured annotations, when the backend attached any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// The memory history endpoint returns either `{"memories": [...]}` or a
/// bare array, depending on backend version. Both decode to the same
/// record list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MemoryHistoryResponse {
    /// The wrapped response shape.
    Wrapped {
        /// The memory records.
        memories: Vec<MemoryRecord>,
    },

    /// The bare-array response shape.
    Bare(Vec<MemoryRecord>),
}

impl MemoryHistoryResponse {
    /// Unwraps the records regardless of response shape.
    pub fn into_records(self) -> Vec<MemoryRecord> {
        match self {
            MemoryHistoryResponse::Wrapped { memories } => memories,
            MemoryHistoryResponse::Bare(records) => records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serialization() {
        let json = serde_json::to_string(&MemoryKind::Observation).unwrap();
        assert_eq!(json, r#""observation""#);
        let kind: MemoryKind = serde_json::from_str(r#""decision""#).unwrap();
        assert_eq!(kind, MemoryKind::Decision);
    }

    #[test]
    fn record_deserialization() {
        let json = r#"{
            "id": "mem-1",
            "content": "disk nearly full",
            "type": "observation",
            "timestamp": "2024-05-01T12:00:00Z",
            "metadata": {"source": "df"}
        }"#;
        let record: MemoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "mem-1");
        assert_eq!(record.kind, MemoryKind::Observation);
        assert_eq!(record.metadata.as_ref().unwrap()["source"], "df");
    }

    #[test]
    fn record_without_metadata() {
        let json = r#"{
            "id": "mem-2",
            "content": "chose apt over snap",
            "type": "decision",
            "timestamp": "2024-05-01T12:01:00Z"
        }"#;
        let record: MemoryRecord = serde_json::from_str(json).unwrap();
        assert!(record.metadata.is_none());
    }

    #[test]
    fn history_response_wrapped() {
        let json = r#"{"memories": [{
            "id": "mem-1",
            "content": "x",
            "type": "thought",
            "timestamp": "2024-05-01T12:00:00Z"
        }]}"#;
        let response: MemoryHistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_records().len(), 1);
    }

    #[test]
    fn history_response_bare() {
        let json = r#"[{
            "id": "mem-1",
            "content": "x",
            "type": "action",
            "timestamp": "2024-05-01T12:00:00Z"
        }]"#;
        let response: MemoryHistoryResponse = serde_json::from_str(json).unwrap();
        let records = response.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, MemoryKind::Action);
    }
}
