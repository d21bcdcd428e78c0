use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A `chunk` frame carrying the next fragment of the streamed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFrame {
    /// Fragment text to append verbatim to the in-progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Correlation identifier for this exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// A `done` frame marking the end of the streamed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneFrame {
    /// Final correlation identifier for the exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// An `error` frame reporting a backend-side failure for this exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Human-readable error text from the backend.
    #[serde(default)]
    pub error: String,

    /// Correlation identifier for this exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// An inbound frame on the streaming chat socket.
///
/// The wire shape is a JSON object tagged by `type`:
/// `{"type": "chunk"|"done"|"error", content?, trace_id?, error?}`.
/// Frames with an unrecognized tag fail to parse and are handled as
/// protocol errors by the session, which logs and ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// The next fragment of the streamed response.
    Chunk(ChunkFrame),

    /// Terminal signal: the response is complete.
    Done(DoneFrame),

    /// Terminal signal: the backend failed mid-exchange.
    Error(ErrorFrame),
}

impl StreamFrame {
    /// Parses an inbound text frame.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            Error::serialization(format!("unparseable stream frame: {e}"), Some(Box::new(e)))
        })
    }

    /// Returns the trace id carried by this frame, if any.
    ///
    /// Every frame shape may carry one; the session adopts a new trace id
    /// from whichever frame first announces it.
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            StreamFrame::Chunk(frame) => frame.trace_id.as_deref(),
            StreamFrame::Done(frame) => frame.trace_id.as_deref(),
            StreamFrame::Error(frame) => frame.trace_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chunk() {
        let frame =
            StreamFrame::parse(r#"{"type":"chunk","content":"Hi","trace_id":"t1"}"#).unwrap();
        match frame {
            StreamFrame::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hi"));
                assert_eq!(chunk.trace_id.as_deref(), Some("t1"));
            }
            _ => panic!("Expected Chunk variant"),
        }
    }

    #[test]
    fn parse_chunk_without_content() {
        let frame = StreamFrame::parse(r#"{"type":"chunk"}"#).unwrap();
        match frame {
            StreamFrame::Chunk(chunk) => {
                assert!(chunk.content.is_none());
                assert!(chunk.trace_id.is_none());
            }
            _ => panic!("Expected Chunk variant"),
        }
    }

    #[test]
    fn parse_done() {
        let frame = StreamFrame::parse(r#"{"type":"done","trace_id":"t9"}"#).unwrap();
        assert_eq!(frame.trace_id(), Some("t9"));
        assert!(matches!(frame, StreamFrame::Done(_)));
    }

    #[test]
    fn parse_error() {
        let frame = StreamFrame::parse(r#"{"type":"error","error":"model overloaded"}"#).unwrap();
        match frame {
            StreamFrame::Error(err) => assert_eq!(err.error, "model overloaded"),
            _ => panic!("Expected Error variant"),
        }
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = StreamFrame::parse(r#"{"type":"ping"}"#).unwrap_err();
        assert!(err.to_string().contains("unparseable stream frame"));
    }

    #[test]
    fn parse_rejects_malformed_json() {
        assert!(StreamFrame::parse("not json at all").is_err());
    }

    #[test]
    fn serialization_tags_by_type() {
        let frame = StreamFrame::Done(DoneFrame {
            trace_id: Some("t1".to_string()),
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["trace_id"], "t1");
    }
}
