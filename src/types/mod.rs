// Public modules
pub mod chat_message;
pub mod memory_record;
pub mod outbound_frame;
pub mod plan;
pub mod plan_step;
pub mod stream_frame;

// Re-exports
pub use chat_message::{ChatMessage, MessageRole, STREAMING_MESSAGE_ID};
pub use memory_record::{MemoryHistoryResponse, MemoryKind, MemoryRecord};
pub use outbound_frame::OutboundFrame;
pub use plan::{Plan, PlanRequest};
pub use plan_step::{PlanStep, StepStatus};
pub use stream_frame::{ChunkFrame, DoneFrame, ErrorFrame, StreamFrame};
