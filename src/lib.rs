// Public modules
pub mod chat;
pub mod client;
pub mod credential;
pub mod diagnostic;
pub mod endpoint;
pub mod error;
pub mod memory;
pub mod observability;
pub mod retry;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

// Re-exports
pub use client::Deck;
pub use credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use diagnostic::{DiagnosticEntry, DiagnosticLog};
pub use endpoint::StreamEndpoint;
pub use error::{Error, Result};
pub use memory::MemoryFeed;
pub use retry::RetryPolicy;
pub use session::{
    ChatSession, ConnectDecision, ConnectionState, FrameOutcome, SessionConfig, StreamState,
};
pub use transport::{
    Connector, SessionDriver, SessionHandle, SessionNotice, Transport, WsConnector,
};
pub use types::*;
