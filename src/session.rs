//! Core chat session state machine.
//!
//! [`ChatSession`] owns one logical streaming conversation: the connection
//! lifecycle, message send, incremental assembly of streamed fragments into
//! finalized messages, and the bounded diagnostic log. It performs no I/O of
//! its own; the transport driver feeds it events and acts on its decisions,
//! which keeps every transition testable without a socket.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use url::Url;

use crate::credential::CredentialStore;
use crate::diagnostic::DiagnosticLog;
use crate::endpoint::StreamEndpoint;
use crate::observability;
use crate::retry::RetryPolicy;
use crate::types::{ChatMessage, OutboundFrame, StreamFrame};

/// Connection lifecycle state of a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live transport.
    Disconnected,

    /// Transport handshake in flight.
    Connecting,

    /// Transport live.
    Connected,

    /// Blocked: no credential is configured. Distinguishable from
    /// Disconnected so the caller can surface a "setup required" state
    /// instead of retrying against a known-bad configuration.
    CredentialRequired,
}

/// Whether a streamed response is currently being assembled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// No response in flight.
    Idle,

    /// A response is being assembled into the placeholder message.
    Streaming,
}

/// Configuration for a chat session.
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    /// Where the streaming socket lives.
    pub endpoint: StreamEndpoint,

    /// Reconnection policy applied after transport loss.
    pub retry: RetryPolicy,

    /// Optional watchdog: with no frame for this long while Streaming, the
    /// stream is force-finalized with a synthetic error. `None` (the
    /// default) waits forever, matching the backend's historical contract.
    pub stream_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Creates a config with default endpoint resolution and retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint resolver.
    pub fn with_endpoint(mut self, endpoint: StreamEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the idle-stream watchdog timeout.
    pub fn with_stream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_timeout = timeout;
        self
    }
}

/// What `connect()` decided.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectDecision {
    /// Open a transport to this URL.
    Dial(Url),

    /// A transport is already live; nothing to do.
    AlreadyLive,

    /// Configuration prevents connecting; no network attempt may be made.
    Blocked,
}

/// Observable outcome of applying one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// A fragment was appended to the in-progress message.
    Fragment(String),

    /// The in-progress message was finalized.
    Finalized(ChatMessage),

    /// The backend reported an error; the stream was finalized with its
    /// partial content retained.
    Failed(String),

    /// The frame changed no conversation state.
    Ignored,
}

/// A chat session: one streaming conversation with the agent backend.
pub struct ChatSession {
    config: SessionConfig,
    credentials: Arc<dyn CredentialStore>,
    connection: ConnectionState,
    stream: StreamState,
    history: Vec<ChatMessage>,
    diagnostics: DiagnosticLog,
    pending_trace_id: Option<String>,
    next_message_id: u64,
    retry_attempt: u32,
    last_frame_at: Option<OffsetDateTime>,
}

impl ChatSession {
    /// Creates a session with default configuration.
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self::with_config(credentials, SessionConfig::default())
    }

    /// Creates a session with the given configuration.
    pub fn with_config(credentials: Arc<dyn CredentialStore>, config: SessionConfig) -> Self {
        Self {
            config,
            credentials,
            connection: ConnectionState::Disconnected,
            stream: StreamState::Idle,
            history: Vec::new(),
            diagnostics: DiagnosticLog::new(),
            pending_trace_id: None,
            next_message_id: 0,
            retry_attempt: 0,
            last_frame_at: None,
        }
    }

    /// Returns the connection lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    /// Returns the stream state.
    pub fn stream_state(&self) -> StreamState {
        self.stream
    }

    /// Returns the conversation history, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Returns the diagnostic log.
    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Returns the trace id of the in-flight exchange, if one was adopted.
    pub fn pending_trace_id(&self) -> Option<&str> {
        self.pending_trace_id.as_deref()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Decides how to establish a transport.
    ///
    /// A no-op while a transport is live. With no credential configured the
    /// session enters [`ConnectionState::CredentialRequired`] without any
    /// network attempt; otherwise the caller should dial the returned URL
    /// and report back via [`transport_opened`] or [`transport_closed`].
    ///
    /// [`transport_opened`]: ChatSession::transport_opened
    /// [`transport_closed`]: ChatSession::transport_closed
    pub fn connect(&mut self) -> ConnectDecision {
        if matches!(
            self.connection,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return ConnectDecision::AlreadyLive;
        }
        let Some(token) = self.credentials.get() else {
            self.connection = ConnectionState::CredentialRequired;
            self.diagnostics
                .record("connect blocked: no access token configured");
            observability::CONNECTS_BLOCKED.click();
            return ConnectDecision::Blocked;
        };
        match self.config.endpoint.resolve(Some(&token)) {
            Ok(url) => {
                self.connection = ConnectionState::Connecting;
                self.diagnostics
                    .record(format!("connecting to {}", StreamEndpoint::redacted(&url)));
                observability::CONNECT_ATTEMPTS.click();
                ConnectDecision::Dial(url)
            }
            Err(err) => {
                self.connection = ConnectionState::CredentialRequired;
                self.diagnostics
                    .record(format!("connect blocked: {err}"));
                observability::CONNECTS_BLOCKED.click();
                ConnectDecision::Blocked
            }
        }
    }

    /// Records a successful transport handshake.
    pub fn transport_opened(&mut self) {
        self.connection = ConnectionState::Connected;
        self.retry_attempt = 0;
        self.diagnostics.record("stream socket connected");
    }

    /// Records a transport-level error. The close that follows drives the
    /// state transition; this only leaves a diagnostic trail.
    pub fn transport_error(&mut self, err: &crate::error::Error) {
        self.diagnostics.record(format!("stream socket error: {err}"));
    }

    /// Records transport loss and returns the delay before the next
    /// reconnect attempt, or `None` when the retry policy has given up.
    ///
    /// An interrupted stream is finalized with its partial content retained
    /// so the conversation never carries a stale in-progress record.
    pub fn transport_closed(&mut self) -> Option<Duration> {
        if self.connection == ConnectionState::Disconnected {
            return None;
        }
        if self.stream == StreamState::Streaming {
            self.diagnostics
                .record("stream interrupted: transport closed mid-response");
            self.finalize_stream();
        }
        self.connection = ConnectionState::Disconnected;
        self.diagnostics.record("stream socket disconnected");
        let delay = self.config.retry.delay_for(self.retry_attempt);
        self.retry_attempt = self.retry_attempt.saturating_add(1);
        match delay {
            Some(delay) => {
                self.diagnostics
                    .record(format!("reconnect scheduled in {}ms", delay.as_millis()));
            }
            None => {
                self.diagnostics.record("reconnect attempts exhausted");
            }
        }
        delay
    }

    /// Sends a user message.
    ///
    /// Preconditions: connected, idle, and non-blank text. Violating any of
    /// them is a silent no-op (`None`); the caller's UI is responsible for
    /// disabling the affordance. On acceptance the user message and the
    /// assistant placeholder are appended, the session enters Streaming, and
    /// the frame to transmit is returned.
    pub fn send(&mut self, text: &str) -> Option<OutboundFrame> {
        let trimmed = text.trim();
        if trimmed.is_empty()
            || self.connection != ConnectionState::Connected
            || self.stream == StreamState::Streaming
        {
            return None;
        }
        let now = OffsetDateTime::now_utc();
        let id = self.next_id();
        self.history.push(ChatMessage::user(id, trimmed, now));
        self.history.push(ChatMessage::placeholder(now));
        self.stream = StreamState::Streaming;
        self.pending_trace_id = None;
        self.last_frame_at = Some(now);
        let preview: String = trimmed.chars().take(48).collect();
        self.diagnostics
            .record(format!("sending message: \"{preview}\""));
        observability::MESSAGES_SENT.click();
        Some(OutboundFrame::new(trimmed))
    }

    /// Applies one inbound text frame.
    ///
    /// Frames are applied strictly in arrival order. Malformed or
    /// unrecognized frames are logged and ignored; the session continues.
    pub fn handle_frame(&mut self, raw: &str) -> FrameOutcome {
        observability::FRAMES_RECEIVED.click();
        self.last_frame_at = Some(OffsetDateTime::now_utc());
        let frame = match StreamFrame::parse(raw) {
            Ok(frame) => frame,
            Err(err) => {
                observability::FRAME_PARSE_ERRORS.click();
                self.diagnostics.record(format!("frame parse error: {err}"));
                return FrameOutcome::Ignored;
            }
        };
        let kind = match &frame {
            StreamFrame::Chunk(_) => "chunk",
            StreamFrame::Done(_) => "done",
            StreamFrame::Error(_) => "error",
        };
        self.diagnostics.record(format!(
            "received frame: type={kind}, trace_id={}",
            frame.trace_id().unwrap_or("N/A")
        ));
        self.adopt_trace_id(&frame);
        match frame {
            StreamFrame::Chunk(chunk) => {
                let Some(content) = chunk.content else {
                    return FrameOutcome::Ignored;
                };
                if self.stream != StreamState::Streaming {
                    self.diagnostics.record("chunk ignored: no stream in flight");
                    return FrameOutcome::Ignored;
                }
                let trace_id = self.pending_trace_id.clone();
                if let Some(placeholder) =
                    self.history.last_mut().filter(|msg| msg.is_placeholder())
                {
                    placeholder.append(&content);
                    placeholder.trace_id = trace_id;
                }
                FrameOutcome::Fragment(content)
            }
            StreamFrame::Done(_) => {
                if self.stream != StreamState::Streaming {
                    self.diagnostics.record("done ignored: no stream in flight");
                    return FrameOutcome::Ignored;
                }
                let finalized = self.finalize_stream();
                let trace = finalized
                    .as_ref()
                    .and_then(|msg| msg.trace_id.as_deref())
                    .unwrap_or("N/A");
                self.diagnostics
                    .record(format!("stream complete, trace_id={trace}"));
                match finalized {
                    Some(message) => FrameOutcome::Finalized(message),
                    None => FrameOutcome::Ignored,
                }
            }
            StreamFrame::Error(error) => {
                observability::STREAM_ERRORS.click();
                self.diagnostics
                    .record(format!("backend error: {}", error.error));
                if self.stream != StreamState::Streaming {
                    return FrameOutcome::Ignored;
                }
                self.finalize_stream();
                FrameOutcome::Failed(error.error)
            }
        }
    }

    /// Forces finalization when the watchdog timeout elapses with no frame.
    ///
    /// Returns true if the watchdog fired. Does nothing unless a stream is
    /// in flight and a timeout is configured.
    pub fn check_watchdog(&mut self, now: OffsetDateTime) -> bool {
        let Some(timeout) = self.config.stream_timeout else {
            return false;
        };
        if self.stream != StreamState::Streaming {
            return false;
        }
        let Some(last) = self.last_frame_at else {
            return false;
        };
        if now - last < timeout {
            return false;
        }
        observability::WATCHDOG_FIRED.click();
        self.diagnostics.record(format!(
            "stream watchdog fired after {}ms of silence; forcing finalization",
            timeout.as_millis()
        ));
        self.finalize_stream();
        true
    }

    /// Tears the session down for good: the stream (if any) is finalized
    /// with its partial content retained and no reconnect is scheduled.
    pub fn teardown(&mut self) {
        if self.stream == StreamState::Streaming {
            self.diagnostics
                .record("stream interrupted: session closed mid-response");
            self.finalize_stream();
        }
        if self.connection != ConnectionState::Disconnected {
            self.connection = ConnectionState::Disconnected;
        }
        self.diagnostics.record("session closed");
    }

    /// Adopts a trace id announced by any frame shape.
    fn adopt_trace_id(&mut self, frame: &StreamFrame) {
        if let Some(trace_id) = frame.trace_id() {
            if self.pending_trace_id.as_deref() != Some(trace_id) {
                self.pending_trace_id = Some(trace_id.to_string());
                self.diagnostics
                    .record(format!("new trace_id: {trace_id}"));
            }
        }
    }

    /// Finalizes the placeholder: permanent id, final trace id, stream Idle.
    /// Partial content is always retained.
    fn finalize_stream(&mut self) -> Option<ChatMessage> {
        self.stream = StreamState::Idle;
        let trace_id = self.pending_trace_id.take();
        let id = self.next_id();
        let placeholder = self.history.last_mut().filter(|msg| msg.is_placeholder())?;
        placeholder.finalize(id, trace_id);
        observability::MESSAGES_FINALIZED.click();
        Some(placeholder.clone())
    }

    fn next_id(&mut self) -> String {
        self.next_message_id += 1;
        format!("msg-{}", self.next_message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::MemoryCredentialStore;
    use crate::types::{MessageRole, STREAMING_MESSAGE_ID};

    fn connected_session() -> ChatSession {
        let store = Arc::new(MemoryCredentialStore::with_token("AIzaSyExampleExample"));
        let mut session = ChatSession::new(store);
        match session.connect() {
            ConnectDecision::Dial(_) => {}
            other => panic!("expected Dial, got {other:?}"),
        }
        session.transport_opened();
        session
    }

    #[test]
    fn chunks_concatenate_exactly() {
        let mut session = connected_session();
        let frame = session.send("hello").expect("send accepted");
        assert_eq!(frame.message, "hello");
        assert_eq!(session.stream_state(), StreamState::Streaming);

        session.handle_frame(r#"{"type":"chunk","content":"Hi","trace_id":"t1"}"#);
        session.handle_frame(r#"{"type":"chunk","content":" there"}"#);
        let outcome = session.handle_frame(r#"{"type":"done","trace_id":"t1"}"#);

        let finalized = match outcome {
            FrameOutcome::Finalized(message) => message,
            other => panic!("expected Finalized, got {other:?}"),
        };
        assert_eq!(finalized.content, "Hi there");
        assert_eq!(finalized.trace_id.as_deref(), Some("t1"));
        assert_eq!(finalized.role, MessageRole::Assistant);
        assert_ne!(finalized.id, STREAMING_MESSAGE_ID);
        assert_eq!(session.stream_state(), StreamState::Idle);
        assert_eq!(session.pending_trace_id(), None);
    }

    #[test]
    fn send_while_streaming_is_noop() {
        let mut session = connected_session();
        session.send("first").expect("send accepted");
        let history_len = session.history().len();

        assert!(session.send("second").is_none());
        assert_eq!(session.history().len(), history_len);
        assert_eq!(session.stream_state(), StreamState::Streaming);
    }

    #[test]
    fn send_blank_is_noop() {
        let mut session = connected_session();
        assert!(session.send("").is_none());
        assert!(session.send("   \t\n").is_none());
        assert!(session.history().is_empty());
        assert_eq!(session.stream_state(), StreamState::Idle);
    }

    #[test]
    fn send_while_disconnected_is_noop() {
        let store = Arc::new(MemoryCredentialStore::with_token("AIzaSyExampleExample"));
        let mut session = ChatSession::new(store);
        assert!(session.send("hello").is_none());
        assert!(session.history().is_empty());
    }

    #[test]
    fn send_trims_and_records_user_message() {
        let mut session = connected_session();
        let frame = session.send("  hello  ").expect("send accepted");
        assert_eq!(frame.message, "hello");

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].content, "hello");
        assert!(history[1].is_placeholder());
        assert!(history[1].content.is_empty());
    }

    #[test]
    fn error_frame_retains_partial_content() {
        let mut session = connected_session();
        session.send("hello").expect("send accepted");
        session.handle_frame(r#"{"type":"chunk","content":"partial"}"#);

        let outcome = session.handle_frame(r#"{"type":"error","error":"model overloaded"}"#);
        assert_eq!(outcome, FrameOutcome::Failed("model overloaded".to_string()));
        assert_eq!(session.stream_state(), StreamState::Idle);

        let last = session.history().last().unwrap();
        assert_eq!(last.content, "partial");
        assert_ne!(last.id, STREAMING_MESSAGE_ID);
    }

    #[test]
    fn malformed_frame_changes_nothing() {
        let mut session = connected_session();
        session.send("hello").expect("send accepted");
        session.handle_frame(r#"{"type":"chunk","content":"Hi"}"#);
        let diagnostics_before = session.diagnostics().len();

        assert_eq!(session.handle_frame("not json"), FrameOutcome::Ignored);
        assert_eq!(
            session.handle_frame(r#"{"type":"ping"}"#),
            FrameOutcome::Ignored
        );

        assert_eq!(session.stream_state(), StreamState::Streaming);
        assert_eq!(session.history().last().unwrap().content, "Hi");
        assert_eq!(session.diagnostics().len(), diagnostics_before + 2);
    }

    #[test]
    fn chunk_without_stream_is_ignored() {
        let mut session = connected_session();
        let outcome = session.handle_frame(r#"{"type":"chunk","content":"stray"}"#);
        assert_eq!(outcome, FrameOutcome::Ignored);
        assert!(session.history().is_empty());
    }

    #[test]
    fn connect_twice_performs_one_attempt() {
        let store = Arc::new(MemoryCredentialStore::with_token("AIzaSyExampleExample"));
        let mut session = ChatSession::new(store);

        assert!(matches!(session.connect(), ConnectDecision::Dial(_)));
        assert_eq!(session.connect(), ConnectDecision::AlreadyLive);

        session.transport_opened();
        assert_eq!(session.connect(), ConnectDecision::AlreadyLive);
    }

    #[test]
    fn connect_without_credential_is_blocked() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut session = ChatSession::new(store);

        assert_eq!(session.connect(), ConnectDecision::Blocked);
        assert_eq!(
            session.connection_state(),
            ConnectionState::CredentialRequired
        );
        assert_eq!(session.stream_state(), StreamState::Idle);
        assert_eq!(session.diagnostics().len(), 1);
        assert!(
            session
                .diagnostics()
                .latest()
                .unwrap()
                .text
                .contains("no access token")
        );
    }

    #[test]
    fn connect_succeeds_after_credential_configured() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut session = ChatSession::new(Arc::clone(&store) as Arc<dyn CredentialStore>);
        assert_eq!(session.connect(), ConnectDecision::Blocked);

        store.set("AIzaSyExampleExample").unwrap();
        assert!(matches!(session.connect(), ConnectDecision::Dial(_)));
    }

    #[test]
    fn dial_url_is_redacted_in_diagnostics() {
        let store = Arc::new(MemoryCredentialStore::with_token("AIzaSyExampleExample"));
        let mut session = ChatSession::new(store);
        let url = match session.connect() {
            ConnectDecision::Dial(url) => url,
            other => panic!("expected Dial, got {other:?}"),
        };
        assert!(url.as_str().contains("AIzaSyExampleExample"));
        for entry in session.diagnostics().iter() {
            assert!(!entry.text.contains("AIzaSyExampleExample"));
        }
    }

    #[test]
    fn disconnect_while_streaming_recovers() {
        let mut session = connected_session();
        session.send("hello").expect("send accepted");
        session.handle_frame(r#"{"type":"chunk","content":"par"}"#);

        let delay = session.transport_closed();
        assert_eq!(delay, Some(crate::retry::DEFAULT_RECONNECT_DELAY));
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(session.stream_state(), StreamState::Idle);

        let last = session.history().last().unwrap();
        assert_eq!(last.content, "par");
        assert_ne!(last.id, STREAMING_MESSAGE_ID);
    }

    #[test]
    fn duplicate_close_schedules_once() {
        let mut session = connected_session();
        assert!(session.transport_closed().is_some());
        assert!(session.transport_closed().is_none());
    }

    #[test]
    fn retry_policy_exhaustion_stops_scheduling() {
        let store = Arc::new(MemoryCredentialStore::with_token("AIzaSyExampleExample"));
        let config = SessionConfig::new().with_retry(
            RetryPolicy::fixed(Duration::from_millis(100)).with_max_attempts(1),
        );
        let mut session = ChatSession::with_config(store, config);

        assert!(matches!(session.connect(), ConnectDecision::Dial(_)));
        assert_eq!(session.transport_closed(), Some(Duration::from_millis(100)));

        assert!(matches!(session.connect(), ConnectDecision::Dial(_)));
        assert_eq!(session.transport_closed(), None);
    }

    #[test]
    fn successful_connection_resets_retry_counter() {
        let store = Arc::new(MemoryCredentialStore::with_token("AIzaSyExampleExample"));
        let config = SessionConfig::new().with_retry(
            RetryPolicy::fixed(Duration::from_millis(100)).with_max_attempts(1),
        );
        let mut session = ChatSession::with_config(store, config);

        session.connect();
        session.transport_closed();
        session.connect();
        session.transport_opened();

        // The reattempt budget is fresh again after a successful handshake.
        assert_eq!(session.transport_closed(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn watchdog_forces_finalization() {
        let store = Arc::new(MemoryCredentialStore::with_token("AIzaSyExampleExample"));
        let config = SessionConfig::new().with_stream_timeout(Some(Duration::from_secs(5)));
        let mut session = ChatSession::with_config(store, config);
        session.connect();
        session.transport_opened();
        session.send("hello").expect("send accepted");
        session.handle_frame(r#"{"type":"chunk","content":"stuck"}"#);

        let now = OffsetDateTime::now_utc();
        assert!(!session.check_watchdog(now));
        assert!(session.check_watchdog(now + Duration::from_secs(6)));

        assert_eq!(session.stream_state(), StreamState::Idle);
        let last = session.history().last().unwrap();
        assert_eq!(last.content, "stuck");
        assert_ne!(last.id, STREAMING_MESSAGE_ID);
    }

    #[test]
    fn watchdog_disabled_by_default() {
        let mut session = connected_session();
        session.send("hello").expect("send accepted");
        let far_future = OffsetDateTime::now_utc() + Duration::from_secs(3600);
        assert!(!session.check_watchdog(far_future));
        assert_eq!(session.stream_state(), StreamState::Streaming);
    }

    #[test]
    fn trace_id_adopted_from_done_frame() {
        let mut session = connected_session();
        session.send("hello").expect("send accepted");
        session.handle_frame(r#"{"type":"chunk","content":"Hi"}"#);
        let outcome = session.handle_frame(r#"{"type":"done","trace_id":"t9"}"#);
        match outcome {
            FrameOutcome::Finalized(message) => {
                assert_eq!(message.trace_id.as_deref(), Some("t9"));
            }
            other => panic!("expected Finalized, got {other:?}"),
        }
    }

    #[test]
    fn finalized_ids_are_unique() {
        let mut session = connected_session();
        session.send("one").expect("send accepted");
        let first = match session.handle_frame(r#"{"type":"done"}"#) {
            FrameOutcome::Finalized(message) => message.id,
            other => panic!("expected Finalized, got {other:?}"),
        };
        session.send("two").expect("send accepted");
        let second = match session.handle_frame(r#"{"type":"done"}"#) {
            FrameOutcome::Finalized(message) => message.id,
            other => panic!("expected Finalized, got {other:?}"),
        };
        assert_ne!(first, second);
    }
}
