//! Streaming transport and the session connection manager.
//!
//! The [`Transport`] trait narrows the socket to the three operations the
//! session needs, so the driver runs identically over tokio-tungstenite and
//! over scripted in-memory transports in tests. [`SessionDriver`] is the
//! connection manager: it dials, pumps frames into the session one at a
//! time, and applies the session's reconnect decisions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use time::OffsetDateTime;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::Result;
use crate::observability;
use crate::session::{ChatSession, ConnectDecision, FrameOutcome};
use crate::types::{ChatMessage, OutboundFrame};

/// How often the driver polls the idle-stream watchdog.
const WATCHDOG_TICK: Duration = Duration::from_millis(250);

/// A bidirectional message transport carrying text frames.
#[async_trait]
pub trait Transport: Send {
    /// Transmits one outbound frame.
    async fn send(&mut self, frame: OutboundFrame) -> Result<()>;

    /// Receives the next inbound text frame. `None` means the transport
    /// closed.
    async fn next(&mut self) -> Option<Result<String>>;

    /// Closes the transport.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports for the driver.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dials the streaming endpoint.
    async fn dial(&self, url: &Url) -> Result<Box<dyn Transport>>;
}

/// A [`Transport`] over a tokio-tungstenite WebSocket.
pub struct WsTransport {
    inner: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: OutboundFrame) -> Result<()> {
        self.inner
            .send(Message::Text(frame.to_json()))
            .await
            .map_err(Into::into)
    }

    async fn next(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Close(_))) => return None,
                // Pings and pongs are answered by tungstenite itself; the
                // protocol carries no binary frames.
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Some(Err(err.into())),
                None => return None,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close(None).await.map_err(Into::into)
    }
}

/// Dials real WebSocket connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn dial(&self, url: &Url) -> Result<Box<dyn Transport>> {
        let (inner, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(Box::new(WsTransport { inner }))
    }
}

/// Events surfaced by the driver to whatever renders the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// The transport handshake succeeded.
    Connected,

    /// The transport was lost or closed.
    Disconnected,

    /// A reconnect attempt will fire after this delay.
    Reconnecting(Duration),

    /// No credential is configured; the session is blocked until one is set.
    CredentialRequired,

    /// A response fragment arrived.
    Fragment(String),

    /// The in-flight response was finalized.
    Finalized(ChatMessage),

    /// The in-flight response failed; partial content was kept.
    Failed(String),
}

/// Handle to a running session driver.
///
/// Dropping the handle (or calling [`shutdown`]) tears the session down:
/// the transport closes and no retry fires afterwards.
///
/// [`shutdown`]: SessionHandle::shutdown
pub struct SessionHandle {
    session: Arc<Mutex<ChatSession>>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    live: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Sends a user message through the session.
    ///
    /// Returns false when the session refused the send (not connected,
    /// already streaming, or blank text).
    pub async fn send(&self, text: &str) -> bool {
        let frame = self.session.lock().await.send(text);
        match frame {
            Some(frame) => self.outbound.send(frame).is_ok(),
            None => false,
        }
    }

    /// Returns the shared session for inspection.
    pub fn session(&self) -> Arc<Mutex<ChatSession>> {
        Arc::clone(&self.session)
    }

    /// Returns true while the driver task is running.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// Tears the session down and waits for the driver to stop.
    pub async fn shutdown(self) {
        self.live.store(false, Ordering::SeqCst);
        drop(self.outbound);
        let _ = self.task.await;
    }
}

/// The connection manager: owns the dial/pump/retry loop for one session.
pub struct SessionDriver;

impl SessionDriver {
    /// Spawns the driver for a session.
    ///
    /// Returns the handle used to send messages and tear the session down,
    /// plus the notice stream for rendering.
    pub fn spawn(
        session: Arc<Mutex<ChatSession>>,
        connector: Arc<dyn Connector>,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionNotice>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(Self::run(
            Arc::clone(&session),
            connector,
            Arc::clone(&live),
            outbound_rx,
            notices_tx,
        ));
        let handle = SessionHandle {
            session,
            outbound: outbound_tx,
            live,
            task,
        };
        (handle, notices_rx)
    }

    async fn run(
        session: Arc<Mutex<ChatSession>>,
        connector: Arc<dyn Connector>,
        live: Arc<AtomicBool>,
        mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
        notices: mpsc::UnboundedSender<SessionNotice>,
    ) {
        loop {
            if !live.load(Ordering::SeqCst) {
                return;
            }
            let decision = session.lock().await.connect();
            let url = match decision {
                ConnectDecision::Dial(url) => url,
                ConnectDecision::AlreadyLive => return,
                ConnectDecision::Blocked => {
                    let _ = notices.send(SessionNotice::CredentialRequired);
                    return;
                }
            };
            let delay = match connector.dial(&url).await {
                Ok(mut transport) => {
                    session.lock().await.transport_opened();
                    let _ = notices.send(SessionNotice::Connected);
                    let delay =
                        Self::pump(&session, transport.as_mut(), &mut outbound, &notices, &live)
                            .await;
                    let _ = transport.close().await;
                    let _ = notices.send(SessionNotice::Disconnected);
                    delay
                }
                Err(err) => {
                    let mut guard = session.lock().await;
                    guard.transport_error(&err);
                    let delay = guard.transport_closed();
                    drop(guard);
                    let _ = notices.send(SessionNotice::Disconnected);
                    delay
                }
            };
            let Some(delay) = delay else {
                return;
            };
            let _ = notices.send(SessionNotice::Reconnecting(delay));
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = Self::wait_teardown(&mut outbound) => {
                    live.store(false, Ordering::SeqCst);
                    session.lock().await.teardown();
                    return;
                }
            }
            if !live.load(Ordering::SeqCst) {
                return;
            }
            observability::RECONNECT_RETRIES.click();
        }
    }

    /// Pumps frames until the transport closes or the session is torn down.
    /// Returns the reconnect delay decided by the session, if any.
    async fn pump(
        session: &Arc<Mutex<ChatSession>>,
        transport: &mut dyn Transport,
        outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>,
        notices: &mpsc::UnboundedSender<SessionNotice>,
        live: &Arc<AtomicBool>,
    ) -> Option<Duration> {
        enum PumpEvent {
            Outbound(Option<OutboundFrame>),
            Inbound(Option<Result<String>>),
            Tick,
        }

        let mut watchdog = tokio::time::interval(WATCHDOG_TICK);
        watchdog.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            let event = tokio::select! {
                frame = outbound.recv() => PumpEvent::Outbound(frame),
                inbound = transport.next() => PumpEvent::Inbound(inbound),
                _ = watchdog.tick() => PumpEvent::Tick,
            };
            match event {
                PumpEvent::Outbound(Some(frame)) => {
                    if let Err(err) = transport.send(frame).await {
                        let mut guard = session.lock().await;
                        guard.transport_error(&err);
                        return guard.transport_closed();
                    }
                }
                PumpEvent::Outbound(None) => {
                    live.store(false, Ordering::SeqCst);
                    session.lock().await.teardown();
                    return None;
                }
                PumpEvent::Inbound(Some(Ok(text))) => {
                    let outcome = session.lock().await.handle_frame(&text);
                    let notice = match outcome {
                        FrameOutcome::Fragment(content) => Some(SessionNotice::Fragment(content)),
                        FrameOutcome::Finalized(message) => Some(SessionNotice::Finalized(message)),
                        FrameOutcome::Failed(error) => Some(SessionNotice::Failed(error)),
                        FrameOutcome::Ignored => None,
                    };
                    if let Some(notice) = notice {
                        let _ = notices.send(notice);
                    }
                }
                PumpEvent::Inbound(Some(Err(err))) => {
                    let mut guard = session.lock().await;
                    guard.transport_error(&err);
                    return guard.transport_closed();
                }
                PumpEvent::Inbound(None) => return session.lock().await.transport_closed(),
                PumpEvent::Tick => {
                    let fired = session
                        .lock()
                        .await
                        .check_watchdog(OffsetDateTime::now_utc());
                    if fired {
                        let _ = notices.send(SessionNotice::Failed("stream timed out".to_string()));
                    }
                }
            }
        }
    }

    async fn wait_teardown(outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>) {
        // Frames queued while disconnected are stale; drain and drop them.
        while outbound.recv().await.is_some() {}
    }
}
