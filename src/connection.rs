#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant as TokioInstant, MissedTickBehavior, interval_at, sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::Result;
use crate::config::Config;
use crate::error::WsError;
use crate::handlers::{CloseReason, Handlers, Payload};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How often a message queued while the socket is still connecting re-checks
/// whether it can be delivered.
const PENDING_SEND_RETRY: Duration = Duration::from_millis(1000);

/// Connection lifecycle state.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connection attempt is in flight
    Connecting,
    /// Successfully connected
    Open {
        /// When the connection was established
        since: Instant,
    },
    /// The connection was lost and a reconnect attempt is scheduled
    ClosedRetryPending {
        /// Which attempt out of the configured budget is scheduled
        attempt: u32,
    },
    /// The reconnect budget is spent; the manager is permanently inert
    ClosedExhausted,
    /// The caller closed the connection; the manager is permanently inert
    ManuallyClosed,
}

impl ConnectionState {
    /// Check if the connection is currently open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Check if the manager has reached a terminal state and will never
    /// connect again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedExhausted | Self::ManuallyClosed)
    }
}

/// Commands the handle sends to the connection actor.
#[derive(Debug)]
enum Command {
    Send(String),
    Close,
}

/// Maintains one logical WebSocket connection over an unreliable socket.
///
/// The manager owns at most one underlying socket at a time and handles all
/// connection concerns on a single background task:
/// - Establishing and re-establishing connections with a bounded attempt
///   budget and exponential backoff
/// - Periodic application-level liveness probes while open
/// - Holding the most recent outbound message issued while the socket is
///   still connecting and delivering it once the socket opens
///
/// Handles are cheap to clone and never block: [`send`](Self::send) and
/// [`close`](Self::close) enqueue work for the actor and return immediately.
/// Failures are observed only through the [`Handlers`] callbacks and the
/// state channel; once construction succeeds, nothing is thrown back at the
/// caller.
///
/// # Example
///
/// ```ignore
/// let connection = ConnectionManager::connect(
///     "wss://example.com",
///     Config::default(),
///     Handlers::new().on_message(|payload| println!("{payload:?}")),
/// )?;
///
/// connection.send_text("hello");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    /// Sender half of the actor's command channel
    command_tx: mpsc::UnboundedSender<Command>,
    /// Watch channel sender for state changes (enables new subscriptions)
    state_tx: watch::Sender<ConnectionState>,
    /// Watch channel receiver for checking the current state
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionManager {
    /// Create a new connection manager and start connecting.
    ///
    /// Validates the endpoint synchronously and spawns the connection actor;
    /// the connection attempt itself is asynchronous and never blocks the
    /// caller. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidAddress`] when the endpoint is empty or not
    /// a parseable URL.
    pub fn connect(endpoint: &str, config: Config, handlers: Handlers) -> Result<Self> {
        if endpoint.trim().is_empty() {
            return Err(WsError::InvalidAddress("endpoint is empty".to_owned()));
        }
        Url::parse(endpoint).map_err(|e| WsError::InvalidAddress(e.to_string()))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let actor = Actor {
            endpoint: endpoint.to_owned(),
            config,
            handlers,
            command_rx,
            state_tx: state_tx.clone(),
            pending: None,
            attempts: 0,
            generation: 0,
        };
        tokio::spawn(actor.run());

        Ok(Self {
            command_tx,
            state_tx,
            state_rx,
        })
    }

    /// Send a structured payload, serialized to its JSON text form.
    ///
    /// Fire-and-forget: the message is written immediately when the socket
    /// is open, held (most-recent-wins) when it is still connecting, and
    /// dropped when the manager is inert. Serialization failure is the only
    /// error this call itself reports.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Serialize`] when the payload cannot be serialized.
    pub fn send<S: Serialize>(&self, payload: &S) -> Result<()> {
        let text = serde_json::to_string(payload)?;
        self.dispatch(text);
        Ok(())
    }

    /// Send a plain text payload through unmodified.
    ///
    /// Same admission rules as [`send`](Self::send).
    pub fn send_text(&self, text: impl Into<String>) {
        self.dispatch(text.into());
    }

    fn dispatch(&self, text: String) {
        if self.command_tx.send(Command::Send(text)).is_err() {
            // The actor has terminated; best-effort delivery means the
            // message is dropped without surfacing an error.
            debug!("connection manager is inert; outbound message dropped");
        }
    }

    /// Close the connection and disable any further automatic reconnection.
    ///
    /// Idempotent. The manager becomes permanently inert regardless of the
    /// reconnect configuration.
    pub fn close(&self) {
        _ = self.command_tx.send(Command::Close);
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Whether the reconnect budget is spent and the manager is inert.
    ///
    /// Drivers poll this to know when to stop feeding the manager.
    #[must_use]
    pub fn is_reconnect_exhausted(&self) -> bool {
        matches!(self.state(), ConnectionState::ClosedExhausted)
    }

    /// Subscribe to connection state changes.
    ///
    /// Returns a receiver that notifies when the connection state changes.
    /// Useful for detecting reconnections and terminal states without
    /// polling.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

/// Outcome of one connection attempt.
enum ConnectOutcome {
    Opened(Box<WsStream>),
    Failed,
    Shutdown,
}

/// Outcome of driving one open connection.
enum OpenOutcome {
    Lost,
    Shutdown,
}

/// The single-owner state machine behind a [`ConnectionManager`].
///
/// All mutable state lives here and is touched only by [`Actor::run`], so
/// state transitions, timers, and socket signals are serialized by
/// construction. The socket is owned by the phase that reads it and dropped
/// before any new attempt starts, which makes stale signals from a previous
/// socket impossible.
struct Actor {
    endpoint: String,
    config: Config,
    handlers: Handlers,
    command_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    /// The most recent message queued while no open socket was available.
    /// A newer send supersedes whatever is held here.
    pending: Option<String>,
    /// Consecutive failed attempts since the last successful open.
    attempts: u32,
    /// Socket instance counter, tags log records per connection.
    generation: u64,
}

impl Actor {
    async fn run(mut self) {
        let mut backoff: ExponentialBackoff = self.config.reconnect.clone().into();

        loop {
            self.generation += 1;
            _ = self.state_tx.send(ConnectionState::Connecting);
            debug!(generation = self.generation, endpoint = %self.endpoint, "connecting");

            match self.establish().await {
                ConnectOutcome::Opened(stream) => {
                    // A successful open demonstrates reachability; stale
                    // failure history does not count against future
                    // reconnects.
                    self.attempts = 0;
                    backoff.reset();
                    _ = self.state_tx.send(ConnectionState::Open {
                        since: Instant::now(),
                    });
                    info!(generation = self.generation, "connection established");
                    if let Some(open) = &self.handlers.open {
                        open();
                    }

                    match self.drive(*stream).await {
                        OpenOutcome::Lost => {}
                        OpenOutcome::Shutdown => {
                            self.go_inert("manual close requested");
                            return;
                        }
                    }
                }
                ConnectOutcome::Failed => {
                    // The in-flight attempt is released; a message queued
                    // against it goes with it.
                    self.pending = None;
                }
                ConnectOutcome::Shutdown => {
                    self.go_inert("manual close requested");
                    return;
                }
            }

            if !self.config.reconnect.enabled {
                self.go_inert("reconnection disabled; connection manager is now inert");
                return;
            }
            if let Some(max) = self.config.reconnect.max_attempts
                && self.attempts >= max
            {
                warn!(
                    attempts = self.attempts,
                    "reconnect budget exhausted; giving up"
                );
                _ = self.state_tx.send(ConnectionState::ClosedExhausted);
                return;
            }

            self.attempts += 1;
            _ = self.state_tx.send(ConnectionState::ClosedRetryPending {
                attempt: self.attempts,
            });
            let delay = backoff
                .next_backoff()
                .unwrap_or(self.config.reconnect.max_backoff);
            debug!(attempt = self.attempts, ?delay, "scheduling reconnect");

            if !self.wait_before_retry(delay).await {
                self.go_inert("manual close requested");
                return;
            }
        }
    }

    /// Run one bounded connection attempt while staying responsive to
    /// commands. Sends issued here are held under the most-recent-wins
    /// policy and re-checked on a fixed cadence until the socket opens.
    async fn establish(&mut self) -> ConnectOutcome {
        let request = self.endpoint.clone();
        let connect = timeout(self.config.connect_timeout, connect_async(request));
        tokio::pin!(connect);
        let mut retry = Box::pin(sleep(PENDING_SEND_RETRY));

        loop {
            tokio::select! {
                attempt = &mut connect => {
                    return match attempt {
                        Ok(Ok((stream, _response))) => ConnectOutcome::Opened(Box::new(stream)),
                        Ok(Err(e)) => {
                            warn!(generation = self.generation, error = %e, "unable to connect");
                            self.notify_error(&WsError::Connection(e));
                            ConnectOutcome::Failed
                        }
                        Err(_elapsed) => {
                            warn!(
                                generation = self.generation,
                                timeout = ?self.config.connect_timeout,
                                "connection attempt timed out"
                            );
                            self.notify_error(&WsError::Timeout);
                            ConnectOutcome::Failed
                        }
                    };
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(Command::Send(text)) => {
                            if self.pending.replace(text).is_some() {
                                debug!("queued message superseded by a newer send");
                            }
                            retry = Box::pin(sleep(PENDING_SEND_RETRY));
                        }
                        Some(Command::Close) | None => return ConnectOutcome::Shutdown,
                    }
                }
                () = &mut retry, if self.pending.is_some() => {
                    // Still connecting: keep the latest message and check again.
                    trace!("queued message waiting for the socket to open");
                    retry = Box::pin(sleep(PENDING_SEND_RETRY));
                }
            }
        }
    }

    /// Drive one open connection until it is lost or closed on purpose.
    ///
    /// The heartbeat timer lives on this stack frame, so it exists exactly
    /// as long as the connection is open and cannot leak across reconnects.
    async fn drive(&mut self, stream: WsStream) -> OpenOutcome {
        let (mut write, mut read) = stream.split();

        // The first probe goes out immediately on open, then one per tick.
        if let Err(e) = write
            .send(Message::Text(self.config.heartbeat_payload.clone().into()))
            .await
        {
            self.notify_error(&WsError::Connection(e));
            return OpenOutcome::Lost;
        }
        let mut heartbeat = interval_at(
            TokioInstant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // A message queued while connecting is delivered now that the
        // socket is open, ending its pending-send cycle.
        if let Some(text) = self.pending.take() {
            debug!(generation = self.generation, "delivering queued message");
            if let Err(e) = write.send(Message::Text(text.into())).await {
                self.notify_error(&WsError::Connection(e));
                return OpenOutcome::Lost;
            }
        }

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    trace!(generation = self.generation, "sending liveness probe");
                    if let Err(e) = write
                        .send(Message::Text(self.config.heartbeat_payload.clone().into()))
                        .await
                    {
                        self.notify_error(&WsError::Connection(e));
                        return OpenOutcome::Lost;
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.notify_message(Payload::Text(text.as_str().to_owned()));
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            self.notify_message(Payload::Binary(bytes.to_vec()));
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                self.notify_error(&WsError::Connection(e));
                                return OpenOutcome::Lost;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = match frame {
                                Some(f) => CloseReason::Frame {
                                    code: Some(f.code.into()),
                                    reason: f.reason.as_str().to_owned(),
                                },
                                None => CloseReason::Frame {
                                    code: None,
                                    reason: String::new(),
                                },
                            };
                            info!(generation = self.generation, ?reason, "server closed the connection");
                            self.notify_close(&reason);
                            return OpenOutcome::Lost;
                        }
                        Some(Ok(_)) => {
                            // Pong and raw frames carry nothing for the caller.
                        }
                        Some(Err(e)) => {
                            error!(generation = self.generation, error = %e, "WebSocket error");
                            self.notify_error(&WsError::Connection(e));
                            return OpenOutcome::Lost;
                        }
                        None => {
                            info!(generation = self.generation, "WebSocket stream ended");
                            self.notify_close(&CloseReason::StreamEnded);
                            return OpenOutcome::Lost;
                        }
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(Command::Send(text)) => {
                            if let Err(e) = write.send(Message::Text(text.into())).await {
                                self.notify_error(&WsError::Connection(e));
                                return OpenOutcome::Lost;
                            }
                        }
                        Some(Command::Close) | None => {
                            // Best-effort close frame; the socket is dropped
                            // either way.
                            _ = write.send(Message::Close(None)).await;
                            return OpenOutcome::Shutdown;
                        }
                    }
                }
            }
        }
    }

    /// Wait out the backoff delay between attempts while staying responsive
    /// to close. Returns `false` when the manager should go inert instead of
    /// retrying.
    async fn wait_before_retry(&mut self, delay: Duration) -> bool {
        let wait = sleep(delay);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                () = &mut wait => return true,
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(Command::Send(_)) => {
                            // No socket is owned between attempts; the
                            // message is dropped, not queued.
                            debug!("no connection; outbound message dropped");
                        }
                        Some(Command::Close) | None => return false,
                    }
                }
            }
        }
    }

    fn go_inert(&self, why: &str) {
        info!(generation = self.generation, "{why}");
        _ = self.state_tx.send(ConnectionState::ManuallyClosed);
    }

    fn notify_message(&self, payload: Payload) {
        if let Some(message) = &self.handlers.message {
            message(payload);
        }
    }

    fn notify_close(&self, reason: &CloseReason) {
        if let Some(close) = &self.handlers.close {
            close(reason);
        }
    }

    fn notify_error(&self, error: &WsError) {
        if let Some(handler) = &self.handlers.error {
            handler(error);
        }
    }
}
