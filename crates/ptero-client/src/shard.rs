//! The real-time websocket channel for one monitored server

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use ptero_api::events::{ProtocolEvent, RawFrame, outbound};

use crate::emitter::Emitter;
use crate::error::{BoxError, Error, Result};
use crate::transport::{ShardConnector, SocketSink};

/// Application-level event names emitted by a shard.
pub mod event {
    pub const AUTH_SUCCESS: &str = "auth_success";
    pub const DEBUG: &str = "debug";
    pub const ERROR: &str = "error";
    /// Every inbound frame, before demultiplexing
    pub const RAW: &str = "raw";
    pub const STATUS_UPDATE: &str = "status_update";
    pub const STATS_UPDATE: &str = "stats_update";
    /// A chunk of console output
    pub const OUTPUT: &str = "output";
    pub const DAEMON_LOG: &str = "daemon_log";
    pub const INSTALL_START: &str = "install_start";
    pub const INSTALL_LOG: &str = "install_log";
    pub const INSTALL_END: &str = "install_end";
    pub const TRANSFER_LOG: &str = "transfer_log";
    pub const TRANSFER_STATUS: &str = "transfer_status";
    pub const BACKUP_COMPLETE: &str = "backup_complete";
}

/// Connection lifecycle states of a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    /// No socket; the initial and terminal state
    Closed,
    /// Fetching credentials and opening the socket
    Connecting,
    /// Socket open, auth frame sent, awaiting confirmation
    Authenticating,
    /// Authenticated and dispatching events
    Open,
}

enum Flow {
    Continue,
    Reconnect,
}

#[derive(Debug, Default, Clone, Copy)]
struct Diagnostics {
    ping: Option<Duration>,
    auth_sent_at: Option<Instant>,
    last_authenticated: Option<DateTime<Utc>>,
}

/// One managed websocket connection to a server's console channel.
///
/// Register handlers for the names in [`event`], then call
/// [`launch`](Self::launch); the call runs the receive loop for the
/// lifetime of the connection. Token expiry is recovered automatically:
/// a `token expiring` warning triggers an in-place re-auth heartbeat, a
/// `token expired` notice a full reconnect with fresh credentials.
///
/// # Example
/// ```no_run
/// use ptero_client::PteroClient;
/// use ptero_client::shard::event;
///
/// # async fn example() -> ptero_client::Result<()> {
/// let client = PteroClient::new("https://panel.example.com", "ptlc_key")?;
/// let shard = client.create_shard("6f54a229");
///
/// shard.add_event(event::OUTPUT, |line| {
///     println!("console: {line}");
///     Ok(())
/// });
///
/// shard.launch().await?;
/// # Ok(())
/// # }
/// ```
pub struct Shard {
    identifier: String,
    connector: Box<dyn ShardConnector>,
    emitter: Emitter,
    state: Mutex<ShardState>,
    writer: AsyncMutex<Option<Box<dyn SocketSink>>>,
    diagnostics: Mutex<Diagnostics>,
}

impl Shard {
    /// Build a shard over a custom [`ShardConnector`].
    ///
    /// [`PteroClient::create_shard`](crate::PteroClient::create_shard) is
    /// the usual entry point; this seam exists for alternative transports
    /// and for tests.
    pub fn with_connector(identifier: impl Into<String>, connector: Box<dyn ShardConnector>) -> Self {
        Self {
            identifier: identifier.into(),
            connector,
            emitter: Emitter::new(),
            state: Mutex::new(ShardState::Closed),
            writer: AsyncMutex::new(None),
            diagnostics: Mutex::new(Diagnostics::default()),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> ShardState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn closed(&self) -> bool {
        self.state() == ShardState::Closed
    }

    /// Auth round-trip latency of the current session.
    pub fn ping(&self) -> Option<Duration> {
        self.diagnostics().ping
    }

    pub fn last_authenticated(&self) -> Option<DateTime<Utc>> {
        self.diagnostics().last_authenticated
    }

    /// Registers a synchronous handler for an application event.
    pub fn add_event<F>(&self, name: impl Into<String>, slot: F)
    where
        F: Fn(Value) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.emitter.add_event(name, slot);
    }

    /// Registers an asynchronous handler for an application event.
    pub fn add_async_event<F, Fut>(&self, name: impl Into<String>, slot: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        self.emitter.add_async_event(name, slot);
    }

    pub fn remove_event(&self, name: &str) {
        self.emitter.remove_event(name);
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.emitter.has_event(name)
    }

    pub fn clear_slots(&self) {
        self.emitter.clear_slots();
    }

    /// Connect, authenticate and run the receive loop until the
    /// connection ends.
    ///
    /// Only valid from `Closed`; calling it on a live shard is a no-op.
    /// Returns once the socket closes — through [`destroy`](Self::destroy),
    /// a server-side close, or an unrecoverable protocol error.
    ///
    /// # Errors
    /// [`Error::Shard`] if authentication or the connection fails
    /// unrecoverably; failures before the first `auth success` are not
    /// retried.
    pub async fn launch(&self) -> Result<()> {
        if !self.closed() {
            return Ok(());
        }

        let outcome = self.run().await;
        self.destroy().await;
        outcome
    }

    /// Closes the connection and resets the shard to `Closed`.
    ///
    /// Safe from any state; closing the write half ends the receive loop
    /// promptly. `launch` may be called again afterwards.
    pub async fn destroy(&self) {
        self.close_writer().await;
        self.set_state(ShardState::Closed);
    }

    /// Sends a console command to the server. No-op while closed.
    pub async fn send_command(&self, command: impl Into<String>) -> Result<()> {
        self.send_if_open(RawFrame::new(outbound::SEND_COMMAND, vec![command.into()]))
            .await
    }

    /// Requests a power state change (`start`, `stop`, `restart`,
    /// `kill`). No-op while closed.
    pub async fn send_state(&self, state: impl Into<String>) -> Result<()> {
        self.send_if_open(RawFrame::new(outbound::SET_STATE, vec![state.into()]))
            .await
    }

    /// Asks the daemon to replay recent console history. No-op while
    /// closed.
    pub async fn request_logs(&self) -> Result<()> {
        self.send_if_open(RawFrame::bare(outbound::SEND_LOGS)).await
    }

    /// Asks the daemon for a stats snapshot. No-op while closed.
    pub async fn request_stats(&self) -> Result<()> {
        self.send_if_open(RawFrame::bare(outbound::SEND_STATS)).await
    }

    async fn run(&self) -> Result<()> {
        loop {
            self.set_state(ShardState::Connecting);
            let auth = self.connector.fetch_auth().await?;

            self.debug("attempting to connect to websocket").await;
            let (mut reader, sink) = self.connector.open(&auth).await?;
            *self.writer.lock().await = Some(sink);

            self.debug("authenticating connection").await;
            self.authenticate(&auth.token).await?;
            self.set_state(ShardState::Authenticating);

            let reconnect = loop {
                let Some(next) = reader.next_frame().await else {
                    break false;
                };

                match self.dispatch(next?).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Reconnect) => break true,
                    // a consumer bug never tears down the channel
                    Err(Error::Event { event, source }) => {
                        tracing::warn!("handler for '{event}' failed: {source}");
                    }
                    Err(err) => return Err(err),
                }
            };

            if !reconnect {
                return Ok(());
            }

            self.debug("token expired, reconnecting").await;
            self.destroy().await;
        }
    }

    async fn dispatch(&self, frame: RawFrame) -> Result<Flow> {
        self.debug(&format!("received event: {}", frame.event)).await;
        self.emitter
            .emit(event::RAW, serde_json::to_value(&frame).unwrap_or(Value::Null))
            .await?;

        match ProtocolEvent::from_name(&frame.event) {
            ProtocolEvent::AuthSuccess => {
                self.mark_authenticated();
                self.set_state(ShardState::Open);
                self.emitter.emit(event::AUTH_SUCCESS, Value::Null).await?;
            }
            ProtocolEvent::TokenExpiring => self.heartbeat().await?,
            ProtocolEvent::TokenExpired => return Ok(Flow::Reconnect),
            ProtocolEvent::DaemonError | ProtocolEvent::JwtError => {
                let detail = frame.joined_args();
                if self.emitter.has_event(event::ERROR) {
                    self.emitter.emit(event::ERROR, Value::String(detail)).await?;
                } else {
                    self.destroy().await;
                    return Err(Error::Shard(detail));
                }
            }
            ProtocolEvent::Status => {
                let state = frame.args.first().cloned().unwrap_or_default();
                self.emitter
                    .emit(event::STATUS_UPDATE, Value::String(state))
                    .await?;
            }
            ProtocolEvent::Stats => {
                let stats: Value = serde_json::from_str(&frame.joined_args())
                    .map_err(|e| Error::Shard(format!("malformed stats payload: {e}")))?;
                self.emitter.emit(event::STATS_UPDATE, stats).await?;
            }
            ProtocolEvent::ConsoleOutput => {
                self.emitter
                    .emit(event::OUTPUT, Value::String(frame.joined_args()))
                    .await?;
            }
            ProtocolEvent::DaemonMessage => {
                self.emitter
                    .emit(event::DAEMON_LOG, Value::String(frame.joined_args()))
                    .await?;
            }
            ProtocolEvent::InstallStart => {
                self.emitter.emit(event::INSTALL_START, Value::Null).await?;
            }
            ProtocolEvent::InstallOutput => {
                self.emitter
                    .emit(event::INSTALL_LOG, Value::String(frame.joined_args()))
                    .await?;
            }
            ProtocolEvent::InstallCompleted => {
                self.emitter.emit(event::INSTALL_END, Value::Null).await?;
            }
            ProtocolEvent::TransferLogs => {
                self.emitter
                    .emit(event::TRANSFER_LOG, Value::String(frame.joined_args()))
                    .await?;
            }
            ProtocolEvent::TransferStatus => {
                self.emitter
                    .emit(event::TRANSFER_STATUS, Value::String(frame.joined_args()))
                    .await?;
            }
            ProtocolEvent::BackupCompleted => {
                let payload = if frame.args.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&frame.joined_args())
                        .map_err(|e| Error::Shard(format!("malformed backup payload: {e}")))?
                };
                self.emitter.emit(event::BACKUP_COMPLETE, payload).await?;
            }
            ProtocolEvent::Unknown(name) => {
                self.emitter
                    .emit(
                        event::ERROR,
                        Value::String(format!("received unknown event '{name}'")),
                    )
                    .await?;
            }
        }

        Ok(Flow::Continue)
    }

    // Re-authenticates on the live socket when the daemon warns that the
    // current token is about to lapse.
    async fn heartbeat(&self) -> Result<()> {
        let auth = self.connector.fetch_auth().await?;
        self.debug("heartbeat: refreshing authentication").await;
        self.authenticate(&auth.token).await
    }

    async fn authenticate(&self, token: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(Error::Shard("connection not available for this shard".into()));
        };

        sink.send_frame(RawFrame::new(outbound::AUTH, vec![token.to_string()]))
            .await?;
        self.mark_auth_sent();
        Ok(())
    }

    async fn send_if_open(&self, frame: RawFrame) -> Result<()> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => sink.send_frame(frame).await,
            None => Ok(()),
        }
    }

    async fn close_writer(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            if let Err(err) = sink.close().await {
                tracing::warn!("error closing websocket: {err}");
            }
            self.debug("closed websocket connection").await;
        }
    }

    async fn debug(&self, message: &str) {
        let text = format!("debug {}: {}", self.identifier, message);
        tracing::debug!("{text}");
        if let Err(err) = self.emitter.emit(event::DEBUG, Value::String(text)).await {
            tracing::warn!("debug hook failed: {err}");
        }
    }

    fn set_state(&self, state: ShardState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn diagnostics(&self) -> Diagnostics {
        *self.diagnostics.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mark_auth_sent(&self) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .auth_sent_at = Some(Instant::now());
    }

    fn mark_authenticated(&self) {
        let mut diag = self.diagnostics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sent) = diag.auth_sent_at {
            diag.ping = Some(sent.elapsed());
        }
        diag.last_authenticated = Some(Utc::now());
    }
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("identifier", &self.identifier)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
