//! Transport seams for the shard's websocket channel
//!
//! The shard talks to its socket through the [`SocketReader`]/[`SocketSink`]
//! pair and obtains fresh connections through a [`ShardConnector`]. The
//! production implementation wires these to the panel's REST auth endpoint
//! and `tokio-tungstenite`; tests script their own.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use ptero_api::events::RawFrame;
use ptero_api::resources::WebSocketAuth;

use crate::error::{Error, Result};
use crate::http::RequestManager;

/// Read half of a shard socket.
#[async_trait]
pub trait SocketReader: Send {
    /// The next inbound frame; `None` once the connection has ended.
    async fn next_frame(&mut self) -> Option<Result<RawFrame>>;
}

/// Write half of a shard socket.
#[async_trait]
pub trait SocketSink: Send {
    async fn send_frame(&mut self, frame: RawFrame) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Produces authenticated connections for one monitored server.
#[async_trait]
pub trait ShardConnector: Send + Sync {
    /// Fetch a fresh one-time socket URL and auth token from the panel.
    async fn fetch_auth(&self) -> Result<WebSocketAuth>;

    /// Open the socket and split it into its read and write halves.
    async fn open(
        &self,
        auth: &WebSocketAuth,
    ) -> Result<(Box<dyn SocketReader>, Box<dyn SocketSink>)>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The production connector: REST auth fetch + tungstenite socket.
pub(crate) struct PanelConnector {
    http: Arc<RequestManager>,
    origin: String,
    identifier: String,
}

impl PanelConnector {
    pub(crate) fn new(http: Arc<RequestManager>, origin: String, identifier: String) -> Self {
        Self {
            http,
            origin,
            identifier,
        }
    }
}

#[async_trait]
impl ShardConnector for PanelConnector {
    async fn fetch_auth(&self) -> Result<WebSocketAuth> {
        self.http
            .get(&format!("/servers/{}/websocket", self.identifier))
            .await?
            .wrapped()
    }

    async fn open(
        &self,
        auth: &WebSocketAuth,
    ) -> Result<(Box<dyn SocketReader>, Box<dyn SocketSink>)> {
        let mut request = auth
            .socket
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Shard(format!("invalid websocket url: {e}")))?;

        // Wings only accepts connections that present the panel as origin.
        let origin = HeaderValue::from_str(&self.origin)
            .map_err(|e| Error::Shard(format!("invalid origin header: {e}")))?;
        request.headers_mut().insert(ORIGIN, origin);

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| Error::Shard(format!("websocket connect failed: {e}")))?;
        tracing::debug!(identifier = %self.identifier, "websocket connected");

        let (sink, stream) = stream.split();
        Ok((
            Box::new(TungsteniteReader { inner: stream }),
            Box::new(TungsteniteSink { inner: sink }),
        ))
    }
}

struct TungsteniteReader {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl SocketReader for TungsteniteReader {
    async fn next_frame(&mut self) -> Option<Result<RawFrame>> {
        while let Some(message) = self.inner.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<RawFrame>(&text) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(err) => {
                        tracing::warn!("skipping unparseable frame: {err}");
                    }
                },
                Ok(Message::Close(_)) => return None,
                // Ping/pong are answered by tungstenite itself; the daemon
                // never sends binary frames
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {
                }
                Err(err) => {
                    return Some(Err(Error::Shard(format!(
                        "websocket transport error: {err}"
                    ))));
                }
            }
        }

        None
    }
}

struct TungsteniteSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl SocketSink for TungsteniteSink {
    async fn send_frame(&mut self, frame: RawFrame) -> Result<()> {
        let text = serde_json::to_string(&frame)
            .map_err(|e| Error::Shard(format!("unserializable frame: {e}")))?;

        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::Shard(format!("websocket send failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner
            .close()
            .await
            .map_err(|e| Error::Shard(format!("websocket close failed: {e}")))
    }
}
