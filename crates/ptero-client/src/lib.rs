//! ptero-client: typed async client for the panel's REST and WebSocket API
//!
//! Provides the request pipeline for both halves of the HTTP API and a
//! [`Shard`] for live console/stat streaming over websocket.
//!
//! # Examples
//!
//! ## REST
//!
//! ```no_run
//! use ptero_client::{PowerSignal, PteroClient};
//!
//! # async fn example() -> ptero_client::Result<()> {
//! let client = PteroClient::new("https://panel.example.com", "ptlc_key")?;
//!
//! // Who owns this key
//! let account = client.get_account().await?;
//! println!("logged in as {}", account.username);
//!
//! // List accessible servers
//! for server in client.get_servers().await? {
//!     println!("{} ({})", server.name, server.identifier);
//! }
//!
//! // Act on one of them
//! client.send_server_command("6f54a229", "say hello").await?;
//! client.set_server_power("6f54a229", PowerSignal::Restart).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Live console channel
//!
//! ```no_run
//! use ptero_client::PteroClient;
//! use ptero_client::shard::event;
//!
//! # async fn example() -> ptero_client::Result<()> {
//! let client = PteroClient::new("https://panel.example.com", "ptlc_key")?;
//! let shard = client.create_shard("6f54a229");
//!
//! shard.add_event(event::OUTPUT, |line| {
//!     println!("console: {line}");
//!     Ok(())
//! });
//! shard.add_event(event::STATS_UPDATE, |stats| {
//!     println!("memory: {:?}", stats.get("memory_bytes"));
//!     Ok(())
//! });
//!
//! // Runs until the connection ends; token expiry is recovered
//! // automatically.
//! shard.launch().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod client;
pub mod emitter;
pub mod error;
pub mod files;
pub mod http;
pub mod permissions;
pub mod query;
pub mod shard;
pub mod transport;

pub use app::PteroApp;
pub use client::{PowerSignal, PteroClient};
pub use emitter::Emitter;
pub use error::{ApiError, ApiErrors, BoxError, Error, Result};
pub use files::{Directory, File};
pub use http::{ApiKind, Body, Method, Payload, RequestManager, RequestOptions};
pub use permissions::{Flag, Permissions};
pub use query::Query;
pub use shard::{Shard, ShardState};
