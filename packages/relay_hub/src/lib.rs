//! Relay Hub - chat relay core
//!
//! This crate owns the single coordinator that tracks connected chat clients
//! and routes their messages. It has no HTTP dependencies: connections are
//! reached through the [`FrameReader`] / [`FrameWriter`] traits, so any
//! framed transport (WebSocket, in-memory pipe) can drive a session.
//!
//! # Example
//!
//! ```no_run
//! use relay_hub::{Hub, HubConfig, SessionConfig, memory, serve_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = Hub::spawn(HubConfig::default());
//!
//!     let (server_side, mut client) = memory::pair();
//!     let (reader, writer) = server_side.split();
//!
//!     let session_hub = hub.clone();
//!     tokio::spawn(async move {
//!         serve_connection(&session_hub, reader, writer, &SessionConfig::default()).await
//!     });
//!
//!     client.send(r#"{"type":"setname","nickname":"alice"}"#);
//!     client.send(r#"{"type":"chat","from":"alice","content":"hi"}"#);
//!
//!     while let Some(frame) = client.recv().await {
//!         println!("{frame}");
//!     }
//! }
//! ```

pub mod envelope;
mod error;
mod hub;
pub mod memory;
mod session;
mod transport;

pub use envelope::{ChatMessage, Frame, Inbound};
pub use error::{DecodeError, HubError, TransportError};
pub use hub::{Hub, HubConfig, HubHandle, HubStats, MailboxSender, SessionId};
pub use session::{SessionConfig, SessionEnd, SessionSummary, serve_connection};
pub use transport::{FrameReader, FrameWriter, Incoming};
