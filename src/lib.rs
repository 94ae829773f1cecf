//! Multi-client TCP Chat Relay Library
//!
//! A small chat relay built on tokio: clients connect over plain TCP,
//! send a name, and every line they send afterwards is broadcast to the
//! other connected clients.
//!
//! # Features
//! - Name handshake with a bounded display name
//! - Registry capped at a configurable number of clients (4 by default)
//! - Broadcast to all other clients as `"<name> says: <message>\n"`
//! - `.DISCONNECT` sentinel and disconnect cleanup
//! - Per-client outbound queues with a write timeout
//! - Graceful shutdown
//!
//! # Architecture
//! - `Registry` is the shared, lock-guarded set of active clients
//! - Each connection runs a session task plus a writer task
//! - `Broadcaster` enqueues lines on recipients' queues under its own lock
//! - `ChatServer` accepts connections and owns every session task
//!
//! # Example
//! ```ignore
//! use chat_relay::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = ChatServer::bind(ServerConfig::new(9000, "lobby")).await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcast::{Broadcaster, DeliveryReport, SelfDelivery};
pub use client::{Client, ClientState};
pub use config::{Cli, ServerConfig};
pub use error::{AppError, SendError};
pub use registry::Registry;
pub use server::ChatServer;
pub use session::{handle_connection, CloseReason, SessionContext, SessionState};
pub use types::{ClientId, DisplayName, IdAllocator};
