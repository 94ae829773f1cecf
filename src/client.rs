//! Client struct definition
//!
//! Represents a registered client: identity plus the queue feeding its
//! connection's writer.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::types::{ClientId, DisplayName};

/// Lifecycle of a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Accepted, name not yet received
    Connecting,
    /// Registered and relaying
    Active,
    /// Removed from the registry, connection closed
    Disconnected,
}

/// Registered client handle
///
/// Cloning is cheap: clones share the same outbound queue. The socket
/// itself stays with the client's session; everyone else reaches it
/// through `send`.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Name given during the handshake
    pub name: DisplayName,
    /// Remote address of the connection
    pub peer: SocketAddr,
    /// Server → client line queue
    sender: mpsc::Sender<Arc<str>>,
}

impl Client {
    /// Create a new client with the given identity and outbound queue
    pub fn new(
        id: ClientId,
        name: DisplayName,
        peer: SocketAddr,
        sender: mpsc::Sender<Arc<str>>,
    ) -> Self {
        Self {
            id,
            name,
            peer,
            sender,
        }
    }

    /// Queue a line for this client
    ///
    /// Never waits: a full queue means the client is too slow and the
    /// line is dropped for it.
    pub fn send(&self, line: Arc<str>) -> Result<(), SendError> {
        self.sender.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Get the display name for this client
    pub fn display_name(&self) -> &str {
        self.name.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(sender: mpsc::Sender<Arc<str>>) -> Client {
        Client::new(
            ClientId(1),
            DisplayName::parse(b"Alice").unwrap(),
            "127.0.0.1:4000".parse().unwrap(),
            sender,
        )
    }

    #[tokio::test]
    async fn test_client_send() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = client(tx);

        assert_eq!(client.display_name(), "Alice");
        client.send(Arc::from("line\n")).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("line\n"));
    }

    #[test]
    fn test_client_send_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let client = client(tx);

        client.send(Arc::from("one")).unwrap();
        assert_eq!(client.send(Arc::from("two")), Err(SendError::QueueFull));
    }

    #[test]
    fn test_client_send_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        let client = client(tx);
        drop(rx);

        assert_eq!(client.send(Arc::from("one")), Err(SendError::ChannelClosed));
    }
}
