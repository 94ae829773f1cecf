//! Error types for the chat relay
//!
//! Defines application-level errors and outbound queue errors.
//! Uses thiserror for ergonomic error definitions.

use std::net::SocketAddr;

use thiserror::Error;

use crate::types::ClientId;

/// Application-level errors
///
/// `Bind` is fatal at startup. Everything else ends a single connection
/// at most; the server keeps serving the others.
#[derive(Debug, Error)]
pub enum AppError {
    /// Listening socket could not be bound (fatal)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// IO error on a single connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry already holds the maximum number of clients
    #[error("registry is full ({max} clients)")]
    CapacityExceeded { max: usize },

    /// A client with this id is already registered
    #[error("client {0} is already registered")]
    AlreadyRegistered(ClientId),

    /// Client closed or sent nothing usable before identifying itself
    #[error("client did not identify itself")]
    HandshakeFailed,

    /// Rejected server configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Outbound queue errors
///
/// Occurs when a broadcast line cannot be queued for a recipient.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The recipient's writer has gone away
    #[error("Channel closed")]
    ChannelClosed,

    /// The recipient is not keeping up with its queue
    #[error("Outbound queue full")]
    QueueFull,
}
