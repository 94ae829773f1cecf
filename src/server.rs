//! ChatServer driver
//!
//! Owns the listener and the session tasks. Accepts connections, turns
//! away new ones while the registry is full, and spawns a session worker
//! for the rest.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::registry::Registry;
use crate::session::{handle_connection, SessionContext};
use crate::types::IdAllocator;

/// The relay server
pub struct ChatServer {
    listener: TcpListener,
    config: ServerConfig,
    context: Arc<SessionContext>,
    ids: IdAllocator,
}

impl ChatServer {
    /// Bind the listening socket
    ///
    /// Bind failure is fatal for the caller; nothing is retried.
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        config.validate()?;

        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AppError::Bind { addr, source })?;

        let registry = Arc::new(Registry::new(config.max_clients));
        let broadcaster = Broadcaster::new(Arc::clone(&registry), config.self_delivery);
        let context = Arc::new(SessionContext {
            registry,
            broadcaster,
            write_timeout: config.write_timeout,
            outbound_queue: config.outbound_queue,
        });

        Ok(Self {
            listener,
            config,
            context,
            ids: IdAllocator::new(),
        })
    }

    /// Address the listener actually bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared registry of active clients
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.context.registry)
    }

    /// Serve until the process exits
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Serve until `shutdown` resolves
    ///
    /// On shutdown every session is aborted; each one unregisters itself
    /// as it is dropped.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let ChatServer {
            listener,
            config,
            context,
            ids,
        } = self;
        tokio::pin!(shutdown);

        info!(
            "Chat server '{}' accepting on {} (max {} clients, {:?} self-delivery)",
            config.label,
            listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| config.bind_addr().to_string()),
            config.max_clients,
            context.broadcaster.policy()
        );

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Session task panicked: {}", e);
                        }
                    }
                }
                accepted = listener.accept() => {
                    handle_accept(accepted, &context, &ids, &mut sessions);
                }
            }
        }

        info!("Chat server '{}' shutting down", config.label);
        sessions.shutdown().await;
        debug!("Remaining clients after shutdown: {}", context.registry.len());
    }
}

fn handle_accept(
    accepted: std::io::Result<(TcpStream, SocketAddr)>,
    context: &Arc<SessionContext>,
    ids: &IdAllocator,
    sessions: &mut JoinSet<()>,
) {
    let (stream, peer) = match accepted {
        Ok(accepted) => accepted,
        Err(e) => {
            error!("Failed to accept connection: {}", e);
            return;
        }
    };

    if context.registry.is_full() {
        warn!(
            "Registry full ({} clients), dropping connection from {}",
            context.registry.max_clients(),
            peer
        );
        return;
    }

    let id = ids.next_id();
    info!("New connection from {} assigned id {}", peer, id);

    let context = Arc::clone(context);
    sessions.spawn(async move {
        match handle_connection(stream, id, context).await {
            Ok(reason) => debug!("Session {} ended: {}", id, reason),
            Err(AppError::HandshakeFailed) => debug!("Session {} ended before handshake", id),
            Err(e) => warn!("Connection {} from {} abandoned: {}", id, peer, e),
        }
    });
}
