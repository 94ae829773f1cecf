//! Client session worker
//!
//! Drives one connection from handshake to close:
//! `Handshaking → Active → Closing → Closed`.
//! A writer task owns the socket's write half and drains the client's
//! outbound queue; the session itself reads and forwards to the
//! broadcaster.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::client::{Client, ClientState};
use crate::error::AppError;
use crate::protocol::{FrameReader, Inbound, Overflow, MAX_MESSAGE_LEN, MAX_NAME_LEN};
use crate::registry::Registry;
use crate::types::{ClientId, DisplayName};

/// State shared by every session
#[derive(Debug)]
pub struct SessionContext {
    pub registry: Arc<Registry>,
    pub broadcaster: Broadcaster,
    pub write_timeout: Duration,
    pub outbound_queue: usize,
}

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// Client lifecycle state seen from outside the session
    pub fn client_state(self) -> ClientState {
        match self {
            SessionState::Handshaking => ClientState::Connecting,
            SessionState::Active => ClientState::Active,
            SessionState::Closing | SessionState::Closed => ClientState::Disconnected,
        }
    }
}

/// Why an active session ended
#[derive(Debug)]
pub enum CloseReason {
    /// Client sent the disconnect sentinel
    Sentinel,
    /// Zero-byte read
    PeerClosed,
    /// Reading from the socket failed
    ReadError(std::io::Error),
    /// Writer gave up on the socket
    WriteFailed,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Sentinel => f.write_str("sent disconnect"),
            CloseReason::PeerClosed => f.write_str("peer closed"),
            CloseReason::ReadError(e) => write!(f, "read error: {}", e),
            CloseReason::WriteFailed => f.write_str("write failed"),
        }
    }
}

/// Registry membership tied to a scope
///
/// Removes the client when dropped, which also covers panics and task
/// aborts.
struct Registration {
    registry: Arc<Registry>,
    id: ClientId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.registry.remove(self.id) {
            debug!("Client {} unregistered", self.id);
        }
    }
}

fn transition(id: ClientId, state: &mut SessionState, next: SessionState) {
    debug!(
        "Client {}: {:?} -> {:?} ({:?})",
        id,
        *state,
        next,
        next.client_state()
    );
    *state = next;
}

/// Writer task tied to its session
///
/// Aborts the task when dropped so an aborted session never leaves its
/// writer running.
struct WriterTask(JoinHandle<()>);

impl Drop for WriterTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Serve one accepted connection until it closes
///
/// Handshake and capacity failures come back as errors; the connection
/// is closed without ever being registered. Any way an active session
/// ends is a normal close.
pub async fn handle_connection(
    stream: TcpStream,
    id: ClientId,
    ctx: Arc<SessionContext>,
) -> Result<CloseReason, AppError> {
    let peer = stream.peer_addr()?;
    let (read_half, write_half) = stream.into_split();
    serve(read_half, write_half, peer, id, ctx).await
}

/// Run the session state machine over a split connection
pub async fn serve<R, W>(
    read_half: R,
    write_half: W,
    peer: SocketAddr,
    id: ClientId,
    ctx: Arc<SessionContext>,
) -> Result<CloseReason, AppError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = FrameReader::new(read_half);
    let mut state = SessionState::Handshaking;

    let name = match handshake(&mut reader).await {
        Ok(name) => name,
        Err(e) => {
            info!("Client {} from {} did not identify itself; disconnecting", id, peer);
            transition(id, &mut state, SessionState::Closing);
            transition(id, &mut state, SessionState::Closed);
            return Err(e);
        }
    };

    let (line_tx, line_rx) = mpsc::channel(ctx.outbound_queue);
    ctx.registry.add(Client::new(id, name.clone(), peer, line_tx))?;
    let registration = Registration {
        registry: Arc::clone(&ctx.registry),
        id,
    };

    transition(id, &mut state, SessionState::Active);
    info!("Client {} joined as '{}' from {}", id, name, peer);

    let mut writer = WriterTask(tokio::spawn(write_loop(
        write_half,
        line_rx,
        ctx.write_timeout,
        id,
    )));

    let (reason, writer_done) = tokio::select! {
        reason = read_loop(&mut reader, id, &name, &ctx.broadcaster) => (reason, false),
        _ = &mut writer.0 => (CloseReason::WriteFailed, true),
    };

    transition(id, &mut state, SessionState::Closing);
    // Last sender goes away with the registry entry, letting the writer
    // flush what is queued and shut the socket down.
    drop(registration);

    if !writer_done && timeout(ctx.write_timeout, &mut writer.0).await.is_err() {
        debug!("Writer for client {} did not finish in time", id);
    }
    drop(writer);

    transition(id, &mut state, SessionState::Closed);
    info!("Client {} ('{}') disconnected: {}", id, name, reason);
    Ok(reason)
}

/// Read the display name
async fn handshake<R>(reader: &mut FrameReader<R>) -> Result<DisplayName, AppError>
where
    R: AsyncRead + Unpin,
{
    let frame = reader
        .next_frame(MAX_NAME_LEN, Overflow::Truncate)
        .await?
        .ok_or(AppError::HandshakeFailed)?;

    DisplayName::parse(&frame).ok_or(AppError::HandshakeFailed)
}

/// Relay messages until the client leaves
async fn read_loop<R>(
    reader: &mut FrameReader<R>,
    id: ClientId,
    name: &DisplayName,
    broadcaster: &Broadcaster,
) -> CloseReason
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match reader.next_frame(MAX_MESSAGE_LEN, Overflow::Split).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return CloseReason::PeerClosed,
            Err(e) => return CloseReason::ReadError(e),
        };
        debug!("{} bytes were read from client {}", frame.len(), id);

        match Inbound::classify(&frame) {
            Inbound::Message(text) => {
                broadcaster.deliver(id, name, &text);
            }
            Inbound::Blank => {}
            Inbound::Disconnect => return CloseReason::Sentinel,
        }
    }
}

/// Write queued lines to the socket
///
/// Ends when every sender is gone or a write fails or stalls.
async fn write_loop<W>(
    mut writer: W,
    mut lines: mpsc::Receiver<Arc<str>>,
    write_timeout: Duration,
    id: ClientId,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        match timeout(write_timeout, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Write to client {} failed: {}", id, e);
                return;
            }
            Err(_) => {
                warn!("Write to client {} timed out after {:?}", id, write_timeout);
                return;
            }
        }
    }

    let _ = writer.shutdown().await;
    debug!("Writer ended for client {}", id);
}
