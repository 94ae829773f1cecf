//! Server configuration
//!
//! `Cli` is the command line surface; `ServerConfig` is what the server
//! actually runs with.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::broadcast::SelfDelivery;
use crate::error::AppError;

/// Default cap on concurrently registered clients
pub const DEFAULT_MAX_CLIENTS: usize = 4;

/// Default bound on a single write to a client
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of lines queued per client before it is skipped
pub const DEFAULT_OUTBOUND_QUEUE: usize = 32;

/// Command line arguments for the relay server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on. Use 0 for an ephemeral port.
    pub port: u16,

    /// Server label, shown in logs only.
    pub label: String,

    /// Interface to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Maximum number of concurrently registered clients.
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    pub max_clients: usize,

    /// Echo every message back to its sender as well.
    #[arg(long)]
    pub include_sender: bool,

    /// Give up on a client whose socket does not accept a line in time.
    #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT.as_millis() as u64)]
    pub write_timeout_ms: u64,

    /// Lines buffered per client before new ones are dropped for it.
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_QUEUE)]
    pub outbound_queue: usize,
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub label: String,
    pub max_clients: usize,
    pub self_delivery: SelfDelivery,
    pub write_timeout: Duration,
    pub outbound_queue: usize,
}

impl ServerConfig {
    /// Configuration with defaults for everything but port and label
    pub fn new(port: u16, label: impl Into<String>) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            label: label.into(),
            max_clients: DEFAULT_MAX_CLIENTS,
            self_delivery: SelfDelivery::default(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    pub fn with_self_delivery(mut self, policy: SelfDelivery) -> Self {
        self.self_delivery = policy;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Address the listener binds to
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_clients == 0 {
            return Err(AppError::InvalidConfig("max clients must be at least 1".into()));
        }
        if self.outbound_queue == 0 {
            return Err(AppError::InvalidConfig("outbound queue must hold at least 1 line".into()));
        }
        if self.write_timeout.is_zero() {
            return Err(AppError::InvalidConfig("write timeout must be positive".into()));
        }
        Ok(())
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        let self_delivery = if cli.include_sender {
            SelfDelivery::Include
        } else {
            SelfDelivery::Exclude
        };

        Self {
            host: cli.host,
            port: cli.port,
            label: cli.label,
            max_clients: cli.max_clients,
            self_delivery,
            write_timeout: Duration::from_millis(cli.write_timeout_ms),
            outbound_queue: cli.outbound_queue,
        }
    }
}
