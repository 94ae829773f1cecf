//! Interactive terminal client for the chat relay
//!
//! Prompts for a name, then sends each stdin line as a message and prints
//! whatever the server relays. Typing `.DISCONNECT` leaves the chat.

use std::net::SocketAddr;

use clap::Parser;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use chat_relay::protocol::{DISCONNECT_SENTINEL, MAX_NAME_LEN};

#[derive(Parser, Debug)]
#[command(author, version, about = "Connect to a chat relay server", long_about = None)]
struct Args {
    /// Server port
    port: u16,

    /// Server host
    #[arg(default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .await
        .inspect_err(|e| error!("Connect to {}:{} failed: {}", args.host, args.port, e))?;
    let server: SocketAddr = stream.peer_addr()?;
    debug!("Connected to {}", server);

    let (read_half, mut write_half) = stream.into_split();
    let mut stdin = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    stdout.write_all(b"Please enter a name: ").await?;
    stdout.flush().await?;
    let Some(name) = stdin.next_line().await? else {
        return Ok(());
    };
    if name.len() > MAX_NAME_LEN {
        eprintln!("Name will be cut to {} bytes", MAX_NAME_LEN);
    }
    write_half.write_all(format!("{}\n", name).as_bytes()).await?;

    // Server → stdout
    let mut incoming = tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        let mut stdout = io::stdout();
        while let Ok(Some(line)) = lines.next_line().await {
            if stdout.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
        debug!("Server closed the connection");
    });

    loop {
        tokio::select! {
            _ = &mut incoming => break,
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                write_half.write_all(format!("{}\n", line).as_bytes()).await?;
                if line.as_bytes().starts_with(DISCONNECT_SENTINEL) {
                    break;
                }
            }
        }
    }

    let _ = write_half.shutdown().await;
    Ok(())
}
