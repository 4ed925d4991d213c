//! MJPEG relay server
//!
//! Run with: cargo run --example relay_server -- [OPTIONS]
//!
//! Examples:
//!   cargo run --example relay_server                               # 0.0.0.0:8080, files/sock
//!   cargo run --example relay_server -- --bind 127.0.0.1:9000
//!   cargo run --example relay_server -- --access access.json       # owner-only viewing
//!
//! Then start a producer for the same session key:
//!   cargo run --example frame_producer -- --user alice --camera cam1 ./jpegs
//!
//! and open http://localhost:8080/stream/alice/cam1 in a browser, or:
//!   ffplay -f mjpeg http://localhost:8080/stream/alice/cam1
//!
//! Stop a stream from outside:
//!   echo '{"status":"stopped"}' > files/sock/alice.cam1.ctrl

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mjpeg_relay::{AccessCheck, AccessList, AllowAll, RelayServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "relay_server", about = "Serve producer frames as MJPEG streams")]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0:8080", env = "MJPEG_BIND")]
    bind: SocketAddr,

    /// Directory holding mailbox and control files
    #[arg(long, default_value = "files/sock", env = "MJPEG_MAILBOX_DIR")]
    mailbox_dir: PathBuf,

    /// Base directory for relative frame references
    #[arg(long, default_value = ".")]
    frame_root: PathBuf,

    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,

    /// Maximum concurrent streams (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// JSON access list `{"user": ["camera", ...]}`; everyone may view when absent
    #[arg(long)]
    access: Option<PathBuf>,

    /// Reclaim mailbox markers left behind for this many seconds
    #[arg(long)]
    stale_marker_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_relay=info".parse()?)
                .add_directive("relay_server=info".parse()?),
        )
        .init();

    std::fs::create_dir_all(&args.mailbox_dir)?;

    let mut config = ServerConfig::with_addr(args.bind)
        .max_connections(args.max_connections)
        .mailbox_dir(&args.mailbox_dir)
        .frame_root(&args.frame_root)
        .poll_interval(Duration::from_millis(args.poll_ms.max(1)));
    if let Some(secs) = args.stale_marker_secs {
        config.relay = config.relay.stale_marker_after(Duration::from_secs(secs));
    }

    println!("Mailboxes: {}", args.mailbox_dir.display());

    match args.access {
        Some(path) => serve(config, AccessList::load(path).await?).await?,
        None => serve(config, AllowAll).await?,
    }

    Ok(())
}

async fn serve<A: AccessCheck>(config: ServerConfig, access: A) -> mjpeg_relay::Result<()> {
    let server = RelayServer::new(config, access);

    println!("Starting MJPEG relay on {}", server.bind_addr());
    println!();
    println!("=== Watch a stream ===");
    println!("Browser: http://{}/stream/<user>/<camera>", server.bind_addr());
    println!();

    // Run with Ctrl+C handling
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await
}
