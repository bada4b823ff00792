//! TypedKV - A Typed In-Memory Key-Value Store over WebSocket
//!
//! This is the main entry point for the TypedKV server.
//! It loads the snapshot, sets up the TCP listener, handles incoming
//! connections and dumps the store once on shutdown.

use anyhow::Context;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use typedkv::commands::CommandHandler;
use typedkv::config::{Invocation, ServerConfig};
use typedkv::connection::{handle_connection, ConnectionStats};
use typedkv::protocol::FrameDecoder;
use typedkv::storage::{ExpirySweeper, SharedStore, Snapshot};

fn print_help() {
    println!(
        r#"
TypedKV - A Typed In-Memory Key-Value Store over WebSocket

USAGE:
    typedkv [OPTIONS] [PORT]

OPTIONS:
    -h, --host <HOST>            Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>            Port to listen on (default: 6379)
    -d, --data-dir <DIR>         Directory for dump files (default: .)
        --sweep-interval <MS>    Expiry sweep period, 0 disables (default: 1000)
        --max-frame-size <BYTES> Largest accepted frame payload (default: 16777216)
    -v, --version                Print version information
        --help                   Print this help message

EXAMPLES:
    typedkv                        # Start on 0.0.0.0:6379
    typedkv 6380                   # Start on port 6380
    typedkv -d /var/lib/typedkv    # Keep dump files elsewhere

CONNECTING:
    Open a WebSocket to ws://<host>:<port>/ and send JSON requests:
    > {{"event":"sset","key":"name","value":"Ariz"}}
    < 1
    > {{"event":"sget","key":"name"}}
    < "Ariz"
"#
    );
}

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
  _                      _ _
 | |_ _   _ _ __   ___  __| | | ____   __
 | __| | | | '_ \ / _ \/ _` | |/ /\ \ / /
 | |_| |_| | |_) |  __/ (_| |   <  \ V /
  \__|\__, | .__/ \___|\__,_|_|\_\  \_/
      |___/|_|

TypedKV v{} - Typed In-Memory Key-Value Store
──────────────────────────────────────────────────────────────
Server starting on {}
Data directory: {}

Use Ctrl+C to shutdown gracefully.
"#,
        typedkv::VERSION,
        config.bind_address(),
        config.data_dir.display()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = match ServerConfig::from_args(std::env::args().skip(1)) {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("TypedKV version {}", typedkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    // Load the previous snapshot (missing or unreadable files load empty)
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;
    let snapshot = Snapshot::new(config.data_dir.clone());
    let store: SharedStore = Arc::new(Mutex::new(snapshot.load()));

    let sweeper = config
        .sweep_interval
        .map(|interval| ExpirySweeper::start(Arc::clone(&store), interval));

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Install signal handlers before accepting anything
    let mut signals = ShutdownSignals::install().context("failed to install signal handlers")?;

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&store), config.frame_decoder(), Arc::clone(&stats)) => {}
        _ = signals.recv() => {}
    }

    info!("Shutdown signal received, stopping server...");
    drop(sweeper);

    // The only dump of the process lifetime
    let written = {
        let store = store.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot.dump(&store)
    };
    info!(namespaces = written, "Store dumped");

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        frames = stats.frames_processed.load(Ordering::Relaxed),
        rejected = stats.handshakes_rejected.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    store: SharedStore,
    decoder: FrameDecoder,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                // Create a command handler for this connection
                let handler = CommandHandler::new(Arc::clone(&store));
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, decoder, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Termination signals that trigger an orderly exit.
#[cfg(unix)]
struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.sigint.recv() => info!("Received SIGINT (Ctrl+C)"),
            _ = self.sigterm.recv() => info!("Received SIGTERM"),
            _ = self.sighup.recv() => info!("Received SIGHUP"),
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl+C"),
        }
    }
}
