use anyhow::Context;
use clap::Parser;
use gpu_attest_gateway::{
    config::{Config, ConfigOverrides},
    logging,
    routes::{AppState, RequestTimeouts, build_router},
    server::Server,
    verifier::{AdmissionGate, CommandAttestationTool},
};
use std::sync::Arc;
use tokio::signal::{self, unix::SignalKind};
use tracing::{error, info};

/// Exposes GPU attestation over HTTP on a TCP port and a unix socket.
#[derive(Parser)]
struct Cli {
    /// The path to the config file.
    #[clap(short, long)]
    config_path: Option<String>,

    /// Path to the log file where service logs are written.
    #[clap(long)]
    log_path: Option<String>,

    /// Port on which the HTTP service will listen.
    #[clap(long)]
    port: Option<u16>,

    /// Path to the unix socket file.
    #[clap(long)]
    socket: Option<String>,

    /// Root directory for the GPU verifier, containing its python environment.
    #[clap(long)]
    verifier_root: Option<String>,

    /// Message indicating successful attestation in the verifier's output.
    #[clap(long)]
    success_marker: Option<String>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    let terminate = async {
        signal::unix::signal(SignalKind::terminate()).expect("failed to install signal handler").recv().await;
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received ctrl-c");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

#[tokio::main]
async fn main() {
    let Cli { config_path, log_path, port, socket, verifier_root, success_marker } = Cli::parse();
    let overrides = ConfigOverrides { log_path, port, socket_path: socket, verifier_root, success_marker };
    let config = match Config::load(config_path.as_deref(), overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            std::process::exit(1);
        }
    };
    let log_guard = match logging::init(config.log.file_path().map(|path| path.as_path())) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("{e:#}");
        drop(log_guard);
        std::process::exit(1);
    }
    info!("Shutting down");
}

async fn run(config: Config) -> anyhow::Result<()> {
    let Config { server, verifier, log } = config;
    info!(
        port = server.port,
        socket_path = %server.socket_path.display(),
        verifier_root = %verifier.root.display(),
        success_marker = %verifier.success_marker,
        log_path = ?log.file_path(),
        "Starting GPU attestation gateway"
    );

    let tool = Arc::new(CommandAttestationTool::new(verifier.root, verifier.elevate));
    let state = AppState::new(tool, AdmissionGate::new(), verifier.success_marker);
    let timeouts = RequestTimeouts { read: server.read_timeout, write: server.write_timeout };
    let router = build_router(Arc::new(state), timeouts);

    let listeners = Server::bind(server.bind_endpoint(), &server.socket_path).await.context("Failed to start server")?;
    listeners.run(router, shutdown_signal()).await.context("Failed to serve")
}
