use anyhow::Context;
use axum::Router;
use std::{
    fs,
    net::SocketAddr,
    os::unix::fs::{DirBuilderExt, PermissionsExt},
    path::{Path, PathBuf},
};
use tokio::{
    net::{TcpListener, UnixListener},
    sync::watch,
};
use tracing::{error, info};

/// Prepare a unix socket listener at the given path.
///
/// Any stale socket file is removed and the parent directory is created if needed. The socket is made
/// accessible to every user; failing to do so is not fatal.
pub fn prepare_socket_listener(socket_path: &Path) -> anyhow::Result<UnixListener> {
    if fs::symlink_metadata(socket_path).is_ok() {
        fs::remove_file(socket_path).context("Failed to remove existing socket file")?;
    }
    if let Some(socket_dir) = socket_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(socket_dir)
            .context("Failed to create socket directory")?;
    }
    let listener = UnixListener::bind(socket_path).context("Failed to create unix socket")?;
    if let Err(e) = fs::set_permissions(socket_path, fs::Permissions::from_mode(0o666)) {
        error!("Failed to set socket permissions 0666: {e}");
    }
    Ok(listener)
}

/// The gateway's listeners, all serving the same router.
pub struct Server {
    tcp: TcpListener,
    unix: UnixListener,
    socket_path: PathBuf,
}

impl Server {
    /// Bind both listeners. Failing to bind either one is an error.
    pub async fn bind(bind_endpoint: SocketAddr, socket_path: &Path) -> anyhow::Result<Self> {
        let tcp = TcpListener::bind(bind_endpoint).await.with_context(|| format!("Failed to bind to {bind_endpoint}"))?;
        let unix = prepare_socket_listener(socket_path)?;
        Ok(Self { tcp, unix, socket_path: socket_path.into() })
    }

    /// The address the TCP listener is bound to.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr().context("Failed to get local address")
    }

    /// Serve the router on both listeners until `shutdown` resolves.
    pub async fn run<F>(self, router: Router, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self { tcp, unix, socket_path } = self;
        let (shutdown_sender, shutdown_receiver) = watch::channel(());
        tokio::spawn(async move {
            shutdown.await;
            let _ = shutdown_sender.send(());
        });

        info!("Starting HTTP server on {}", tcp.local_addr().context("Failed to get local address")?);
        let tcp_server =
            axum::serve(tcp, router.clone()).with_graceful_shutdown(wait_shutdown(shutdown_receiver.clone()));
        info!("Starting unix socket server on {}", socket_path.display());
        let unix_server = axum::serve(unix, router).with_graceful_shutdown(wait_shutdown(shutdown_receiver));

        let (tcp_result, unix_result) = tokio::join!(tcp_server.into_future(), unix_server.into_future());
        if let Err(e) = fs::remove_file(&socket_path) {
            error!("Failed to remove socket file {}: {e}", socket_path.display());
        }
        tcp_result.context("HTTP server failed")?;
        unix_result.context("Unix socket server failed")?;
        Ok(())
    }
}

async fn wait_shutdown(mut receiver: watch::Receiver<()>) {
    // Either a value was sent or the sender is gone, both mean we're shutting down.
    let _ = receiver.changed().await;
}
