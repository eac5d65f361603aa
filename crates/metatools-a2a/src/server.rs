use crate::handler::A2aHandler;
use crate::router::{build_router, normalize_base_path, DEFAULT_BASE_PATH};
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use metatools_core::{MetatoolsError, MetatoolsResult};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long in-flight requests may run after shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind; IPv6 literals may be given with or without brackets.
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    /// Prefix every route is mounted under.
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8091,
            base_path: DEFAULT_BASE_PATH.into(),
        }
    }
}

impl ServerConfig {
    /// `host:port`, bracketing bare IPv6 hosts.
    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// The A2A HTTP server.
pub struct A2aServer {
    config: ServerConfig,
    handler: Arc<A2aHandler>,
}

impl A2aServer {
    /// Creates a server for `handler`; nothing is bound yet.
    pub fn new(config: ServerConfig, handler: Arc<A2aHandler>) -> Self {
        Self { config, handler }
    }

    /// The router this server serves.
    pub fn router(&self) -> Router {
        build_router(self.handler.clone(), &self.config.base_path)
    }

    /// Binds the listener without serving yet.
    pub async fn bind(self) -> MetatoolsResult<BoundServer> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| MetatoolsError::Server(format!("listen {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MetatoolsError::Server(format!("listen {addr}: {e}")))?;

        Ok(BoundServer {
            router: self.router(),
            base_path: normalize_base_path(&self.config.base_path),
            listener,
            local_addr,
        })
    }

    /// Binds and serves until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> MetatoolsResult<()> {
        self.bind().await?.run(cancel).await
    }
}

/// A server whose listener is bound.
pub struct BoundServer {
    router: Router,
    base_path: String,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundServer {
    /// Address the listener actually bound, including an ephemeral port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until `cancel` fires or the accept loop fails.
    ///
    /// Cancellation stops accepting and gives open connections
    /// [`SHUTDOWN_GRACE`] to finish. Connections still open after that are
    /// closed, and the call returns `Ok`.
    pub async fn run(self, cancel: CancellationToken) -> MetatoolsResult<()> {
        let Self {
            router,
            base_path,
            listener,
            local_addr,
        } = self;

        let (done_tx, mut done_rx) = oneshot::channel();
        tokio::spawn(accept_loop(listener, router, local_addr, cancel.child_token(), done_tx));

        info!(addr = %local_addr, base_path = %base_path, "A2A server listening");

        let stopped = tokio::select! {
            _ = cancel.cancelled() => None,
            done = &mut done_rx => Some(done),
        };
        match stopped {
            None => {
                info!("Shutting down A2A server");
                // The loop closes every connection within the grace period.
                let _ = done_rx.await;
                info!("A2A server stopped");
                Ok(())
            }
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(MetatoolsError::Server("server task ended unexpectedly".into())),
        }
    }
}

/// Accepts connections until `shutdown` fires or accepting fails, then
/// drains the open connections and reports on `done`.
async fn accept_loop(
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    done: oneshot::Sender<MetatoolsResult<()>>,
) {
    let mut connections = JoinSet::new();
    let outcome = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(stream, peer, router.clone(), shutdown.clone()));
                }
                Err(e) if is_per_connection(&e) => {
                    debug!(error = %e, "Accept failed for one connection");
                }
                Err(e) => break Err(MetatoolsError::Server(format!("serve {local_addr}: {e}"))),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    };

    drop(listener);
    shutdown.cancel();
    drain(&mut connections).await;
    let _ = done.send(outcome);
}

/// Serves one connection, switching to a graceful close once `shutdown`
/// fires.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "Cannot set TCP_NODELAY");
    }
    let builder = Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "Connection ended with error");
    }
}

/// Waits up to [`SHUTDOWN_GRACE`] for connections, then aborts the rest.
async fn drain(connections: &mut JoinSet<()>) {
    if connections.is_empty() {
        return;
    }
    let finished = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if finished.is_err() {
        warn!(
            open = connections.len(),
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Shutdown grace elapsed; closing remaining connections"
        );
        connections.shutdown().await;
    }
}

fn is_per_connection(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
    )
}
