//! MJPEG relay server
//!
//! Binds the HTTP listener, runs the registry cleanup task and serves the
//! routes until shut down. Shutdown cancels every running relay so that the
//! open streaming responses end and graceful shutdown can complete.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::server::access::AccessCheck;
use crate::server::config::ServerConfig;
use crate::server::router::{self, AppState};

/// MJPEG relay server
pub struct RelayServer<A: AccessCheck> {
    config: ServerConfig,
    state: Arc<AppState<A>>,
}

impl<A: AccessCheck> RelayServer<A> {
    /// Create a new server with the given configuration and access check
    pub fn new(config: ServerConfig, access: A) -> Self {
        let registry = Arc::new(SessionRegistry::with_config(config.registry.clone()));
        let state = Arc::new(AppState::new(
            access,
            registry,
            config.relay.clone(),
            config.max_connections,
            CancellationToken::new(),
        ));

        Self { config, state }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.state.registry
    }

    /// Routes, for embedding in a larger application or for tests
    pub fn router(&self) -> Router {
        router::build(Arc::clone(&self.state))
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            mailbox_dir = %self.config.relay.mailbox_dir.display(),
            "MJPEG relay listening"
        );

        let cleanup_handle = self.state.registry.spawn_cleanup_task();

        let cancel = self.state.cancel.clone();
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            cancel.cancel();
        };

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await;

        // Stop cleanup task on shutdown
        cleanup_handle.abort();
        self.state.cancel.cancel();

        tracing::info!(addr = %addr, "MJPEG relay stopped");
        result.map_err(Into::into)
    }
}
