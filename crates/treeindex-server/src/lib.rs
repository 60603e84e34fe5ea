//! HTTP transport for the tree index.
//!
//! Maps the index service operations onto a small JSON API. No indexing
//! logic lives here.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use treeindex::IndexService;

pub mod config;
pub mod error;
pub mod routes;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError};

/// Builds the API router over `service`.
pub fn router(service: Arc<IndexService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/index", post(routes::start_index))
        .route("/api/index/status", get(routes::index_status))
        .route("/api/index/clear", post(routes::clear_cache))
        .route("/api/search", get(routes::search))
        .with_state(service)
        .layer(cors)
}

/// A running API server. Dropping it stops accepting connections.
pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Server {
    /// Binds `addr` and serves the API on a spawned task.
    ///
    /// Port 0 picks a free port; see [`Server::addr`] for the bound address.
    pub async fn start(addr: SocketAddr, service: Arc<IndexService>) -> Result<Self, ServerError> {
        let app = router(service);
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(error) = served {
                log::error!("API server stopped with error: {error}");
            }
        });
        log::info!("API server listening on http://{addr}");

        Ok(Server {
            addr,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&mut self) -> Result<(), ServerError> {
        if let Some(sender) = self.shutdown.take() {
            sender.send(()).map_err(|_| ServerError::ShutdownSignal)
        } else {
            Ok(())
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
