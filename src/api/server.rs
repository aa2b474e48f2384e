//! HTTP server lifecycle: bind → spawn background task → return a handle
//! with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Failed to read bound address: {0}")]
    LocalAddr(std::io::Error),
}

/// Handle to a running server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ApiServer {
    /// Ask the server to stop accepting connections. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait for in-flight requests to drain after `shutdown`.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            tracing::error!("API server task failed: {e}");
        }
    }
}

/// Bind `addr` (port 0 picks an ephemeral port) and serve the router in a
/// background task.
pub async fn start_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::export::FontChoice;
    use crate::ocr::MockOcrEngine;
    use crate::storage::LocalImageStore;

    fn test_core(dir: &std::path::Path) -> Arc<CoreState> {
        let data_dir = dir.to_string_lossy().to_string();
        let config = AppConfig::from_lookup(move |key| {
            (key == "ODABNOTE_DATA_DIR").then(|| data_dir.clone())
        })
        .unwrap();
        let images = Arc::new(LocalImageStore::new(config.uploads_dir()));
        Arc::new(CoreState::with_services(
            config,
            images,
            Arc::new(MockOcrEngine::new("x")),
            FontChoice::Builtin,
        ))
    }

    fn localhost() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn start_serves_health_and_stops() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = start_server(test_core(tmp.path()), localhost())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);

        let url = format!("http://{}/api/health", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        server.shutdown();
        server.wait().await;
    }

    #[tokio::test]
    async fn protected_route_rejects_anonymous_over_http() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = start_server(test_core(tmp.path()), localhost())
            .await
            .expect("server should start");

        let url = format!("http://{}/api/workbooks", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        let resp = reqwest::get(format!("http://{}/nonexistent", server.addr))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        server.shutdown();
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = start_server(test_core(tmp.path()), localhost())
            .await
            .expect("server should start");
        server.shutdown();
        server.shutdown();
        server.wait().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let mut first = start_server(test_core(tmp.path()), localhost())
            .await
            .unwrap();
        let result = start_server(test_core(tmp.path()), first.addr).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
        first.shutdown();
    }
}
