// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::sync::oneshot;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::handlers::{classes_handler, health_handler, index_handler};
use super::predict::{handler::max_encoded_len, predict_handler, predict_json_handler};
use crate::vision::{LeafPipeline, VisionModelInfo, VisionModelManager, MAX_IMAGE_SIZE};

/// Allowance for multipart boundaries and part headers on top of the file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Allowance for JSON framing around the base64 payload
const JSON_OVERHEAD: usize = 4 * 1024;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen_addr: String,
    /// Largest accepted image, in decoded bytes
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            max_upload_bytes: MAX_IMAGE_SIZE,
        }
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LeafPipeline>,
    pub labels: Arc<Vec<String>>,
    pub models: Arc<Vec<VisionModelInfo>>,
    pub max_upload_bytes: usize,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        pipeline: Arc<LeafPipeline>,
        labels: Vec<String>,
        models: Vec<VisionModelInfo>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            pipeline,
            labels: Arc::new(labels),
            models: Arc::new(models),
            max_upload_bytes,
            started_at: Instant::now(),
        }
    }

    pub fn from_manager(manager: &VisionModelManager, max_upload_bytes: usize) -> Self {
        Self::new(
            manager.pipeline(),
            manager.labels(),
            manager.list_models(),
            max_upload_bytes,
        )
    }
}

pub fn create_router(state: AppState) -> Router {
    let multipart_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    let json_limit = max_encoded_len(state.max_upload_bytes).saturating_add(JSON_OVERHEAD);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/v1/classes", get(classes_handler))
        .route(
            "/predict",
            post(predict_handler).layer(DefaultBodyLimit::max(multipart_limit)),
        )
        .route(
            "/v1/predict",
            post(predict_json_handler).layer(DefaultBodyLimit::max(json_limit)),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Running HTTP server
///
/// Serving happens on a background task until [`ApiServer::shutdown`] is called.
pub struct ApiServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl ApiServer {
    pub async fn start(config: ApiConfig, state: AppState) -> Result<Self> {
        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address {}", config.listen_addr))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let actual_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = create_router(state);

        let handle = tokio::spawn(async move {
            let serve_future = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });

            if let Err(e) = serve_future.await {
                tracing::error!("HTTP server error: {}", e);
            }
        });

        info!("🌐 Leaf classifier listening on http://{}", actual_addr);

        Ok(Self {
            addr: actual_addr,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}
