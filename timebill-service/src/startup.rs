use crate::billing::BillingEngine;
use crate::catalog::Catalog;
use crate::config::TimebillConfig;
use crate::handlers;
use crate::services::{
    DocumentStore, HttpPdfRenderer, MockPdfRenderer, MongoDb, PdfRenderer, TemplateEmailComposer,
};
use crate::workers::PdfWorker;
use axum::{routing::get, Router};
use service_core::error::AppError;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub engine: BillingEngine,
    pub catalog: Catalog,
}

/// Probe and metrics routes. Business operations are not exposed over HTTP.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
    worker_shutdown: CancellationToken,
}

impl Application {
    pub async fn build(config: TimebillConfig) -> Result<Self, AppError> {
        let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let renderer: Arc<dyn PdfRenderer> = match HttpPdfRenderer::new(&config.pdf) {
            Ok(renderer) => Arc::new(renderer),
            Err(e) => {
                tracing::warn!(error = %e, "No PDF renderer configured, using mock renderer");
                Arc::new(MockPdfRenderer::new())
            }
        };

        Self::with_store(config, Arc::new(db), renderer).await
    }

    /// Assemble the service on an already opened store.
    pub async fn with_store(
        config: TimebillConfig,
        store: Arc<dyn DocumentStore>,
        renderer: Arc<dyn PdfRenderer>,
    ) -> Result<Self, AppError> {
        let composer = Arc::new(TemplateEmailComposer::new(config.billing.currency.clone()));
        let engine = BillingEngine::new(
            store.clone(),
            renderer,
            composer,
            config.billing.clone(),
            config.issuer.clone(),
        );

        let (worker, queue) = PdfWorker::new(config.pdf.clone(), engine.pdf_cache());
        let worker_shutdown = worker.shutdown_token();
        let engine = if config.pdf.worker_enabled {
            engine.with_pdf_queue(queue)
        } else {
            engine
        };
        worker.start().await;

        let state = AppState {
            store: store.clone(),
            catalog: Catalog::new(store),
            engine,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, router(state.clone()));

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
            worker_shutdown,
        })
    }

    pub fn engine(&self) -> &BillingEngine {
        &self.state.engine
    }

    pub fn catalog(&self) -> &Catalog {
        &self.state.catalog
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stops the PDF worker pool once `self` is consumed by the server.
    pub fn worker_shutdown(&self) -> CancellationToken {
        self.worker_shutdown.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
