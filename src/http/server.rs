//! HTTP server for the question-answering API

use super::handler::{
    delete_handler, generate_response_handler, populate_handler, rephrase_handler, status_handler,
};
use crate::service::QaService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Routes of the API, with the service as shared state
pub fn router(service: Arc<QaService>) -> Router {
    Router::new()
        .route("/generate_response", post(generate_response_handler))
        .route("/rephrase_prompt", post(rephrase_handler))
        .route("/populate_data", get(populate_handler))
        .route("/delete_data", get(delete_handler))
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

pub struct HttpServer {
    service: Arc<QaService>,
    address: String,
    port: u16,
}

impl HttpServer {
    pub fn new(service: Arc<QaService>, address: &str, port: u16) -> Self {
        Self {
            service,
            address: address.to_string(),
            port,
        }
    }

    /// Serve until ctrl-c
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        let app = router(Arc::clone(&self.service));

        let addr = format!("{}:{}", self.address, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("Question answering API listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down");
            })
            .await?;

        Ok(())
    }
}
