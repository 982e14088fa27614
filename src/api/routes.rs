//! HTTP route definitions.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::processor::InvoiceProcessor;

use super::types::HealthResponse;
use super::{agent, auth, connections, dashboard, invoices, payments};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub processor: InvoiceProcessor,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let processor = InvoiceProcessor::new(&config);
        Self { config, processor }
    }
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config));
    let app = router(state);

    tracing::info!("Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the full router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/connections/gmail", post(connections::connect_gmail))
        .route("/api/connections/:id", get(connections::connection_status))
        .route("/api/invoices", get(invoices::list_invoices))
        .route("/api/invoices/scan", post(invoices::scan_inbox))
        .route("/api/invoices/process", post(invoices::process_pending))
        .route("/api/invoices/:id/pay", post(invoices::pay_invoice))
        .route("/api/payments/history", get(payments::history))
        .route("/api/payments/balance", get(payments::balance))
        .route("/api/payments/payees", get(payments::search_payees))
        .route("/api/payments/checkout", post(payments::checkout))
        .route("/api/payments/:reference", get(payments::payment_status))
        .route("/api/agent/chat", post(agent::chat))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
        payment_mode: state.processor.payment_mode(),
    })
}
