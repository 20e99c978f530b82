//! # Fireglobe Server
//!
//! REST adapter over [`TesterService`]. The transport mode decides where the
//! routes are mounted and whether failures surface as HTTP error statuses:
//!
//! - `plain-http`: routes at `/`, errors become 4xx/5xx `{success: false, error}`
//! - `message-protocol`: routes under `/rest`, every response is `200`

pub mod api;
pub mod error;
mod handlers;

use axum::routing::{get, post};
use axum::Router;
use fireglobe_core::{Result, TesterService, TransportMode};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TesterService>,
    pub mode: TransportMode,
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/generate-personalities", post(handlers::generate_personalities))
        .route("/generate-personality-message", post(handlers::generate_personality_message))
        .route("/evaluate-conversation", post(handlers::evaluate_conversation))
        .route("/store-conversation", post(handlers::store_conversation))
        .route("/analyze-agent-transaction", post(handlers::analyze_agent_transaction))
        .route("/get-transaction-analysis", post(handlers::get_transaction_analysis))
        .route("/transaction-analysis-result", post(handlers::transaction_analysis_result))
}

/// Build the router for the service's configured transport
pub fn router(service: Arc<TesterService>) -> Router {
    let server = service.config().server.clone();
    let state = AppState {
        service,
        mode: server.transport,
    };

    let app = match server.transport.route_prefix() {
        "" => api_routes(),
        prefix => Router::new()
            .nest(prefix, api_routes())
            .route("/health", get(handlers::health)),
    };

    let app = app.layer(TraceLayer::new_for_http());
    let app = if server.cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };
    app.with_state(state)
}

/// Serve until ctrl-c
pub async fn serve(service: Arc<TesterService>) -> Result<()> {
    let addr: SocketAddr = service.config().server.bind;
    let transport = service.config().server.transport;
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {} ({:?})", addr, transport);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
