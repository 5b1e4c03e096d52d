use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

use super::chart_routes::make_chart_routes;
use super::content_routes::{
    make_author_routes, make_comment_routes, make_interaction_routes, make_item_routes,
};
use super::log_requests;
use super::metrics::metrics_handler;
use super::state::ServerState;
use super::websocket::ws_handler;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: state.version.clone(),
    };
    Json(stats)
}

/// JSON error body shared by every endpoint.
pub(super) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub fn make_app(state: ServerState) -> Router {
    let ws_routes: Router = Router::new()
        .route("/", get(ws_handler))
        .with_state(state.clone());

    let home_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1/charts", make_chart_routes(state.clone()))
        .nest("/v1/interactions", make_interaction_routes(state.clone()))
        .nest("/v1/authors", make_author_routes(state.clone()))
        .nest("/v1/items", make_item_routes(state.clone()))
        .nest("/v1/comments", make_comment_routes(state.clone()))
        .nest("/v1/ws", ws_routes);

    app.layer(middleware::from_fn_with_state(state, log_requests))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the API and the metrics endpoint until `shutdown` is cancelled.
pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    info!("Serving on port {}, metrics on port {}", port, metrics_port);

    let api_shutdown = shutdown.clone();
    let api = axum::serve(listener, app)
        .with_graceful_shutdown(async move { api_shutdown.cancelled().await });
    let metrics = axum::serve(metrics_listener, make_metrics_app())
        .with_graceful_shutdown(async move { shutdown.cancelled().await });

    let (api_result, metrics_result) = tokio::join!(api, metrics);
    api_result.context("API server failed")?;
    metrics_result.context("Metrics server failed")?;
    Ok(())
}
