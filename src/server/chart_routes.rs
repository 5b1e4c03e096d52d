use super::server::json_error;
use super::state::{GuardedChartBuilder, ServerState};
use crate::catalog::ChartCategory;
use crate::charts::{ChartQuery, SortMode, DEFAULT_REGION};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct ChartParams {
    category: Option<String>,
    region: Option<String>,
    sort: Option<String>,
    limit: Option<usize>,
}

async fn get_chart(
    State(builder): State<GuardedChartBuilder>,
    Query(params): Query<ChartParams>,
) -> Response {
    let category = match params.category.as_deref().map(ChartCategory::from_str) {
        Some(Ok(category)) => category,
        Some(Err(e)) => return json_error(StatusCode::BAD_REQUEST, e),
        None => return json_error(StatusCode::BAD_REQUEST, "category is required"),
    };
    let sort = match params.sort.as_deref().map(SortMode::from_str) {
        Some(Ok(sort)) => sort,
        Some(Err(e)) => return json_error(StatusCode::BAD_REQUEST, e),
        None => SortMode::default(),
    };
    let region = params
        .region
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let query = ChartQuery {
        category,
        region,
        sort,
        limit: builder.clamp_limit(params.limit),
    };
    Json(builder.build_chart(&query).await).into_response()
}

pub fn make_chart_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", get(get_chart))
        .with_state(state)
}
