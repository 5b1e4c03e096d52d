//! Catalog, engagement and comment endpoints.

use super::server::json_error;
use super::state::{GuardedEngagementService, GuardedStatsResolver, ServerState};
use crate::background_jobs::{HookEvent, SchedulerHandle};
use crate::catalog::{ContentType, MediaStores, NewAuthor, NewItem};
use crate::engagement::InteractionError;
use crate::sqlite_persistence::run_blocking;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use tracing::{error, info};

impl IntoResponse for InteractionError {
    fn into_response(self) -> Response {
        match &self {
            InteractionError::ItemNotFound { .. } | InteractionError::CommentNotFound(_) => {
                json_error(StatusCode::NOT_FOUND, self.to_string())
            }
            InteractionError::Store(e) => {
                error!("Store failure: {:#}", e);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            _ => json_error(StatusCode::BAD_REQUEST, self.to_string()),
        }
    }
}

fn internal_error(context: &str, e: anyhow::Error) -> Response {
    error!("{}: {:#}", context, e);
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

async fn create_author(
    State(stores): State<MediaStores>,
    Json(author): Json<NewAuthor>,
) -> Response {
    if author.name.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Author name is required");
    }
    let catalog = stores.catalog.clone();
    match run_blocking(move || catalog.create_author(author)).await {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Err(e) => internal_error("Failed to create author", e),
    }
}

async fn publish_item(
    State(stores): State<MediaStores>,
    State(scheduler): State<SchedulerHandle>,
    Json(item): Json<NewItem>,
) -> Response {
    if item.title.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Item title is required");
    }
    if let Some(author_id) = item.author_id.clone() {
        let catalog = stores.catalog.clone();
        match run_blocking(move || catalog.get_author(&author_id)).await {
            Ok(Some(_)) => {}
            Ok(None) => return json_error(StatusCode::BAD_REQUEST, "Unknown author"),
            Err(e) => return internal_error("Failed to look up author", e),
        }
    }

    let content_type = item.content_type;
    let catalog = stores.catalog.clone();
    match run_blocking(move || catalog.publish_item(item, Utc::now().timestamp())).await {
        Ok(id) => {
            info!("Published {} {}", content_type, id);
            scheduler.notify(HookEvent::OnCatalogChange);
            (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
        }
        Err(e) => internal_error("Failed to publish item", e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemStatsParams {
    page: Option<usize>,
    page_size: Option<usize>,
}

async fn get_item(
    State(resolver): State<GuardedStatsResolver>,
    Path((content_type, id)): Path<(String, String)>,
    Query(params): Query<ItemStatsParams>,
) -> Response {
    let content_type = match ContentType::from_str(&content_type) {
        Ok(ct) => ct,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, e),
    };
    let page = params.page.unwrap_or(1).max(1);
    match resolver
        .get_item_with_stats(content_type, &id, page, params.page_size)
        .await
    {
        Some(item) => Json(item).into_response(),
        None => json_error(StatusCode::NOT_FOUND, format!("{} {} not found", content_type, id)),
    }
}

async fn delete_item(
    State(stores): State<MediaStores>,
    State(scheduler): State<SchedulerHandle>,
    Path((content_type, id)): Path<(String, String)>,
) -> Response {
    let content_type = match ContentType::from_str(&content_type) {
        Ok(ct) => ct,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, e),
    };
    let catalog = stores.catalog.clone();
    let item_id = id.clone();
    match run_blocking(move || catalog.delete_item(content_type, &item_id)).await {
        Ok(true) => {
            info!("Deleted {} {}", content_type, id);
            scheduler.notify(HookEvent::OnCatalogChange);
            Json(json!({ "deleted": true })).into_response()
        }
        Ok(false) => json_error(StatusCode::NOT_FOUND, format!("{} {} not found", content_type, id)),
        Err(e) => internal_error("Failed to delete item", e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InteractionBody {
    item_id: String,
    content_type: String,
    kind: String,
    #[serde(default)]
    user_id: Option<String>,
}

async fn post_interaction(
    State(engagement): State<GuardedEngagementService>,
    Json(body): Json<InteractionBody>,
) -> Result<Response, InteractionError> {
    let outcome = engagement
        .record_interaction(
            &body.item_id,
            &body.content_type,
            &body.kind,
            body.user_id.as_deref(),
        )
        .await?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentBody {
    user_id: String,
    body: String,
    #[serde(default)]
    parent_id: Option<String>,
}

async fn post_comment(
    State(engagement): State<GuardedEngagementService>,
    Path((content_type, id)): Path<(String, String)>,
    Json(body): Json<CommentBody>,
) -> Result<Response, InteractionError> {
    let comment = engagement
        .add_comment(
            &content_type,
            &id,
            &body.user_id,
            &body.body,
            body.parent_id.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionBody {
    user_id: String,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

async fn post_reaction(
    State(engagement): State<GuardedEngagementService>,
    Path(comment_id): Path<String>,
    Json(body): Json<ReactionBody>,
) -> Result<Response, InteractionError> {
    let outcome = engagement
        .react_to_comment(&comment_id, &body.user_id, body.active)
        .await?;
    Ok(Json(outcome).into_response())
}

pub fn make_author_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", post(create_author))
        .with_state(state)
}

pub fn make_item_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", post(publish_item))
        .route("/{content_type}/{id}", get(get_item).delete(delete_item))
        .route("/{content_type}/{id}/comments", post(post_comment))
        .with_state(state)
}

pub fn make_interaction_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", post(post_interaction))
        .with_state(state)
}

pub fn make_comment_routes(state: ServerState) -> Router {
    Router::new()
        .route("/{id}/reactions", post(post_reaction))
        .with_state(state)
}
