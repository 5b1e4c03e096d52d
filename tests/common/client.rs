//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per charts-server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_home(&self) -> Response {
        self.client
            .get(self.url("/"))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Charts
    // ========================================================================

    pub async fn get_chart(
        &self,
        category: &str,
        sort: Option<&str>,
        limit: Option<usize>,
    ) -> Response {
        let mut query: Vec<(&str, String)> = vec![("category", category.to_string())];
        if let Some(sort) = sort {
            query.push(("sort", sort.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.client
            .get(self.url("/v1/charts"))
            .query(&query)
            .send()
            .await
            .expect("Chart request failed")
    }

    /// Fetches a chart and returns its items, asserting success.
    pub async fn chart_items(&self, category: &str, sort: Option<&str>) -> Vec<Value> {
        let response = self.get_chart(category, sort, None).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Chart body is not a JSON array")
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub async fn create_author(&self, name: &str) -> Response {
        self.client
            .post(self.url("/v1/authors"))
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("Create author request failed")
    }

    pub async fn publish_item(&self, body: Value) -> Response {
        self.client
            .post(self.url("/v1/items"))
            .json(&body)
            .send()
            .await
            .expect("Publish item request failed")
    }

    pub async fn get_item(&self, content_type: &str, id: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/items/{}/{}", content_type, id)))
            .send()
            .await
            .expect("Get item request failed")
    }

    pub async fn get_item_page(
        &self,
        content_type: &str,
        id: &str,
        page: usize,
        page_size: usize,
    ) -> Response {
        self.client
            .get(self.url(&format!("/v1/items/{}/{}", content_type, id)))
            .query(&[("page", page), ("pageSize", page_size)])
            .send()
            .await
            .expect("Get item request failed")
    }

    pub async fn delete_item(&self, content_type: &str, id: &str) -> Response {
        self.client
            .delete(self.url(&format!("/v1/items/{}/{}", content_type, id)))
            .send()
            .await
            .expect("Delete item request failed")
    }

    // ========================================================================
    // Engagement
    // ========================================================================

    pub async fn interact(
        &self,
        content_type: &str,
        item_id: &str,
        kind: &str,
        user_id: Option<&str>,
    ) -> Response {
        let mut body = json!({
            "itemId": item_id,
            "contentType": content_type,
            "kind": kind,
        });
        if let Some(user_id) = user_id {
            body["userId"] = json!(user_id);
        }
        self.client
            .post(self.url("/v1/interactions"))
            .json(&body)
            .send()
            .await
            .expect("Interaction request failed")
    }

    /// Records an interaction, asserting success.
    pub async fn interact_ok(
        &self,
        content_type: &str,
        item_id: &str,
        kind: &str,
        user_id: Option<&str>,
    ) {
        let response = self.interact(content_type, item_id, kind, user_id).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "{} on {} failed: {:?}",
            kind,
            item_id,
            response.text().await
        );
    }

    pub async fn post_comment(
        &self,
        content_type: &str,
        item_id: &str,
        user_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Response {
        self.client
            .post(self.url(&format!("/v1/items/{}/{}/comments", content_type, item_id)))
            .json(&json!({
                "userId": user_id,
                "body": body,
                "parentId": parent_id,
            }))
            .send()
            .await
            .expect("Comment request failed")
    }

    pub async fn react(&self, comment_id: &str, user_id: &str, active: bool) -> Response {
        self.client
            .post(self.url(&format!("/v1/comments/{}/reactions", comment_id)))
            .json(&json!({ "userId": user_id, "active": active }))
            .send()
            .await
            .expect("Reaction request failed")
    }
}
