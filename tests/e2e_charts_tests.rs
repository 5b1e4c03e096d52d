//! End-to-end tests for chart endpoints
//!
//! Engagement is seeded straight into the media store before the first chart
//! request, so the first build sees a known trending order.

mod common;

use charts_server::catalog::{ChartCategory, ContentType, EngagementSet, EngagementStore};
use charts_server::charts::{ChartStore, IsoWeek, SnapshotState};
use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn ids(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

fn find<'a>(items: &'a [Value], id: &str) -> &'a Value {
    items
        .iter()
        .find(|item| item["id"] == id)
        .unwrap_or_else(|| panic!("{} not in chart", id))
}

/// Song 3 gets two likes (score 4), song 2 one view (score 1), song 1 nothing.
fn seed_song_engagement(server: &TestServer) {
    let songs = &server.catalog.song_ids;
    let store = &server.media_store;
    store
        .add_to_set(&songs[2], EngagementSet::Likes, USER_1)
        .unwrap();
    store
        .add_to_set(&songs[2], EngagementSet::Likes, USER_2)
        .unwrap();
    store
        .increment_week_views(ContentType::Song, &songs[1], &IsoWeek::current())
        .unwrap();
}

#[tokio::test]
async fn test_home_reports_version_and_uptime() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_home().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime"].is_string());
}

#[tokio::test]
async fn test_first_build_ranks_by_trending_score() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_song_engagement(&server);
    let songs = &server.catalog.song_ids;

    // No item charted last week, so this order is the position order.
    let items = client.chart_items("songs", Some("last-week")).await;
    assert_eq!(
        ids(&items),
        vec![songs[2].clone(), songs[1].clone(), songs[0].clone()]
    );

    for (index, item) in items.iter().enumerate() {
        let position = index as u64 + 1;
        assert_eq!(item["position"], position);
        assert_eq!(item["peak"], position);
        assert_eq!(item["weeksOn"], 1);
        assert!(item["lastWeek"].is_null());
        assert_eq!(item["region"], "global");
        assert_eq!(item["artist"], AUTHOR_NAME);
        assert_eq!(item["genre"], "rock");
    }

    let top = find(&items, &songs[2]);
    assert_eq!(top["stats"]["likes"], 2);
    assert_eq!(top["stats"]["totalViews"], 0);
    let viewed = find(&items, &songs[1]);
    assert_eq!(viewed["stats"]["weeklyViews"], 1);
    assert_eq!(viewed["stats"]["totalViews"], 1);

    let week = IsoWeek::current();
    assert_eq!(
        server
            .chart_store
            .get_snapshot_state(ChartCategory::Songs, &week)
            .unwrap(),
        SnapshotState::Built
    );
}

#[tokio::test]
async fn test_sort_modes_reorder_without_changing_positions() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_song_engagement(&server);
    let songs = &server.catalog.song_ids;

    // Most views first, ties by position.
    let all_time = client.chart_items("songs", None).await;
    assert_eq!(
        ids(&all_time),
        vec![songs[1].clone(), songs[2].clone(), songs[0].clone()]
    );
    assert_eq!(find(&all_time, &songs[2])["position"], 1);

    let this_week = client.chart_items("songs", Some("this-week")).await;
    assert_eq!(ids(&this_week), ids(&all_time));
    assert_eq!(find(&this_week, &songs[1])["position"], 2);
}

#[tokio::test]
async fn test_ranks_are_sticky_within_a_week() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_song_engagement(&server);
    let songs = &server.catalog.song_ids;

    let first = client.chart_items("songs", Some("last-week")).await;
    assert_eq!(find(&first, &songs[0])["position"], 3);

    for user in [USER_1, USER_2, USER_3] {
        server
            .media_store
            .add_to_set(&songs[0], EngagementSet::Shares, user)
            .unwrap();
    }

    let second = client.chart_items("songs", Some("last-week")).await;
    let rebuilt = find(&second, &songs[0]);
    assert_eq!(rebuilt["position"], 3);
    assert_eq!(rebuilt["weeksOn"], 1);
    assert_eq!(rebuilt["stats"]["shares"], 3);
}

#[tokio::test]
async fn test_category_specific_fields() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let videos = client.chart_items("videos", None).await;
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["id"], server.catalog.video_id.as_str());
    assert_eq!(videos[0]["videoUrl"], VIDEO_URL);
    assert!(videos[0].get("artist").is_none());

    let albums = client.chart_items("albums", None).await;
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0]["title"], ALBUM_TITLE);
    assert_eq!(albums[0]["artist"], AUTHOR_NAME);
    assert_eq!(albums[0]["releaseDate"], "2024-05-01");
    assert!(albums[0].get("videoUrl").is_none());
}

#[tokio::test]
async fn test_limit_and_invalid_queries() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_chart("songs", None, Some(2)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let items: Vec<Value> = response.json().await.unwrap();
    assert_eq!(items.len(), 2);

    let response = client.get_chart("songs", None, Some(0)).await;
    let items: Vec<Value> = response.json().await.unwrap();
    assert_eq!(items.len(), 1);

    let response = client.get_chart("podcasts", None, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("podcasts"));

    let response = client.get_chart("songs", Some("yesterday"), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_published_and_deleted_items_follow_the_catalog() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.create_author("New Author").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let author_id = response.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = client
        .publish_item(json!({
            "contentType": "song",
            "title": "Fresh Single",
            "authorId": author_id,
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let song_id = response.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let items = client.chart_items("songs", None).await;
    assert_eq!(items.len(), 4);
    assert_eq!(find(&items, &song_id)["artist"], "New Author");

    let response = client.delete_item("song", &song_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = client.delete_item("song", &song_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let items = client.chart_items("songs", None).await;
    assert!(items.iter().all(|item| item["id"] != song_id.as_str()));
}

#[tokio::test]
async fn test_publish_rejects_invalid_items() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .publish_item(json!({ "contentType": "song", "title": "  " }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .publish_item(json!({
            "contentType": "song",
            "title": "Orphan",
            "authorId": UNKNOWN_ITEM_ID,
        }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client.create_author("").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
