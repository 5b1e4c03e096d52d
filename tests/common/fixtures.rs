//! Test catalog creation
//!
//! Seeds a fresh media database through the store API. Item ids are
//! generated, so they are returned in a [`SeededCatalog`].

use super::constants::*;
use anyhow::Result;
use charts_server::catalog::{CatalogStore, ContentType, NewAuthor, NewItem, SqliteMediaStore};

/// Ids of the seeded catalog.
#[derive(Debug, Clone)]
pub struct SeededCatalog {
    pub author_id: String,
    /// In the order of `SONG_TITLES`.
    pub song_ids: Vec<String>,
    pub album_id: String,
    pub video_id: String,
}

/// One author with three songs, one album and one video.
pub fn seed_catalog(store: &SqliteMediaStore) -> Result<SeededCatalog> {
    let now = chrono::Utc::now().timestamp();

    let author_id = store.create_author(NewAuthor {
        name: AUTHOR_NAME.to_string(),
        avatar_url: None,
        bio: Some("Plays songs for tests".to_string()),
    })?;

    let mut song_ids = Vec::new();
    for title in SONG_TITLES {
        let mut song = NewItem::new(ContentType::Song, title);
        song.author_id = Some(author_id.clone());
        song.genre = Some("rock".to_string());
        song_ids.push(store.publish_item(song, now)?);
    }

    let mut album = NewItem::new(ContentType::Album, ALBUM_TITLE);
    album.author_id = Some(author_id.clone());
    album.release_date = Some("2024-05-01".to_string());
    let album_id = store.publish_item(album, now)?;

    let mut video = NewItem::new(ContentType::Video, VIDEO_TITLE);
    video.video_url = Some(VIDEO_URL.to_string());
    let video_id = store.publish_item(video, now)?;

    Ok(SeededCatalog {
        author_id,
        song_ids,
        album_id,
        video_id,
    })
}
