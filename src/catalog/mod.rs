mod content_type;
mod models;
mod schema;
mod sqlite_media_store;
mod store;

pub use content_type::{ChartCategory, ContentType, ContentTypeDescriptor, CONTENT_TYPES};
pub use models::{
    Author, Comment, CommentThread, EngagementCounts, EngagementSet, Item, NewAuthor, NewComment,
    NewItem,
};
pub use sqlite_media_store::SqliteMediaStore;
pub use store::{CatalogStore, CommentStore, EngagementStore, FullMediaStore};

use std::sync::Arc;

/// Handles onto the media database, one per concern.
#[derive(Clone)]
pub struct MediaStores {
    pub catalog: Arc<dyn CatalogStore>,
    pub engagement: Arc<dyn EngagementStore>,
    pub comments: Arc<dyn CommentStore>,
}

impl MediaStores {
    pub fn new<S: FullMediaStore + 'static>(store: Arc<S>) -> Self {
        Self {
            catalog: store.clone(),
            engagement: store.clone(),
            comments: store,
        }
    }
}
