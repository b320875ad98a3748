use async_trait::async_trait;

use crate::types::{ArticleList, ArticleRecord, ItemId, ItemQuery, ListId, ListOptions, PreviewMarker, RawItem};
use crate::Result;

#[async_trait]
pub trait ListStorage: Send + Sync {
    /// Create an empty list at version 0
    async fn create_list(&self, title: &str, options: &ListOptions) -> Result<ArticleList>;

    /// Load a list, latest version when `version` is `None`
    async fn get_list(&self, id: ListId, version: Option<u64>) -> Result<ArticleList>;

    /// Current canonical version, without loading the articles
    async fn stored_version(&self, id: ListId) -> Result<u64>;

    /// Persist a new version. `expected` is the caller's known version and is
    /// checked against the stored one under the backend's version gate;
    /// `None` overwrites unconditionally.
    async fn store_version(&self, id: ListId, articles: &[ArticleRecord], expected: Option<u64>) -> Result<u64>;

    /// Store a draft that does not advance the canonical version
    async fn store_preview(&self, id: ListId, articles: &[ArticleRecord]) -> Result<PreviewMarker>;

    /// Latest draft, if one was saved
    async fn get_preview(&self, id: ListId) -> Result<Option<ArticleList>>;

    /// Lists that should auto-load for `actor`
    async fn get_setup(&self, actor: &str) -> Result<Vec<ListId>>;

    async fn put_setup(&self, actor: &str, lists: &[ListId]) -> Result<()>;
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn store_item(&self, item: &RawItem) -> Result<()>;

    async fn get_item(&self, id: ItemId) -> Result<Option<RawItem>>;

    /// Items matching `query`, newest first
    async fn query_items(&self, query: &ItemQuery) -> Result<Vec<RawItem>>;
}
