use std::sync::Arc;

use async_trait::async_trait;
use fp_core::{
    ArticleList, ArticleRecord, ContentRepository, ItemQuery, ListId, ListStorage, ListSync, PreviewMarker, RawItem,
    Result, SaveRequest, VersionGate,
};
use tracing::{debug, info};

/// Server-side end of the synchronization contract for one actor.
pub struct StorageSync {
    lists: Arc<dyn ListStorage>,
    content: Arc<dyn ContentRepository>,
    actor: String,
}

impl StorageSync {
    pub fn new(lists: Arc<dyn ListStorage>, content: Arc<dyn ContentRepository>, actor: impl Into<String>) -> Self {
        Self {
            lists,
            content,
            actor: actor.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub async fn load_preview(&self, id: ListId) -> Result<Option<ArticleList>> {
        self.lists.get_preview(id).await
    }
}

#[async_trait]
impl ListSync for StorageSync {
    async fn query_posts(&self, query: &ItemQuery) -> Result<Vec<RawItem>> {
        self.content.query_items(query).await
    }

    async fn load_list(&self, id: ListId, version: Option<u64>) -> Result<ArticleList> {
        self.lists.get_list(id, version).await
    }

    async fn check_newer_version(&self, id: ListId, known: u64) -> Result<bool> {
        let stored = self.lists.stored_version(id).await?;
        Ok(VersionGate::is_newer(stored, known))
    }

    async fn save_list(&self, id: ListId, request: &SaveRequest) -> Result<u64> {
        if request.preview {
            let marker = self.lists.store_preview(id, &request.articles).await?;
            debug!("Preview of list {} saved by {}", id, self.actor);
            return Ok(marker.based_on);
        }
        let expected = (!request.force).then_some(request.version);
        let version = self.lists.store_version(id, &request.articles, expected).await?;
        info!(
            "💾 List {} saved by {} ({} articles, version {})",
            id,
            self.actor,
            request.articles.len(),
            version
        );
        Ok(version)
    }

    async fn save_preview(&self, id: ListId, articles: &[ArticleRecord]) -> Result<PreviewMarker> {
        self.lists.store_preview(id, articles).await
    }

    async fn load_list_setup(&self) -> Result<Vec<ListId>> {
        self.lists.get_setup(&self.actor).await
    }

    async fn save_list_setup(&self, lists: &[ListId]) -> Result<()> {
        self.lists.put_setup(&self.actor, lists).await
    }
}
