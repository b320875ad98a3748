use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fp_core::{
    ArticleList, ArticleRecord, ContentRepository, Error, ItemId, ItemQuery, ListId, ListOptions, ListStorage,
    PreviewMarker, RawItem, Result, VersionGate,
};
use tokio::sync::RwLock;
use tracing::{info, warn};


struct ListEntry {
    title: String,
    options: ListOptions,
    /// Version `n` lives at index `n - 1`; version 0 is the empty list.
    versions: Vec<Vec<ArticleRecord>>,
    preview: Option<(Vec<ArticleRecord>, PreviewMarker)>,
}

impl ListEntry {
    fn stored_version(&self) -> u64 {
        self.versions.len() as u64
    }

    fn snapshot(&self, id: ListId, version: u64, articles: Vec<ArticleRecord>, preview: bool) -> ArticleList {
        ArticleList {
            id,
            title: self.title.clone(),
            version,
            articles,
            options: self.options.clone(),
            preview,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    lists: BTreeMap<ListId, ListEntry>,
    items: Vec<RawItem>,
    setups: HashMap<String, Vec<ListId>>,
    next_id: ListId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    fn entry(&self, id: ListId) -> Result<&ListEntry> {
        self.lists
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("list {}", id)))
    }

    fn entry_mut(&mut self, id: ListId) -> Result<&mut ListEntry> {
        self.lists
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("list {}", id)))
    }

    fn create_list(&mut self, title: &str, options: &ListOptions) -> ArticleList {
        let id = self.next_id;
        self.next_id += 1;
        let entry = ListEntry {
            title: title.to_string(),
            options: options.clone(),
            versions: Vec::new(),
            preview: None,
        };
        let list = entry.snapshot(id, 0, Vec::new(), false);
        self.lists.insert(id, entry);
        list
    }

    fn get_list(&self, id: ListId, version: Option<u64>) -> Result<ArticleList> {
        let entry = self.entry(id)?;
        let stored = entry.stored_version();
        let version = version.unwrap_or(stored);
        let articles = match version {
            0 => Vec::new(),
            v if v <= stored => entry.versions[(v - 1) as usize].clone(),
            v => return Err(Error::NotFound(format!("version {} of list {}", v, id))),
        };
        Ok(entry.snapshot(id, version, articles, false))
    }

    fn store_version(
        &mut self,
        id: ListId,
        articles: &[ArticleRecord],
        expected: Option<u64>,
        gate: &VersionGate,
    ) -> Result<u64> {
        let entry = self.entry_mut(id)?;
        let stored = entry.stored_version();
        if let Some(known) = expected {
            if let Err(e) = gate.admit(id, known, stored) {
                warn!("⚠️ Rejected save of list {} based on version {} (stored {})", id, known, stored);
                return Err(e);
            }
        }
        entry.versions.push(articles.to_vec());
        Ok(entry.stored_version())
    }

    fn store_preview(&mut self, id: ListId, articles: &[ArticleRecord]) -> Result<PreviewMarker> {
        let entry = self.entry_mut(id)?;
        let marker = PreviewMarker {
            list_id: id,
            based_on: entry.stored_version(),
            saved_at: Utc::now(),
        };
        entry.preview = Some((articles.to_vec(), marker.clone()));
        Ok(marker)
    }

    fn get_preview(&self, id: ListId) -> Result<Option<ArticleList>> {
        let entry = self.entry(id)?;
        Ok(entry
            .preview
            .as_ref()
            .map(|(articles, marker)| entry.snapshot(id, marker.based_on, articles.clone(), true)))
    }

    fn store_item(&mut self, item: &RawItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            *existing = item.clone();
        } else {
            self.items.push(item.clone());
        }
    }

    fn query_items(&self, query: &ItemQuery) -> Vec<RawItem> {
        let mut items: Vec<RawItem> = self.items.iter().filter(|i| query.matches(i)).cloned().collect();
        items.sort_by(|a, b| newest_first(a, b));
        items
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Items with an unreadable date sort after dated ones; ties break on id, descending.
pub(crate) fn newest_first(a: &RawItem, b: &RawItem) -> Ordering {
    match (a.timestamp(), b.timestamp()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.id.cmp(&a.id))
}

pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
    gate: VersionGate,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_gate(VersionGate::default())
    }

    pub fn with_gate(gate: VersionGate) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new())),
            gate,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListStorage for MemoryStorage {
    async fn create_list(&self, title: &str, options: &ListOptions) -> Result<ArticleList> {
        let mut store = self.store.write().await;
        let list = store.create_list(title, options);
        info!("📋 Created list {} ({})", list.id, title);
        Ok(list)
    }

    async fn get_list(&self, id: ListId, version: Option<u64>) -> Result<ArticleList> {
        let store = self.store.read().await;
        store.get_list(id, version)
    }

    async fn stored_version(&self, id: ListId) -> Result<u64> {
        let store = self.store.read().await;
        Ok(store.entry(id)?.stored_version())
    }

    async fn store_version(&self, id: ListId, articles: &[ArticleRecord], expected: Option<u64>) -> Result<u64> {
        let mut store = self.store.write().await;
        store.store_version(id, articles, expected, &self.gate)
    }

    async fn store_preview(&self, id: ListId, articles: &[ArticleRecord]) -> Result<PreviewMarker> {
        let mut store = self.store.write().await;
        store.store_preview(id, articles)
    }

    async fn get_preview(&self, id: ListId) -> Result<Option<ArticleList>> {
        let store = self.store.read().await;
        store.get_preview(id)
    }

    async fn get_setup(&self, actor: &str) -> Result<Vec<ListId>> {
        let store = self.store.read().await;
        Ok(store.setups.get(actor).cloned().unwrap_or_default())
    }

    async fn put_setup(&self, actor: &str, lists: &[ListId]) -> Result<()> {
        let mut store = self.store.write().await;
        store.setups.insert(actor.to_string(), lists.to_vec());
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for MemoryStorage {
    async fn store_item(&self, item: &RawItem) -> Result<()> {
        let mut store = self.store.write().await;
        store.store_item(item);
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<RawItem>> {
        let store = self.store.read().await;
        Ok(store.items.iter().find(|i| i.id == id).cloned())
    }

    async fn query_items(&self, query: &ItemQuery) -> Result<Vec<RawItem>> {
        let store = self.store.read().await;
        Ok(store.query_items(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: ItemId) -> ArticleRecord {
        ArticleRecord {
            source_item_id: id,
            options: Default::default(),
            title: format!("Article {}", id),
            title_html: format!("<h2>Article {}</h2>", id),
            url: format!("https://example.com/{}", id),
            content: String::new(),
            size: 24,
            created: None,
            published: None,
            image: None,
        }
    }

    fn item(id: ItemId, date: &str) -> RawItem {
        RawItem {
            id,
            title: format!("Item {}", id),
            body: String::new(),
            permalink: format!("https://example.com/{}", id),
            date: date.to_string(),
            author: None,
            size: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_versions_only_increase() {
        let storage = MemoryStorage::new();
        let list = storage.create_list("Front page", &ListOptions::default()).await.unwrap();
        assert_eq!(list.version, 0);

        let v1 = storage.store_version(list.id, &[record(1)], Some(0)).await.unwrap();
        let v2 = storage.store_version(list.id, &[record(1), record(2)], Some(v1)).await.unwrap();
        assert_eq!((v1, v2), (1, 2));

        let err = storage.store_version(list.id, &[record(3)], Some(v1)).await.unwrap_err();
        assert!(matches!(err, Error::VersionConflict { known: 1, stored: 2, .. }));

        let forced = storage.store_version(list.id, &[record(3)], None).await.unwrap();
        assert_eq!(forced, 3);
    }

    #[tokio::test]
    async fn test_load_historical_version() {
        let storage = MemoryStorage::new();
        let list = storage.create_list("Sports", &ListOptions::default()).await.unwrap();
        storage.store_version(list.id, &[record(1)], Some(0)).await.unwrap();
        storage.store_version(list.id, &[record(2), record(3)], Some(1)).await.unwrap();

        let first = storage.get_list(list.id, Some(1)).await.unwrap();
        assert_eq!(first.articles.len(), 1);
        let latest = storage.get_list(list.id, None).await.unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.articles.len(), 2);
        assert!(matches!(storage.get_list(list.id, Some(9)).await, Err(Error::NotFound(_))));
        assert!(matches!(storage.get_list(42, None).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_preview_does_not_advance_version() {
        let storage = MemoryStorage::new();
        let list = storage.create_list("Culture", &ListOptions::default()).await.unwrap();
        storage.store_version(list.id, &[record(1)], Some(0)).await.unwrap();

        let marker = storage.store_preview(list.id, &[record(7)]).await.unwrap();
        assert_eq!(marker.based_on, 1);
        assert_eq!(storage.stored_version(list.id).await.unwrap(), 1);

        let preview = storage.get_preview(list.id).await.unwrap().unwrap();
        assert!(preview.preview);
        assert_eq!(preview.articles[0].source_item_id, 7);
    }

    #[tokio::test]
    async fn test_tolerant_gate_accepts_slightly_stale_saves() {
        let storage = MemoryStorage::with_gate(VersionGate::new(1));
        let list = storage.create_list("Opinion", &ListOptions::default()).await.unwrap();
        storage.store_version(list.id, &[record(1)], Some(0)).await.unwrap();
        assert_eq!(storage.store_version(list.id, &[record(2)], Some(0)).await.unwrap(), 2);
        assert!(storage.store_version(list.id, &[record(3)], Some(0)).await.is_err());
    }

    #[tokio::test]
    async fn test_setup_is_per_actor() {
        let storage = MemoryStorage::new();
        storage.put_setup("ana", &[1, 2]).await.unwrap();
        storage.put_setup("ana", &[3]).await.unwrap();
        assert_eq!(storage.get_setup("ana").await.unwrap(), vec![3]);
        assert!(storage.get_setup("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_items_newest_first() {
        let storage = MemoryStorage::new();
        storage.store_item(&item(1, "2024-01-01 08:00:00")).await.unwrap();
        storage.store_item(&item(2, "2024-02-01 08:00:00")).await.unwrap();
        storage.store_item(&item(3, "not a date")).await.unwrap();
        storage.store_item(&item(4, "2023-12-01")).await.unwrap();

        let all = storage.query_items(&ItemQuery::default()).await.unwrap();
        let ids: Vec<ItemId> = all.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 1, 4, 3]);

        let page = storage
            .query_items(&ItemQuery { offset: 1, limit: Some(2), ..Default::default() })
            .await
            .unwrap();
        let ids: Vec<ItemId> = page.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }
}
