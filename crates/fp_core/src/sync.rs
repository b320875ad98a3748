use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{ArticleList, ArticleRecord, ItemQuery, ListId, PreviewMarker, RawItem, SaveRequest};
use crate::{Error, Result};

/// Request/response contract between an editing surface and the persistence boundary.
///
/// Each call is independent; conflicting writers are told apart only by the
/// version they declare on save.
#[async_trait]
pub trait ListSync: Send + Sync {
    async fn query_posts(&self, query: &ItemQuery) -> Result<Vec<RawItem>>;

    /// `version: None` loads the latest version
    async fn load_list(&self, id: ListId, version: Option<u64>) -> Result<ArticleList>;

    /// Compares versions only; never transfers the list body
    async fn check_newer_version(&self, id: ListId, known: u64) -> Result<bool>;

    /// Returns the new canonical version, or the unchanged one for a preview save
    async fn save_list(&self, id: ListId, request: &SaveRequest) -> Result<u64>;

    async fn save_preview(&self, id: ListId, articles: &[ArticleRecord]) -> Result<PreviewMarker>;

    async fn load_list_setup(&self) -> Result<Vec<ListId>>;

    /// Last write wins
    async fn save_list_setup(&self, lists: &[ListId]) -> Result<()>;
}

/// Wire shape of a `check-newer-version` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewerVersion {
    pub newer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedVersion {
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No remote change known.
    Clean,
    /// A newer-version check is in flight.
    StaleCheckRequested,
    /// The stored list moved past the local version; reload or force-save.
    ConflictDetected,
}

/// Editor-side view of one list: the articles being edited, the version they
/// were loaded at, and what is known about the remote copy.
pub struct EditorSession<S: ListSync + ?Sized> {
    sync: Arc<S>,
    list: ArticleList,
    state: SyncState,
}

impl<S: ListSync + ?Sized> EditorSession<S> {
    pub async fn open(sync: Arc<S>, id: ListId, version: Option<u64>) -> Result<Self> {
        let list = sync.load_list(id, version).await?;
        debug!("Opened list {} at version {}", id, list.version);
        Ok(Self {
            sync,
            list,
            state: SyncState::Clean,
        })
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn list(&self) -> &ArticleList {
        &self.list
    }

    pub fn version(&self) -> u64 {
        self.list.version
    }

    pub fn articles_mut(&mut self) -> &mut Vec<ArticleRecord> {
        &mut self.list.articles
    }

    /// Ask whether someone saved a newer version. Cheap enough to call on a timer.
    pub async fn poll(&mut self) -> Result<SyncState> {
        let previous = self.state;
        self.state = SyncState::StaleCheckRequested;
        match self.sync.check_newer_version(self.list.id, self.list.version).await {
            Ok(true) => {
                warn!("List {} has a newer version than {}", self.list.id, self.list.version);
                self.state = SyncState::ConflictDetected;
            }
            Ok(false) => self.state = SyncState::Clean,
            Err(e) => {
                self.state = previous;
                return Err(e);
            }
        }
        Ok(self.state)
    }

    pub async fn save(&mut self) -> Result<u64> {
        self.save_with(false).await
    }

    /// Overwrite the stored list regardless of its version.
    pub async fn force_save(&mut self) -> Result<u64> {
        self.save_with(true).await
    }

    async fn save_with(&mut self, force: bool) -> Result<u64> {
        let request = SaveRequest {
            articles: self.list.articles.clone(),
            version: self.list.version,
            preview: false,
            force,
        };
        match self.sync.save_list(self.list.id, &request).await {
            Ok(version) => {
                self.list.version = version;
                self.state = SyncState::Clean;
                Ok(version)
            }
            Err(e @ Error::VersionConflict { .. }) => {
                self.state = SyncState::ConflictDetected;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn save_preview(&self) -> Result<PreviewMarker> {
        self.sync.save_preview(self.list.id, &self.list.articles).await
    }

    /// Load the latest version, returning the local articles it replaced so
    /// the caller can re-apply its edits.
    pub async fn reload(&mut self) -> Result<Vec<ArticleRecord>> {
        let latest = self.sync.load_list(self.list.id, None).await?;
        let previous = std::mem::replace(&mut self.list, latest);
        self.state = SyncState::Clean;
        Ok(previous.articles)
    }
}
