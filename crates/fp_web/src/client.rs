use async_trait::async_trait;
use fp_core::envelope::interpret;
use fp_core::sync::{NewerVersion, SavedVersion};
use fp_core::{
    ArticleList, ArticleRecord, Error, ItemQuery, ListId, ListOptions, ListSync, PreviewMarker, RawItem, Result,
    SaveRequest,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::wire::{CreateList, ListSetup, PreviewRequest, ACTOR_HEADER};

/// Remote end of the synchronization contract, speaking to an `fp serve` instance.
///
/// Connection failures and unreadable bodies come back as transport errors,
/// the logged-out sentinel as [`Error::SessionExpired`], a rejected save as
/// [`Error::VersionConflict`] and any other `error` body as [`Error::Logical`].
pub struct HttpSyncClient {
    http: Client,
    base: Url,
    actor: String,
}

impl HttpSyncClient {
    pub fn new(base: &str, actor: impl Into<String>) -> Result<Self> {
        let base = Url::parse(base).map_err(|e| Error::InvalidInput(format!("Invalid server url {}: {}", base, e)))?;
        Ok(Self {
            http: Client::new(),
            base,
            actor: actor.into(),
        })
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::InvalidInput(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.header(ACTOR_HEADER, &self.actor).send().await?;
        let status = response.status();
        debug!("{} {}", status, response.url());
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Unreadable response ({}): {}", status, e)))?;
        let payload = interpret(body)?;
        if !status.is_success() {
            return Err(Error::Transport(format!("Server answered {}", status)));
        }
        Ok(serde_json::from_value(payload)?)
    }

    pub async fn create_list(&self, title: &str, options: &ListOptions) -> Result<ArticleList> {
        let body = CreateList {
            title: title.to_string(),
            options: options.clone(),
        };
        self.send(self.http.post(self.endpoint("/api/lists")?).json(&body)).await
    }

    pub async fn load_preview(&self, id: ListId) -> Result<ArticleList> {
        let url = self.endpoint(&format!("/api/lists/{}/preview", id))?;
        self.send(self.http.get(url)).await
    }

    pub async fn store_post(&self, item: &RawItem) -> Result<RawItem> {
        self.send(self.http.post(self.endpoint("/api/posts")?).json(item)).await
    }
}

#[async_trait]
impl ListSync for HttpSyncClient {
    async fn query_posts(&self, query: &ItemQuery) -> Result<Vec<RawItem>> {
        self.send(self.http.post(self.endpoint("/api/posts/query")?).json(query)).await
    }

    async fn load_list(&self, id: ListId, version: Option<u64>) -> Result<ArticleList> {
        let mut request = self.http.get(self.endpoint(&format!("/api/lists/{}", id))?);
        if let Some(version) = version {
            request = request.query(&[("version", version)]);
        }
        self.send(request).await
    }

    async fn check_newer_version(&self, id: ListId, known: u64) -> Result<bool> {
        let url = self.endpoint(&format!("/api/lists/{}/newer", id))?;
        let answer: NewerVersion = self.send(self.http.get(url).query(&[("version", known)])).await?;
        Ok(answer.newer)
    }

    async fn save_list(&self, id: ListId, request: &SaveRequest) -> Result<u64> {
        let url = self.endpoint(&format!("/api/lists/{}", id))?;
        let saved: SavedVersion = self.send(self.http.post(url).json(request)).await?;
        Ok(saved.version)
    }

    async fn save_preview(&self, id: ListId, articles: &[ArticleRecord]) -> Result<PreviewMarker> {
        let url = self.endpoint(&format!("/api/lists/{}/preview", id))?;
        let body = PreviewRequest {
            articles: articles.to_vec(),
        };
        self.send(self.http.post(url).json(&body)).await
    }

    async fn load_list_setup(&self) -> Result<Vec<ListId>> {
        let setup: ListSetup = self.send(self.http.get(self.endpoint("/api/setup")?)).await?;
        Ok(setup.lists)
    }

    async fn save_list_setup(&self, lists: &[ListId]) -> Result<()> {
        let body = ListSetup { lists: lists.to_vec() };
        let _: ListSetup = self.send(self.http.post(self.endpoint("/api/setup")?).json(&body)).await?;
        Ok(())
    }
}
