use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::request::Parts,
    response::Html,
    Json,
};
use fp_core::sync::{NewerVersion, SavedVersion};
use fp_core::{ArticleList, Error, ItemQuery, ListId, ListOptions, ListSync, PreviewMarker, RawItem, SaveRequest};
use fp_render::{ListRenderer, RenderContext, VecSource, MAX_ARTICLES};
use fp_storage::StorageSync;
use tracing::debug;

use crate::error::ApiError;
use crate::wire::{CreateList, KnownVersion, ListSetup, PreviewRequest, RenderParams, VersionParam, ACTOR_HEADER};
use crate::AppState;

type ApiResult<T> = std::result::Result<T, ApiError>;

/// The editor a request acts for, taken from [`ACTOR_HEADER`].
#[derive(Debug, Clone)]
pub struct Actor(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> ApiResult<Self> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|actor| !actor.is_empty())
            .map(|actor| Actor(actor.to_string()))
            .ok_or(ApiError(Error::SessionExpired))
    }
}

fn sync_for(state: &AppState, actor: Actor) -> StorageSync {
    StorageSync::new(state.storage.lists.clone(), state.storage.content.clone(), actor.0)
}

pub async fn query_posts(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(query): Json<ItemQuery>,
) -> ApiResult<Json<Vec<RawItem>>> {
    let items = sync_for(&state, actor).query_posts(&query).await?;
    Ok(Json(items))
}

pub async fn store_post(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Json(item): Json<RawItem>,
) -> ApiResult<Json<RawItem>> {
    state.storage.content.store_item(&item).await?;
    debug!("Stored item {}", item.id);
    Ok(Json(item))
}

pub async fn create_list(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Json(body): Json<CreateList>,
) -> ApiResult<Json<ArticleList>> {
    if body.title.trim().is_empty() {
        return Err(Error::InvalidInput("List title must not be empty".to_string()).into());
    }
    let list = state.storage.lists.create_list(&body.title, &body.options).await?;
    debug!("List {} created by {}", list.id, actor);
    Ok(Json(list))
}

pub async fn load_list(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ListId>,
    Query(params): Query<VersionParam>,
) -> ApiResult<Json<ArticleList>> {
    let list = sync_for(&state, actor).load_list(id, params.version).await?;
    Ok(Json(list))
}

pub async fn check_newer_version(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ListId>,
    Query(params): Query<KnownVersion>,
) -> ApiResult<Json<NewerVersion>> {
    let newer = sync_for(&state, actor).check_newer_version(id, params.version).await?;
    Ok(Json(NewerVersion { newer }))
}

pub async fn save_list(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ListId>,
    Json(request): Json<SaveRequest>,
) -> ApiResult<Json<SavedVersion>> {
    let version = sync_for(&state, actor).save_list(id, &request).await?;
    Ok(Json(SavedVersion { version }))
}

pub async fn save_preview(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ListId>,
    Json(body): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewMarker>> {
    let marker = sync_for(&state, actor).save_preview(id, &body.articles).await?;
    Ok(Json(marker))
}

pub async fn load_preview(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ListId>,
) -> ApiResult<Json<ArticleList>> {
    sync_for(&state, actor)
        .load_preview(id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("preview of list {}", id)).into())
}

pub async fn load_setup(State(state): State<Arc<AppState>>, actor: Actor) -> ApiResult<Json<ListSetup>> {
    let lists = sync_for(&state, actor).load_list_setup().await?;
    Ok(Json(ListSetup { lists }))
}

pub async fn save_setup(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(setup): Json<ListSetup>,
) -> ApiResult<Json<ListSetup>> {
    sync_for(&state, actor).save_list_setup(&setup.lists).await?;
    Ok(Json(setup))
}

/// Presentation-time rendering of the live repository.
pub async fn render(State(state): State<Arc<AppState>>, Query(params): Query<RenderParams>) -> ApiResult<Html<String>> {
    let exclude = params.exclude_ids()?;
    let base = match params.list {
        Some(id) => state.storage.lists.get_list(id, None).await?.options,
        None => ListOptions::default(),
    };
    let options = params.apply(base);

    // Excluded items still occupy a slot, so fetch enough to fill the page past them.
    let wanted = params.limit.unwrap_or(MAX_ARTICLES).min(MAX_ARTICLES);
    let query = ItemQuery {
        search: params.search.clone(),
        author: params.author.clone(),
        offset: 0,
        limit: Some(params.offset.saturating_add(wanted).saturating_add(exclude.len())),
        exclude: Vec::new(),
    };
    let items = state.storage.content.query_items(&query).await?;

    let renderer = ListRenderer::new(state.templates.clone())
        .with_template(options.template)
        .with_list_width(options.width)
        .with_filter_suffix(options.suffix);
    let mut ctx = RenderContext::new()
        .with_offset(params.offset)
        .with_limit(params.limit)
        .excluding(exclude);
    let html = renderer.render(&mut VecSource::new(items), &mut ctx)?;
    debug!("Rendered {} articles", ctx.emitted());
    Ok(Html(html))
}
