//! Request and response bodies shared by the router and [`crate::HttpSyncClient`].

use fp_core::{ArticleRecord, Error, ItemId, ListId, ListOptions, Result};
use serde::{Deserialize, Serialize};

/// Header naming the acting editor. Requests without it are treated as logged out.
pub const ACTOR_HEADER: &str = "x-actor";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateList {
    pub title: String,
    #[serde(default)]
    pub options: ListOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionParam {
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownVersion {
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub articles: Vec<ArticleRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSetup {
    pub lists: Vec<ListId>,
}

/// Query string of `GET /api/render`.
///
/// `list` borrows template, width and suffix from a stored list; the explicit
/// fields override it. `exclude` is a comma separated id list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderParams {
    pub list: Option<ListId>,
    pub search: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
    pub exclude: Option<String>,
    pub template: Option<String>,
    pub width: Option<u32>,
    pub suffix: Option<String>,
}

impl RenderParams {
    pub fn exclude_ids(&self) -> Result<Vec<ItemId>> {
        let Some(raw) = self.exclude.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<ItemId>()
                    .map_err(|_| Error::InvalidInput(format!("Invalid item id in exclude: {}", s)))
            })
            .collect()
    }

    /// Fold the explicit overrides into `options`.
    pub fn apply(&self, mut options: ListOptions) -> ListOptions {
        if let Some(template) = &self.template {
            options.template = template.clone();
        }
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(suffix) = &self.suffix {
            options.suffix = suffix.clone();
        }
        options
    }
}
