use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ListId = u64;
pub type ItemId = u64;

/// Render-size hint used when neither the item nor the caller supplies one.
pub const DEFAULT_ARTICLE_SIZE: u32 = 24;
pub const DEFAULT_TEMPLATE: &str = "article";
pub const DEFAULT_LIST_WIDTH: u32 = 468;

/// Reference to a visual asset resolved by the content repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub attachment: u64,
    pub url: String,
}

/// A content item as the repository hands it out, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub permalink: String,
    /// Creation/publish date exactly as stored; parsed lazily.
    pub date: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub image: Option<ImageRef>,
}

impl RawItem {
    /// Parses `date`, accepting RFC 3339 and the `YYYY-MM-DD[ HH:MM:SS]` forms.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.date)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Text(String),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

pub type ArticleOptions = BTreeMap<String, OptionValue>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageAlignment {
    #[default]
    None,
    Left,
    Right,
    Center,
}

impl ImageAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleImage {
    pub attachment: u64,
    pub alignment: ImageAlignment,
    pub size: String,
    pub url: String,
}

/// Canonical, normalized article as rendered and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub source_item_id: ItemId,
    #[serde(default)]
    pub options: ArticleOptions,
    pub title: String,
    pub title_html: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    pub size: u32,
    pub created: Option<DateTime<Utc>>,
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image: Option<ArticleImage>,
}

impl ArticleRecord {
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.options.get(key), Some(OptionValue::Bool(true)))
    }
}

/// Per-render options carried by a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    pub template: String,
    pub width: u32,
    #[serde(default)]
    pub suffix: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            width: DEFAULT_LIST_WIDTH,
            suffix: String::new(),
        }
    }
}

/// An ordered list of articles at a given version.
///
/// Lists built on the fly by the renderer have id `0` and version `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleList {
    pub id: ListId,
    pub title: String,
    pub version: u64,
    #[serde(default)]
    pub articles: Vec<ArticleRecord>,
    #[serde(default)]
    pub options: ListOptions,
    #[serde(default)]
    pub preview: bool,
}

impl ArticleList {
    pub fn transient(options: ListOptions) -> Self {
        Self {
            id: 0,
            title: String::new(),
            version: 0,
            articles: Vec::new(),
            options,
            preview: false,
        }
    }
}

/// Filter criteria for the `query-posts` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub exclude: Vec<ItemId>,
}

impl ItemQuery {
    /// Whether `item` passes the search, author and exclusion criteria.
    /// Offset and limit are applied by the repository after ordering.
    pub fn matches(&self, item: &RawItem) -> bool {
        if self.exclude.contains(&item.id) {
            return false;
        }
        if let Some(author) = &self.author {
            if item.author.as_deref() != Some(author.as_str()) {
                return false;
            }
        }
        match &self.search {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                item.title.to_lowercase().contains(&needle) || item.body.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

/// Body of a `save-list` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub articles: Vec<ArticleRecord>,
    /// Version the editor last loaded.
    pub version: u64,
    #[serde(default)]
    pub preview: bool,
    /// Skip the version gate and overwrite whatever is stored.
    #[serde(default)]
    pub force: bool,
}

/// Returned by a preview save; the canonical version is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewMarker {
    pub list_id: ListId,
    pub based_on: u64,
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: ItemId, title: &str, author: Option<&str>) -> RawItem {
        RawItem {
            id,
            title: title.to_string(),
            body: format!("Body of {}", title),
            permalink: format!("https://example.com/{}", id),
            date: "2024-03-01 10:30:00".to_string(),
            author: author.map(str::to_string),
            size: None,
            image: None,
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01T10:30:00+02:00").is_some());
        assert!(parse_timestamp("2024-03-01 10:30:00").is_some());
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("yesterday-ish").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_item_query_matching() {
        let query = ItemQuery {
            search: Some("ELECTION".to_string()),
            exclude: vec![2],
            ..Default::default()
        };
        assert!(query.matches(&item(1, "Election night", None)));
        assert!(!query.matches(&item(2, "Election recap", None)));
        assert!(!query.matches(&item(3, "Weather", None)));

        let by_author = ItemQuery {
            author: Some("ana".to_string()),
            ..Default::default()
        };
        assert!(by_author.matches(&item(4, "Anything", Some("ana"))));
        assert!(!by_author.matches(&item(5, "Anything", None)));
    }

    #[test]
    fn test_option_values_deserialize_untagged() {
        let options: ArticleOptions =
            serde_json::from_str(r#"{"hideRelated": true, "streamer": "breaking"}"#).unwrap();
        assert_eq!(options.get("hideRelated"), Some(&OptionValue::Bool(true)));
        assert_eq!(options.get("streamer"), Some(&OptionValue::Text("breaking".to_string())));
    }
}
