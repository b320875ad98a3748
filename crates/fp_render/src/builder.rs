use fp_core::{
    ArticleImage, ArticleOptions, ArticleRecord, ImageAlignment, ImageRef, OptionValue, RawItem, Result,
    DEFAULT_ARTICLE_SIZE,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::filters::{FilterContext, FilterPipeline, MarkupStage};

/// Caller-supplied properties merged underneath every built record.
///
/// Anything the source item provides itself wins over these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDefaults {
    #[serde(default)]
    pub options: ArticleOptions,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
}

/// What the source item itself says about each field, after filtering.
struct ItemFields {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    size: Option<u32>,
    image: Option<ArticleImage>,
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn heading(title: &str) -> String {
    format!("<h2>{}</h2>", escape_html(title))
}

#[derive(Debug, Clone, Default)]
pub struct ArticleRecordBuilder {
    defaults: ArticleDefaults,
}

impl ArticleRecordBuilder {
    pub fn new(defaults: ArticleDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ArticleDefaults {
        &self.defaults
    }

    pub fn set_defaults(&mut self, defaults: ArticleDefaults) {
        self.defaults = defaults;
    }

    /// Normalize `item` into an article record.
    ///
    /// Layering, lowest first: built-in constants, caller defaults, item data.
    /// The list-scoped and unscoped content stages both receive the raw body
    /// and the unscoped output is kept; the title goes through the title stage. `title_html` is only
    /// a fallback, the header resolver normally replaces it.
    pub fn build(
        &self,
        item: &RawItem,
        image: Option<ImageRef>,
        filters: &FilterPipeline,
        ctx: Option<&FilterContext>,
    ) -> Result<ArticleRecord> {
        // Both stages read the raw body; the unscoped result is the one kept.
        filters.apply_markup(MarkupStage::ListContent, &item.body, ctx)?;
        let content = filters.apply_markup(MarkupStage::Content, &item.body, ctx)?;
        let fields = ItemFields {
            title: non_empty(filters.apply_markup(MarkupStage::Title, &item.title, ctx)?),
            url: non_empty(item.permalink.clone()),
            content: non_empty(content),
            size: item.size,
            image: image.map(|img| ArticleImage {
                attachment: img.attachment,
                alignment: ImageAlignment::None,
                size: "full".to_string(),
                url: img.url,
            }),
        };

        let timestamp = item.timestamp();
        if timestamp.is_none() {
            warn!("⚠️ Item {} has an unreadable date {:?}", item.id, item.date);
        }

        let mut options = ArticleOptions::new();
        options.insert("hideRelated".to_string(), OptionValue::Bool(false));
        options.extend(self.defaults.options.clone());

        let title = fields
            .title
            .or_else(|| self.defaults.title.clone())
            .unwrap_or_default();

        Ok(ArticleRecord {
            source_item_id: item.id,
            options,
            title_html: heading(&item.title),
            title,
            url: fields.url.or_else(|| self.defaults.url.clone()).unwrap_or_default(),
            content: fields.content.or_else(|| self.defaults.content.clone()).unwrap_or_default(),
            size: fields.size.or(self.defaults.size).unwrap_or(DEFAULT_ARTICLE_SIZE),
            created: timestamp,
            published: timestamp,
            image: fields.image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> RawItem {
        RawItem {
            id: 11,
            title: "Storm <warning>".to_string(),
            body: "Heavy rain expected.".to_string(),
            permalink: "https://example.com/storm".to_string(),
            date: "2024-05-02 06:15:00".to_string(),
            author: None,
            size: None,
            image: None,
        }
    }

    fn ctx() -> FilterContext {
        FilterContext { suffix: String::new(), width: 468 }
    }

    #[test]
    fn test_defaults_fill_only_what_the_item_lacks() {
        let mut options = ArticleOptions::new();
        options.insert("hideRelated".to_string(), OptionValue::Bool(true));
        options.insert("streamer".to_string(), "breaking".into());
        let builder = ArticleRecordBuilder::new(ArticleDefaults {
            options,
            title: Some("Default title".to_string()),
            url: Some("https://example.com/default".to_string()),
            content: Some("Default content".to_string()),
            size: Some(40),
        });

        let record = builder.build(&item(), None, &FilterPipeline::new(), None).unwrap();
        assert_eq!(record.source_item_id, 11);
        assert_eq!(record.title, "Storm <warning>");
        assert_eq!(record.url, "https://example.com/storm");
        assert_eq!(record.content, "Heavy rain expected.");
        assert_eq!(record.size, 40);
        assert!(record.flag("hideRelated"));
        assert_eq!(record.option("streamer"), Some(&OptionValue::Text("breaking".to_string())));

        let mut bare = item();
        bare.body.clear();
        bare.size = Some(12);
        let record = builder.build(&bare, None, &FilterPipeline::new(), None).unwrap();
        assert_eq!(record.content, "Default content");
        assert_eq!(record.size, 12);
    }

    #[test]
    fn test_constants_without_defaults() {
        let record = ArticleRecordBuilder::default()
            .build(&item(), None, &FilterPipeline::new(), None)
            .unwrap();
        assert_eq!(record.size, DEFAULT_ARTICLE_SIZE);
        assert!(!record.flag("hideRelated"));
        assert_eq!(record.title_html, "<h2>Storm &lt;warning&gt;</h2>");
        assert!(record.image.is_none());
        assert_eq!(record.created, record.published);
        assert!(record.created.is_some());
    }

    #[test]
    fn test_no_filters_keeps_body() {
        let pipeline = FilterPipeline::new();
        let record = ArticleRecordBuilder::default()
            .build(&item(), None, &pipeline, Some(&ctx()))
            .unwrap();
        assert_eq!(record.content, item().body);
    }

    #[test]
    fn test_content_stages_each_see_the_raw_body() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let scoped_seen = seen.clone();
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add_markup_filter(MarkupStage::ListContent, "scoped", None, move |s, _| {
                scoped_seen.lock().unwrap().push(s.to_string());
                Ok(format!("[scoped:{}]", s))
            })
            .add_markup_filter(MarkupStage::Content, "unscoped", None, |s, _| Ok(format!("[unscoped:{}]", s)))
            .add_markup_filter(MarkupStage::Title, "upper", None, |s, _| Ok(s.to_uppercase()));

        let record = ArticleRecordBuilder::default()
            .build(&item(), None, &pipeline, Some(&ctx()))
            .unwrap();
        assert_eq!(record.content, "[unscoped:Heavy rain expected.]");
        assert_eq!(*seen.lock().unwrap(), vec!["Heavy rain expected.".to_string()]);
        assert_eq!(record.title, "STORM <WARNING>");
    }

    #[test]
    fn test_list_content_stage_alone_leaves_body() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add_markup_filter(MarkupStage::ListContent, "scoped", None, |s, _| Ok(format!("[scoped:{}]", s)));
        let record = ArticleRecordBuilder::default()
            .build(&item(), None, &pipeline, Some(&ctx()))
            .unwrap();
        assert_eq!(record.content, "Heavy rain expected.");
    }

    #[test]
    fn test_image_only_from_the_item() {
        let builder = ArticleRecordBuilder::new(ArticleDefaults {
            title: Some("Default title".to_string()),
            size: Some(40),
            ..Default::default()
        });
        let record = builder.build(&item(), None, &FilterPipeline::new(), None).unwrap();
        assert!(record.image.is_none());

        let image = ImageRef { attachment: 9, url: "https://cdn.example.com/9.jpg".to_string() };
        let record = builder.build(&item(), Some(image), &FilterPipeline::new(), None).unwrap();
        assert_eq!(record.image.map(|i| i.attachment), Some(9));
    }

    #[test]
    fn test_unreadable_date_still_builds() {
        let mut broken = item();
        broken.date = "sometime".to_string();
        let record = ArticleRecordBuilder::default()
            .build(&broken, None, &FilterPipeline::new(), None)
            .unwrap();
        assert!(record.created.is_none());
        assert!(record.published.is_none());
    }

    #[test]
    fn test_featured_image() {
        let image = ImageRef { attachment: 7, url: "https://cdn.example.com/7.jpg".to_string() };
        let record = ArticleRecordBuilder::default()
            .build(&item(), Some(image), &FilterPipeline::new(), None)
            .unwrap();
        let image = record.image.unwrap();
        assert_eq!(image.attachment, 7);
        assert_eq!(image.size, "full");
        assert_eq!(image.alignment, ImageAlignment::None);
    }
}
