use askama::Template;
use fp_core::{ArticleRecord, Error, Result};

/// One loaded template, ready to turn records into markup.
pub trait TemplateHandle: Send + Sync {
    fn name(&self) -> &str;
    fn emit(&self, record: &ArticleRecord) -> Result<Vec<u8>>;
}

pub trait TemplateEngine: Send + Sync {
    fn load(&self, name: &str) -> Result<Box<dyn TemplateHandle>>;
}

struct ArticleView<'a> {
    post: u64,
    size: u32,
    title: &'a str,
    title_html: &'a str,
    url: &'a str,
    content: &'a str,
    has_image: bool,
    image_url: &'a str,
    image_align: &'a str,
    hide_related: bool,
}

impl<'a> From<&'a ArticleRecord> for ArticleView<'a> {
    fn from(record: &'a ArticleRecord) -> Self {
        Self {
            post: record.source_item_id,
            size: record.size,
            title: &record.title,
            title_html: &record.title_html,
            url: &record.url,
            content: &record.content,
            has_image: record.image.is_some(),
            image_url: record.image.as_ref().map_or("", |i| i.url.as_str()),
            image_align: record.image.as_ref().map_or("none", |i| i.alignment.as_str()),
            hide_related: record.flag("hideRelated"),
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<article class="fp-article fp-size-{{ a.size }}" data-post="{{ a.post }}">
{{ a.title_html|safe }}
{% if a.has_image %}<figure class="fp-image fp-align-{{ a.image_align }}"><img src="{{ a.image_url }}" alt="{{ a.title }}"></figure>
{% endif %}<div class="fp-content">{{ a.content|safe }}</div>
{% if !a.hide_related %}<a class="fp-more" href="{{ a.url }}">{{ a.title }}</a>
{% endif %}</article>
"#,
    ext = "html"
)]
struct ArticleTemplate<'a> {
    a: ArticleView<'a>,
}

#[derive(Template)]
#[template(
    source = r#"<li class="fp-compact" data-post="{{ a.post }}"><a href="{{ a.url }}">{{ a.title }}</a></li>
"#,
    ext = "html"
)]
struct CompactTemplate<'a> {
    a: ArticleView<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Article,
    Compact,
}

impl TemplateHandle for Builtin {
    fn name(&self) -> &str {
        match self {
            Builtin::Article => "article",
            Builtin::Compact => "compact",
        }
    }

    fn emit(&self, record: &ArticleRecord) -> Result<Vec<u8>> {
        let a = ArticleView::from(record);
        let rendered = match self {
            Builtin::Article => ArticleTemplate { a }.render(),
            Builtin::Compact => CompactTemplate { a }.render(),
        };
        rendered
            .map(String::into_bytes)
            .map_err(|e| Error::Template(format!("{} template: {}", self.name(), e)))
    }
}

/// Templates compiled into the binary: `article` and `compact`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    pub const NAMES: &'static [&'static str] = &["article", "compact"];
}

impl TemplateEngine for BuiltinTemplates {
    fn load(&self, name: &str) -> Result<Box<dyn TemplateHandle>> {
        match name {
            "article" => Ok(Box::new(Builtin::Article)),
            "compact" => Ok(Box::new(Builtin::Compact)),
            other => Err(Error::Template(format!("Unknown template: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_core::{ArticleImage, ImageAlignment, OptionValue};

    fn record() -> ArticleRecord {
        ArticleRecord {
            source_item_id: 3,
            options: Default::default(),
            title: "Fish & chips".to_string(),
            title_html: "<h2>Fish &amp; chips</h2>".to_string(),
            url: "https://example.com/3".to_string(),
            content: "<p>Crispy.</p>".to_string(),
            size: 24,
            created: None,
            published: None,
            image: Some(ArticleImage {
                attachment: 5,
                alignment: ImageAlignment::Left,
                size: "full".to_string(),
                url: "https://cdn.example.com/5.jpg".to_string(),
            }),
        }
    }

    #[test]
    fn test_article_template() {
        let handle = BuiltinTemplates.load("article").unwrap();
        let html = String::from_utf8(handle.emit(&record()).unwrap()).unwrap();
        assert!(html.contains(r#"data-post="3""#));
        assert!(html.contains("<h2>Fish &amp; chips</h2>"));
        assert!(html.contains("<p>Crispy.</p>"));
        assert!(html.contains("fp-align-left"));
        assert!(html.contains("fp-more"));
    }

    #[test]
    fn test_hide_related_drops_link() {
        let mut record = record();
        record.options.insert("hideRelated".to_string(), OptionValue::Bool(true));
        let html = String::from_utf8(BuiltinTemplates.load("article").unwrap().emit(&record).unwrap()).unwrap();
        assert!(!html.contains("fp-more"));
    }

    #[test]
    fn test_compact_template_and_unknown() {
        let handle = BuiltinTemplates.load("compact").unwrap();
        assert_eq!(handle.name(), "compact");
        let html = String::from_utf8(handle.emit(&record()).unwrap()).unwrap();
        assert!(html.starts_with(r#"<li class="fp-compact""#));
        assert!(matches!(BuiltinTemplates.load("mosaic"), Err(Error::Template(_))));
    }
}
