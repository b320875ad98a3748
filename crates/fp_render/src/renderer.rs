use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use fp_core::{ArticleList, ArticleRecord, ContentSource, Error, ItemId, ListOptions, RawItem, Result};
use tracing::debug;

use crate::builder::{ArticleDefaults, ArticleRecordBuilder};
use crate::current::CurrentItem;
use crate::filters::{FilterContext, FilterPipeline};
use crate::header::{DefaultHeader, HeaderResolver};
use crate::template::{TemplateEngine, TemplateHandle};

/// Hard ceiling on articles emitted by one pass, whatever the limit says.
pub const MAX_ARTICLES: usize = 50;

/// Per-pass bookkeeping: where to start, when to stop, what to leave out.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub offset: usize,
    /// `None` means unlimited (still bounded by the ceiling).
    pub limit: Option<usize>,
    pub exclude: HashSet<ItemId>,
    /// Accumulated markup for [`ListRenderer::render`]; callers may write around it.
    pub output: String,
    emitted: usize,
    skipped: usize,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.exclude.extend(ids);
        self
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn done(&self, ceiling: usize) -> bool {
        self.emitted >= ceiling || self.limit.is_some_and(|limit| self.emitted >= limit)
    }
}

/// Renders a content source into article markup.
pub struct ListRenderer {
    list: ArticleList,
    templates: Arc<dyn TemplateEngine>,
    builder: ArticleRecordBuilder,
    header: Box<dyn HeaderResolver>,
    pipeline: FilterPipeline,
    current: CurrentItem,
    max_articles: usize,
}

impl ListRenderer {
    pub fn new(templates: Arc<dyn TemplateEngine>) -> Self {
        Self {
            list: ArticleList::transient(ListOptions::default()),
            templates,
            builder: ArticleRecordBuilder::default(),
            header: Box::new(DefaultHeader),
            pipeline: FilterPipeline::new(),
            current: CurrentItem::new(),
            max_articles: MAX_ARTICLES,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.list.options.template = template.into();
        self
    }

    pub fn with_list_width(mut self, width: u32) -> Self {
        self.list.options.width = width;
        self
    }

    pub fn with_filter_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.list.options.suffix = suffix.into();
        self
    }

    pub fn with_list(mut self, list: ArticleList) -> Self {
        self.list = list;
        self
    }

    pub fn with_default_properties(mut self, defaults: ArticleDefaults) -> Self {
        self.builder.set_defaults(defaults);
        self
    }

    pub fn with_header<H: HeaderResolver + 'static>(mut self, header: H) -> Self {
        self.header = Box::new(header);
        self
    }

    pub fn with_pipeline(mut self, pipeline: FilterPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_current_item(mut self, current: CurrentItem) -> Self {
        self.current = current;
        self
    }

    pub fn with_max_articles(mut self, max_articles: usize) -> Self {
        self.max_articles = max_articles;
        self
    }

    pub fn toggle_filters(&mut self, enabled: bool) {
        self.pipeline.set_enabled(enabled);
    }

    pub fn list(&self) -> &ArticleList {
        &self.list
    }

    pub fn list_width(&self) -> u32 {
        self.list.options.width
    }

    pub fn filter_suffix(&self) -> &str {
        &self.list.options.suffix
    }

    pub fn default_properties(&self) -> &ArticleDefaults {
        self.builder.defaults()
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut FilterPipeline {
        &mut self.pipeline
    }

    pub fn current_item(&self) -> &CurrentItem {
        &self.current
    }

    /// Render into `ctx.output` and return the markup this pass produced.
    pub fn render(&self, source: &mut dyn ContentSource, ctx: &mut RenderContext) -> Result<String> {
        let mut buffer = Vec::new();
        self.render_to(source, ctx, &mut buffer)?;
        let markup = String::from_utf8(buffer).map_err(|e| Error::Template(e.to_string()))?;
        ctx.output.push_str(&markup);
        Ok(markup)
    }

    /// Write each article to `out` as soon as it is produced. Returns the number emitted.
    pub fn render_to<W: Write + ?Sized>(
        &self,
        source: &mut dyn ContentSource,
        ctx: &mut RenderContext,
        out: &mut W,
    ) -> Result<usize> {
        let template = self.templates.load(&self.list.options.template)?;
        ctx.emitted = 0;
        ctx.skipped = 0;

        // Both guards restore their shared state on every exit path below.
        let pass = self.pipeline.begin_pass(&self.list.options)?;
        let scope = self.current.scope();
        let filter_ctx = pass.context();

        debug!(
            "Render pass started (template {}, suffix {:?}, width {}, offset {}, limit {:?})",
            template.name(),
            self.list.options.suffix,
            self.list.options.width,
            ctx.offset,
            ctx.limit
        );

        loop {
            if ctx.done(self.max_articles) || !source.has_more() {
                break;
            }
            if ctx.skipped < ctx.offset {
                source.advance();
                ctx.skipped += 1;
                continue;
            }
            let Some(item) = source.next_item()? else {
                break;
            };
            scope.enter(&item);

            let image = source.featured_image(&item);
            let record = self.prepare(&item, image, ctx.emitted, filter_ctx)?;
            match record {
                Some(record) if !ctx.exclude.contains(&item.id) => {
                    self.emit(template.as_ref(), &record, out)?;
                    ctx.emitted += 1;
                }
                _ => debug!("Item {} produced no output", item.id),
            }
        }

        debug!("Render pass finished ({} emitted, {} skipped)", ctx.emitted, ctx.skipped);
        Ok(ctx.emitted)
    }

    fn prepare(
        &self,
        item: &RawItem,
        image: Option<fp_core::ImageRef>,
        position: usize,
        filter_ctx: Option<&FilterContext>,
    ) -> Result<Option<ArticleRecord>> {
        let mut record = self.builder.build(item, image, &self.pipeline, filter_ctx)?;
        record.title_html = self.header.resolve(position, &record, item, &self.list)?;
        self.pipeline.apply_article(record, item, filter_ctx)
    }

    fn emit<W: Write + ?Sized>(&self, template: &dyn TemplateHandle, record: &ArticleRecord, out: &mut W) -> Result<()> {
        let bytes = template.emit(record)?;
        out.write_all(&bytes)?;
        Ok(())
    }
}
