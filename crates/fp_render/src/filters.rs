//! Ordered, named filter stages applied during a render pass.
//!
//! The active variant suffix and target width live in a [`FilterState`]
//! handle instead of a global. [`FilterPipeline::begin_pass`] installs them
//! and the returned [`PassGuard`] puts the previous value back when dropped,
//! so filters never see a suffix left over from another pass.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use fp_core::{ArticleRecord, ListOptions, RawItem, Result};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterContext {
    pub suffix: String,
    pub width: u32,
}

impl From<&ListOptions> for FilterContext {
    fn from(options: &ListOptions) -> Self {
        Self {
            suffix: options.suffix.clone(),
            width: options.width,
        }
    }
}

/// Shared slot holding the context of the pass in progress, if any.
#[derive(Debug, Clone, Default)]
pub struct FilterState(Arc<RwLock<Option<FilterContext>>>);

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<FilterContext> {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Active suffix, empty outside a pass.
    pub fn suffix(&self) -> String {
        self.current().map(|c| c.suffix).unwrap_or_default()
    }

    pub fn width(&self) -> Option<u32> {
        self.current().map(|c| c.width)
    }

    fn replace(&self, next: Option<FilterContext>) -> Option<FilterContext> {
        let mut slot = self.0.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *slot, next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkupStage {
    /// Item title, list-scoped.
    Title,
    /// Item body, list-scoped invocation.
    ListContent,
    /// Item body, unscoped invocation. Its result becomes the article content.
    Content,
}

pub type PassHook = Box<dyn Fn(&FilterContext) -> Result<()> + Send + Sync>;
pub type MarkupFilter = Box<dyn Fn(&str, &FilterContext) -> Result<String> + Send + Sync>;
pub type ArticleFilter =
    Box<dyn Fn(ArticleRecord, &RawItem, &FilterContext) -> Result<Option<ArticleRecord>> + Send + Sync>;

struct Registered<F> {
    name: String,
    /// Only runs when the pass suffix equals this; `None` runs for every suffix.
    variant: Option<String>,
    filter: F,
}

impl<F> Registered<F> {
    fn applies(&self, ctx: &FilterContext) -> bool {
        self.variant.as_deref().map_or(true, |v| v == ctx.suffix)
    }
}

pub struct FilterPipeline {
    enabled: bool,
    state: FilterState,
    pass_hooks: Vec<Registered<PassHook>>,
    markup: HashMap<MarkupStage, Vec<Registered<MarkupFilter>>>,
    article: Vec<Registered<ArticleFilter>>,
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::with_state(FilterState::new())
    }

    /// Pipelines built on the same state nest: an inner pass restores the
    /// outer pass's context when it ends.
    pub fn with_state(state: FilterState) -> Self {
        Self {
            enabled: true,
            state,
            pass_hooks: Vec::new(),
            markup: HashMap::new(),
            article: Vec::new(),
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Runs once when a pass starts, after the suffix and width are installed.
    pub fn on_pass<F>(&mut self, name: &str, variant: Option<&str>, hook: F) -> &mut Self
    where
        F: Fn(&FilterContext) -> Result<()> + Send + Sync + 'static,
    {
        self.pass_hooks.push(Registered {
            name: name.to_string(),
            variant: variant.map(str::to_string),
            filter: Box::new(hook),
        });
        self
    }

    pub fn add_markup_filter<F>(&mut self, stage: MarkupStage, name: &str, variant: Option<&str>, filter: F) -> &mut Self
    where
        F: Fn(&str, &FilterContext) -> Result<String> + Send + Sync + 'static,
    {
        self.markup.entry(stage).or_default().push(Registered {
            name: name.to_string(),
            variant: variant.map(str::to_string),
            filter: Box::new(filter),
        });
        self
    }

    /// Runs on each finished record; returning `None` drops the article from the pass.
    pub fn add_article_filter<F>(&mut self, name: &str, variant: Option<&str>, filter: F) -> &mut Self
    where
        F: Fn(ArticleRecord, &RawItem, &FilterContext) -> Result<Option<ArticleRecord>> + Send + Sync + 'static,
    {
        self.article.push(Registered {
            name: name.to_string(),
            variant: variant.map(str::to_string),
            filter: Box::new(filter),
        });
        self
    }

    /// Remove every filter registered under `name`, across all stages.
    pub fn remove(&mut self, name: &str) {
        self.pass_hooks.retain(|r| r.name != name);
        for filters in self.markup.values_mut() {
            filters.retain(|r| r.name != name);
        }
        self.article.retain(|r| r.name != name);
    }

    /// Install the pass context and run the pass hooks.
    ///
    /// With the pipeline disabled nothing is installed and the guard is inert.
    pub fn begin_pass(&self, options: &ListOptions) -> Result<PassGuard> {
        if !self.enabled {
            return Ok(PassGuard {
                state: self.state.clone(),
                previous: None,
                context: None,
            });
        }
        let context = FilterContext::from(options);
        let previous = self.state.replace(Some(context.clone()));
        let guard = PassGuard {
            state: self.state.clone(),
            previous: Some(previous),
            context: Some(context),
        };
        if let Some(ctx) = guard.context() {
            debug!("Filter pass started (suffix {:?}, width {})", ctx.suffix, ctx.width);
            for hook in self.pass_hooks.iter().filter(|h| h.applies(ctx)) {
                (hook.filter)(ctx)?;
            }
        }
        Ok(guard)
    }

    /// Run `stage` over `input`. Without a pass context the input comes back unchanged.
    pub fn apply_markup(&self, stage: MarkupStage, input: &str, ctx: Option<&FilterContext>) -> Result<String> {
        let (Some(ctx), Some(filters)) = (ctx, self.markup.get(&stage)) else {
            return Ok(input.to_string());
        };
        let mut value = input.to_string();
        for registered in filters.iter().filter(|r| r.applies(ctx)) {
            value = (registered.filter)(&value, ctx)?;
        }
        Ok(value)
    }

    pub fn apply_article(
        &self,
        record: ArticleRecord,
        item: &RawItem,
        ctx: Option<&FilterContext>,
    ) -> Result<Option<ArticleRecord>> {
        let Some(ctx) = ctx else {
            return Ok(Some(record));
        };
        let mut record = record;
        for registered in self.article.iter().filter(|r| r.applies(ctx)) {
            match (registered.filter)(record, item, ctx)? {
                Some(next) => record = next,
                None => {
                    debug!("Article {} dropped by filter {}", item.id, registered.name);
                    return Ok(None);
                }
            }
        }
        Ok(Some(record))
    }
}

/// Restores the previous filter context on drop, including on error and unwind.
pub struct PassGuard {
    state: FilterState,
    previous: Option<Option<FilterContext>>,
    context: Option<FilterContext>,
}

impl PassGuard {
    pub fn context(&self) -> Option<&FilterContext> {
        self.context.as_ref()
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.state.replace(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_core::Error;
    use std::sync::Mutex;

    fn options(suffix: &str, width: u32) -> ListOptions {
        ListOptions {
            template: "article".to_string(),
            width,
            suffix: suffix.to_string(),
        }
    }

    #[test]
    fn test_state_is_scoped_to_pass() {
        let pipeline = FilterPipeline::new();
        assert_eq!(pipeline.state().current(), None);
        {
            let _pass = pipeline.begin_pass(&options("sidebar", 300)).unwrap();
            assert_eq!(pipeline.state().suffix(), "sidebar");
            assert_eq!(pipeline.state().width(), Some(300));
        }
        assert_eq!(pipeline.state().current(), None);
        assert_eq!(pipeline.state().suffix(), "");
    }

    #[test]
    fn test_nested_passes_restore_outer_context() {
        let state = FilterState::new();
        let outer = FilterPipeline::with_state(state.clone());
        let inner = FilterPipeline::with_state(state.clone());

        let _outer = outer.begin_pass(&options("outer", 600)).unwrap();
        {
            let _inner = inner.begin_pass(&options("inner", 200)).unwrap();
            assert_eq!(state.suffix(), "inner");
        }
        assert_eq!(state.suffix(), "outer");
        drop(_outer);
        assert_eq!(state.current(), None);
    }

    #[test]
    fn test_pass_hooks_run_once_per_pass() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = FilterPipeline::new();
        let seen = calls.clone();
        pipeline.on_pass("probe", None, move |ctx| {
            seen.lock().unwrap().push(ctx.clone());
            Ok(())
        });
        let seen = calls.clone();
        pipeline.on_pass("front-only", Some("front"), move |_| {
            seen.lock().unwrap().push(FilterContext { suffix: "front-only".to_string(), width: 0 });
            Ok(())
        });

        drop(pipeline.begin_pass(&options("sidebar", 300)).unwrap());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].suffix, "sidebar");
    }

    #[test]
    fn test_failing_hook_still_clears_state() {
        let mut pipeline = FilterPipeline::new();
        pipeline.on_pass("broken", None, |_| Err(Error::Render("hook failed".to_string())));
        assert!(pipeline.begin_pass(&options("x", 1)).is_err());
        assert_eq!(pipeline.state().current(), None);
    }

    #[test]
    fn test_disabled_pipeline_installs_nothing() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add_markup_filter(MarkupStage::Content, "shout", None, |s, _| Ok(s.to_uppercase()));
        pipeline.set_enabled(false);

        let pass = pipeline.begin_pass(&options("x", 1)).unwrap();
        assert!(pass.context().is_none());
        assert_eq!(pipeline.state().current(), None);
        assert_eq!(pipeline.apply_markup(MarkupStage::Content, "quiet", pass.context()).unwrap(), "quiet");
    }

    #[test]
    fn test_markup_filters_run_in_order_and_respect_variants() {
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add_markup_filter(MarkupStage::Content, "wrap", None, |s, _| Ok(format!("<p>{}</p>", s)))
            .add_markup_filter(MarkupStage::Content, "mark", Some("front"), |s, _| Ok(format!("{}!", s)));

        let ctx = FilterContext { suffix: String::new(), width: 468 };
        assert_eq!(pipeline.apply_markup(MarkupStage::Content, "hi", Some(&ctx)).unwrap(), "<p>hi</p>");

        let front = FilterContext { suffix: "front".to_string(), width: 468 };
        assert_eq!(pipeline.apply_markup(MarkupStage::Content, "hi", Some(&front)).unwrap(), "<p>hi</p>!");

        pipeline.remove("wrap");
        assert_eq!(pipeline.apply_markup(MarkupStage::Content, "hi", Some(&front)).unwrap(), "hi!");
        assert_eq!(pipeline.apply_markup(MarkupStage::Title, "hi", Some(&front)).unwrap(), "hi");
    }
}
