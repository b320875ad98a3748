pub mod builder;
pub mod current;
pub mod filters;
pub mod header;
pub mod renderer;
pub mod source;
pub mod template;

pub use builder::{ArticleDefaults, ArticleRecordBuilder};
pub use current::CurrentItem;
pub use filters::{FilterContext, FilterPipeline, FilterState, MarkupStage};
pub use header::{DefaultHeader, HeaderResolver};
pub use renderer::{ListRenderer, RenderContext, MAX_ARTICLES};
pub use source::VecSource;
pub use template::{BuiltinTemplates, TemplateEngine, TemplateHandle};

pub mod prelude {
    pub use super::{
        ArticleDefaults, BuiltinTemplates, FilterPipeline, ListRenderer, MarkupStage, RenderContext, VecSource,
    };
    pub use fp_core::{ArticleRecord, ContentSource, Error, RawItem, Result};
}
