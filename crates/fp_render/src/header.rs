use fp_core::{ArticleList, ArticleRecord, RawItem, Result};

use crate::builder::heading;

/// Computes the display header of each article in a pass.
///
/// Errors are not caught by the renderer; a failing resolver aborts the pass.
pub trait HeaderResolver: Send + Sync {
    fn resolve(&self, position: usize, record: &ArticleRecord, item: &RawItem, list: &ArticleList) -> Result<String>;
}

impl<F> HeaderResolver for F
where
    F: Fn(usize, &ArticleRecord, &RawItem, &ArticleList) -> Result<String> + Send + Sync,
{
    fn resolve(&self, position: usize, record: &ArticleRecord, item: &RawItem, list: &ArticleList) -> Result<String> {
        self(position, record, item, list)
    }
}

/// Level-2 heading around the plain title.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHeader;

impl HeaderResolver for DefaultHeader {
    fn resolve(&self, _position: usize, record: &ArticleRecord, _item: &RawItem, _list: &ArticleList) -> Result<String> {
        if record.title_html.is_empty() {
            Ok(heading(&record.title))
        } else {
            Ok(record.title_html.clone())
        }
    }
}
