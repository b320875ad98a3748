use crate::types::{ImageRef, RawItem};
use crate::Result;

/// Sequential, read-only view over the content repository used by a render pass.
///
/// Implementations may perform I/O per item; callers consume them strictly in order.
pub trait ContentSource {
    fn has_more(&self) -> bool;

    /// Move the cursor past the next item without extracting it.
    fn advance(&mut self);

    fn next_item(&mut self) -> Result<Option<RawItem>>;

    /// Featured image for `item`, if the repository has one.
    fn featured_image(&self, item: &RawItem) -> Option<ImageRef> {
        item.image.clone()
    }
}
