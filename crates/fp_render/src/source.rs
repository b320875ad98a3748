use std::collections::HashMap;

use fp_core::{ContentSource, ImageRef, ItemId, RawItem, Result};

/// Content source over items already fetched from the repository.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    items: Vec<RawItem>,
    cursor: usize,
    images: HashMap<ItemId, ImageRef>,
}

impl VecSource {
    pub fn new(items: Vec<RawItem>) -> Self {
        Self {
            items,
            cursor: 0,
            images: HashMap::new(),
        }
    }

    /// Resolve `id`'s featured image to `image`, overriding the item's own.
    pub fn with_image(mut self, id: ItemId, image: ImageRef) -> Self {
        self.images.insert(id, image);
        self
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl ContentSource for VecSource {
    fn has_more(&self) -> bool {
        self.cursor < self.items.len()
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + 1).min(self.items.len());
    }

    fn next_item(&mut self) -> Result<Option<RawItem>> {
        let item = self.items.get(self.cursor).cloned();
        self.advance();
        Ok(item)
    }

    fn featured_image(&self, item: &RawItem) -> Option<ImageRef> {
        self.images.get(&item.id).cloned().or_else(|| item.image.clone())
    }
}
