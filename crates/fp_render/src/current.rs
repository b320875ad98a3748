use std::sync::{Arc, Mutex};

use fp_core::RawItem;

/// The item a render pass is currently working on.
///
/// Collaborators running inside a pass (header resolvers, filters) can read
/// it; outside a pass it holds whatever it held before the pass started.
#[derive(Debug, Clone, Default)]
pub struct CurrentItem(Arc<Mutex<Option<RawItem>>>);

impl CurrentItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<RawItem> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, item: Option<RawItem>) -> Option<RawItem> {
        let mut slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *slot, item)
    }

    /// Remember the current value; it is put back when the scope drops.
    pub fn scope(&self) -> ItemScope {
        ItemScope {
            slot: self.clone(),
            previous: Some(self.get()),
        }
    }
}

pub struct ItemScope {
    slot: CurrentItem,
    previous: Option<Option<RawItem>>,
}

impl ItemScope {
    pub fn enter(&self, item: &RawItem) {
        self.slot.set(Some(item.clone()));
    }
}

impl Drop for ItemScope {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.slot.set(previous);
        }
    }
}
