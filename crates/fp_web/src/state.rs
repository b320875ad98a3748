use std::sync::Arc;

use fp_render::{BuiltinTemplates, TemplateEngine};
use fp_storage::Storage;

pub struct AppState {
    pub storage: Storage,
    pub templates: Arc<dyn TemplateEngine>,
}

impl AppState {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            templates: Arc::new(BuiltinTemplates),
        }
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateEngine>) -> Self {
        self.templates = templates;
        self
    }
}
