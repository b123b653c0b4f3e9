use std::sync::Arc;

use metadata_store::MetadataStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetadataStore>,
}
