use std::path::PathBuf;
use visage_embedder::FaceEmbedder;
use visage_vector_store::VectorStore;

/// Shared state handed to every request handler.
///
/// Constructed once at startup and injected into the router; nothing here is
/// a process-wide singleton.
pub struct AppState {
    pub store: VectorStore,
    pub embedder: Box<dyn FaceEmbedder>,
    pub image_dir: PathBuf,
}

impl AppState {
    #[must_use]
    pub fn new(store: VectorStore, embedder: Box<dyn FaceEmbedder>, image_dir: PathBuf) -> Self {
        Self {
            store,
            embedder,
            image_dir,
        }
    }
}
