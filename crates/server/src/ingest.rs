use std::path::{Path, PathBuf};
use thiserror::Error;
use visage_embedder::FaceEmbedder;
use visage_vector_store::{IngestReport, VectorStore};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Embedder(#[from] visage_embedder::EmbedderError),

    #[error(transparent)]
    Store(#[from] visage_vector_store::VectorStoreError),
}

/// Embeds every regular file under `dir` and registers the results in one
/// pass. Files in which the embedder finds no face are skipped; the rest are
/// inserted one by one, each durable before the next begins.
pub async fn ingest_directory(
    store: &VectorStore,
    embedder: &dyn FaceEmbedder,
    dir: &Path,
) -> Result<IngestReport, IngestError> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();
    // Stable ingest order keeps insertion sequences reproducible.
    paths.sort();

    log::info!("Ingesting {} files from {}", paths.len(), dir.display());

    let mut items: Vec<(Option<Vec<f32>>, String)> = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path).await.map_err(|source| IngestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let embedding = embedder.embed(&bytes).await?;
        items.push((embedding, path.to_string_lossy().to_string()));
    }

    Ok(store.bulk_ingest(items).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;
    use visage_embedder::StubEmbedder;
    use visage_vector_store::MemoryBackend;

    #[tokio::test]
    async fn ingests_files_and_skips_faceless_ones() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.jpg"), b"face a").unwrap();
        std::fs::write(tmp.path().join("b.jpg"), b"face b").unwrap();
        // Empty file: the stub embedder reports "no face".
        std::fs::write(tmp.path().join("blank.jpg"), b"").unwrap();

        let store = VectorStore::open(Arc::new(MemoryBackend::new()))
            .await
            .unwrap();
        let embedder = StubEmbedder::new(16);

        let report = ingest_directory(&store, &embedder, tmp.path())
            .await
            .unwrap();
        assert_eq!(report.ingested, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn empty_directory_ingests_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = VectorStore::open(Arc::new(MemoryBackend::new()))
            .await
            .unwrap();
        let embedder = StubEmbedder::new(16);

        let report = ingest_directory(&store, &embedder, tmp.path())
            .await
            .unwrap();
        assert_eq!(report, IngestReport::default());
    }
}
