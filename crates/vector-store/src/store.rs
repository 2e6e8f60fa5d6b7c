use crate::backend::VectorBackend;
use crate::error::{Result, VectorStoreError};
use crate::similarity::rank_and_filter;
use crate::types::{FaceEntry, FaceMatch, IngestReport};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

struct Collection {
    entries: Vec<FaceEntry>,
    next_seq: u64,
    dimension: Option<usize>,
}

/// Durable collection of registered face embeddings.
///
/// Single-writer/multi-reader: queries share a read lock, insert/delete take
/// the write lock and complete their durable write before the mutation
/// becomes visible. Any query that starts after an insert/delete returns
/// observes its effect.
pub struct VectorStore {
    backend: Arc<dyn VectorBackend>,
    collection: RwLock<Collection>,
}

impl VectorStore {
    /// Opens the store, rebuilding the in-memory index from persisted state
    /// alone.
    pub async fn open(backend: Arc<dyn VectorBackend>) -> Result<Self> {
        let entries = backend.list_all().await?;
        let next_seq = entries.iter().map(|e| e.seq + 1).max().unwrap_or(0);
        let dimension = entries.first().map(|e| e.embedding.len());
        log::info!("Opened vector store with {} entries", entries.len());

        Ok(Self {
            backend,
            collection: RwLock::new(Collection {
                entries,
                next_seq,
                dimension,
            }),
        })
    }

    /// Registers an embedding and returns its freshly assigned id.
    ///
    /// The first-ever insert establishes the collection's dimensionality;
    /// later inserts must match it. On a persistence failure nothing becomes
    /// visible to queries.
    pub async fn insert(&self, embedding: Vec<f32>, source_ref: impl Into<String>) -> Result<String> {
        let mut collection = self.collection.write().await;

        if embedding.is_empty() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: collection.dimension.unwrap_or(1),
                actual: 0,
            });
        }
        if let Some(expected) = collection.dimension {
            if embedding.len() != expected {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let entry = FaceEntry {
            seq: collection.next_seq,
            id: Uuid::new_v4().to_string(),
            embedding,
            source_ref: source_ref.into(),
        };

        // Durable write first, in-memory mutation second; holding the write
        // lock across both keeps half-written state invisible to readers.
        self.backend.insert_one(&entry).await?;

        collection.next_seq += 1;
        if collection.dimension.is_none() {
            collection.dimension = Some(entry.embedding.len());
        }
        let id = entry.id.clone();
        log::debug!("Inserted entry {id} (seq {}) from {}", entry.seq, entry.source_ref);
        collection.entries.push(entry);
        Ok(id)
    }

    /// Full-scan similarity query: every stored entry scoring strictly above
    /// `threshold` against `embedding`, sorted by similarity descending with
    /// earlier-inserted entries winning ties. Never mutates the collection.
    pub async fn query(&self, embedding: &[f32], threshold: f32) -> Result<Vec<FaceMatch>> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(VectorStoreError::InvalidThreshold(threshold));
        }

        let collection = self.collection.read().await;
        if collection.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = collection.dimension {
            if embedding.len() != expected {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        Ok(rank_and_filter(embedding, &collection.entries, threshold))
    }

    /// Removes an entry and returns its source reference so the caller can
    /// clean up the backing file. A second delete of the same id fails with
    /// `NotFound`.
    pub async fn delete(&self, id: &str) -> Result<String> {
        let mut collection = self.collection.write().await;
        let pos = collection
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| VectorStoreError::NotFound(id.to_string()))?;

        self.backend.delete_by_id(id).await?;

        let entry = collection.entries.remove(pos);
        log::debug!("Deleted entry {id} ({})", entry.source_ref);
        Ok(entry.source_ref)
    }

    /// Inserts a batch of (embedding, source) pairs. Items without an
    /// embedding (no face detected) are counted as skipped; each successful
    /// insert is independently durable before the next begins, so an error
    /// aborts the rest of the batch without rolling back prior inserts.
    pub async fn bulk_ingest(
        &self,
        items: Vec<(Option<Vec<f32>>, String)>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        for (embedding, source_ref) in items {
            let Some(embedding) = embedding else {
                log::debug!("Skipping {source_ref}: no embedding");
                report.skipped += 1;
                continue;
            };
            self.insert(embedding, source_ref).await?;
            report.ingested += 1;
        }
        log::info!(
            "Bulk ingest finished: {} ingested, {} skipped",
            report.ingested,
            report.skipped
        );
        Ok(report)
    }

    pub async fn len(&self) -> usize {
        self.collection.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.collection.read().await.entries.is_empty()
    }

    /// Established embedding dimensionality, if any entry was ever inserted
    /// in this process or loaded from persisted state.
    pub async fn dimension(&self) -> Option<usize> {
        self.collection.read().await.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    async fn store_with_backend() -> (VectorStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = VectorStore::open(backend.clone()).await.unwrap();
        (store, backend)
    }

    #[tokio::test]
    async fn inserted_ids_are_unique() {
        let (store, _) = store_with_backend().await;
        let mut ids = HashSet::new();
        for i in 0..32 {
            let id = store
                .insert(vec![1.0, i as f32], format!("db/{i}.jpg"))
                .await
                .unwrap();
            assert!(ids.insert(id), "duplicate id returned");
        }

        // A deleted id is never handed out again.
        let victim = ids.iter().next().unwrap().clone();
        store.delete(&victim).await.unwrap();
        let fresh = store.insert(vec![1.0, 99.0], "db/fresh.jpg").await.unwrap();
        assert!(!ids.contains(&fresh));
    }

    #[tokio::test]
    async fn first_insert_establishes_dimensionality() {
        let (store, _) = store_with_backend().await;
        assert_eq!(store.dimension().await, None);

        store.insert(vec![1.0, 0.0, 0.0], "db/a.jpg").await.unwrap();
        assert_eq!(store.dimension().await, Some(3));

        let err = store.insert(vec![1.0, 0.0], "db/b.jpg").await.unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn empty_embedding_is_rejected() {
        let (store, _) = store_with_backend().await;
        let err = store.insert(Vec::new(), "db/a.jpg").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn query_validates_threshold_and_dimension() {
        let (store, _) = store_with_backend().await;
        store.insert(vec![1.0, 0.0], "db/a.jpg").await.unwrap();

        let err = store.query(&[1.0, 0.0], 1.5).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidThreshold(_)));
        let err = store.query(&[1.0, 0.0], -0.1).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidThreshold(_)));

        let err = store.query(&[1.0, 0.0, 0.0], 0.5).await.unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn query_on_empty_collection_skips_dimension_check() {
        let (store, _) = store_with_backend().await;
        let hits = store.query(&[1.0, 0.0, 0.0, 0.0], 0.5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn ranked_query_matches_expected_order() {
        let (store, _) = store_with_backend().await;
        let a = store.insert(vec![1.0, 0.0], "db/a.jpg").await.unwrap();
        let b = store.insert(vec![0.0, 1.0], "db/b.jpg").await.unwrap();
        let c = store.insert(vec![0.9, 0.1], "db/c.jpg").await.unwrap();

        let hits = store.query(&[1.0, 0.0], 0.5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, a);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].id, c);
        assert!((hits[1].similarity - 0.9939).abs() < 1e-3);
        assert!(!hits.iter().any(|h| h.id == b));
    }

    #[tokio::test]
    async fn delete_returns_source_ref_and_is_not_idempotent() {
        let (store, _) = store_with_backend().await;
        let id = store.insert(vec![1.0, 0.0], "db/face.jpg").await.unwrap();

        let source_ref = store.delete(&id).await.unwrap();
        assert_eq!(source_ref, "db/face.jpg");

        let hits = store.query(&[1.0, 0.0], 0.5).await.unwrap();
        assert!(hits.is_empty());

        let err = store.delete(&id).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_not_found() {
        let (store, _) = store_with_backend().await;
        let err = store.delete("nonexistent-id").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_insert_is_never_visible() {
        let (store, backend) = store_with_backend().await;
        store.insert(vec![1.0, 0.0], "db/a.jpg").await.unwrap();

        backend.fail_writes(true);
        let err = store.insert(vec![0.9, 0.1], "db/b.jpg").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Persistence(_)));

        backend.fail_writes(false);
        assert_eq!(store.len().await, 1);
        let hits = store.query(&[0.9, 0.1], 0.5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_ref, "db/a.jpg");
    }

    #[tokio::test]
    async fn failed_delete_leaves_entry_visible() {
        let (store, backend) = store_with_backend().await;
        let id = store.insert(vec![1.0, 0.0], "db/a.jpg").await.unwrap();

        backend.fail_writes(true);
        let err = store.delete(&id).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Persistence(_)));

        backend.fail_writes(false);
        let hits = store.query(&[1.0, 0.0], 0.5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[tokio::test]
    async fn bulk_ingest_skips_absent_embeddings() {
        let (store, _) = store_with_backend().await;
        let report = store
            .bulk_ingest(vec![
                (Some(vec![1.0, 0.0]), "db/a.jpg".to_string()),
                (None, "db/no-face.jpg".to_string()),
                (Some(vec![0.0, 1.0]), "db/b.jpg".to_string()),
            ])
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                ingested: 2,
                skipped: 1
            }
        );
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn bulk_ingest_error_keeps_prior_inserts() {
        let (store, backend) = store_with_backend().await;
        store.insert(vec![1.0, 0.0], "db/seed.jpg").await.unwrap();

        // Second item disagrees with the established dimensionality.
        let err = store
            .bulk_ingest(vec![
                (Some(vec![0.0, 1.0]), "db/ok.jpg".to_string()),
                (Some(vec![1.0, 0.0, 0.0]), "db/bad.jpg".to_string()),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));

        assert_eq!(store.len().await, 2);
        assert_eq!(backend.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_queries_share_the_store() {
        let (store, _) = store_with_backend().await;
        let store = Arc::new(store);
        for i in 0..8 {
            store
                .insert(vec![1.0, i as f32 * 0.1], format!("db/{i}.jpg"))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.query(&[1.0, 0.0], 0.5).await.unwrap()
            }));
        }

        let first = handles.remove(0).await.unwrap();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), first);
        }
    }
}
