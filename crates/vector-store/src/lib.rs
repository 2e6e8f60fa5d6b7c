//! # Visage Vector Store
//!
//! Durable storage and cosine-similarity search for face embeddings.
//!
//! ## Architecture
//!
//! ```text
//! embedding (from the face embedder)
//!     │
//!     ├──> VectorStore ── insert / query / delete / bulk_ingest
//!     │        │
//!     │        ├──> similarity ranking (full scan, strict threshold)
//!     │        │
//!     │        └──> VectorBackend (durable engine)
//!     │                 ├─> JsonFileBackend (atomic JSON file)
//!     │                 └─> MemoryBackend (tests)
//! ```
//!
//! The store assigns opaque ids, enforces a single embedding dimensionality
//! per collection, and completes every durable write before the change
//! becomes visible to queries.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use visage_vector_store::{JsonFileBackend, VectorStore};
//!
//! #[tokio::main]
//! async fn main() -> visage_vector_store::Result<()> {
//!     let backend = Arc::new(JsonFileBackend::new("faces.json"));
//!     let store = VectorStore::open(backend).await?;
//!
//!     let id = store.insert(vec![0.1, 0.9, 0.2], "db/alice.jpg").await?;
//!     let matches = store.query(&[0.1, 0.9, 0.2], 0.6).await?;
//!     for hit in matches {
//!         println!("{}: {:.3}", hit.source_ref, hit.similarity);
//!     }
//!
//!     let removed_path = store.delete(&id).await?;
//!     println!("removed {removed_path}");
//!     Ok(())
//! }
//! ```

mod backend;
mod error;
mod similarity;
mod store;
mod types;

pub use backend::{JsonFileBackend, MemoryBackend, VectorBackend, COLLECTION_SCHEMA_VERSION};
pub use error::{Result, VectorStoreError};
pub use similarity::{cosine_similarity, rank_and_filter};
pub use store::VectorStore;
pub use types::{FaceEntry, FaceMatch, IngestReport};
