//! # Visage Embedder
//!
//! The contract between the face-embedding generator and the rest of the
//! system. The store only cares that an embedder turns image bytes into a
//! fixed-length vector or reports "no face found"; which model produces the
//! vector is irrelevant to it.
//!
//! Ships with [`StubEmbedder`], a deterministic hash-seeded backend that
//! keeps the whole service runnable and testable without any model assets.

mod stub;

use async_trait::async_trait;
use thiserror::Error;

pub use stub::StubEmbedder;

pub type Result<T> = std::result::Result<T, EmbedderError>;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("Embedding failed: {0}")]
    Backend(String),
}

/// Face-embedding generator seam.
///
/// `embed` returns `Ok(None)` when no face can be located in the image;
/// callers decide whether that is a rejection (single upload) or a skip
/// (bulk ingest). All vectors from one embedder share `dimension()`.
#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, image: &[u8]) -> Result<Option<Vec<f32>>>;
}
