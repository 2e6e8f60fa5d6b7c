//! # Visage Server
//!
//! HTTP transport over the face vector store: thin glue that validates
//! requests, drives the embedder, and maps store errors to stable status
//! codes. The store itself never touches image files; this layer owns their
//! lifecycle, keyed off the `source_ref` the store returns.
//!
//! Endpoints:
//!
//! | Route           | Method | Purpose                                  |
//! |-----------------|--------|------------------------------------------|
//! | `/search`       | POST   | similarity search over registered faces  |
//! | `/upload`       | POST   | register a new face image                |
//! | `/remove-image` | POST   | delete a face by id (and its image file) |
//! | `/create-db`    | POST   | bulk-ingest the image directory          |
//! | `/health`       | GET    | liveness probe                           |

mod ingest;
mod routes;
mod state;

pub use ingest::{ingest_directory, IngestError};
pub use routes::{router, DEFAULT_THRESHOLD};
pub use state::AppState;
