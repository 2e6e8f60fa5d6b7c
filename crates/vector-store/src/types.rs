use serde::{Deserialize, Serialize};

/// One stored (id, embedding, source path) record.
///
/// `seq` is the insertion sequence number; it backs the "earlier-inserted
/// first" ranking tie-break and survives restarts. Ids are opaque and never
/// reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceEntry {
    pub seq: u64,
    pub id: String,
    pub embedding: Vec<f32>,
    pub source_ref: String,
}

/// One ranked query hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub id: String,
    pub source_ref: String,
    pub similarity: f32,
}

/// Outcome of a bulk ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub ingested: usize,
    pub skipped: usize,
}
