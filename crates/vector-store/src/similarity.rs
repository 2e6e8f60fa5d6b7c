use crate::error::{Result, VectorStoreError};
use crate::types::{FaceEntry, FaceMatch};
use std::cmp::Ordering;

/// Cosine similarity between two vectors, in [-1.0, 1.0].
///
/// Fails with `ZeroNormVector` when either vector has zero magnitude; the
/// ratio is undefined there and the caller decides what a degenerate vector
/// means.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(VectorStoreError::ZeroNormVector);
    }

    Ok(dot / (norm_a * norm_b))
}

/// Scores every candidate against `query`, keeps those strictly above
/// `threshold`, and returns them sorted by similarity descending.
///
/// Ties are broken by insertion sequence (earlier entry first), so the
/// output is identical for any candidate iteration order. Candidates whose
/// stored embedding has zero norm are treated as "no match" rather than
/// failing the whole scan.
pub fn rank_and_filter(query: &[f32], candidates: &[FaceEntry], threshold: f32) -> Vec<FaceMatch> {
    let mut hits: Vec<(u64, FaceMatch)> = Vec::new();

    for entry in candidates {
        let Ok(similarity) = cosine_similarity(query, &entry.embedding) else {
            continue;
        };
        if similarity > threshold {
            hits.push((
                entry.seq,
                FaceMatch {
                    id: entry.id.clone(),
                    source_ref: entry.source_ref.clone(),
                    similarity,
                },
            ));
        }
    }

    hits.sort_by(|(seq_a, a), (seq_b, b)| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| seq_a.cmp(seq_b))
    });

    hits.into_iter().map(|(_, hit)| hit).collect()
}
