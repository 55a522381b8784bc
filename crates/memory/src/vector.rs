//! Cosine similarity for the in-memory adapter's embedding search.
//!
//! Real deployments delegate vector math to the storage collaborator; this
//! exists so the in-memory adapter can honor the search contract in tests
//! and ephemeral sessions.

use loreweave_core::memory::Memory;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]. Returns 0.0 if either vector is empty, zero,
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank memories by cosine similarity to a query embedding.
///
/// Memories without embeddings are skipped; results below `threshold` are
/// excluded; output is sorted by descending similarity and truncated to
/// `count`.
pub fn rank_by_similarity(
    memories: &[Memory],
    query: &[f32],
    threshold: f32,
    count: usize,
) -> Vec<Memory> {
    let mut scored: Vec<(f32, Memory)> = memories
        .iter()
        .filter_map(|m| {
            let embedding = m.embedding.as_ref()?;
            let sim = cosine_similarity(embedding, query);
            (sim >= threshold).then(|| (sim, m.clone()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(count);
    scored.into_iter().map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loreweave_core::memory::Content;
    use uuid::Uuid;

    fn memory(text: &str, embedding: Option<Vec<f32>>) -> Memory {
        let mut m = Memory::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Content::from_text(text),
        );
        m.embedding = embedding;
        m
    }

    #[test]
    fn identical_vectors_are_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_are_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn ranking_orders_and_truncates() {
        let memories = vec![
            memory("orthogonal", Some(vec![0.0, 1.0])),
            memory("exact", Some(vec![1.0, 0.0])),
            memory("partial", Some(vec![1.0, 1.0])),
            memory("no embedding", None),
        ];
        let hits = rank_by_similarity(&memories, &[1.0, 0.0], 0.1, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content.text, "exact");
        assert_eq!(hits[1].content.text, "partial");
    }

    #[test]
    fn threshold_excludes_weak_matches() {
        let memories = vec![
            memory("strong", Some(vec![1.0, 0.0])),
            memory("weak", Some(vec![0.0, 1.0])),
        ];
        let hits = rank_by_similarity(&memories, &[1.0, 0.0], 0.5, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content.text, "strong");
    }
}
