use crate::models::QueryWeights;
use crate::services::{QueryVectors, SnapshotEntry};

/// Calculate the cosine similarity between two vectors
///
/// # Returns
/// Similarity in [-1, 1]; 0 when the vectors differ in length or either is zero
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Weighted similarity between a profile's query vectors and one catalog entry
///
/// similarity = task * cos(task) + narrative * cos(narrative) + skills * cos(skills)
///
/// The skills term is skipped when the profile has no skills query; callers
/// pass weights already renormalized for that case. Clamped to [0, 1].
pub fn weighted_similarity(query: &QueryVectors, entry: &SnapshotEntry, weights: &QueryWeights) -> f64 {
    let mut score = weights.task * cosine_similarity(&query.task, &entry.task)
        + weights.narrative * cosine_similarity(&query.narrative, &entry.narrative);

    if let Some(skills) = &query.skills {
        score += weights.skills * cosine_similarity(skills, &entry.skills);
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(task: Vec<f32>, narrative: Vec<f32>, skills: Vec<f32>) -> SnapshotEntry {
        SnapshotEntry {
            slug: "test".to_string(),
            task,
            narrative,
            skills,
        }
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_weighted_similarity_uses_all_three_vectors() {
        let query = QueryVectors {
            task: vec![1.0, 0.0],
            narrative: vec![1.0, 0.0],
            skills: Some(vec![1.0, 0.0]),
        };
        // task matches, narrative orthogonal, skills matches
        let e = entry(vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]);

        let score = weighted_similarity(&query, &e, &QueryWeights::default());
        assert!((score - 0.7).abs() < 1e-9, "expected 0.5 + 0.2, got {}", score);
    }

    #[test]
    fn test_weighted_similarity_without_skills() {
        let query = QueryVectors {
            task: vec![1.0, 0.0],
            narrative: vec![1.0, 0.0],
            skills: None,
        };
        let e = entry(vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]);

        let weights = QueryWeights::default().without_skills();
        let score = weighted_similarity(&query, &e, &weights);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_similarity_clamps_negative() {
        let query = QueryVectors {
            task: vec![1.0, 0.0],
            narrative: vec![1.0, 0.0],
            skills: None,
        };
        let e = entry(vec![-1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 1.0]);

        assert_eq!(weighted_similarity(&query, &e, &QueryWeights::default()), 0.0);
    }
}
