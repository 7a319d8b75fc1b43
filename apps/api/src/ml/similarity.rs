use ndarray::ArrayView1;

/// Cosine similarity of two equal-length vectors.
///
/// A zero vector is treated as orthogonal to everything and scores `0.0`.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let dot = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rounds a score to four decimal places for presentation.
pub fn round_score(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}
