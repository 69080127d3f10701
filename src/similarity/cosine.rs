//! Cosine similarity over sparse frequency vectors.

use std::hash::Hash;

use super::vector::FrequencyVector;

/// Compute cosine similarity between two frequency vectors.
///
/// Shared tokens contribute to the dot product; every token contributes its
/// squared count to its own vector's norm. Returns 0.0 when either vector is
/// empty instead of dividing by zero. All counts are non-negative, so the
/// result lies in [0.0, 1.0].
pub fn cosine<T: Eq + Hash>(v1: &FrequencyVector<T>, v2: &FrequencyVector<T>) -> f64 {
    let norm1 = v1.squared_norm();
    let norm2 = v2.squared_norm();
    if norm1 == 0 || norm2 == 0 {
        return 0.0;
    }

    // iterate the smaller side, the dot product only needs shared tokens
    let (small, large) = if v1.len() <= v2.len() { (v1, v2) } else { (v2, v1) };
    let dot: u64 = small
        .iter()
        .map(|(token, count)| count * large.get(token))
        .sum();

    // sqrt(n1 * n2) keeps score(v, v) exactly 1.0
    let denominator = (norm1 as f64 * norm2 as f64).sqrt();
    (dot as f64 / denominator).clamp(0.0, 1.0)
}
