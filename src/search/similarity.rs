//! Exact cosine ranking.

/// Cosine similarity in `[-1, 1]`.
///
/// Returns `0.0` for empty vectors, mismatched lengths or a zero norm, so one
/// malformed stored vector ranks last instead of failing the whole query.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// `1 - similarity`; lower is closer.
pub fn distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Order `(distance, item)` pairs ascending and keep the first `top_k`.
///
/// The sort is stable: equal distances keep their input order.
pub fn rank_by_distance<T>(mut scored: Vec<(f32, T)>, top_k: usize) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(top_k);
    scored
}
