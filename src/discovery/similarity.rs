use crate::errors::DiscoveryError;

/// Cosine similarity of two embeddings.
///
/// Zero-norm vectors have similarity 0. Vectors of different lengths are an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, DiscoveryError> {
    if a.len() != b.len() {
        return Err(DiscoveryError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
