use crate::error::VecError;

/// Dot product with f64 accumulation.
///
/// On L2-normalized inputs this is the cosine similarity. Returns 0.0 on
/// dimension mismatch.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut acc: f64 = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        acc += (*x as f64) * (*y as f64);
    }
    acc as f32
}

/// Scales `v` in place to unit L2 norm.
///
/// Zero vectors are left untouched, so they keep similarity 0 with
/// everything.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return;
    }
    let scale = 1.0 / norm;
    for x in v.iter_mut() {
        *x = ((*x as f64) * scale) as f32;
    }
}

/// Returns an L2-normalized copy of `v`.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    l2_normalize(&mut out);
    out
}

/// Compute the cosine similarity between two vectors of any norm.
///
/// Returns a value in `[-1, 1]`. Zero vectors and dimension mismatches
/// yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        let ai = *x as f64;
        let bi = *y as f64;
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    // Clamp to [-1, 1] to handle floating point errors.
    similarity.clamp(-1.0, 1.0) as f32
}

/// Checks that `v` is a usable embedding of dimension `dim`.
pub fn validate(v: &[f32], dim: usize) -> Result<(), VecError> {
    if v.is_empty() {
        return Err(VecError::EmptyVector);
    }
    if v.len() != dim {
        return Err(VecError::DimensionMismatch {
            got: v.len(),
            want: dim,
        });
    }
    if let Some(index) = v.iter().position(|x| !x.is_finite()) {
        return Err(VecError::NonFinite { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        let s = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((s - 1.0).abs() < 0.001, "identical: got {s}");
    }

    #[test]
    fn test_orthogonal() {
        let s = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(s.abs() < 0.001, "orthogonal: got {s}");
    }

    #[test]
    fn test_opposite() {
        let s = cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]);
        assert!((s + 1.0).abs() < 0.001, "opposite: got {s}");
    }

    #[test]
    fn test_dimension_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(dot(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);

        let mut z = [0.0f32; 3];
        l2_normalize(&mut z);
        assert_eq!(z, [0.0, 0.0, 0.0]);
        assert_eq!(dot(&z, &normalized(&[3.0, 4.0, 0.0])), 0.0);
    }

    #[test]
    fn test_normalized_self_similarity() {
        let samples: [&[f32]; 4] = [
            &[3.0, 4.0],
            &[1e-6, -2e-6, 5e-7],
            &[1200.0, -33.5, 0.25, 7.0],
            &[-1.0, -1.0, -1.0, -1.0, -1.0],
        ];
        for v in samples {
            let n = normalized(v);
            let s = dot(&n, &n);
            assert!((s - 1.0).abs() < 1e-3, "{v:?}: self similarity {s}");
            assert!((dot(&n, &n) - cosine_similarity(v, v)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_validate() {
        assert!(validate(&[1.0, 2.0], 2).is_ok());
        assert!(matches!(validate(&[], 2), Err(VecError::EmptyVector)));
        assert!(matches!(
            validate(&[1.0], 2),
            Err(VecError::DimensionMismatch { got: 1, want: 2 })
        ));
        assert!(matches!(
            validate(&[1.0, f32::NAN], 2),
            Err(VecError::NonFinite { index: 1 })
        ));
        assert!(matches!(
            validate(&[f32::INFINITY, 0.0], 2),
            Err(VecError::NonFinite { index: 0 })
        ));
    }
}
