//! Cosine similarity between embedding vectors

use crate::error::{RelativityError, Result};

/// Cosine similarity of two equal-length vectors.
///
/// Accumulates in `f64`. A zero-magnitude side (the default for empty text)
/// yields `0.0` instead of dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(RelativityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot_product = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if !(dot_product.is_finite() && norm_a.is_finite() && norm_b.is_finite()) {
        return Err(RelativityError::NonFiniteScore(
            "embedding contains NaN or infinite components".to_string(),
        ));
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = dot_product / (norm_a.sqrt() * norm_b.sqrt());
    Ok(score.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_self_similarity_is_one() {
        let v: Vec<f32> = vec![0.3, -1.2, 4.0, 0.05];
        let score = cosine_similarity(&v, &v).unwrap();
        assert!((score - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_opposite_vectors() {
        let v: Vec<f32> = vec![1.0, 2.0, -3.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        let score = cosine_similarity(&v, &neg).unwrap();
        assert!((score + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_symmetric() {
        let a: Vec<f32> = vec![0.1, 0.7, 0.2];
        let b: Vec<f32> = vec![0.9, -0.4, 0.3];
        assert_eq!(
            cosine_similarity(&a, &b).unwrap(),
            cosine_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let zero: Vec<f32> = vec![0.0; 4];
        let v: Vec<f32> = vec![1.0, 0.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &v).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&v, &zero).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let score = cosine_similarity(&[1.0, 0.0], &[0.0, 5.0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, RelativityError::DimensionMismatch { left: 2, right: 3 }));
    }

    #[test]
    fn test_nan_component_is_an_error() {
        let err = cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, RelativityError::NonFiniteScore(_)));
    }
}
