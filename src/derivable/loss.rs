use nalgebra::DVector;

use super::NeuraLoss;
use crate::err::{NeuraError, NeuraResult};

/// `0.5 * mean((predicted - expected)^2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanSquaredError;

impl NeuraLoss for MeanSquaredError {
    fn eval(&self, predicted: &DVector<f32>, expected: &DVector<f32>) -> NeuraResult<f32> {
        NeuraError::check_dimensions(expected.len(), predicted.len())?;

        if predicted.is_empty() {
            return Ok(0.0);
        }

        let sum_squared: f32 = predicted
            .iter()
            .zip(expected.iter())
            .map(|(p, e)| (p - e) * (p - e))
            .sum();

        Ok(0.5 * sum_squared / predicted.len() as f32)
    }

    fn nabla(
        &self,
        predicted: &DVector<f32>,
        expected: &DVector<f32>,
    ) -> NeuraResult<DVector<f32>> {
        NeuraError::check_dimensions(expected.len(), predicted.len())?;

        if predicted.is_empty() {
            return Ok(DVector::zeros(0));
        }

        let scale = 1.0 / predicted.len() as f32;
        Ok(DVector::from_fn(predicted.len(), |i, _| {
            (predicted[i] - expected[i]) * scale
        }))
    }
}

/// `-Σ expected_i * ln(predicted_i + ε)`, with ε keeping the logarithm away
/// from zero probabilities.
///
/// The `p - e` gradient assumes the predictions come out of a
/// [`super::activation::Softmax`] output layer; that pairing is a caller
/// contract, not something this type detects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossEntropy;

impl CrossEntropy {
    const EPSILON: f32 = 1e-8;
}

impl NeuraLoss for CrossEntropy {
    fn eval(&self, predicted: &DVector<f32>, expected: &DVector<f32>) -> NeuraResult<f32> {
        NeuraError::check_dimensions(expected.len(), predicted.len())?;

        Ok(-predicted
            .iter()
            .zip(expected.iter())
            .map(|(p, e)| e * (p + Self::EPSILON).ln())
            .sum::<f32>())
    }

    fn nabla(
        &self,
        predicted: &DVector<f32>,
        expected: &DVector<f32>,
    ) -> NeuraResult<DVector<f32>> {
        NeuraError::check_dimensions(expected.len(), predicted.len())?;

        Ok(predicted - expected)
    }
}

#[cfg(test)]
mod test {
    use nalgebra::dvector;

    use super::*;
    use crate::assert_approx;

    #[test]
    fn test_mse_eval() {
        let loss = MeanSquaredError;

        assert_eq!(
            loss.eval(&dvector![1.0], &dvector![1.0]).unwrap(),
            0.0
        );
        assert_approx!(
            loss.eval(&dvector![0.0], &dvector![1.0]).unwrap(),
            0.5,
            1e-6
        );
        assert_approx!(
            loss.eval(&dvector![1.0, 2.0, 2.0], &dvector![1.0, 2.0, 3.0])
                .unwrap(),
            0.5 / 3.0,
            1e-6
        );
    }

    #[test]
    fn test_mse_eval_empty_is_zero() {
        let loss = MeanSquaredError;
        assert_eq!(
            loss.eval(&DVector::zeros(0), &DVector::zeros(0)).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_mse_nabla() {
        let loss = MeanSquaredError;
        let nabla = loss
            .nabla(&dvector![1.0, 2.0, 2.0], &dvector![1.0, 2.0, 3.0])
            .unwrap();

        assert_eq!(nabla[0], 0.0);
        assert_eq!(nabla[1], 0.0);
        assert_approx!(nabla[2], -1.0 / 3.0, 1e-6);
    }

    #[test]
    fn test_mse_dimension_mismatch() {
        let loss = MeanSquaredError;
        assert!(loss.eval(&dvector![1.0, 2.0], &dvector![1.0]).is_err());
        assert!(loss.nabla(&dvector![1.0], &dvector![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_cross_entropy_eval() {
        let loss = CrossEntropy;
        let value = loss
            .eval(&dvector![0.1, 0.2, 0.7], &dvector![0.0, 0.0, 1.0])
            .unwrap();

        assert_approx!(value, -(0.7f32 + 1e-8).ln(), 1e-6);
    }

    #[test]
    fn test_cross_entropy_zero_probability_stays_finite() {
        let loss = CrossEntropy;
        let value = loss
            .eval(&dvector![0.0, 1.0], &dvector![1.0, 0.0])
            .unwrap();

        assert!(value.is_finite());
    }

    #[test]
    fn test_cross_entropy_nabla() {
        let loss = CrossEntropy;
        let nabla = loss
            .nabla(&dvector![0.1, 0.2, 0.7], &dvector![0.0, 0.0, 1.0])
            .unwrap();

        assert_approx!(nabla[0], 0.1, 1e-6);
        assert_approx!(nabla[1], 0.2, 1e-6);
        assert_approx!(nabla[2], -0.3, 1e-6);
    }
}
