pub mod activation;
pub mod loss;

use dyn_clone::DynClone;
use nalgebra::DVector;

use crate::err::NeuraResult;

/// An activation function applied to a whole layer at once.
///
/// The vector-level contract lets activations that couple neurons together
/// (like [`activation::Softmax`]) see every potential of the layer, while
/// elementwise activations simply map over the vector.
pub trait NeuraActivation: DynClone + Send + Sync + std::fmt::Debug {
    /// Maps the pre-activation potentials of a layer to its outputs.
    fn activate_layer(&self, potentials: &DVector<f32>) -> DVector<f32>;

    /// Derivative of the activation with respect to each pre-activation
    /// potential, evaluated at `potentials`.
    fn derivative_potentials(&self, potentials: &DVector<f32>) -> DVector<f32>;
}

dyn_clone::clone_trait_object!(NeuraActivation);

/// A loss function between a predicted vector and an expected vector.
pub trait NeuraLoss: DynClone + Send + Sync + std::fmt::Debug {
    fn eval(&self, predicted: &DVector<f32>, expected: &DVector<f32>) -> NeuraResult<f32>;

    /// Gradient of the loss with respect to `predicted`.
    fn nabla(
        &self,
        predicted: &DVector<f32>,
        expected: &DVector<f32>,
    ) -> NeuraResult<DVector<f32>>;
}

dyn_clone::clone_trait_object!(NeuraLoss);
