mod dense;
pub use dense::NeuraDenseLayer;

mod dropout;
pub use dropout::NeuraDropout;

mod weight;
pub use weight::{NeuraGradientBuffer, NeuraWeight, NeuraWeightTensor};

use dyn_clone::DynClone;
use nalgebra::DVector;

use crate::err::NeuraResult;
use crate::initializer::NeuraInitializer;
use crate::optimizer::NeuraOptimizer;

/// A trainable layer of the network.
///
/// Forward and backward passes take `&self` so a mini-batch can evaluate many
/// examples in parallel against shared weights; all mutation happens in the
/// sequential `reset_state_before_batch` and `update_weights` phases.
pub trait NeuraLayer: DynClone + Send + Sync + std::fmt::Debug {
    fn input_size(&self) -> usize;

    fn output_size(&self) -> usize;

    fn initialize_weights(&mut self, initializer: &mut dyn NeuraInitializer);

    /// Runs once per mini-batch, before any example of that batch: redraws
    /// the dropout mask and zeroes the optimizer auxiliary slots.
    fn reset_state_before_batch(&mut self);

    /// Returns the layer output together with the activation derivatives at
    /// the pre-activation potentials, which backpropagation consumes.
    fn forward_pass(
        &self,
        input: &DVector<f32>,
        is_training: bool,
    ) -> NeuraResult<(DVector<f32>, DVector<f32>)>;

    /// Returns the gradient with respect to the layer input and the
    /// per-weight gradient buffer for this example.
    fn backpropagation(
        &self,
        top_gradient: &DVector<f32>,
        layer_input: &DVector<f32>,
        potential_gradients: &DVector<f32>,
    ) -> (DVector<f32>, NeuraGradientBuffer);

    /// Applies one optimizer step per weight. `aggregated` holds the summed
    /// per-example gradients; the `1 / batch_size` averaging happens here, as
    /// each gradient is handed to the optimizer.
    fn update_weights(
        &mut self,
        aggregated: &NeuraGradientBuffer,
        optimizer: &mut dyn NeuraOptimizer,
        batch_size: usize,
    );
}

dyn_clone::clone_trait_object!(NeuraLayer);
