use nalgebra::DVector;
use rayon::prelude::*;

use super::{NeuraDropout, NeuraGradientBuffer, NeuraLayer, NeuraWeightTensor};
use crate::derivable::NeuraActivation;
use crate::err::{NeuraError, NeuraResult};
use crate::initializer::NeuraInitializer;
use crate::optimizer::NeuraOptimizer;

/// Fully connected layer with an optional inverted-dropout policy over its
/// output neurons.
#[derive(Clone, Debug)]
pub struct NeuraDenseLayer {
    weights: NeuraWeightTensor,
    activation: Box<dyn NeuraActivation>,
    dropout: Option<NeuraDropout>,
    learning_rate_override: Option<f32>,
}

impl NeuraDenseLayer {
    pub fn new(
        input_size: usize,
        output_size: usize,
        activation: Box<dyn NeuraActivation>,
    ) -> Self {
        Self {
            weights: NeuraWeightTensor::zeros(input_size, output_size),
            activation,
            dropout: None,
            learning_rate_override: None,
        }
    }

    pub fn with_dropout(mut self, rate: f32, seed: u64) -> Self {
        self.dropout = Some(NeuraDropout::new(rate, self.weights.output_size(), seed));
        self
    }

    /// Makes this layer update with its own learning rate instead of the
    /// optimizer's.
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate_override = Some(learning_rate);
        self
    }

    pub fn weights(&self) -> &NeuraWeightTensor {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut NeuraWeightTensor {
        &mut self.weights
    }

    fn active_dropout(&self, is_training: bool) -> Option<&NeuraDropout> {
        if is_training {
            self.dropout.as_ref()
        } else {
            None
        }
    }
}

impl NeuraLayer for NeuraDenseLayer {
    fn input_size(&self) -> usize {
        self.weights.input_size()
    }

    fn output_size(&self) -> usize {
        self.weights.output_size()
    }

    fn initialize_weights(&mut self, initializer: &mut dyn NeuraInitializer) {
        self.weights.initialize(initializer);
    }

    fn reset_state_before_batch(&mut self) {
        if let Some(dropout) = &mut self.dropout {
            dropout.redraw_mask();
        }
        // Velocity and square-gradient slots restart every mini-batch.
        self.weights.reset_aux();
    }

    fn forward_pass(
        &self,
        input: &DVector<f32>,
        is_training: bool,
    ) -> NeuraResult<(DVector<f32>, DVector<f32>)> {
        let input_size = self.weights.input_size();
        let output_size = self.weights.output_size();
        NeuraError::check_dimensions(input_size, input.len())?;

        let dropout = self.active_dropout(is_training);

        let mut potentials = DVector::zeros(output_size);
        potentials
            .as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, potential)| {
                if let Some(dropout) = dropout {
                    if !dropout.is_kept(i) {
                        return;
                    }
                }

                let row = self.weights.row(i);
                let mut acc = row[0].value;
                for j in 0..input_size {
                    acc += row[j + 1].value * input[j];
                }

                if let Some(dropout) = dropout {
                    acc *= dropout.scale();
                }

                *potential = acc;
            });

        let mut output = self.activation.activate_layer(&potentials);
        let potential_gradients = self.activation.derivative_potentials(&potentials);

        // The activation may map a dropped neuron's zero potential to a
        // nonzero output (sigmoid gives 0.5), so dropped outputs are zeroed
        // after activation.
        if let Some(dropout) = dropout {
            for i in 0..output_size {
                if !dropout.is_kept(i) {
                    output[i] = 0.0;
                }
            }
        }

        Ok((output, potential_gradients))
    }

    fn backpropagation(
        &self,
        top_gradient: &DVector<f32>,
        layer_input: &DVector<f32>,
        potential_gradients: &DVector<f32>,
    ) -> (DVector<f32>, NeuraGradientBuffer) {
        let input_size = self.weights.input_size();
        let output_size = self.weights.output_size();
        debug_assert_eq!(top_gradient.len(), output_size);
        debug_assert_eq!(layer_input.len(), input_size);

        let dropout = self.dropout.as_ref();

        let mut buffer = NeuraGradientBuffer::zeros(input_size, output_size);
        let stride = buffer.stride();
        buffer
            .as_mut_slice()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(i, row)| {
                let mut top = top_gradient[i];
                if let Some(dropout) = dropout {
                    if !dropout.is_kept(i) {
                        return;
                    }
                    top *= dropout.scale();
                }

                let gradient = top * potential_gradients[i];

                row[0] = gradient;
                for j in 1..stride {
                    row[j] = gradient * layer_input[j - 1];
                }
            });

        // Column 0 of each buffer row holds the neuron's delta (zero for
        // dropped neurons), which lets the propagated gradient parallelize
        // over the input index without write contention.
        let mut input_gradient = DVector::zeros(input_size);
        input_gradient
            .as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(j, slot)| {
                let mut acc = 0.0;
                for i in 0..output_size {
                    acc += self.weights.row(i)[j + 1].value * buffer.row(i)[0];
                }
                *slot = acc;
            });

        (input_gradient, buffer)
    }

    fn update_weights(
        &mut self,
        aggregated: &NeuraGradientBuffer,
        optimizer: &mut dyn NeuraOptimizer,
        batch_size: usize,
    ) {
        debug_assert!(batch_size > 0);
        debug_assert_eq!(aggregated.output_size(), self.weights.output_size());

        let scale = 1.0 / batch_size as f32;

        let previous_learning_rate = optimizer.learning_rate();
        if let Some(learning_rate) = self.learning_rate_override {
            optimizer.set_learning_rate(learning_rate);
        }

        for i in 0..self.weights.output_size() {
            let gradients = aggregated.row(i);
            let row = self.weights.row_mut(i);
            for (weight, gradient) in row.iter_mut().zip(gradients) {
                weight.value = optimizer.update_weight(
                    weight.value,
                    gradient * scale,
                    &mut weight.velocity,
                    &mut weight.square_gradient,
                );
            }
        }

        optimizer.set_learning_rate(previous_learning_rate);
    }
}
