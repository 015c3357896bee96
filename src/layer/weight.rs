//! Weight storage and gradient buffers for fully connected layers.

use crate::initializer::NeuraInitializer;

/// One weight together with its optimizer auxiliary slots.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NeuraWeight {
    pub value: f32,
    pub velocity: f32,
    pub square_gradient: f32,
}

/// Flat array-of-structs weight storage. One row per output neuron, each row
/// `input_size + 1` wide with the bias in column 0.
#[derive(Clone, Debug)]
pub struct NeuraWeightTensor {
    weights: Vec<NeuraWeight>,
    output_size: usize,
    stride: usize,
}

impl NeuraWeightTensor {
    pub fn zeros(input_size: usize, output_size: usize) -> Self {
        let stride = input_size + 1;
        Self {
            weights: vec![NeuraWeight::default(); output_size * stride],
            output_size,
            stride,
        }
    }

    pub fn input_size(&self) -> usize {
        self.stride - 1
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    #[inline]
    pub fn row(&self, neuron: usize) -> &[NeuraWeight] {
        &self.weights[neuron * self.stride..(neuron + 1) * self.stride]
    }

    #[inline]
    pub fn row_mut(&mut self, neuron: usize) -> &mut [NeuraWeight] {
        &mut self.weights[neuron * self.stride..(neuron + 1) * self.stride]
    }

    /// Draws a fresh value for every weight, biases included. Velocity and
    /// square-gradient slots are left at zero.
    pub fn initialize(&mut self, initializer: &mut dyn NeuraInitializer) {
        let fan_in = self.input_size();
        let fan_out = self.output_size;

        for weight in &mut self.weights {
            weight.value = initializer.initial_weight(fan_in, fan_out);
            weight.velocity = 0.0;
            weight.square_gradient = 0.0;
        }
    }

    /// Zeroes both auxiliary slots of every weight, keeping the values.
    pub fn reset_aux(&mut self) {
        for weight in &mut self.weights {
            weight.velocity = 0.0;
            weight.square_gradient = 0.0;
        }
    }
}

/// Accumulated loss gradients for one layer, in the same `[output][input + 1]`
/// geometry as the weight tensor (bias gradient in column 0).
#[derive(Clone, Debug)]
pub struct NeuraGradientBuffer {
    values: Vec<f32>,
    output_size: usize,
    stride: usize,
}

impl NeuraGradientBuffer {
    pub fn zeros(input_size: usize, output_size: usize) -> Self {
        let stride = input_size + 1;
        Self {
            values: vec![0.0; output_size * stride],
            output_size,
            stride,
        }
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn row(&self, neuron: usize) -> &[f32] {
        &self.values[neuron * self.stride..(neuron + 1) * self.stride]
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Elementwise accumulation of another buffer of the same geometry.
    pub fn add_assign(&mut self, other: &NeuraGradientBuffer) {
        debug_assert_eq!(self.values.len(), other.values.len());

        for (sum, value) in self.values.iter_mut().zip(other.values.iter()) {
            *sum += value;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::initializer::RandomValue;

    #[test]
    fn test_geometry() {
        let tensor = NeuraWeightTensor::zeros(3, 2);

        assert_eq!(tensor.input_size(), 3);
        assert_eq!(tensor.output_size(), 2);
        assert_eq!(tensor.row(0).len(), 4);
        assert_eq!(tensor.row(1).len(), 4);
    }

    #[test]
    fn test_initialize_touches_every_value_and_no_aux() {
        let mut tensor = NeuraWeightTensor::zeros(4, 3);
        let mut initializer = RandomValue::new(42);
        tensor.initialize(&mut initializer);

        for i in 0..3 {
            for weight in tensor.row(i) {
                assert_eq!(weight.velocity, 0.0);
                assert_eq!(weight.square_gradient, 0.0);
            }
        }
        let nonzero = (0..3)
            .flat_map(|i| tensor.row(i).iter())
            .filter(|w| w.value != 0.0)
            .count();
        assert!(nonzero > 0);
    }

    #[test]
    fn test_reset_aux_keeps_values() {
        let mut tensor = NeuraWeightTensor::zeros(1, 1);
        tensor.row_mut(0)[0] = NeuraWeight {
            value: 0.25,
            velocity: 3.0,
            square_gradient: 4.0,
        };

        tensor.reset_aux();

        assert_eq!(tensor.row(0)[0].value, 0.25);
        assert_eq!(tensor.row(0)[0].velocity, 0.0);
        assert_eq!(tensor.row(0)[0].square_gradient, 0.0);
    }

    #[test]
    fn test_gradient_buffer_accumulation() {
        let mut sum = NeuraGradientBuffer::zeros(1, 2);
        let mut other = NeuraGradientBuffer::zeros(1, 2);
        other.as_mut_slice()[0] = 1.0;
        other.as_mut_slice()[3] = 2.0;

        sum.add_assign(&other);
        sum.add_assign(&other);

        assert_eq!(sum.row(0), &[2.0, 0.0]);
        assert_eq!(sum.row(1), &[0.0, 4.0]);
    }
}
