//! Network assembly, inference and mini-batch training.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::derivable::NeuraLoss;
use crate::err::{NeuraError, NeuraResult};
use crate::initializer::NeuraInitializer;
use crate::layer::{NeuraGradientBuffer, NeuraLayer};
use crate::optimizer::NeuraOptimizer;

/// Invoked after every epoch with the network and the zero-based epoch index.
/// The network is borrowed immutably, so the callback can run [`NeuraNetwork::test`]
/// mid-training.
pub type NeuraEpochCallback = Box<dyn FnMut(&NeuraNetwork, usize) + Send>;

/// Everything one forward pass captures for the backward pass: the final
/// prediction, each layer's input, and each layer's activation derivatives.
pub struct NeuraForwardTrace {
    pub prediction: DVector<f32>,
    layer_inputs: Vec<DVector<f32>>,
    potential_gradients: Vec<DVector<f32>>,
}

pub struct NeuraNetwork {
    layers: Vec<Box<dyn NeuraLayer>>,
    loss: Box<dyn NeuraLoss>,
    initializer: Box<dyn NeuraInitializer>,
    optimizer: Box<dyn NeuraOptimizer>,
    rng: StdRng,
    on_epoch_end: Option<NeuraEpochCallback>,
}

impl std::fmt::Debug for NeuraNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuraNetwork")
            .field("layers", &self.layers)
            .field("loss", &self.loss)
            .field("initializer", &self.initializer)
            .field("optimizer", &self.optimizer)
            .field("on_epoch_end", &self.on_epoch_end.is_some())
            .finish()
    }
}

impl NeuraNetwork {
    pub fn new(
        loss: Box<dyn NeuraLoss>,
        initializer: Box<dyn NeuraInitializer>,
        optimizer: Box<dyn NeuraOptimizer>,
        shuffle_seed: u64,
    ) -> Self {
        Self {
            layers: Vec::new(),
            loss,
            initializer,
            optimizer,
            rng: StdRng::seed_from_u64(shuffle_seed),
            on_epoch_end: None,
        }
    }

    /// Appends a layer, checking that its input size matches the previous
    /// layer's output size.
    pub fn add_layer(&mut self, layer: Box<dyn NeuraLayer>) -> NeuraResult<()> {
        if let Some(last) = self.layers.last() {
            if last.output_size() != layer.input_size() {
                return Err(NeuraError::LayerChainMismatch {
                    expected: last.output_size(),
                    found: layer.input_size(),
                });
            }
        }

        self.layers.push(layer);
        Ok(())
    }

    pub fn on_epoch_end(&mut self, callback: impl FnMut(&NeuraNetwork, usize) + Send + 'static) {
        self.on_epoch_end = Some(Box::new(callback));
    }

    pub fn loss(&self) -> &dyn NeuraLoss {
        self.loss.as_ref()
    }

    pub fn layers(&self) -> &[Box<dyn NeuraLayer>] {
        &self.layers
    }

    pub fn initialize_weights(&mut self) {
        for layer in &mut self.layers {
            layer.initialize_weights(self.initializer.as_mut());
        }
    }

    /// Threads `input` through every layer, capturing what backpropagation
    /// needs.
    pub fn forward_propagate(
        &self,
        input: &DVector<f32>,
        is_training: bool,
    ) -> NeuraResult<NeuraForwardTrace> {
        forward_through(&self.layers, input, is_training)
    }

    /// Walks the layers in reverse from the loss gradient, returning one
    /// gradient buffer per layer, in layer order.
    pub fn back_propagate(
        &self,
        trace: &NeuraForwardTrace,
        expected: &DVector<f32>,
    ) -> NeuraResult<Vec<NeuraGradientBuffer>> {
        backward_through(&self.layers, self.loss.as_ref(), trace, expected)
    }

    /// Inference on a single input, dropout disabled.
    pub fn evaluate(&self, input: &DVector<f32>) -> NeuraResult<DVector<f32>> {
        Ok(self.forward_propagate(input, false)?.prediction)
    }

    /// Inference over a whole set, in input order.
    pub fn test(&self, inputs: &[DVector<f32>]) -> NeuraResult<Vec<DVector<f32>>> {
        let layers = &self.layers;
        inputs
            .par_iter()
            .map(|input| Ok(forward_through(layers, input, false)?.prediction))
            .collect()
    }

    /// Mini-batch gradient descent over the whole dataset.
    ///
    /// Each epoch walks `ceil(n / mini_batch_size)` batches whose indices
    /// cycle through the (shuffled) dataset, wrapping around instead of
    /// truncating the final batch. Per-example gradients are computed in
    /// parallel against shared read-only weights, summed, and applied in one
    /// sequential sweep per batch.
    pub fn train(
        &mut self,
        inputs: &[DVector<f32>],
        expected: &[DVector<f32>],
        max_epochs: usize,
        mini_batch_size: usize,
        shuffle_each_epoch: bool,
    ) -> NeuraResult<()> {
        if inputs.is_empty() {
            return Err(NeuraError::EmptyDataset);
        }
        if inputs.len() != expected.len() {
            return Err(NeuraError::UnpairedDataset {
                inputs: inputs.len(),
                expected: expected.len(),
            });
        }
        if mini_batch_size == 0 {
            return Err(NeuraError::EmptyMiniBatch);
        }

        let total = inputs.len();
        let runs_per_epoch = (total + mini_batch_size - 1) / mini_batch_size;
        log::info!(
            "training on {} examples, {} epochs, batch size {} ({} runs per epoch)",
            total,
            max_epochs,
            mini_batch_size,
            runs_per_epoch
        );

        let mut order: Vec<usize> = (0..total).collect();

        for epoch in 0..max_epochs {
            if shuffle_each_epoch {
                order.shuffle(&mut self.rng);
            }

            for run in 0..runs_per_epoch {
                self.train_mini_batch(inputs, expected, &order, run, mini_batch_size)?;
            }

            log::debug!("epoch {}/{} done", epoch + 1, max_epochs);

            // Taken out of the struct for the call so the callback may borrow
            // the network immutably.
            if let Some(mut callback) = self.on_epoch_end.take() {
                callback(self, epoch);
                self.on_epoch_end = Some(callback);
            }
        }

        log::info!("training finished after {} epochs", max_epochs);
        Ok(())
    }

    fn train_mini_batch(
        &mut self,
        inputs: &[DVector<f32>],
        expected: &[DVector<f32>],
        order: &[usize],
        run: usize,
        mini_batch_size: usize,
    ) -> NeuraResult<()> {
        for layer in &mut self.layers {
            layer.reset_state_before_batch();
        }

        let batch: Vec<usize> = batch_indices(run, mini_batch_size, order.len())
            .map(|k| order[k])
            .collect();

        let layers = &self.layers;
        let loss = self.loss.as_ref();
        let per_example: Vec<Vec<NeuraGradientBuffer>> = batch
            .par_iter()
            .map(|&example| {
                let trace = forward_through(layers, &inputs[example], true)?;
                backward_through(layers, loss, &trace, &expected[example])
            })
            .collect::<NeuraResult<_>>()?;

        let mut per_example = per_example.into_iter();
        let mut aggregated = per_example.next().ok_or(NeuraError::EmptyMiniBatch)?;
        for buffers in per_example {
            for (sum, buffer) in aggregated.iter_mut().zip(buffers.iter()) {
                sum.add_assign(buffer);
            }
        }

        self.optimizer.advance_step();
        let batch_size = batch.len();
        for (layer, buffer) in self.layers.iter_mut().zip(aggregated.iter()) {
            layer.update_weights(buffer, self.optimizer.as_mut(), batch_size);
        }

        Ok(())
    }
}

/// Indices drawn by mini-batch `run`, cycling through `0..total` so the last
/// batch of an epoch wraps around instead of coming up short.
fn batch_indices(run: usize, mini_batch_size: usize, total: usize) -> impl Iterator<Item = usize> {
    (0..mini_batch_size).map(move |k| (run * mini_batch_size + k) % total)
}

fn forward_through(
    layers: &[Box<dyn NeuraLayer>],
    input: &DVector<f32>,
    is_training: bool,
) -> NeuraResult<NeuraForwardTrace> {
    let mut layer_inputs = Vec::with_capacity(layers.len());
    let mut potential_gradients = Vec::with_capacity(layers.len());

    let mut current = input.clone();
    for layer in layers {
        let (output, gradients) = layer.forward_pass(&current, is_training)?;
        layer_inputs.push(std::mem::replace(&mut current, output));
        potential_gradients.push(gradients);
    }

    Ok(NeuraForwardTrace {
        prediction: current,
        layer_inputs,
        potential_gradients,
    })
}

fn backward_through(
    layers: &[Box<dyn NeuraLayer>],
    loss: &dyn NeuraLoss,
    trace: &NeuraForwardTrace,
    expected: &DVector<f32>,
) -> NeuraResult<Vec<NeuraGradientBuffer>> {
    let mut gradient = loss.nabla(&trace.prediction, expected)?;

    let mut buffers = Vec::with_capacity(layers.len());
    for (i, layer) in layers.iter().enumerate().rev() {
        let (input_gradient, buffer) = layer.backpropagation(
            &gradient,
            &trace.layer_inputs[i],
            &trace.potential_gradients[i],
        );
        gradient = input_gradient;
        buffers.push(buffer);
    }

    buffers.reverse();
    Ok(buffers)
}
