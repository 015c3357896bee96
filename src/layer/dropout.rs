use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Inverted-dropout policy over the output neurons of a dense layer.
///
/// The mask is redrawn once per mini-batch. During training, dropped neurons
/// produce no potential and no gradient; kept potentials are scaled by
/// `1 / (1 - rate)` so inference needs no rescaling.
#[derive(Clone, Debug)]
pub struct NeuraDropout {
    rate: f32,
    mask: Vec<bool>,
    rng: StdRng,
}

impl NeuraDropout {
    pub fn new(rate: f32, output_size: usize, seed: u64) -> Self {
        debug_assert!((0.0..=1.0).contains(&rate));

        Self {
            rate,
            mask: vec![true; output_size],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// One draw per neuron; a neuron is kept when the draw exceeds the rate,
    /// so rate 1.0 drops every neuron and rate 0.0 keeps every neuron.
    pub fn redraw_mask(&mut self) {
        for kept in &mut self.mask {
            *kept = self.rng.gen::<f32>() > self.rate;
        }
    }

    #[inline]
    pub fn is_kept(&self, neuron: usize) -> bool {
        self.mask[neuron]
    }

    /// Scaling factor applied to kept potentials during training. Never used
    /// when every neuron is dropped, so rate 1.0 cannot divide by zero.
    #[inline]
    pub fn scale(&self) -> f32 {
        1.0 / (1.0 - self.rate)
    }
}
