//! Seeded weight initialization strategies.

use dyn_clone::DynClone;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

/// Produces the initial value of one weight. Stateful: each call advances the
/// initializer's RNG, so a given seed always yields the same weight stream.
pub trait NeuraInitializer: DynClone + Send + std::fmt::Debug {
    fn initial_weight(&mut self, fan_in: usize, fan_out: usize) -> f32;
}

dyn_clone::clone_trait_object!(NeuraInitializer);

/// Glorot (Xavier) uniform initialization over
/// `±sqrt(6 / (fan_in + fan_out))`.
#[derive(Clone, Debug)]
pub struct Glorot {
    rng: StdRng,
    unit: Uniform<f32>,
}

impl Glorot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            unit: Uniform::new(-1.0, 1.0),
        }
    }
}

impl NeuraInitializer for Glorot {
    fn initial_weight(&mut self, fan_in: usize, fan_out: usize) -> f32 {
        let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
        self.unit.sample(&mut self.rng) * limit
    }
}

/// He initialization: normal draw with standard deviation `1 / sqrt(fan_in)`.
#[derive(Clone, Debug)]
pub struct He {
    rng: StdRng,
}

impl He {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Box-Muller transform from two uniform draws. The `1 - u` flips move
    /// the draws into `(0, 1]` so the logarithm never sees zero.
    fn normal(&mut self, standard_deviation: f32) -> f32 {
        let x1 = 1.0 - self.rng.gen::<f32>();
        let x2 = 1.0 - self.rng.gen::<f32>();

        let y1 = ((-2.0 * (x1 as f64).ln()).sqrt()
            * (2.0 * std::f64::consts::PI * x2 as f64).cos()) as f32;
        y1 * standard_deviation
    }
}

impl NeuraInitializer for He {
    fn initial_weight(&mut self, fan_in: usize, _fan_out: usize) -> f32 {
        let std = 1.0 / (fan_in as f32).sqrt();
        self.normal(std)
    }
}

/// Uniform draw in `[-0.5, 0.5)`.
#[derive(Clone, Debug)]
pub struct RandomValue {
    rng: StdRng,
}

impl RandomValue {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl NeuraInitializer for RandomValue {
    fn initial_weight(&mut self, _fan_in: usize, _fan_out: usize) -> f32 {
        self.rng.gen::<f32>() - 0.5
    }
}

/// Uniform draw in `[-0.05, 0.05)`.
#[derive(Clone, Debug)]
pub struct RandomWeight {
    rng: StdRng,
}

impl RandomWeight {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl NeuraInitializer for RandomWeight {
    fn initial_weight(&mut self, _fan_in: usize, _fan_out: usize) -> f32 {
        (self.rng.gen::<f32>() - 0.5) * 0.1
    }
}
