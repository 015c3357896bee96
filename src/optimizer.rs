//! Per-weight update rules.
//!
//! Optimizers are stateless across weights: all per-weight state (velocity,
//! square gradient) lives in the weight tensor and is passed in by the layer.
//! The only optimizer-owned state is the learning rate and, for the Adam
//! family, the global step counter.

use dyn_clone::DynClone;

const EPSILON: f32 = 1e-8;

pub trait NeuraOptimizer: DynClone + Send + Sync + std::fmt::Debug {
    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, learning_rate: f32);

    /// Advances the global step counter. The network calls this exactly once
    /// per mini-batch, before any weight update of that batch, so bias
    /// correction always sees a step of at least 1.
    fn advance_step(&mut self) {}

    /// Returns the new weight value. `velocity` and `square_gradient` are the
    /// weight's auxiliary slots; rules that do not use a slot leave it
    /// untouched.
    fn update_weight(
        &self,
        weight: f32,
        gradient: f32,
        velocity: &mut f32,
        square_gradient: &mut f32,
    ) -> f32;
}

dyn_clone::clone_trait_object!(NeuraOptimizer);

/// Plain stochastic gradient descent with a constant learning rate.
#[derive(Clone, Debug)]
pub struct Sgd {
    pub learning_rate: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl NeuraOptimizer for Sgd {
    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    fn update_weight(
        &self,
        weight: f32,
        gradient: f32,
        _velocity: &mut f32,
        _square_gradient: &mut f32,
    ) -> f32 {
        weight - self.learning_rate * gradient
    }
}

/// Gradient descent with momentum accumulated in the velocity slot.
#[derive(Clone, Debug)]
pub struct SgdMomentum {
    pub learning_rate: f32,
    pub momentum: f32,
}

impl SgdMomentum {
    pub fn new(learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
        }
    }
}

impl NeuraOptimizer for SgdMomentum {
    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    fn update_weight(
        &self,
        weight: f32,
        gradient: f32,
        velocity: &mut f32,
        _square_gradient: &mut f32,
    ) -> f32 {
        *velocity = self.momentum * *velocity + self.learning_rate * gradient;
        weight - *velocity
    }
}

/// Root mean square propagation. The stabilizing ε sits inside the square
/// root.
#[derive(Clone, Debug)]
pub struct RmsProp {
    pub learning_rate: f32,
    pub decay_rate: f32,
}

impl RmsProp {
    pub fn new(learning_rate: f32, decay_rate: f32) -> Self {
        Self {
            learning_rate,
            decay_rate,
        }
    }
}

impl NeuraOptimizer for RmsProp {
    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    fn update_weight(
        &self,
        weight: f32,
        gradient: f32,
        _velocity: &mut f32,
        square_gradient: &mut f32,
    ) -> f32 {
        *square_gradient =
            self.decay_rate * *square_gradient + (1.0 - self.decay_rate) * gradient * gradient;
        weight - self.learning_rate * gradient / (*square_gradient + EPSILON).sqrt()
    }
}

/// Adaptive moment estimation with bias-corrected first and second moments.
#[derive(Clone, Debug)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    step: i32,
}

impl Adam {
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            step: 0,
        }
    }

    fn adam_delta(&self, gradient: f32, velocity: &mut f32, square_gradient: &mut f32) -> f32 {
        debug_assert!(self.step >= 1, "advance_step must run before updates");

        *velocity = self.beta1 * *velocity + (1.0 - self.beta1) * gradient;
        let m_hat = *velocity / (1.0 - self.beta1.powi(self.step));

        *square_gradient =
            self.beta2 * *square_gradient + (1.0 - self.beta2) * gradient * gradient;
        let v_hat = *square_gradient / (1.0 - self.beta2.powi(self.step));

        self.learning_rate * m_hat / (v_hat.sqrt() + EPSILON)
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.001, 0.9, 0.999)
    }
}

impl NeuraOptimizer for Adam {
    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    fn advance_step(&mut self) {
        self.step += 1;
    }

    fn update_weight(
        &self,
        weight: f32,
        gradient: f32,
        velocity: &mut f32,
        square_gradient: &mut f32,
    ) -> f32 {
        weight - self.adam_delta(gradient, velocity, square_gradient)
    }
}

/// Adam with decoupled weight decay: the weight shrinks by
/// `lr * weight_decay` before the Adam step is applied.
#[derive(Clone, Debug)]
pub struct AdamW {
    adam: Adam,
    pub weight_decay: f32,
}

impl AdamW {
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, weight_decay: f32) -> Self {
        Self {
            adam: Adam::new(learning_rate, beta1, beta2),
            weight_decay,
        }
    }
}

impl Default for AdamW {
    fn default() -> Self {
        Self::new(0.001, 0.9, 0.999, 0.001)
    }
}

impl NeuraOptimizer for AdamW {
    fn learning_rate(&self) -> f32 {
        self.adam.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.adam.learning_rate = learning_rate;
    }

    fn advance_step(&mut self) {
        self.adam.advance_step();
    }

    fn update_weight(
        &self,
        weight: f32,
        gradient: f32,
        velocity: &mut f32,
        square_gradient: &mut f32,
    ) -> f32 {
        let decayed = weight * (1.0 - self.adam.learning_rate * self.weight_decay);
        decayed - self.adam.adam_delta(gradient, velocity, square_gradient)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assert_approx;

    #[test]
    fn test_sgd_ignores_aux_slots() {
        let sgd = Sgd::new(0.5);
        let mut velocity = 0.0;
        let mut square_gradient = 0.0;

        let updated = sgd.update_weight(1.0, 0.2, &mut velocity, &mut square_gradient);

        assert_approx!(updated, 0.9, 1e-6);
        assert_eq!(velocity, 0.0);
        assert_eq!(square_gradient, 0.0);
    }

    #[test]
    fn test_momentum_accumulates_velocity() {
        let optimizer = SgdMomentum::new(0.1, 0.9);
        let mut velocity = 0.0;
        let mut square_gradient = 0.0;

        let mut weight = 1.0;
        weight = optimizer.update_weight(weight, 1.0, &mut velocity, &mut square_gradient);
        assert_approx!(velocity, 0.1, 1e-6);
        assert_approx!(weight, 0.9, 1e-6);

        weight = optimizer.update_weight(weight, 1.0, &mut velocity, &mut square_gradient);
        assert_approx!(velocity, 0.19, 1e-6);
        assert_approx!(weight, 0.71, 1e-6);
    }

    #[test]
    fn test_rmsprop_epsilon_inside_sqrt() {
        let optimizer = RmsProp::new(0.001, 0.9);
        let mut velocity = 0.0;
        let mut square_gradient = 0.0;

        let updated = optimizer.update_weight(1.0, 2.0, &mut velocity, &mut square_gradient);

        assert_approx!(square_gradient, 0.4, 1e-6);
        let expected = 1.0 - 0.001 * 2.0 / (0.4f32 + EPSILON).sqrt();
        assert_approx!(updated, expected, 1e-6);
    }

    #[test]
    fn test_adam_first_step_bias_correction() {
        let mut optimizer = Adam::new(0.1, 0.9, 0.999);
        optimizer.advance_step();
        let mut velocity = 0.0;
        let mut square_gradient = 0.0;

        let updated = optimizer.update_weight(1.0, 1.0, &mut velocity, &mut square_gradient);

        // After bias correction both moments estimate the raw gradient, so
        // the very first step moves by almost exactly the learning rate.
        assert_approx!(velocity, 0.1, 1e-6);
        assert_approx!(square_gradient, 0.001, 1e-7);
        assert_approx!(updated, 0.9, 1e-4);
    }

    #[test]
    fn test_adamw_decays_before_stepping() {
        let mut adam = Adam::new(0.1, 0.9, 0.999);
        let mut adamw = AdamW::new(0.1, 0.9, 0.999, 0.01);
        adam.advance_step();
        adamw.advance_step();

        let (mut v1, mut s1) = (0.0, 0.0);
        let (mut v2, mut s2) = (0.0, 0.0);
        let plain = adam.update_weight(1.0, 1.0, &mut v1, &mut s1);
        let decayed = adamw.update_weight(1.0, 1.0, &mut v2, &mut s2);

        assert_approx!(plain - decayed, 0.1 * 0.01, 1e-6);
        assert_eq!(v1, v2);
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_learning_rate_roundtrip() {
        let mut optimizer: Box<dyn NeuraOptimizer> = Box::new(AdamW::default());

        assert_approx!(optimizer.learning_rate(), 0.001, 1e-9);
        optimizer.set_learning_rate(0.5);
        assert_approx!(optimizer.learning_rate(), 0.5, 1e-9);
    }
}
