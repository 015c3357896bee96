use nalgebra::DVector;

use super::NeuraActivation;

/// Implements [`NeuraActivation`] for an elementwise activation, given the
/// scalar value and scalar derivative at one potential.
macro_rules! impl_elementwise {
    ( $type:ty, $self:ident, $variable:ident, $eval:expr, $derivative:expr ) => {
        impl NeuraActivation for $type {
            fn activate_layer($self: &Self, potentials: &DVector<f32>) -> DVector<f32> {
                potentials.map(|$variable| $eval)
            }

            fn derivative_potentials($self: &Self, potentials: &DVector<f32>) -> DVector<f32> {
                potentials.map(|$variable| $derivative)
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Relu;

impl_elementwise!(Relu, self, x, x.max(0.0), {
    // The derivative at exactly 0 takes the negative-side value.
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
});

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeakyRelu(pub f32);

impl Default for LeakyRelu {
    fn default() -> Self {
        Self(0.01)
    }
}

impl_elementwise!(
    LeakyRelu,
    self,
    x,
    {
        if x > 0.0 {
            x
        } else {
            self.0 * x
        }
    },
    {
        if x > 0.0 {
            1.0
        } else {
            self.0
        }
    }
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sigmoid;

impl_elementwise!(Sigmoid, self, x, 1.0 / (1.0 + (-x).exp()), {
    let y = 1.0 / (1.0 + (-x).exp());
    y * (1.0 - y)
});

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tanh;

impl_elementwise!(Tanh, self, x, x.tanh(), {
    let y = x.tanh();
    1.0 - y * y
});

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selu;

impl Selu {
    const ALPHA: f32 = 1.6733;
    const SCALE: f32 = 1.0507;
}

impl_elementwise!(
    Selu,
    self,
    x,
    {
        if x >= 0.0 {
            Self::SCALE * x
        } else {
            Self::SCALE * Self::ALPHA * (x.exp() - 1.0)
        }
    },
    {
        if x >= 0.0 {
            Self::SCALE
        } else {
            Self::SCALE * Self::ALPHA * x.exp()
        }
    }
);

/// Softmax over the whole layer, stabilized by subtracting the maximum
/// potential before exponentiation.
///
/// `derivative_potentials` returns the elementwise `s * (1 - s)` terms, not
/// the full Jacobian. This is only correct when paired with
/// [`super::loss::CrossEntropy`], whose `p - e` gradient already folds the
/// Jacobian in and never consumes these terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Softmax;

impl NeuraActivation for Softmax {
    fn activate_layer(&self, potentials: &DVector<f32>) -> DVector<f32> {
        let max = potentials.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exponentials = potentials.map(|x| (x - max).exp());
        let sum: f32 = exponentials.iter().sum();
        exponentials / sum
    }

    fn derivative_potentials(&self, potentials: &DVector<f32>) -> DVector<f32> {
        self.activate_layer(potentials).map(|s| s * (1.0 - s))
    }
}
