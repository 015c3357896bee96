//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

pub type NeuraResult<T> = Result<T, NeuraError>;

#[derive(Debug, Error)]
pub enum NeuraError {
    /// Two vectors that must have the same length do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A layer was appended whose input size does not match the previous
    /// layer's output size.
    #[error("layer chain mismatch: previous layer outputs {expected}, new layer expects {found}")]
    LayerChainMismatch { expected: usize, found: usize },

    /// A mini-batch aggregation produced no gradients.
    #[error("mini-batch produced no gradients to aggregate")]
    EmptyMiniBatch,

    /// A training or evaluation call received no examples.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Inputs and expected outputs have different lengths.
    #[error("unpaired dataset: {inputs} inputs but {expected} expected outputs")]
    UnpairedDataset { inputs: usize, expected: usize },

    /// A class label lies outside the encoder's class range.
    #[error("unknown class {class}, encoder covers 0..{classes}")]
    UnknownClass { class: usize, classes: usize },

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path} as CSV")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid float {value:?} in {path}")]
    Parse {
        path: PathBuf,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

impl NeuraError {
    /// Checks that `found` matches `expected`, for vector-length contracts.
    pub(crate) fn check_dimensions(expected: usize, found: usize) -> NeuraResult<()> {
        if expected == found {
            Ok(())
        } else {
            Err(NeuraError::DimensionMismatch { expected, found })
        }
    }
}
