//! Classification metrics over decoded predictions.

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::DVector;

use crate::err::{NeuraError, NeuraResult};
use crate::utils::argmax;

/// Square confusion matrix indexed by `[actual][predicted]` class.
#[derive(Clone, Debug)]
pub struct NeuraConfusionMatrix {
    classes: usize,
    counts: Vec<usize>,
}

impl NeuraConfusionMatrix {
    pub fn new(classes: usize) -> Self {
        Self {
            classes,
            counts: vec![0; classes * classes],
        }
    }

    /// Builds the matrix from paired prediction/expectation vectors, decoding
    /// each by argmax.
    pub fn from_vectors(
        predicted: &[DVector<f32>],
        expected: &[DVector<f32>],
        classes: usize,
    ) -> NeuraResult<Self> {
        if predicted.len() != expected.len() {
            return Err(NeuraError::UnpairedDataset {
                inputs: predicted.len(),
                expected: expected.len(),
            });
        }

        let mut matrix = Self::new(classes);
        for (prediction, expectation) in predicted.iter().zip(expected.iter()) {
            matrix.record_vectors(prediction, expectation)?;
        }
        Ok(matrix)
    }

    pub fn record(&mut self, predicted: usize, actual: usize) {
        self.counts[actual * self.classes + predicted] += 1;
    }

    pub fn record_vectors(
        &mut self,
        predicted: &DVector<f32>,
        expected: &DVector<f32>,
    ) -> NeuraResult<()> {
        NeuraError::check_dimensions(self.classes, predicted.len())?;
        NeuraError::check_dimensions(self.classes, expected.len())?;

        self.record(argmax(predicted.as_slice()), argmax(expected.as_slice()));
        Ok(())
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual * self.classes + predicted]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    fn true_positives(&self, class: usize) -> usize {
        self.count(class, class)
    }

    fn false_positives(&self, class: usize) -> usize {
        (0..self.classes)
            .filter(|&actual| actual != class)
            .map(|actual| self.count(actual, class))
            .sum()
    }

    fn false_negatives(&self, class: usize) -> usize {
        (0..self.classes)
            .filter(|&predicted| predicted != class)
            .map(|predicted| self.count(class, predicted))
            .sum()
    }

    pub fn accuracy(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        let correct: usize = (0..self.classes).map(|c| self.true_positives(c)).sum();
        correct as f32 / total as f32
    }

    /// Per-class precision; 0 when the class was never predicted.
    pub fn precision(&self, class: usize) -> f32 {
        ratio(
            self.true_positives(class),
            self.true_positives(class) + self.false_positives(class),
        )
    }

    /// Per-class recall; 0 when the class never occurred.
    pub fn recall(&self, class: usize) -> f32 {
        ratio(
            self.true_positives(class),
            self.true_positives(class) + self.false_negatives(class),
        )
    }

    pub fn f1_score(&self, class: usize) -> f32 {
        let precision = self.precision(class);
        let recall = self.recall(class);
        if precision + recall == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / (precision + recall)
    }

    pub fn macro_precision(&self) -> f32 {
        self.macro_average(Self::precision)
    }

    pub fn macro_recall(&self) -> f32 {
        self.macro_average(Self::recall)
    }

    pub fn macro_f1(&self) -> f32 {
        self.macro_average(Self::f1_score)
    }

    fn macro_average(&self, metric: fn(&Self, usize) -> f32) -> f32 {
        if self.classes == 0 {
            return 0.0;
        }
        (0..self.classes).map(|c| metric(self, c)).sum::<f32>() / self.classes as f32
    }
}

fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

impl fmt::Display for NeuraConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.2}%", self.accuracy() * 100.0)?;
        writeln!(f, "Precision: {:.4}", self.macro_precision())?;
        writeln!(f, "Recall: {:.4}", self.macro_recall())?;
        write!(f, "F1 Score: {:.4}", self.macro_f1())
    }
}

/// Writes one result per line, e.g. the decoded class of each test example.
pub fn export_results_csv<T: fmt::Display>(
    path: impl AsRef<Path>,
    results: impl IntoIterator<Item = T>,
) -> NeuraResult<()> {
    let path = path.as_ref();
    let io_error = |source| NeuraError::Io {
        path: path.to_owned(),
        source,
    };

    let file = std::fs::File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    let mut count = 0usize;
    for result in results {
        writeln!(writer, "{}", result).map_err(io_error)?;
        count += 1;
    }
    writer.flush().map_err(io_error)?;

    log::info!("exported {} results to {}", count, path.display());
    Ok(())
}
