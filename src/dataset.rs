//! Loading and preprocessing of CSV-backed datasets.

use std::path::Path;

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::err::{NeuraError, NeuraResult};
use crate::utils::argmax;

/// Reads a headerless CSV file, one float vector per record.
pub fn load_vectors(path: impl AsRef<Path>) -> NeuraResult<Vec<DVector<f32>>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| NeuraError::Csv {
            path: path.to_owned(),
            source,
        })?;

    let mut vectors = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| NeuraError::Csv {
            path: path.to_owned(),
            source,
        })?;

        let mut values = Vec::with_capacity(record.len());
        for field in record.iter() {
            let value = field
                .trim()
                .parse::<f32>()
                .map_err(|source| NeuraError::Parse {
                    path: path.to_owned(),
                    value: field.to_owned(),
                    source,
                })?;
            values.push(value);
        }
        vectors.push(DVector::from_vec(values));
    }

    log::info!("loaded {} vectors from {}", vectors.len(), path.display());
    Ok(vectors)
}

/// Divides every component by `divisor`, e.g. 255 for 8-bit pixel data.
pub fn normalize_by_division(vectors: &mut [DVector<f32>], divisor: f32) {
    for vector in vectors {
        *vector /= divisor;
    }
}

/// Shuffles inputs and expected outputs with the same permutation, so pairs
/// stay aligned. Deterministic for a given seed.
pub fn shuffle_paired(
    inputs: &mut [DVector<f32>],
    expected: &mut [DVector<f32>],
    seed: u64,
) -> NeuraResult<()> {
    if inputs.len() != expected.len() {
        return Err(NeuraError::UnpairedDataset {
            inputs: inputs.len(),
            expected: expected.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    for i in (1..inputs.len()).rev() {
        let j = rng.gen_range(0..=i);
        inputs.swap(i, j);
        expected.swap(i, j);
    }

    Ok(())
}

/// Maps class indices `0..classes` to one-hot vectors and back.
#[derive(Clone, Copy, Debug)]
pub struct NeuraOneHotEncoder {
    pub classes: usize,
}

impl NeuraOneHotEncoder {
    pub fn new(classes: usize) -> Self {
        Self { classes }
    }

    pub fn encode(&self, class: usize) -> NeuraResult<DVector<f32>> {
        if class >= self.classes {
            return Err(NeuraError::UnknownClass {
                class,
                classes: self.classes,
            });
        }

        let mut vector = DVector::zeros(self.classes);
        vector[class] = 1.0;
        Ok(vector)
    }

    pub fn encode_all(&self, classes: &[usize]) -> NeuraResult<Vec<DVector<f32>>> {
        classes.iter().map(|&class| self.encode(class)).collect()
    }

    /// Recovers the class of a one-hot or probability vector by argmax.
    pub fn decode(&self, vector: &DVector<f32>) -> NeuraResult<usize> {
        NeuraError::check_dimensions(self.classes, vector.len())?;
        Ok(argmax(vector.as_slice()))
    }

    pub fn decode_all(&self, vectors: &[DVector<f32>]) -> NeuraResult<Vec<usize>> {
        vectors.iter().map(|vector| self.decode(vector)).collect()
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use nalgebra::dvector;

    use super::*;

    #[test]
    fn test_load_vectors() {
        let mut file = tempfile_path("vectors.csv");
        writeln!(file.1, "1.0,2.5,-3.0").unwrap();
        writeln!(file.1, "0,0,255").unwrap();
        drop(file.1);

        let vectors = load_vectors(&file.0).unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], dvector![1.0, 2.5, -3.0]);
        assert_eq!(vectors[1], dvector![0.0, 0.0, 255.0]);

        std::fs::remove_file(&file.0).unwrap();
    }

    #[test]
    fn test_load_vectors_rejects_garbage() {
        let mut file = tempfile_path("garbage.csv");
        writeln!(file.1, "1.0,abc").unwrap();
        drop(file.1);

        assert!(matches!(
            load_vectors(&file.0),
            Err(crate::err::NeuraError::Parse { .. })
        ));

        std::fs::remove_file(&file.0).unwrap();
    }

    fn tempfile_path(name: &str) -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("neuramlp-{}-{}", std::process::id(), name));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }

    #[test]
    fn test_normalize_by_division() {
        let mut vectors = vec![dvector![255.0, 0.0, 51.0]];
        normalize_by_division(&mut vectors, 255.0);

        assert_eq!(vectors[0], dvector![1.0, 0.0, 0.2]);
    }

    #[test]
    fn test_shuffle_keeps_pairs_aligned() {
        let mut inputs: Vec<_> = (0..100).map(|i| dvector![i as f32]).collect();
        let mut expected: Vec<_> = (0..100).map(|i| dvector![-(i as f32)]).collect();

        shuffle_paired(&mut inputs, &mut expected, 42).unwrap();

        assert!(inputs.iter().enumerate().any(|(i, v)| v[0] != i as f32));
        for (input, output) in inputs.iter().zip(expected.iter()) {
            assert_eq!(input[0], -output[0]);
        }
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let mut a: Vec<_> = (0..32).map(|i| dvector![i as f32]).collect();
        let mut b = a.clone();
        let mut labels_a: Vec<_> = (0..32).map(|i| dvector![i as f32]).collect();
        let mut labels_b = labels_a.clone();

        shuffle_paired(&mut a, &mut labels_a, 7).unwrap();
        shuffle_paired(&mut b, &mut labels_b, 7).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_shuffle_rejects_unpaired() {
        let mut inputs = vec![dvector![1.0]];
        let mut expected = vec![];
        assert!(shuffle_paired(&mut inputs, &mut expected, 42).is_err());
    }

    #[test]
    fn test_one_hot_roundtrip() {
        let encoder = NeuraOneHotEncoder::new(4);

        let encoded = encoder.encode(2).unwrap();
        assert_eq!(encoded, dvector![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(encoder.decode(&encoded).unwrap(), 2);
    }

    #[test]
    fn test_one_hot_decodes_probabilities() {
        let encoder = NeuraOneHotEncoder::new(3);
        let probabilities = dvector![0.2, 0.5, 0.3];

        assert_eq!(encoder.decode(&probabilities).unwrap(), 1);
    }

    #[test]
    fn test_one_hot_rejects_out_of_range() {
        let encoder = NeuraOneHotEncoder::new(3);
        assert!(encoder.encode(3).is_err());
        assert!(encoder.decode(&dvector![1.0, 0.0]).is_err());
    }
}
