use crate::utils;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A train/test partition, as indices into the split data
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn indices_by_class(y: &[u8]) -> (Vec<usize>, Vec<usize>) {
    let mut indices_class0: Vec<usize> = Vec::new();
    let mut indices_class1: Vec<usize> = Vec::new();
    for (i, f) in y.iter().enumerate() {
        if *f == 0 {
            indices_class0.push(i)
        } else if *f == 1 {
            indices_class1.push(i)
        }
    }
    (indices_class0, indices_class1)
}

/// Stratified k-fold repeated `n_repeats` times, each repeat reshuffling both classes.
/// A class smaller than `n_splits` simply leaves some test folds without it.
pub fn repeated_stratified_kfold(y: &[u8], n_splits: usize, n_repeats: usize, rng: &mut ChaCha8Rng) -> Vec<Fold> {
    let (indices_class0, indices_class1) = indices_by_class(y);
    let mut folds = Vec::with_capacity(n_splits * n_repeats);

    for _ in 0..n_repeats {
        let class0_chunks = utils::split_into_balanced_random_chunks(indices_class0.clone(), n_splits, rng);
        let class1_chunks = utils::split_into_balanced_random_chunks(indices_class1.clone(), n_splits, rng);

        let validation_folds: Vec<Vec<usize>> = class0_chunks
            .into_iter()
            .zip(class1_chunks)
            .map(|(i1, i2)| i1.into_iter().chain(i2).collect())
            .collect();

        for i in 0..n_splits {
            let train: Vec<usize> = validation_folds
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .flat_map(|(_, fold)| fold.iter().cloned())
                .collect();
            folds.push(Fold { train, test: validation_folds[i].clone() });
        }
    }

    folds
}

/// Stratified train/test split. Each class with at least two samples keeps one on each side,
/// a singleton class goes to training.
pub fn stratified_holdout(y: &[u8], test_size: f64, rng: &mut ChaCha8Rng) -> Fold {
    let (indices_class0, indices_class1) = indices_by_class(y);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for mut indices in [indices_class0, indices_class1] {
        indices.shuffle(rng);
        let n = indices.len();
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_size).round() as usize).clamp(1, n - 1)
        };
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    Fold { train, test }
}
