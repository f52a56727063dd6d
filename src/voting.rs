use crate::utils::argmax;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// How member outputs are combined into one prediction
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PredictDecision {
    /// Average support vectors: arg-max of the mean probabilities
    ASV,
    /// Majority voting over hard predictions
    MV,
}

/// Element-wise mean of the member probability matrices (all of the same shape)
pub fn average_support(supports: &[Array2<f64>]) -> Option<Array2<f64>> {
    let first = supports.first()?;
    let mut total = Array2::<f64>::zeros(first.raw_dim());
    for support in supports {
        total += support;
    }
    Some(total / supports.len() as f64)
}

/// Class position of the highest average support per sample, first column on ties
pub fn asv_decision(average: &Array2<f64>) -> Vec<usize> {
    average
        .rows()
        .into_iter()
        .map(|row| argmax(&row.to_vec()).unwrap_or(0))
        .collect()
}

/// Most frequent label per sample among member predictions, the smallest label on ties
pub fn majority_vote(predictions: &[Vec<u8>]) -> Vec<u8> {
    let n_samples = predictions.first().map_or(0, |p| p.len());
    (0..n_samples)
        .map(|sample| {
            let mut counts = [0usize; 256];
            for member in predictions {
                counts[member[sample] as usize] += 1;
            }
            let mut best = 0usize;
            for (label, &count) in counts.iter().enumerate() {
                if count > counts[best] {
                    best = label;
                }
            }
            best as u8
        })
        .collect()
}
