use serde::{Deserialize, Serialize};

/// Non-pairwise and averaged pairwise diversity of a committee
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct DiversityMeasures {
    /// In [0, 1], 0 when all members agree on every sample
    pub entropy: f64,
    pub kohavi_wolpert: f64,
    pub disagreement: f64,
    /// Mean pairwise Q-statistic in [-1, 1]: 0 independent, < 0 errors on different samples
    pub q_statistic: f64,
}

/// `oracle[i][j]` is true when member i classifies sample j correctly
pub fn oracle_outputs(predictions: &[Vec<u8>], y: &[u8]) -> Vec<Vec<bool>> {
    predictions
        .iter()
        .map(|p| p.iter().zip(y).map(|(a, b)| a == b).collect())
        .collect()
}

/// Number of members correct on each sample
fn correct_counts(oracle: &[Vec<bool>]) -> Vec<usize> {
    let n_samples = oracle.first().map_or(0, |o| o.len());
    (0..n_samples).map(|j| oracle.iter().filter(|o| o[j]).count()).collect()
}

/// (N11, N10, N01, N00) of a pair of members
fn pair_table(a: &[bool], b: &[bool]) -> (f64, f64, f64, f64) {
    let (mut n11, mut n10, mut n01, mut n00) = (0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        match (x, y) {
            (true, true) => n11 += 1.0,
            (true, false) => n10 += 1.0,
            (false, true) => n01 += 1.0,
            (false, false) => n00 += 1.0,
        }
    }
    (n11, n10, n01, n00)
}

/// Yule's Q of a pair. With a zero denominator, 1 if the pair never disagrees, 0 otherwise.
pub fn q_statistic(a: &[bool], b: &[bool]) -> f64 {
    let (n11, n10, n01, n00) = pair_table(a, b);
    let denominator = n11 * n00 + n01 * n10;
    if denominator == 0.0 {
        if n01 + n10 == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (n11 * n00 - n01 * n10) / denominator
    }
}

pub fn disagreement(a: &[bool], b: &[bool]) -> f64 {
    let (n11, n10, n01, n00) = pair_table(a, b);
    let total = n11 + n10 + n01 + n00;
    if total == 0.0 {
        0.0
    } else {
        (n01 + n10) / total
    }
}

impl DiversityMeasures {
    /// None with fewer than two members or no sample
    pub fn from_oracle(oracle: &[Vec<bool>]) -> Option<DiversityMeasures> {
        let l = oracle.len();
        let counts = correct_counts(oracle);
        let n = counts.len();
        if l < 2 || n == 0 {
            return None;
        }
        let (lf, nf) = (l as f64, n as f64);

        let half = lf - (lf / 2.0).ceil();
        let entropy = counts
            .iter()
            .map(|&c| c.min(l - c) as f64 / half)
            .sum::<f64>()
            / nf;

        let kohavi_wolpert = counts.iter().map(|&c| (c * (l - c)) as f64).sum::<f64>() / (nf * lf * lf);

        let mut q_sum = 0.0;
        let mut dis_sum = 0.0;
        let mut pairs = 0.0;
        for i in 0..l {
            for k in (i + 1)..l {
                q_sum += q_statistic(&oracle[i], &oracle[k]);
                dis_sum += disagreement(&oracle[i], &oracle[k]);
                pairs += 1.0;
            }
        }

        Some(DiversityMeasures {
            entropy,
            kohavi_wolpert,
            disagreement: dis_sum / pairs,
            q_statistic: q_sum / pairs,
        })
    }
}

/// Fleiss-style interrater agreement kappa over the committee, with `p` the mean member
/// accuracy. None when p is 0 or 1 (or without at least two members and one sample).
pub fn interrater_agreement(oracle: &[Vec<bool>]) -> Option<f64> {
    let l = oracle.len();
    let counts = correct_counts(oracle);
    let n = counts.len();
    if l < 2 || n == 0 {
        return None;
    }
    let (lf, nf) = (l as f64, n as f64);
    let p = counts.iter().sum::<usize>() as f64 / (nf * lf);
    if p <= 0.0 || p >= 1.0 {
        return None;
    }
    let spread = counts.iter().map(|&c| (c * (l - c)) as f64).sum::<f64>() / lf;
    Some(1.0 - spread / (nf * (lf - 1.0) * p * (1.0 - p)))
}
