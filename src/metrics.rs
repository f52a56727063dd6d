use crate::data::MINORITY_CLASS;
use serde::{Deserialize, Serialize};

/// Binary confusion matrix, the minority class (1) being the positive one
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn new(y_true: &[u8], y_pred: &[u8]) -> ConfusionMatrix {
        let mut cm = ConfusionMatrix::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t == MINORITY_CLASS, p == MINORITY_CLASS) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    fn ratio(num: usize, den: usize) -> f64 {
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    }

    pub fn precision(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fp)
    }

    /// Sensitivity
    pub fn recall(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fn_)
    }

    pub fn specificity(&self) -> f64 {
        Self::ratio(self.tn, self.tn + self.fp)
    }

    pub fn balanced_accuracy(&self) -> f64 {
        (self.recall() + self.specificity()) / 2.0
    }

    /// sqrt(recall * specificity)
    pub fn g_mean(&self) -> f64 {
        (self.recall() * self.specificity()).sqrt()
    }

    /// sqrt(precision * recall)
    pub fn g_mean2(&self) -> f64 {
        (self.precision() * self.recall()).sqrt()
    }

    pub fn f1_score(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn accuracy(&self) -> f64 {
        Self::ratio(self.tp + self.tn, self.tp + self.tn + self.fp + self.fn_)
    }
}

/// Scores usable as optimization objectives (maximized, the optimizer minimizes their negation)
#[allow(non_camel_case_types)]
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectiveMetric {
    precision,
    recall,
    specificity,
    balanced_accuracy,
    g_mean,
    f1_score,
}

impl ObjectiveMetric {
    pub fn score(&self, cm: &ConfusionMatrix) -> f64 {
        match self {
            ObjectiveMetric::precision => cm.precision(),
            ObjectiveMetric::recall => cm.recall(),
            ObjectiveMetric::specificity => cm.specificity(),
            ObjectiveMetric::balanced_accuracy => cm.balanced_accuracy(),
            ObjectiveMetric::g_mean => cm.g_mean(),
            ObjectiveMetric::f1_score => cm.f1_score(),
        }
    }
}
