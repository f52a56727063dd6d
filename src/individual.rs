use crate::problem::{Bounds, Decision, Evaluation};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A decision under evolution, with its evaluation and its NSGA-II bookkeeping
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    /// SVC hyperparameters and feature mask
    pub decision: Decision,
    /// Minimized objective values (empty until evaluated)
    pub objectives: Vec<f64>,
    /// Constraint violation, <= 0 when feasible
    pub constraint_violation: f64,

    /// Non-domination rank among feasible individuals, usize::MAX otherwise
    pub rank: usize,
    pub crowding_distance: f64,

    /// Identifier hash of the decision
    pub hash: u64,
}

impl Individual {
    pub fn new(decision: Decision) -> Individual {
        let mut individual = Individual {
            decision,
            objectives: Vec::new(),
            constraint_violation: f64::INFINITY,
            rank: usize::MAX,
            crowding_distance: 0.0,
            hash: 0,
        };
        individual.compute_hash();
        individual
    }

    /// Reals drawn uniformly within bounds, each bit set with probability 1/2
    pub fn random(n_features: usize, bounds: &Bounds, rng: &mut ChaCha8Rng) -> Individual {
        let c = rng.gen_range(bounds.c.0..=bounds.c.1);
        let gamma = rng.gen_range(bounds.gamma.0..=bounds.gamma.1);
        let feature_mask = (0..n_features).map(|_| rng.gen_bool(0.5)).collect();
        Individual::new(Decision { c, gamma, feature_mask })
    }

    pub fn compute_hash(&mut self) {
        let mut hasher = DefaultHasher::new();
        self.decision.c.to_bits().hash(&mut hasher);
        self.decision.gamma.to_bits().hash(&mut hasher);
        self.decision.feature_mask.hash(&mut hasher);
        self.hash = hasher.finish();
    }

    pub fn set_evaluation(&mut self, evaluation: Evaluation) {
        self.objectives = evaluation.objectives;
        self.constraint_violation = evaluation.constraint_violation;
    }

    pub fn is_feasible(&self) -> bool {
        self.constraint_violation <= 0.0
    }

    /// Pareto dominance for minimization: no objective worse and at least one better
    pub fn dominates(&self, other: &Individual) -> bool {
        let mut strictly_better = false;
        for (a, b) in self.objectives.iter().zip(other.objectives.iter()) {
            if a > b {
                return false;
            }
            if a < b {
                strictly_better = true;
            }
        }
        strictly_better
    }
}

impl fmt::Debug for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C={:.4} gamma={:.4} k={} F={:?} CV={} rank={} crowding={:.3}",
            self.decision.c,
            self.decision.gamma,
            self.decision.k(),
            self.objectives,
            self.constraint_violation,
            self.rank,
            self.crowding_distance
        )
    }
}
