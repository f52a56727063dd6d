use crate::classifier::BaseClassifier;
use crate::cv::{self, Fold};
use crate::data::Data;
use crate::metrics::{ConfusionMatrix, ObjectiveMetric};
use crate::param;
use log::trace;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One candidate of the search: SVC hyperparameters and a feature mask
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Decision {
    pub c: f64,
    pub gamma: f64,
    pub feature_mask: Vec<bool>,
}

impl Decision {
    pub fn selected_features(&self) -> Vec<usize> {
        self.feature_mask
            .iter()
            .enumerate()
            .filter(|(_, &selected)| selected)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn k(&self) -> usize {
        self.feature_mask.iter().filter(|&&b| b).count()
    }
}

/// Objectives are minimized; a constraint violation <= 0 means feasible
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub objectives: Vec<f64>,
    pub constraint_violation: f64,
}

impl Evaluation {
    pub fn is_feasible(&self) -> bool {
        self.constraint_violation <= 0.0
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub c: (f64, f64),
    pub gamma: (f64, f64),
}

/// What a multi-objective optimizer needs to know of a problem
pub trait MultiObjectiveProblem: Sync {
    fn n_features(&self) -> usize;
    fn n_objectives(&self) -> usize;
    fn bounds(&self) -> Bounds;
    fn evaluate(&self, decision: &Decision) -> Evaluation;
}

/// Settings shared by both problem variants
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemSettings {
    pub scale_features: f64,
    pub objectives: Vec<ObjectiveMetric>,
    pub bounds: Bounds,
}

impl ProblemSettings {
    pub fn from_param(ensemble: &param::Ensemble, optimizer: &param::Optimizer) -> ProblemSettings {
        ProblemSettings {
            scale_features: ensemble.scale_features,
            objectives: ensemble.objectives.clone(),
            bounds: Bounds { c: optimizer.c_bounds, gamma: optimizer.gamma_bounds },
        }
    }

    /// Number of features a feasible mask must select
    pub fn required_features(&self, n_features: usize) -> usize {
        n_features - ((1.0 - self.scale_features) * n_features as f64).floor() as usize
    }

    /// `(n - k - floor((1 - scale) * n))^2`
    pub fn constraint_violation(&self, n_features: usize, k: usize) -> f64 {
        let gap = n_features as f64 - k as f64 - ((1.0 - self.scale_features) * n_features as f64).floor();
        gap * gap
    }
}

/// Objectives scored on a single stratified train/test split of the bootstrap
pub struct HoldoutProblem<C: BaseClassifier> {
    data: Data,
    template: C,
    settings: ProblemSettings,
    fold: Fold,
}

/// Objectives averaged over repeated stratified k-fold on the bootstrap
pub struct CrossValProblem<C: BaseClassifier> {
    data: Data,
    template: C,
    settings: ProblemSettings,
    folds: Vec<Fold>,
}

pub enum Problem<C: BaseClassifier> {
    Holdout(HoldoutProblem<C>),
    CrossVal(CrossValProblem<C>),
}

impl<C: BaseClassifier> Problem<C> {
    /// Build the problem of one repeat over its repaired bootstrap
    pub fn new(data: Data, template: C, ensemble: &param::Ensemble, optimizer: &param::Optimizer, rng: &mut ChaCha8Rng) -> Problem<C> {
        let settings = ProblemSettings::from_param(ensemble, optimizer);
        if ensemble.cross_val {
            let folds = cv::repeated_stratified_kfold(&data.y, ensemble.cv_splits, ensemble.cv_repeats, rng);
            Problem::CrossVal(CrossValProblem { data, template, settings, folds })
        } else {
            let fold = cv::stratified_holdout(&data.y, ensemble.test_size, rng);
            Problem::Holdout(HoldoutProblem { data, template, settings, fold })
        }
    }

    pub fn data(&self) -> &Data {
        match self {
            Problem::Holdout(p) => &p.data,
            Problem::CrossVal(p) => &p.data,
        }
    }

    pub fn settings(&self) -> &ProblemSettings {
        match self {
            Problem::Holdout(p) => &p.settings,
            Problem::CrossVal(p) => &p.settings,
        }
    }

    pub fn folds(&self) -> &[Fold] {
        match self {
            Problem::Holdout(p) => std::slice::from_ref(&p.fold),
            Problem::CrossVal(p) => &p.folds,
        }
    }

    fn template(&self) -> &C {
        match self {
            Problem::Holdout(p) => &p.template,
            Problem::CrossVal(p) => &p.template,
        }
    }
}

/// Metric values of a decision on one fold; zeros when the classifier cannot be fitted
fn score_fold<C: BaseClassifier>(data: &Data, template: &C, decision: &Decision, features: &[usize], fold: &Fold, metrics: &[ObjectiveMetric]) -> Vec<f64> {
    let zeros = vec![0.0; metrics.len()];
    if fold.test.is_empty() {
        return zeros;
    }

    let train = data.subset(&fold.train);
    let test = data.subset(&fold.test);
    let mut classifier = template.with_params(decision.c, decision.gamma);
    if let Err(e) = classifier.fit(&train.select_features(features), &train.y) {
        trace!("Candidate C={:.4} gamma={:.4} not fitted: {}", decision.c, decision.gamma, e);
        return zeros;
    }
    match classifier.predict(&test.select_features(features)) {
        Ok(predictions) => {
            let cm = ConfusionMatrix::new(&test.y, &predictions);
            metrics.iter().map(|m| m.score(&cm)).collect()
        }
        Err(e) => {
            trace!("Candidate C={:.4} gamma={:.4} failed to predict: {}", decision.c, decision.gamma, e);
            zeros
        }
    }
}

impl<C: BaseClassifier> MultiObjectiveProblem for Problem<C> {
    fn n_features(&self) -> usize {
        self.data().feature_len
    }

    fn n_objectives(&self) -> usize {
        self.settings().objectives.len()
    }

    fn bounds(&self) -> Bounds {
        self.settings().bounds
    }

    fn evaluate(&self, decision: &Decision) -> Evaluation {
        let settings = self.settings();
        let n_features = self.n_features();
        let constraint_violation = settings.constraint_violation(n_features, decision.k());
        let features = decision.selected_features();

        if features.is_empty() {
            return Evaluation { objectives: vec![0.0; settings.objectives.len()], constraint_violation };
        }

        let folds = self.folds();
        let mut means = vec![0.0; settings.objectives.len()];
        for fold in folds {
            let scores = score_fold(self.data(), self.template(), decision, &features, fold, &settings.objectives);
            for (m, s) in means.iter_mut().zip(scores) {
                *m += s;
            }
        }

        Evaluation {
            objectives: means.into_iter().map(|m| -(m / folds.len() as f64)).collect(),
            constraint_violation,
        }
    }
}
