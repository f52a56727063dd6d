use crate::bootstrap::DiversifiedSampler;
use crate::cinfo;
use crate::classifier::BaseClassifier;
use crate::data::{Data, MAJORITY_CLASS, MINORITY_CLASS};
use crate::distance::distance_matrix;
use crate::diversity::{self, DiversityMeasures};
use crate::error::{ClassifierError, Result, SemoosError, SolverError};
use crate::ga::{Nsga2, Optimizer};
use crate::param::{self, Param};
use crate::problem::Problem;
use crate::repair::{repair_minority, RepairAction};
use crate::voting::{self, PredictDecision};
use log::{debug, info, warn};
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A fitted committee member and the feature columns it was trained on
#[derive(Clone)]
pub struct EnsembleMember<C: BaseClassifier> {
    pub classifier: C,
    pub features: Vec<usize>,
    pub c: f64,
    pub gamma: f64,
    /// Bootstrap repeat that produced the member
    pub repeat: usize,
}

impl<C: BaseClassifier> EnsembleMember<C> {
    fn columns(&self, X: &Array2<f64>) -> Array2<f64> {
        X.select(Axis(1), &self.features)
    }
}

/// Why a Pareto solution did not become a member
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    EmptyFeatureMask,
    FitFailed(ClassifierError),
}

/// Outcome of one bootstrap repeat
#[derive(Clone, Debug, PartialEq)]
pub struct RepeatReport {
    pub repeat: usize,
    pub root: usize,
    pub uniform_fallback: bool,
    pub repair: RepairAction,
    /// Set when the optimizer returned no Pareto set
    pub solver_error: Option<SolverError>,
    pub evaluations: usize,
    /// Minimized objective vectors of the Pareto set
    pub objectives: Vec<Vec<f64>>,
    pub members_added: usize,
    /// (position in the Pareto set, reason)
    pub skipped: Vec<(usize, SkipReason)>,
}

/// Committee produced by [`EnsembleBuilder`], never modified once returned
#[derive(Clone)]
pub struct Ensemble<C: BaseClassifier> {
    members: Vec<EnsembleMember<C>>,
    classes: Vec<u8>,
    n_features: usize,
    training_data: Option<Data>,
    reports: Vec<RepeatReport>,
    roots: Vec<usize>,
    predict_decision: PredictDecision,
}

impl<C: BaseClassifier> Ensemble<C> {
    pub fn empty(predict_decision: PredictDecision) -> Ensemble<C> {
        Ensemble {
            members: Vec::new(),
            classes: vec![MAJORITY_CLASS, MINORITY_CLASS],
            n_features: 0,
            training_data: None,
            reports: Vec::new(),
            roots: Vec::new(),
            predict_decision,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[EnsembleMember<C>] {
        &self.members
    }

    /// Feature subsets, parallel to `members()`
    pub fn selected_features(&self) -> Vec<&[usize]> {
        self.members.iter().map(|m| m.features.as_slice()).collect()
    }

    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn reports(&self) -> &[RepeatReport] {
        &self.reports
    }

    pub fn predict_decision(&self) -> PredictDecision {
        self.predict_decision
    }

    pub fn training_data(&self) -> Option<&Data> {
        self.training_data.as_ref()
    }

    fn check_input(&self, X: &Array2<f64>, action: &'static str) -> Result<()> {
        if self.members.is_empty() {
            return Err(SemoosError::EmptyEnsemble(action));
        }
        if X.ncols() != self.n_features {
            return Err(ClassifierError::Shape { expected: self.n_features, got: X.ncols() }.into());
        }
        Ok(())
    }

    /// Member probabilities, each member seeing only its own features
    fn supports(&self, X: &Array2<f64>) -> Result<Vec<Array2<f64>>> {
        self.members
            .iter()
            .map(|m| m.classifier.predict_proba(&m.columns(X)).map_err(SemoosError::from))
            .collect()
    }

    fn hard_predictions(&self, X: &Array2<f64>) -> Result<Vec<Vec<u8>>> {
        self.members
            .iter()
            .map(|m| m.classifier.predict(&m.columns(X)).map_err(SemoosError::from))
            .collect()
    }

    /// Combine members with the configured decision rule
    pub fn predict(&self, X: &Array2<f64>) -> Result<Vec<u8>> {
        self.predict_with(X, self.predict_decision)
    }

    pub fn predict_with(&self, X: &Array2<f64>, decision: PredictDecision) -> Result<Vec<u8>> {
        self.check_input(X, "predict")?;
        match decision {
            PredictDecision::ASV => {
                let average = self.average_support(X)?;
                Ok(voting::asv_decision(&average).into_iter().map(|i| self.classes[i]).collect())
            }
            PredictDecision::MV => Ok(voting::majority_vote(&self.hard_predictions(X)?)
                .into_iter()
                .map(|label| self.classes[label as usize])
                .collect()),
        }
    }

    /// Member-averaged probabilities, one column per class
    pub fn predict_proba(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(X, "predict_proba")?;
        self.average_support(X)
    }

    fn average_support(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        voting::average_support(&self.supports(X)?).ok_or(SemoosError::EmptyEnsemble("average supports"))
    }

    fn training_oracle(&self, action: &'static str) -> Result<Vec<Vec<bool>>> {
        let data = match (&self.training_data, self.members.is_empty()) {
            (Some(data), false) => data,
            _ => return Err(SemoosError::EmptyEnsemble(action)),
        };
        Ok(diversity::oracle_outputs(&self.hard_predictions(&data.X)?, &data.y))
    }

    /// Diversity on the training data; None for a single member
    pub fn calculate_diversity(&self) -> Result<Option<DiversityMeasures>> {
        let oracle = self.training_oracle("calculate diversity")?;
        Ok(DiversityMeasures::from_oracle(&oracle))
    }

    /// Interrater agreement kappa on the training data
    pub fn interrater_agreement(&self) -> Result<Option<f64>> {
        let oracle = self.training_oracle("compute interrater agreement")?;
        Ok(diversity::interrater_agreement(&oracle))
    }
}

/// Builds ensembles from diversified bootstraps, one optimizer call per repeat
pub struct EnsembleBuilder<C: BaseClassifier, O: Optimizer = Nsga2> {
    template: C,
    optimizer: O,
    settings: param::Ensemble,
    optimizer_settings: param::Optimizer,
    seed: u64,
    colorful: bool,
    running: Arc<AtomicBool>,
}

impl<C: BaseClassifier> EnsembleBuilder<C, Nsga2> {
    /// Validate the ensemble and optimizer sections and set up the default NSGA-II
    pub fn new(template: C, param: &Param) -> Result<EnsembleBuilder<C, Nsga2>> {
        param::validate_ensemble(&param.ensemble)?;
        param::validate_optimizer(&param.optimizer)?;
        if param.general.thread_number == 0 {
            return Err(SemoosError::Config("Invalid thread_number=0. Must be >= 1.".to_string()));
        }

        Ok(EnsembleBuilder {
            template,
            optimizer: Nsga2::new(&param.optimizer, param.general.thread_number),
            settings: param.ensemble.clone(),
            optimizer_settings: param.optimizer.clone(),
            seed: param.general.seed,
            colorful: param.general.display_colorful,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Flag polled between repeats and by the optimizer between generations
    pub fn with_stop_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.optimizer = self.optimizer.with_stop_flag(Arc::clone(&running));
        self.running = running;
        self
    }
}

impl<C: BaseClassifier, O: Optimizer> EnsembleBuilder<C, O> {
    pub fn with_optimizer<P: Optimizer>(self, optimizer: P) -> EnsembleBuilder<C, P> {
        EnsembleBuilder {
            template: self.template,
            optimizer,
            settings: self.settings,
            optimizer_settings: self.optimizer_settings,
            seed: self.seed,
            colorful: self.colorful,
            running: self.running,
        }
    }

    /// Fresh ensemble
    pub fn fit(&self, data: &Data, classes: Option<Vec<u8>>) -> Result<Ensemble<C>> {
        self.partial_fit(data, classes, Ensemble::empty(self.settings.predict_decision), true)
    }

    /// Run all repeats on `data`. With `reset` the members of `previous` are dropped,
    /// otherwise new members are appended after them. Roots restart from scratch and
    /// the stored training data becomes `data` in both cases.
    pub fn partial_fit(&self, data: &Data, classes: Option<Vec<u8>>, previous: Ensemble<C>, reset: bool) -> Result<Ensemble<C>> {
        let time = Instant::now();
        self.check_data(data)?;

        // probability columns and member labels are both ordered [majority, minority]
        let classes = match classes {
            Some(classes) if classes != [MAJORITY_CLASS, MINORITY_CLASS] => {
                return Err(SemoosError::Config(format!(
                    "Expected classes [{}, {}] (majority, minority), got {:?}",
                    MAJORITY_CLASS, MINORITY_CLASS, classes
                )))
            }
            Some(classes) => classes,
            None => vec![MAJORITY_CLASS, MINORITY_CLASS],
        };

        let mut ensemble = if reset { Ensemble::empty(self.settings.predict_decision) } else { previous };
        if !ensemble.members.is_empty() && ensemble.n_features != data.feature_len {
            return Err(SemoosError::Config(format!(
                "Cannot extend an ensemble trained on {} features with data having {} features",
                ensemble.n_features, data.feature_len
            )));
        }
        ensemble.classes = classes;
        ensemble.n_features = data.feature_len;
        ensemble.predict_decision = self.settings.predict_decision;

        let distances = distance_matrix(&data.X, self.settings.p_minkowski)?;
        let pool = data.minority_indices();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut sampler = DiversifiedSampler::new(&distances);

        for repeat in 0..self.settings.n_repeats {
            if !self.running.load(Ordering::Relaxed) {
                warn!("Signal received: stopping before repeat #{}", repeat + 1);
                break;
            }

            cinfo!(self.colorful, "\x1b[1;93mRepeat #{}/{}...\x1b[0m", repeat + 1, self.settings.n_repeats);
            let report = self.run_repeat(repeat, data, &pool, &mut sampler, &mut rng, &mut ensemble.members);
            let interrupted = matches!(report.solver_error, Some(SolverError::Interrupted { .. }));
            ensemble.reports.push(report);
            if interrupted {
                break;
            }
        }

        ensemble.roots.extend_from_slice(sampler.roots());
        ensemble.training_data = Some(data.clone());

        cinfo!(
            self.colorful,
            "\x1b[1;96mEnsemble of {} members built in {:.2?}\x1b[0m",
            ensemble.len(),
            time.elapsed()
        );
        Ok(ensemble)
    }

    fn check_data(&self, data: &Data) -> Result<()> {
        if data.feature_len == 0 {
            return Err(SemoosError::Config("Empty feature set: at least one feature is required.".to_string()));
        }
        if data.sample_len == 0 {
            return Err(SemoosError::Data("Dataset without samples".to_string()));
        }
        if data.count_class(MINORITY_CLASS) == 0 {
            return Err(SemoosError::Data(
                "No minority (label 1) sample: bootstraps cannot be repaired".to_string(),
            ));
        }
        Ok(())
    }

    fn run_repeat(
        &self,
        repeat: usize,
        data: &Data,
        pool: &[usize],
        sampler: &mut DiversifiedSampler,
        rng: &mut ChaCha8Rng,
        members: &mut Vec<EnsembleMember<C>>,
    ) -> RepeatReport {
        let mut bootstrap = sampler.draw(rng);
        let repair = repair_minority(&mut bootstrap.indices, &data.y, pool, rng);
        debug!(
            "Repeat #{}: root {} | fallback {} | {} minority rows injected",
            repeat + 1,
            bootstrap.root,
            bootstrap.uniform_fallback,
            repair.injected_count()
        );

        let mut report = RepeatReport {
            repeat,
            root: bootstrap.root,
            uniform_fallback: bootstrap.uniform_fallback,
            repair,
            solver_error: None,
            evaluations: 0,
            objectives: Vec::new(),
            members_added: 0,
            skipped: Vec::new(),
        };

        let problem = Problem::new(
            data.subset(&bootstrap.indices),
            self.template.clone(),
            &self.settings,
            &self.optimizer_settings,
            rng,
        );

        let pareto = match self.optimizer.solve(&problem) {
            Ok(pareto) => pareto,
            Err(e) => {
                warn!("Repeat #{}: {}", repeat + 1, e);
                report.solver_error = Some(e);
                return report;
            }
        };
        report.evaluations = pareto.evaluations;
        report.objectives = pareto.objectives.clone();

        for (position, decision) in pareto.solutions.iter().enumerate() {
            let features = decision.selected_features();
            if features.is_empty() {
                report.skipped.push((position, SkipReason::EmptyFeatureMask));
                continue;
            }
            let mut classifier = self.template.with_params(decision.c, decision.gamma);
            match classifier.fit(&data.select_features(&features), &data.y) {
                Ok(()) => {
                    members.push(EnsembleMember { classifier, features, c: decision.c, gamma: decision.gamma, repeat });
                    report.members_added += 1;
                }
                Err(e) => {
                    warn!("Repeat #{}: candidate {} not fitted: {}", repeat + 1, position, e);
                    report.skipped.push((position, SkipReason::FitFailed(e)));
                }
            }
        }

        info!(
            "Repeat #{}: {} Pareto solutions in {} evaluations, {} members added",
            repeat + 1,
            pareto.len(),
            pareto.evaluations,
            report.members_added
        );
        report
    }
}
