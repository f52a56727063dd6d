use crate::error::SemoosError;
use crate::metrics::ObjectiveMetric;
use crate::voting::PredictDecision;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum RealCrossover {
    #[serde(rename = "real_sbx")]
    Sbx,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum BinaryCrossover {
    #[serde(rename = "bin_two_point")]
    TwoPoint,
    #[serde(rename = "bin_one_point")]
    OnePoint,
    #[serde(rename = "bin_ux")]
    Uniform,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum RealMutation {
    #[serde(rename = "real_pm")]
    Polynomial,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum BinaryMutation {
    #[serde(rename = "bin_bitflip")]
    Bitflip,
}

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub ensemble: Ensemble,
    #[serde(default)]
    pub optimizer: Optimizer,
    #[serde(default)]
    pub experiment: Experiment,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "one_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub path: String,
    #[serde(default = "false_default")]
    pub sample_column: bool,
    #[serde(default = "delimiter_default")]
    pub delimiter: char,
    #[serde(default = "class_names_default")]
    pub classes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ensemble {
    #[serde(default = "n_repeats_default")]
    pub n_repeats: usize,
    #[serde(default = "p_minkowski_default")]
    pub p_minkowski: f64,
    #[serde(default = "predict_decision_default")]
    pub predict_decision: PredictDecision,
    #[serde(default = "half_default")]
    pub scale_features: f64,
    #[serde(default = "half_default")]
    pub test_size: f64,
    #[serde(default = "false_default")]
    pub cross_val: bool,
    #[serde(default = "cv_splits_default")]
    pub cv_splits: usize,
    #[serde(default = "cv_repeats_default")]
    pub cv_repeats: usize,
    #[serde(default = "objectives_default")]
    pub objectives: Vec<ObjectiveMetric>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Optimizer {
    #[serde(default = "p_size_default")]
    pub p_size: usize,
    #[serde(default = "n_eval_default")]
    pub n_eval: usize,
    #[serde(default = "optimizer_seed_default")]
    pub seed: u64,
    #[serde(default = "eta_default")]
    pub etac: f64,
    #[serde(default = "eta_default")]
    pub etam: f64,
    #[serde(default = "crossover_real_default")]
    pub crossover_real: RealCrossover,
    #[serde(default = "crossover_bin_default")]
    pub crossover_bin: BinaryCrossover,
    #[serde(default = "mutation_real_default")]
    pub mutation_real: RealMutation,
    #[serde(default = "mutation_bin_default")]
    pub mutation_bin: BinaryMutation,
    #[serde(default = "c_bounds_default")]
    pub c_bounds: (f64, f64),
    #[serde(default = "gamma_bounds_default")]
    pub gamma_bounds: (f64, f64),
    #[serde(default = "zero_default")]
    pub time_limit_secs: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Experiment {
    #[serde(default = "cv_splits_default")]
    pub n_splits: usize,
    #[serde(default = "cv_repeats_default")]
    pub n_repeats: usize,
    #[serde(default = "true_default")]
    pub baseline: bool,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Ensemble {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Experiment {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Param {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn get(param_file: String) -> Result<Param, SemoosError> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)?;

    validate(&mut config)?;

    Ok(config)
}

pub fn validate(param: &mut Param) -> Result<(), SemoosError> {
    if !param.general.log_base.is_empty() {
        param.general.display_colorful = false;
    }

    if param.general.thread_number == 0 {
        return Err(SemoosError::Config(
            "Invalid thread_number=0. Must be >= 1.".to_string(),
        ));
    }

    validate_ensemble(&param.ensemble)?;
    validate_optimizer(&param.optimizer)?;

    if param.experiment.n_splits < 2 || param.experiment.n_repeats == 0 {
        return Err(SemoosError::Config(format!(
            "Invalid experiment folds ({} splits x {} repeats). Need >= 2 splits and >= 1 repeat.",
            param.experiment.n_splits, param.experiment.n_repeats
        )));
    }

    Ok(())
}

pub(crate) fn validate_ensemble(ensemble: &Ensemble) -> Result<(), SemoosError> {
    if ensemble.n_repeats == 0 {
        return Err(SemoosError::Config(
            "Invalid n_repeats=0. At least one bootstrap repeat is required.".to_string(),
        ));
    }

    let p = ensemble.p_minkowski;
    if p.is_nan() || p <= 0.0 {
        return Err(SemoosError::Config(format!(
            "Invalid p_minkowski={}. Must be > 0 (1=Manhattan, 2=Euclidean, inf=Chebyshev).",
            p
        )));
    }

    if !(ensemble.scale_features > 0.0 && ensemble.scale_features <= 1.0) {
        return Err(SemoosError::Config(format!(
            "Invalid scale_features={:.3}. Must be in range (0, 1].",
            ensemble.scale_features
        )));
    }

    if !ensemble.cross_val && !(ensemble.test_size > 0.0 && ensemble.test_size < 1.0) {
        return Err(SemoosError::Config(format!(
            "Invalid test_size={:.3}. Must be in range (0, 1).",
            ensemble.test_size
        )));
    }

    if ensemble.cross_val && (ensemble.cv_splits < 2 || ensemble.cv_repeats == 0) {
        return Err(SemoosError::Config(format!(
            "Invalid cross-validation ({} splits x {} repeats). Need >= 2 splits and >= 1 repeat.",
            ensemble.cv_splits, ensemble.cv_repeats
        )));
    }

    if ensemble.cross_val && ensemble.cv_splits > 2 {
        warn!(
            "cv_splits={} while repaired bootstraps only guarantee 2 minority samples: \
            some folds will be trained on a single class.",
            ensemble.cv_splits
        );
    }

    if ensemble.objectives.is_empty() {
        return Err(SemoosError::Config(
            "At least one objective metric is required.".to_string(),
        ));
    }

    Ok(())
}

pub(crate) fn validate_optimizer(optimizer: &Optimizer) -> Result<(), SemoosError> {
    if optimizer.p_size < 2 {
        return Err(SemoosError::Config(format!(
            "Invalid p_size={}. Must be >= 2.",
            optimizer.p_size
        )));
    }

    if optimizer.n_eval < optimizer.p_size {
        return Err(SemoosError::Config(format!(
            "Invalid n_eval={}. The evaluation budget must cover at least the initial population (p_size={}).",
            optimizer.n_eval, optimizer.p_size
        )));
    }

    if optimizer.etac < 0.0 || optimizer.etam < 0.0 {
        return Err(SemoosError::Config(format!(
            "Invalid distribution indices etac={:.3}, etam={:.3}. Must be >= 0.",
            optimizer.etac, optimizer.etam
        )));
    }

    for (name, (low, high)) in [("c_bounds", optimizer.c_bounds), ("gamma_bounds", optimizer.gamma_bounds)] {
        if !(low > 0.0 && low < high && high.is_finite()) {
            return Err(SemoosError::Config(format!(
                "Invalid {}=({}, {}). Need 0 < low < high.",
                name, low, high
            )));
        }
    }

    if optimizer.time_limit_secs < 0.0 {
        return Err(SemoosError::Config(format!(
            "Invalid time_limit_secs={:.1}. Use 0 to disable the limit.",
            optimizer.time_limit_secs
        )));
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn optimizer_seed_default() -> u64 {
    1
}
fn empty_string() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn delimiter_default() -> char {
    ','
}
fn class_names_default() -> Vec<String> {
    Vec::new()
}
fn false_default() -> bool {
    false
}
fn true_default() -> bool {
    true
}
fn zero_default() -> f64 {
    0.0
}
fn half_default() -> f64 {
    0.5
}
fn one_default() -> usize {
    1
}
fn n_repeats_default() -> usize {
    5
}
fn p_minkowski_default() -> f64 {
    2.0
}
fn predict_decision_default() -> PredictDecision {
    PredictDecision::ASV
}
fn cv_splits_default() -> usize {
    2
}
fn cv_repeats_default() -> usize {
    5
}
fn objectives_default() -> Vec<ObjectiveMetric> {
    vec![ObjectiveMetric::precision, ObjectiveMetric::recall]
}
fn p_size_default() -> usize {
    100
}
fn n_eval_default() -> usize {
    1000
}
fn eta_default() -> f64 {
    5.0
}
fn crossover_real_default() -> RealCrossover {
    RealCrossover::Sbx
}
fn crossover_bin_default() -> BinaryCrossover {
    BinaryCrossover::TwoPoint
}
fn mutation_real_default() -> RealMutation {
    RealMutation::Polynomial
}
fn mutation_bin_default() -> BinaryMutation {
    BinaryMutation::Bitflip
}
fn c_bounds_default() -> (f64, f64) {
    (0.1, 1000.0)
}
fn gamma_bounds_default() -> (f64, f64) {
    (0.001, 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_param_matches_reference_settings() {
        let param = Param::default();
        assert_eq!(param.ensemble.n_repeats, 5);
        assert_eq!(param.ensemble.p_minkowski, 2.0);
        assert_eq!(param.ensemble.predict_decision, PredictDecision::ASV);
        assert_eq!(param.optimizer.p_size, 100);
        assert_eq!(param.optimizer.n_eval, 1000);
        assert_eq!(param.optimizer.seed, 1);
        assert_eq!(param.optimizer.crossover_bin, BinaryCrossover::TwoPoint);
        assert_eq!(param.ensemble.objectives.len(), 2);
    }

    #[test]
    fn test_default_param_is_valid() {
        let mut param = Param::default();
        assert!(validate(&mut param).is_ok());
    }

    #[test]
    fn test_yaml_overrides_are_partial() {
        let yaml = "ensemble:\n  n_repeats: 3\n  predict_decision: MV\noptimizer:\n  crossover_bin: bin_ux\n";
        let param: Param = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(param.ensemble.n_repeats, 3);
        assert_eq!(param.ensemble.predict_decision, PredictDecision::MV);
        assert_eq!(param.optimizer.crossover_bin, BinaryCrossover::Uniform);
        assert_eq!(param.optimizer.p_size, 100, "untouched fields keep their default");
    }

    #[test]
    fn test_validate_rejects_invalid_minkowski_parameter() {
        let mut param = Param::default();
        param.ensemble.p_minkowski = 0.0;
        assert!(matches!(validate(&mut param), Err(SemoosError::Config(_))));
        param.ensemble.p_minkowski = -1.0;
        assert!(matches!(validate(&mut param), Err(SemoosError::Config(_))));
        param.ensemble.p_minkowski = 0.5;
        assert!(validate(&mut param).is_ok(), "0<p<1 is allowed");
        param.ensemble.p_minkowski = f64::INFINITY;
        assert!(validate(&mut param).is_ok(), "p=inf is allowed");
    }

    #[test]
    fn test_validate_rejects_zero_repeats() {
        let mut param = Param::default();
        param.ensemble.n_repeats = 0;
        assert!(matches!(validate(&mut param), Err(SemoosError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_budget_smaller_than_population() {
        let mut param = Param::default();
        param.optimizer.p_size = 50;
        param.optimizer.n_eval = 20;
        assert!(matches!(validate(&mut param), Err(SemoosError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut param = Param::default();
        param.optimizer.gamma_bounds = (1.0, 0.5);
        assert!(matches!(validate(&mut param), Err(SemoosError::Config(_))));
    }

    #[test]
    fn test_sample_param_file_loads() {
        let param = get("param.yaml".to_string()).unwrap();
        assert_eq!(param.general.thread_number, 4);
        assert_eq!(param.data.classes, vec!["majority", "minority"]);
        assert_eq!(param.optimizer.mutation_real, RealMutation::Polynomial);
        assert_eq!(param.optimizer.time_limit_secs, 0.0);
    }

    #[test]
    fn test_log_base_disables_colors() {
        let mut param = Param::default();
        param.general.log_base = "semoos_run".to_string();
        validate(&mut param).unwrap();
        assert!(!param.general.display_colorful);
    }
}
