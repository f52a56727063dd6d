use thiserror::Error;

/// Errors surfaced to callers of the ensemble builder, the predictor and the experiment runner
#[derive(Debug, Error)]
pub enum SemoosError {
    /// Invalid parameters, detected before any computation starts
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Dataset that cannot feed the bootstrap procedure
    #[error("invalid data: {0}")]
    Data(String),
    /// Prediction or diversity requested on an ensemble without members
    #[error("cannot {0} with an empty ensemble: fit must produce at least one member first")]
    EmptyEnsemble(&'static str),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Failures of one optimizer invocation. All of them are recoverable at the repeat level.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("no feasible solution in the final population after {evaluations} evaluations")]
    NoFeasibleSolution { evaluations: usize },
    #[error("time limit of {limit_secs:.1}s exceeded after {evaluations} evaluations")]
    Timeout { limit_secs: f64, evaluations: usize },
    #[error("interrupted after {evaluations} evaluations")]
    Interrupted { evaluations: usize },
}

/// Failures of the base classifier
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("training labels contain a single class")]
    SingleClass,
    #[error("classifier used before being fitted")]
    NotFitted,
    #[error("expected {expected} columns, got {got}")]
    Shape { expected: usize, got: usize },
    #[error("classifier backend failed: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SemoosError>;
