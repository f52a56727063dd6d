use crate::data::MINORITY_CLASS;
use crate::error::ClassifierError;
use linfa::dataset::Pr;
use linfa::traits::Predict;
use linfa::Dataset;
use linfa_svm::{Svm, SvmError, SvmParams};
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// A probabilistic binary classifier parametrized by a regularization `c` and a kernel
/// width `gamma`. Probability columns are ordered by label: `[P(0), P(1)]`.
pub trait BaseClassifier: Clone + Send + Sync {
    /// Unfitted copy carrying new hyperparameters
    fn with_params(&self, c: f64, gamma: f64) -> Self;
    fn fit(&mut self, X: &Array2<f64>, y: &[u8]) -> Result<(), ClassifierError>;
    fn predict(&self, X: &Array2<f64>) -> Result<Vec<u8>, ClassifierError>;
    fn predict_proba(&self, X: &Array2<f64>) -> Result<Array2<f64>, ClassifierError>;
    fn name(&self) -> &'static str {
        "classifier"
    }
}

/// RBF-kernel SVC with Platt-scaled probabilities
#[derive(Clone)]
pub struct SvcClassifier {
    pub c: f64,
    pub gamma: f64,
    n_features: usize,
    model: Option<Arc<Svm<f64, Pr>>>,
}

impl SvcClassifier {
    pub fn new(c: f64, gamma: f64) -> SvcClassifier {
        SvcClassifier { c, gamma, n_features: 0, model: None }
    }

    /// C=1 and gamma=1/(n_features * var(X)), the usual "scale" heuristic
    pub fn scaled(X: &Array2<f64>) -> SvcClassifier {
        let variance = X.var(0.0);
        let denominator = X.ncols() as f64 * variance;
        let gamma = if denominator > 0.0 && denominator.is_finite() { 1.0 / denominator } else { 1.0 };
        SvcClassifier::new(1.0, gamma)
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn check_shape(&self, X: &Array2<f64>) -> Result<&Svm<f64, Pr>, ClassifierError> {
        let model = self.model.as_deref().ok_or(ClassifierError::NotFitted)?;
        if X.ncols() != self.n_features {
            return Err(ClassifierError::Shape { expected: self.n_features, got: X.ncols() });
        }
        Ok(model)
    }

    /// P(minority) for every row
    fn positive_probabilities(&self, X: &Array2<f64>) -> Result<Vec<f64>, ClassifierError> {
        let model = self.check_shape(X)?;
        let predictions = model.predict(X.to_owned());
        let targets: Vec<Pr> = predictions.targets().to_vec();
        Ok(targets.iter().map(|v| **v as f64).collect())
    }
}

impl BaseClassifier for SvcClassifier {
    fn with_params(&self, c: f64, gamma: f64) -> Self {
        SvcClassifier::new(c, gamma)
    }

    fn fit(&mut self, X: &Array2<f64>, y: &[u8]) -> Result<(), ClassifierError> {
        if X.nrows() != y.len() {
            return Err(ClassifierError::Shape { expected: X.nrows(), got: y.len() });
        }
        if !y.iter().any(|&l| l == MINORITY_CLASS) || y.iter().all(|&l| l == MINORITY_CLASS) {
            return Err(ClassifierError::SingleClass);
        }

        let targets = Array1::from_vec(y.iter().map(|&l| l == MINORITY_CLASS).collect::<Vec<bool>>());
        let dataset = Dataset::new(X.to_owned(), targets);

        // linfa's gaussian kernel is exp(-|x-y|^2 / eps)
        let params: SvmParams<f64, Pr> = Svm::<f64, Pr>::params()
            .pos_neg_weights(self.c, self.c)
            .gaussian_kernel(1.0 / self.gamma);

        let model = <SvmParams<f64, Pr> as linfa::traits::Fit<_, _, SvmError>>::fit(&params, &dataset)
            .map_err(|e| ClassifierError::Backend(e.to_string()))?;

        self.n_features = X.ncols();
        self.model = Some(Arc::new(model));
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Vec<u8>, ClassifierError> {
        Ok(self
            .positive_probabilities(X)?
            .into_iter()
            .map(|p| if p >= 0.5 { MINORITY_CLASS } else { 1 - MINORITY_CLASS })
            .collect())
    }

    fn predict_proba(&self, X: &Array2<f64>) -> Result<Array2<f64>, ClassifierError> {
        let positives = self.positive_probabilities(X)?;
        let mut proba = Array2::<f64>::zeros((positives.len(), 2));
        for (i, p) in positives.into_iter().enumerate() {
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        Ok(proba)
    }

    fn name(&self) -> &'static str {
        "SVC"
    }
}
