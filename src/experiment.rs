use crate::diversity::DiversityMeasures;
use crate::metrics::ConfusionMatrix;
use crate::param::Param;
use crate::utils::{mean_and_std, strip_ansi};
use serde::{Deserialize, Serialize};

/// Scores reported for a classifier on one test fold
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ScoreSet {
    pub balanced_accuracy: f64,
    pub g_mean: f64,
    pub g_mean2: f64,
    pub f1_score: f64,
    pub recall: f64,
    pub specificity: f64,
    pub precision: f64,
}

impl ScoreSet {
    pub const NAMES: [&'static str; 7] = ["BAC", "Gmean", "Gmean2", "F1score", "Recall", "Specificity", "Precision"];

    pub fn new(y_true: &[u8], y_pred: &[u8]) -> ScoreSet {
        let cm = ConfusionMatrix::new(y_true, y_pred);
        ScoreSet {
            balanced_accuracy: cm.balanced_accuracy(),
            g_mean: cm.g_mean(),
            g_mean2: cm.g_mean2(),
            f1_score: cm.f1_score(),
            recall: cm.recall(),
            specificity: cm.specificity(),
            precision: cm.precision(),
        }
    }

    /// Values in the order of `NAMES`
    pub fn values(&self) -> [f64; 7] {
        [
            self.balanced_accuracy,
            self.g_mean,
            self.g_mean2,
            self.f1_score,
            self.recall,
            self.specificity,
            self.precision,
        ]
    }
}

/// Ensemble (and baseline) results on one outer fold
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FoldResult {
    pub fold: usize,
    pub repeat: usize,
    pub train_size: usize,
    pub test_size: usize,
    /// None when no member could be built on this fold
    pub ensemble: Option<ScoreSet>,
    pub ensemble_size: usize,
    pub diversity: Option<DiversityMeasures>,
    pub baseline: Option<ScoreSet>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MetricSummary {
    pub metric: String,
    pub mean: f64,
    pub std: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Experiment {
    /// Experiment ID, i.e., crate name and timestamp
    pub id: String,
    pub timestamp: String,
    /// semoos version and git hash used
    pub semoos_version: String,
    pub parameters: Param,
    /// One-line description of the dataset
    pub data_summary: String,
    pub folds: Vec<FoldResult>,
    /// Execution time in seconds
    pub execution_time: f64,
}

fn summarize<'a>(scores: impl Iterator<Item = &'a ScoreSet>) -> Option<Vec<MetricSummary>> {
    let collected: Vec<&ScoreSet> = scores.collect();
    if collected.is_empty() {
        return None;
    }
    Some(
        ScoreSet::NAMES
            .iter()
            .enumerate()
            .map(|(m, name)| {
                let values: Vec<f64> = collected.iter().map(|s| s.values()[m]).collect();
                let (mean, std) = mean_and_std(&values);
                MetricSummary { metric: name.to_string(), mean, std }
            })
            .collect(),
    )
}

impl Experiment {
    /// Mean and standard deviation of the ensemble scores across folds
    pub fn ensemble_summary(&self) -> Option<Vec<MetricSummary>> {
        summarize(self.folds.iter().filter_map(|f| f.ensemble.as_ref()))
    }

    pub fn baseline_summary(&self) -> Option<Vec<MetricSummary>> {
        summarize(self.folds.iter().filter_map(|f| f.baseline.as_ref()))
    }

    pub fn mean_ensemble_size(&self) -> f64 {
        let sizes: Vec<f64> = self.folds.iter().map(|f| f.ensemble_size as f64).collect();
        mean_and_std(&sizes).0
    }

    /// Mean diversity over the folds where it could be measured
    pub fn mean_diversity(&self) -> Option<DiversityMeasures> {
        let measures: Vec<&DiversityMeasures> = self.folds.iter().filter_map(|f| f.diversity.as_ref()).collect();
        if measures.is_empty() {
            return None;
        }
        let mean = |f: fn(&DiversityMeasures) -> f64| mean_and_std(&measures.iter().map(|m| f(m)).collect::<Vec<f64>>()).0;
        Some(DiversityMeasures {
            entropy: mean(|m| m.entropy),
            kohavi_wolpert: mean(|m| m.kohavi_wolpert),
            disagreement: mean(|m| m.disagreement),
            q_statistic: mean(|m| m.q_statistic),
        })
    }

    pub fn display_results(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!("\n=============== Experiment {} ===============\n\n", self.id));
        text.push_str(&format!("semoos version: v{}\n", self.semoos_version));
        text.push_str(&format!("Timestamp: {}\n", self.timestamp));
        text.push_str(&format!("Data: {}\n", self.data_summary));
        text.push_str(&format!(
            "Folds: {} ({} splits x {} repeats) | decision: {:?} | repeats per ensemble: {}\n",
            self.folds.len(),
            self.parameters.experiment.n_splits,
            self.parameters.experiment.n_repeats,
            self.parameters.ensemble.predict_decision,
            self.parameters.ensemble.n_repeats
        ));
        text.push_str(&format!("Execution time: {:.2}s\n\n", self.execution_time));

        text.push_str(&format!("\x1b[1;93m{:<12} {:>18} {:>18}\x1b[0m\n", "Metric", "SEMOOS", "SVC"));
        let ensemble = self.ensemble_summary();
        let baseline = self.baseline_summary();
        for (m, name) in ScoreSet::NAMES.iter().enumerate() {
            let cell = |summary: &Option<Vec<MetricSummary>>| match summary {
                Some(s) => format!("{:.3} ± {:.3}", s[m].mean, s[m].std),
                None => "-".to_string(),
            };
            text.push_str(&format!("{:<12} {:>18} {:>18}\n", name, cell(&ensemble), cell(&baseline)));
        }

        text.push_str(&format!("\nMean ensemble size: {:.1}\n", self.mean_ensemble_size()));
        match self.mean_diversity() {
            Some(d) => text.push_str(&format!(
                "Diversity: entropy {:.3} | KW {:.3} | disagreement {:.3} | Q {:.3}\n",
                d.entropy, d.kohavi_wolpert, d.disagreement, d.q_statistic
            )),
            None => text.push_str("Diversity: not measured (fewer than two members)\n"),
        }

        if self.parameters.general.display_colorful {
            text
        } else {
            strip_ansi(&text)
        }
    }
}
