#![allow(non_snake_case)]

pub mod bootstrap;
pub mod classifier;
pub mod cv;
pub mod data;
pub mod distance;
pub mod diversity;
pub mod ensemble;
pub mod error;
pub mod experiment;
pub mod ga;
pub mod individual;
pub mod metrics;
pub mod param;
pub mod population;
pub mod problem;
pub mod repair;
pub mod utils;
pub mod voting;

pub use classifier::{BaseClassifier, SvcClassifier};
pub use data::Data;
pub use ensemble::{Ensemble, EnsembleBuilder};
pub use error::{Result, SemoosError};
pub use experiment::Experiment;
pub use param::Param;

use chrono::Local;
use experiment::{FoldResult, ScoreSet};
use log::{debug, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Load the dataset named in the parameters and run the experiment on it
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Experiment> {
    let mut data = Data::load_data(&param.data.path, param.data.delimiter, param.data.sample_column)?;
    data.set_classes(param.data.classes.clone());
    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", data);
    run_on_data(&data, param, running)
}

/// Repeated stratified k-fold evaluation of the ensemble, and of a single SVC if requested
pub fn run_on_data(data: &Data, param: &Param, running: Arc<AtomicBool>) -> Result<Experiment> {
    let start = std::time::Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let builder = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), param)?.with_stop_flag(Arc::clone(&running));
    let mut rng = ChaCha8Rng::seed_from_u64(param.general.seed);
    let outer_folds = cv::repeated_stratified_kfold(
        &data.y,
        param.experiment.n_splits,
        param.experiment.n_repeats,
        &mut rng,
    );

    let mut folds = Vec::with_capacity(outer_folds.len());
    for (i, fold) in outer_folds.iter().enumerate() {
        if !running.load(Ordering::Relaxed) {
            warn!("Signal received: {} of {} folds completed", i, outer_folds.len());
            break;
        }
        cinfo!(
            param.general.display_colorful,
            "\x1b[1;93mCompleting fold #{}/{}...\x1b[0m",
            i + 1,
            outer_folds.len()
        );

        let train = data.subset(&fold.train);
        let test = data.subset(&fold.test);
        folds.push(evaluate_fold(&builder, &train, &test, i, i / param.experiment.n_splits, param)?);
    }

    let semoos_version = format!(
        "{}#{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("SEMOOS_GIT_SHA").unwrap_or("unknown")
    );

    Ok(Experiment {
        id: format!("semoos_{}", timestamp),
        timestamp,
        semoos_version,
        parameters: param.clone(),
        data_summary: format!("{}", data),
        folds,
        execution_time: start.elapsed().as_secs_f64(),
    })
}

fn evaluate_fold(
    builder: &EnsembleBuilder<SvcClassifier>,
    train: &Data,
    test: &Data,
    fold: usize,
    repeat: usize,
    param: &Param,
) -> Result<FoldResult> {
    let (ensemble, ensemble_size, diversity) = match builder.fit(train, None) {
        Ok(ensemble) if !ensemble.is_empty() => {
            let predictions = ensemble.predict(&test.X)?;
            let diversity = ensemble.calculate_diversity()?;
            (Some(ScoreSet::new(&test.y, &predictions)), ensemble.len(), diversity)
        }
        Ok(_) => {
            warn!("Fold #{}: no ensemble member could be built", fold + 1);
            (None, 0, None)
        }
        Err(SemoosError::Data(e)) => {
            warn!("Fold #{} skipped: {}", fold + 1, e);
            (None, 0, None)
        }
        Err(e) => return Err(e),
    };

    let baseline = if param.experiment.baseline {
        let mut svc = SvcClassifier::scaled(&train.X);
        match svc.fit(&train.X, &train.y).and_then(|_| svc.predict(&test.X)) {
            Ok(predictions) => Some(ScoreSet::new(&test.y, &predictions)),
            Err(e) => {
                warn!("Fold #{}: baseline SVC failed: {}", fold + 1, e);
                None
            }
        }
    } else {
        None
    };

    debug!(
        "Fold #{}: ensemble {:?} ({} members) | baseline {:?}",
        fold + 1,
        ensemble.map(|s| s.balanced_accuracy),
        ensemble_size,
        baseline.map(|s| s.balanced_accuracy)
    );

    Ok(FoldResult {
        fold,
        repeat,
        train_size: train.sample_len,
        test_size: test.sample_len,
        ensemble,
        ensemble_size,
        diversity,
        baseline,
    })
}
