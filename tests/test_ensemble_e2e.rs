#![allow(non_snake_case)]

use ndarray::Array2;
use semoos::diversity::DiversityMeasures;
use semoos::voting::PredictDecision;
use semoos::{BaseClassifier, Data, EnsembleBuilder, Param, SemoosError, SvcClassifier};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// 30 samples on 3 features: 24 majority near the origin, 6 minority shifted on the first two
fn imbalanced_data() -> Data {
    let mut values = Vec::new();
    let mut y = Vec::new();
    for i in 0..24 {
        values.push((i % 4) as f64 * 0.2);
        values.push((i / 4) as f64 * 0.15);
        values.push(((i * 7) % 5) as f64 * 0.3);
        y.push(0);
    }
    for i in 0..6 {
        values.push(4.0 + (i % 2) as f64 * 0.3);
        values.push(4.0 + (i / 2) as f64 * 0.2);
        values.push(((i * 3) % 5) as f64 * 0.3);
        y.push(1);
    }
    Data::new(Array2::from_shape_vec((30, 3), values).unwrap(), y).unwrap()
}

fn small_param() -> Param {
    let mut param = Param::default();
    param.general.display_colorful = false;
    param.ensemble.n_repeats = 2;
    param.optimizer.p_size = 10;
    param.optimizer.n_eval = 40;
    param
}

#[test]
fn test_single_repeat_on_eighteen_to_two_data() {
    let mut values = Vec::new();
    for i in 0..18 {
        values.push((i % 6) as f64 * 0.1);
        values.push((i / 6) as f64 * 0.1);
    }
    values.extend_from_slice(&[3.0, 3.1, 3.2, 2.9]);
    let mut y = vec![0u8; 18];
    y.extend_from_slice(&[1, 1]);
    let data = Data::new(Array2::from_shape_vec((20, 2), values).unwrap(), y).unwrap();

    let mut param = small_param();
    param.ensemble.n_repeats = 1;
    param.optimizer.n_eval = 50;
    let ensemble = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), &param).unwrap().fit(&data, None).unwrap();

    assert!(!ensemble.is_empty());
    assert!(ensemble.len() <= 10);
    assert_eq!(ensemble.roots().len(), 1);
    let report = &ensemble.reports()[0];
    assert!(report.solver_error.is_none());
    assert!(report.evaluations <= 50);
    assert_eq!(report.members_added + report.skipped.len(), report.objectives.len());

    for decision in [PredictDecision::ASV, PredictDecision::MV] {
        let predictions = ensemble.predict_with(&data.X, decision).unwrap();
        assert_eq!(predictions.len(), 20);
        assert!(predictions.iter().all(|&l| l <= 1));
    }

    let diversity = ensemble.calculate_diversity().unwrap();
    if ensemble.len() >= 2 {
        let measures = diversity.expect("two or more members have a diversity");
        for value in [measures.entropy, measures.kohavi_wolpert, measures.disagreement, measures.q_statistic] {
            assert!(value.is_finite());
        }
    } else {
        assert!(diversity.is_none());
    }
}

#[test]
fn test_ensemble_size_is_bounded_by_repeats_and_population() {
    let param = small_param();
    let data = imbalanced_data();
    let ensemble = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), &param).unwrap().fit(&data, None).unwrap();

    assert!(!ensemble.is_empty());
    assert!(ensemble.len() <= param.ensemble.n_repeats * param.optimizer.p_size);
    assert_eq!(ensemble.selected_features().len(), ensemble.len());
    assert_eq!(ensemble.roots().len(), param.ensemble.n_repeats);
    for (member, features) in ensemble.members().iter().zip(ensemble.selected_features()) {
        assert!(!features.is_empty());
        assert!(features.iter().all(|&f| f < data.feature_len));
        assert_eq!(member.features.as_slice(), features);
        assert!(member.classifier.is_fitted());
    }
    for report in ensemble.reports() {
        assert!(report.evaluations <= param.optimizer.n_eval);
    }
}

#[test]
fn test_asv_and_mv_predict_binary_labels() {
    let param = small_param();
    let data = imbalanced_data();
    let ensemble = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), &param).unwrap().fit(&data, None).unwrap();

    for decision in [PredictDecision::ASV, PredictDecision::MV] {
        let predictions = ensemble.predict_with(&data.X, decision).unwrap();
        assert_eq!(predictions.len(), data.sample_len);
        assert!(predictions.iter().all(|&l| l == 0 || l == 1));
    }

    let proba = ensemble.predict_proba(&data.X).unwrap();
    assert_eq!(proba.dim(), (data.sample_len, 2));
    for row in proba.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_same_seed_builds_the_same_ensemble() {
    let param = small_param();
    let data = imbalanced_data();
    let builder = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), &param).unwrap();
    let a = builder.fit(&data, None).unwrap();
    let b = builder.fit(&data, None).unwrap();

    assert_eq!(a.roots(), b.roots());
    assert_eq!(a.selected_features(), b.selected_features());
    let hyperparameters = |e: &semoos::Ensemble<SvcClassifier>| -> Vec<(f64, f64)> {
        e.members().iter().map(|m| (m.c, m.gamma)).collect()
    };
    assert_eq!(hyperparameters(&a), hyperparameters(&b));
    assert_eq!(a.predict(&data.X).unwrap(), b.predict(&data.X).unwrap());
}

#[test]
fn test_diversity_is_within_range() {
    let param = small_param();
    let data = imbalanced_data();
    let ensemble = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), &param).unwrap().fit(&data, None).unwrap();

    match ensemble.calculate_diversity().unwrap() {
        Some(DiversityMeasures { entropy, kohavi_wolpert, disagreement, q_statistic }) => {
            assert!(ensemble.len() > 1);
            assert!((0.0..=1.0).contains(&entropy));
            assert!((0.0..=0.25).contains(&kohavi_wolpert));
            assert!((0.0..=1.0).contains(&disagreement));
            assert!((-1.0..=1.0).contains(&q_statistic));
        }
        None => assert_eq!(ensemble.len(), 1),
    }
}

#[test]
fn test_cross_validated_objectives() {
    let mut param = small_param();
    param.ensemble.n_repeats = 1;
    param.ensemble.cross_val = true;
    param.ensemble.cv_splits = 2;
    param.ensemble.cv_repeats = 1;
    let data = imbalanced_data();
    let ensemble = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), &param).unwrap().fit(&data, None).unwrap();

    let report = &ensemble.reports()[0];
    assert!(report.solver_error.is_none());
    for objectives in &report.objectives {
        assert_eq!(objectives.len(), 2);
        assert!(objectives.iter().all(|&o| (-1.0..=0.0).contains(&o)));
    }
}

#[test]
fn test_no_minority_sample_is_a_data_error() {
    let mut data = imbalanced_data();
    data.y = vec![0; data.sample_len];
    let builder = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), &small_param()).unwrap();
    assert!(matches!(builder.fit(&data, None), Err(SemoosError::Data(_))));
}

#[test]
fn test_flipped_classes_are_a_config_error() {
    let builder = EnsembleBuilder::new(SvcClassifier::new(1.0, 1.0), &small_param()).unwrap();
    assert!(matches!(builder.fit(&imbalanced_data(), Some(vec![1, 0])), Err(SemoosError::Config(_))));
}

#[test]
fn test_svc_requires_both_classes() {
    let mut svc = SvcClassifier::new(1.0, 1.0);
    let X = Array2::<f64>::zeros((4, 2));
    assert!(svc.fit(&X, &[0, 0, 0, 0]).is_err());
    assert!(svc.predict(&X).is_err());
}

#[test]
fn test_run_on_data_reports_every_outer_fold() {
    let mut param = small_param();
    param.ensemble.n_repeats = 1;
    param.experiment.n_splits = 2;
    param.experiment.n_repeats = 1;
    let data = imbalanced_data();

    let experiment = semoos::run_on_data(&data, &param, Arc::new(AtomicBool::new(true))).unwrap();
    assert_eq!(experiment.folds.len(), 2);
    assert!(experiment.id.starts_with("semoos_"));
    for fold in &experiment.folds {
        assert_eq!(fold.train_size + fold.test_size, data.sample_len);
        assert!(fold.baseline.is_some());
        if let Some(scores) = fold.ensemble {
            assert!((0.0..=1.0).contains(&scores.balanced_accuracy));
            assert!(fold.ensemble_size >= 1);
        }
    }
    assert!(experiment.display_results().contains("BAC"));
}

#[test]
fn test_run_on_data_stops_when_flag_is_cleared() {
    let mut param = small_param();
    param.experiment.n_splits = 2;
    let experiment = semoos::run_on_data(&imbalanced_data(), &param, Arc::new(AtomicBool::new(false))).unwrap();
    assert!(experiment.folds.is_empty());
}
