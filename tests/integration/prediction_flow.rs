//! Raw records through normalizer, heuristic, model and backtest.

use serde_json::{json, Value};

use sizecast::backtest::BacktestSimulator;
use sizecast::history::{HistoryNormalizer, InputOrder, NewestFirst, OldestFirst, Sequence};
use sizecast::predict::{
    EnsembleAdapter, EnsembleOutcome, FeatureExtractor, FeatureVector, HeuristicPredictor, ModelPredictor,
    Predictor,
};
use sizecast::types::{Color, PredictError, Size};

fn records(numbers: &[i64]) -> Vec<Value> {
    numbers.iter().map(|n| json!({ "number": n })).collect()
}

fn newest_first(numbers: &[i64]) -> Sequence<NewestFirst> {
    HistoryNormalizer::new().normalize(&records(numbers), InputOrder::NewestFirst)
}

#[test]
fn test_double_big_predicts_small() {
    let p = HeuristicPredictor::new().predict(&newest_first(&[7, 8, 3, 9, 2])).unwrap();
    assert_eq!(p.size, Size::Small);
    assert_eq!(p.numbers, [1, 2, 3]);
}

#[test]
fn test_double_small_predicts_big() {
    let p = HeuristicPredictor::new().predict(&newest_first(&[2, 3, 7, 1, 4])).unwrap();
    assert_eq!(p.size, Size::Big);
    assert_eq!(p.numbers, [6, 7, 8]);
}

#[test]
fn test_mixed_window_with_colors() {
    let raw = vec![
        json!({"number": 7, "color": "red"}),
        json!({"num": "2", "colors": ["green"]}),
        json!({"Number": 8.0, "color": "Red"}),
        json!({"number": 1, "color": " violet "}),
    ];
    let window = HistoryNormalizer::new().normalize(&raw, InputOrder::NewestFirst);
    let p = HeuristicPredictor::new().predict(&window).unwrap();
    assert_eq!(p.size, Size::Big);
    assert_eq!(p.color, Color::Red);
    assert_eq!(p.numbers, [6, 7, 8]);
}

#[test]
fn test_declared_order_reaches_same_prediction() {
    let oldest: Vec<i64> = vec![2, 9, 3, 8, 7];
    let a = HistoryNormalizer::new().normalize(&records(&oldest), InputOrder::OldestFirst);
    let b = newest_first(&[7, 8, 3, 9, 2]);
    assert_eq!(a, b);
}

#[test]
fn test_bad_rows_do_not_abort_batch() {
    let raw = vec![
        json!({"number": "abc", "color": "red"}),
        json!({"number": 6}),
        json!({"number": 9}),
        json!("not a record"),
    ];
    let window = HistoryNormalizer::new().normalize(&raw, InputOrder::NewestFirst);
    assert_eq!(window.len(), 4);
    assert_eq!(window.as_slice()[0].number, None);
    assert_eq!(window.as_slice()[3].number, None);

    // The two usable numbers are both Big.
    let p = HeuristicPredictor::new().predict(&window).unwrap();
    assert_eq!(p.size, Size::Small);
}

#[test]
fn test_backtest_ten_observations() {
    let history: Sequence<OldestFirst> = newest_first(&[0, 9, 8, 7, 6, 5, 4, 3, 2, 1]).into_oldest_first();
    let result = BacktestSimulator::new(8).run(&HeuristicPredictor::new(), &history).unwrap();
    assert_eq!(result.total, 2);
    assert!(result.hits <= 2);

    let short: Sequence<OldestFirst> = newest_first(&[8, 7, 6, 5, 4, 3, 2, 1]).into_oldest_first();
    let err = BacktestSimulator::new(8).run(&HeuristicPredictor::new(), &short).unwrap_err();
    assert_eq!(err, PredictError::InsufficientHistory { window: 8, available: 8 });
}

fn size_only_model(big_bias: f64) -> sizecast::model::ModelArtifact {
    let weights = vec![vec![0.0; FeatureVector::len_for(8)]; 2];
    let artifact = json!({
        "size": { "weights": weights, "bias": [0.0, big_bias] }
    });
    sizecast::model::parse_model(&artifact.to_string()).unwrap()
}

#[test]
fn test_linear_model_scores_features() {
    let model = std::sync::Arc::new(size_only_model(2.0));
    let features = FeatureExtractor::new(8).extract(&newest_first(&[1, 2]));
    assert_eq!(features.len(), 21);

    let EnsembleOutcome::Scored(output) = EnsembleAdapter::new(model).score(&features) else {
        panic!("expected scored outcome");
    };
    let size = output.size.unwrap();
    assert_eq!(size.label, Size::Big);
    assert!(size.prob > 0.8);
    assert!(output.color.is_none());
}

#[test]
fn test_feature_shape_mismatch_is_failed_outcome() {
    let model = std::sync::Arc::new(size_only_model(2.0));
    let features = FeatureExtractor::new(4).extract(&newest_first(&[1, 2]));
    let outcome = EnsembleAdapter::new(model).score(&features);
    assert!(outcome.is_failed());
    assert!(outcome.output().is_empty());
}

#[test]
fn test_model_backtest_always_small() {
    let model = std::sync::Arc::new(size_only_model(-3.0));
    let predictor = ModelPredictor::new(model, FeatureExtractor::new(8));
    // Targets after window 2: 1, 7, 2 -> two Small.
    let history: Sequence<OldestFirst> = newest_first(&[2, 7, 1, 9, 4]).into_oldest_first();
    let result = BacktestSimulator::new(2).run(&predictor, &history).unwrap();
    assert_eq!(result.predictor, "model");
    assert_eq!(result.total, 3);
    assert_eq!(result.hits, 2);
}
