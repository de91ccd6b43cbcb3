//! Cross-validated evaluation of test cases on a shared dataset.

use chronoml_core::{ChronoError, Result, TaskType, Tensor};
use chronoml_data::Dataset;
use chronoml_metrics::survival::{censoring_distribution, KaplanMeier};
use chronoml_metrics::{
    supported_metrics, ClassificationOutcome, ClassifierMetric, RegressionMetric, SurvivalOutcome,
    TimeToEventMetric,
};
use chronoml_plugins::Estimator;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info};

use crate::config::BenchmarkConfig;
use crate::report::{CaseScores, MetricSummary, PerTestScores, ScoreTable};
use crate::split::{kfold, stratified_kfold, Fold};

/// A labelled, configured estimator to benchmark.
pub struct TestCase {
    pub label: String,
    pub model: Box<dyn Estimator>,
}

impl TestCase {
    pub fn new(label: impl Into<String>, model: Box<dyn Estimator>) -> Self {
        TestCase {
            label: label.into(),
            model,
        }
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("label", &self.label)
            .field("model", &self.model.fullname())
            .finish()
    }
}

/// Train and held-out data of one fold, materialized once and shared by
/// every test case.
struct FoldData {
    train: Dataset,
    test: Dataset,
    censoring: Option<KaplanMeier>,
}

// ─── Validation and folds ───────────────────────────────────────────────────

fn validate(task: TaskType, tests: &[TestCase], data: &Dataset, config: &BenchmarkConfig) -> Result<()> {
    if tests.is_empty() {
        return Err(ChronoError::config("benchmark needs at least one test case"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = tests.iter().find(|t| !seen.insert(t.label.as_str())) {
        return Err(ChronoError::config(format!("duplicate test case label {:?}", dup.label)));
    }
    if !data.supports(task) {
        return Err(ChronoError::invalid_input(format!(
            "dataset targets do not support {}",
            task
        )));
    }
    if task == TaskType::TimeToEvent {
        if config.horizons.is_empty() {
            return Err(ChronoError::config("time_to_event benchmarks need at least one horizon"));
        }
        if let Some(h) = config.horizons.iter().find(|h| !h.is_finite()) {
            return Err(ChronoError::config(format!("horizon {} is not finite", h)));
        }
    }
    Ok(())
}

/// Class index of every sample; labels must be non-negative integers.
fn class_labels(targets: &Tensor) -> Result<Vec<usize>> {
    if targets.ncols() != 1 {
        return Err(ChronoError::invalid_input(format!(
            "classification targets need one column, got {}",
            targets.ncols()
        )));
    }
    targets
        .data()
        .iter()
        .map(|&v| {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                Err(ChronoError::invalid_input(format!("label {} is not a class index", v)))
            }
        })
        .collect()
}

fn make_folds(task: TaskType, data: &Dataset, config: &BenchmarkConfig) -> Result<Vec<Fold>> {
    match task {
        TaskType::Classification => {
            let targets = data
                .static_targets()
                .ok_or_else(|| ChronoError::invalid_input("classification needs static targets"))?;
            stratified_kfold(&class_labels(targets)?, config.n_splits, config.random_state)
        }
        TaskType::TimeToEvent => {
            let targets = data
                .event_targets()
                .ok_or_else(|| ChronoError::invalid_input("time_to_event needs event targets"))?;
            let strata: Vec<usize> = targets.events().iter().map(|&e| usize::from(e)).collect();
            stratified_kfold(&strata, config.n_splits, config.random_state)
        }
        TaskType::Regression => kfold(data.len(), config.n_splits, config.random_state),
    }
}

fn materialize(task: TaskType, data: &Dataset, folds: &[Fold]) -> Result<Vec<FoldData>> {
    folds
        .iter()
        .map(|fold| {
            let train = data.subset(&fold.train)?;
            let test = data.subset(&fold.test)?;
            let censoring = match (task, train.event_targets()) {
                (TaskType::TimeToEvent, Some(events)) => {
                    Some(censoring_distribution(events.times(), events.events())?)
                }
                _ => None,
            };
            Ok(FoldData { train, test, censoring })
        })
        .collect()
}

// ─── Scoring ────────────────────────────────────────────────────────────────

fn check_rows(pred: &Tensor, expected: usize, what: &str) -> Result<()> {
    if pred.nrows() != expected {
        return Err(ChronoError::invalid_input(format!(
            "{} returned {} rows for {} samples",
            what,
            pred.nrows(),
            expected
        )));
    }
    Ok(())
}

fn score_classification(model: &dyn Estimator, fold: &FoldData) -> Result<Vec<f64>> {
    let n = fold.test.len();
    let targets = fold
        .test
        .static_targets()
        .ok_or_else(|| ChronoError::invalid_input("classification needs static targets"))?;
    let y_true = class_labels(targets)?;

    let proba = model.predict_proba(&fold.test)?;
    check_rows(&proba, n, "predict_proba")?;
    let pred = model.predict(&fold.test)?;
    check_rows(&pred, n, "predict")?;
    let y_pred = class_labels(&Tensor::column(&pred.column_values(0)?))?;

    let n_classes = y_true
        .iter()
        .chain(&y_pred)
        .map(|c| c + 1)
        .max()
        .unwrap_or(0)
        .max(proba.ncols());
    let outcome = ClassificationOutcome {
        y_true: &y_true,
        y_pred: &y_pred,
        proba: &proba,
        n_classes,
    };
    ClassifierMetric::ALL.iter().map(|m| m.score(&outcome)).collect()
}

fn score_regression(model: &dyn Estimator, fold: &FoldData) -> Result<Vec<f64>> {
    let y_true = fold
        .test
        .static_targets()
        .ok_or_else(|| ChronoError::invalid_input("regression needs static targets"))?;
    let pred = model.predict(&fold.test)?;
    check_rows(&pred, fold.test.len(), "predict")?;
    RegressionMetric::ALL.iter().map(|m| m.score(y_true, &pred)).collect()
}

fn score_time_to_event(model: &dyn Estimator, fold: &FoldData, horizons: &[f64]) -> Result<Vec<f64>> {
    let missing = || ChronoError::invalid_input("time_to_event needs event targets");
    let train = fold.train.event_targets().ok_or_else(missing)?;
    let test = fold.test.event_targets().ok_or_else(missing)?;
    let censoring = fold.censoring.as_ref().ok_or_else(missing)?;

    let risk = model.predict_risk(&fold.test, horizons)?;
    check_rows(&risk, fold.test.len(), "predict_risk")?;
    let outcome = SurvivalOutcome {
        train_times: train.times(),
        train_events: train.events(),
        test_times: test.times(),
        test_events: test.events(),
        risk: &risk,
        horizons,
    };
    TimeToEventMetric::ALL
        .iter()
        .map(|m| m.score_with(censoring, &outcome))
        .collect()
}

fn run_fold(task: TaskType, model: &mut dyn Estimator, fold: &FoldData, config: &BenchmarkConfig) -> Result<Vec<f64>> {
    model.fit(&fold.train)?;
    match task {
        TaskType::Classification => score_classification(model, fold),
        TaskType::Regression => score_regression(model, fold),
        TaskType::TimeToEvent => score_time_to_event(model, fold, &config.horizons),
    }
}

/// Fit and score one test case on every fold.
fn evaluate_case(
    task: TaskType,
    case: &mut TestCase,
    folds: &[FoldData],
    config: &BenchmarkConfig,
) -> Result<CaseScores> {
    info!(label = %case.label, plugin = %case.model.fullname(), "evaluating test case");
    let metrics = supported_metrics(task);
    let mut per_metric: Vec<Vec<f64>> = vec![Vec::with_capacity(folds.len()); metrics.len()];

    for (k, fold) in folds.iter().enumerate() {
        let scores = run_fold(task, case.model.as_mut(), fold, config)
            .map_err(|e| ChronoError::plugin_execution(case.label.clone(), k, e))?;
        debug!(label = %case.label, fold = k, train = fold.train.len(), test = fold.test.len(), "fold scored");
        for (values, score) in per_metric.iter_mut().zip(scores) {
            values.push(score);
        }
    }

    Ok(metrics
        .iter()
        .zip(per_metric)
        .map(|(name, folds)| (name.to_string(), MetricSummary::from_folds(folds)))
        .collect::<BTreeMap<_, _>>())
}

/// Cross-validate every test case on `data` and score it with every metric
/// of `task`.
///
/// Returns the aggregate table (metrics × labels, means over folds) and the
/// per-test detail. The first failing fit or prediction aborts the run with
/// [`ChronoError::PluginExecution`]; with `config.parallel` the reported
/// failure is still the one of the earliest test case.
pub fn benchmark_models(
    task: TaskType,
    tests: &mut [TestCase],
    data: &Dataset,
    config: &BenchmarkConfig,
) -> Result<(ScoreTable, PerTestScores)> {
    validate(task, tests, data, config)?;
    let folds = make_folds(task, data, config)?;
    let fold_data = materialize(task, data, &folds)?;
    info!(
        task = %task,
        tests = tests.len(),
        samples = data.len(),
        n_splits = config.n_splits,
        parallel = config.parallel,
        "benchmark started"
    );

    let results: Vec<Result<CaseScores>> = if config.parallel {
        tests
            .par_iter_mut()
            .map(|case| evaluate_case(task, case, &fold_data, config))
            .collect()
    } else {
        let mut out = Vec::with_capacity(tests.len());
        for case in tests.iter_mut() {
            let result = evaluate_case(task, case, &fold_data, config);
            let failed = result.is_err();
            out.push(result);
            if failed {
                break;
            }
        }
        out
    };

    let mut per_test = PerTestScores::new();
    for (case, result) in tests.iter().zip(results) {
        per_test.insert(case.label.clone(), result?);
    }
    let labels: Vec<String> = tests.iter().map(|t| t.label.clone()).collect();
    let table = ScoreTable::from_scores(&supported_metrics(task), &labels, &per_test)?;
    info!(task = %task, tests = labels.len(), "benchmark finished");
    Ok((table, per_test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoml_data::{EventTargets, Targets, TimeSeries};
    use chronoml_plugins::{Args, Category, Params, Plugin};

    /// Predicts the training mean; optionally fails on a given fit call.
    struct MeanModel {
        mean: Option<f64>,
        fail_on_fit: Option<usize>,
        fits: usize,
    }

    impl MeanModel {
        fn new() -> Self {
            MeanModel { mean: None, fail_on_fit: None, fits: 0 }
        }
    }

    impl Plugin for MeanModel {
        fn name(&self) -> &str {
            "mean_model"
        }
        fn category(&self) -> Category {
            Category::Regression
        }
        fn hyperparameter_space(&self) -> Vec<Params> {
            Vec::new()
        }
        fn args(&self) -> Args {
            Args::new()
        }
        fn is_fitted(&self) -> bool {
            self.mean.is_some()
        }
        fn fit(&mut self, data: &Dataset) -> Result<()> {
            self.fits += 1;
            if self.fail_on_fit == Some(self.fits) {
                return Err(ChronoError::fit("mean_model", "boom"));
            }
            let y = data.static_targets().ok_or_else(|| ChronoError::fit("mean_model", "no targets"))?;
            self.mean = Some(y.data().iter().sum::<f64>() / y.numel() as f64);
            Ok(())
        }
    }

    impl Estimator for MeanModel {
        fn predict(&self, data: &Dataset) -> Result<Tensor> {
            let mean = self.mean.ok_or_else(|| ChronoError::NotFitted(self.fullname()))?;
            Ok(Tensor::full(data.len(), 1, mean))
        }
    }

    fn regression_data(n: usize) -> Dataset {
        let series = (0..n)
            .map(|i| TimeSeries::new(vec![0.0], Tensor::column(&[i as f64])).unwrap())
            .collect();
        let y: Vec<f64> = (0..n).map(|i| i as f64).collect();
        Dataset::new(series)
            .unwrap()
            .with_targets(Targets::Static(Tensor::column(&y)))
            .unwrap()
    }

    fn case(label: &str) -> TestCase {
        TestCase::new(label, Box::new(MeanModel::new()))
    }

    #[test]
    fn test_regression_benchmark_shapes() {
        let data = regression_data(12);
        let mut tests = vec![case("b"), case("a")];
        let (table, per_test) =
            benchmark_models(TaskType::Regression, &mut tests, &data, &BenchmarkConfig::new(3, 0)).unwrap();
        assert_eq!(table.index(), &["mse", "mae", "r2"]);
        assert_eq!(table.columns(), &["b", "a"]);
        assert_eq!(per_test["a"]["mse"].folds.len(), 3);
        // identical models on identical folds
        assert_eq!(table.get("mse", "a"), table.get("mse", "b"));
        assert!(table.get("r2", "a").unwrap() <= 0.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = regression_data(10);
        let config = BenchmarkConfig::new(2, 5);
        let mut seq = vec![case("x"), case("y")];
        let mut par = vec![case("x"), case("y")];
        let a = benchmark_models(TaskType::Regression, &mut seq, &data, &config).unwrap();
        let b = benchmark_models(TaskType::Regression, &mut par, &data, &config.clone().with_parallel(true)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_failure_names_label_and_fold() {
        let data = regression_data(9);
        for parallel in [false, true] {
            let mut failing = MeanModel::new();
            failing.fail_on_fit = Some(2);
            let mut tests = vec![case("ok"), TestCase::new("broken", Box::new(failing))];
            let config = BenchmarkConfig::new(3, 0).with_parallel(parallel);
            let err = benchmark_models(TaskType::Regression, &mut tests, &data, &config).unwrap_err();
            match err {
                ChronoError::PluginExecution { label, fold, source } => {
                    assert_eq!(label, "broken");
                    assert_eq!(fold, 1);
                    assert!(matches!(*source, ChronoError::Fit { .. }));
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_validation_errors() {
        let data = regression_data(4);
        let config = BenchmarkConfig::new(2, 0);
        assert!(matches!(
            benchmark_models(TaskType::Regression, &mut [], &data, &config),
            Err(ChronoError::Config(_))
        ));
        let mut dup = vec![case("a"), case("a")];
        assert!(matches!(
            benchmark_models(TaskType::Regression, &mut dup, &data, &config),
            Err(ChronoError::Config(_))
        ));
        let mut one = vec![case("a")];
        assert!(matches!(
            benchmark_models(TaskType::Regression, &mut one, &data, &BenchmarkConfig::new(5, 0)),
            Err(ChronoError::Config(_))
        ));
        assert!(matches!(
            benchmark_models(TaskType::TimeToEvent, &mut one, &data, &config),
            Err(ChronoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_time_to_event_requires_horizons() {
        let series = (0..4)
            .map(|i| TimeSeries::new(vec![0.0], Tensor::column(&[i as f64])).unwrap())
            .collect();
        let events = EventTargets::new(vec![1.0, 2.0, 3.0, 4.0], vec![true, false, true, true]).unwrap();
        let data = Dataset::new(series).unwrap().with_targets(Targets::Events(events)).unwrap();
        let mut one = vec![case("a")];
        let err = benchmark_models(TaskType::TimeToEvent, &mut one, &data, &BenchmarkConfig::new(2, 0)).unwrap_err();
        assert!(matches!(err, ChronoError::Config(_)));
    }
}
