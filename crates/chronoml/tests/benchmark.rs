use chronoml::metrics::{
    classifier_supported_metrics, regression_supported_metrics, time_to_event_supported_metrics,
};
use chronoml::prelude::*;
use approx::assert_relative_eq;
use proptest::prelude::*;

fn step_args(step: &str, args: Args) -> StepArgs {
    StepArgs::from([(step.to_string(), args)])
}

/// `pipeline1`: ffill imputation followed by `estimator`; `plugin1`: the bare
/// estimator from the registry. Both train for 10 iterations.
fn test_cases(registry: &PluginRegistry, estimator: &str) -> Vec<TestCase> {
    let name = estimator.rsplit('.').next().unwrap();
    let pipeline = Pipeline::new(registry, &["preprocessing.imputation.ffill", estimator])
        .unwrap()
        .configure(&step_args(name, args! { "n_iter" => 10 }))
        .unwrap();
    let plugin = registry.get_estimator(estimator, &args! { "n_iter" => 10 }).unwrap();
    vec![
        TestCase::new("pipeline1", Box::new(pipeline)),
        TestCase::new("plugin1", plugin),
    ]
}

fn assert_complete(table: &ScoreTable, per_test: &chronoml::benchmarks::PerTestScores, metrics: &[&str]) {
    for label in ["pipeline1", "plugin1"] {
        assert!(table.columns().iter().any(|c| c == label));
        assert!(per_test.contains_key(label));
    }
    for metric in metrics {
        assert!(table.index().iter().any(|m| m == metric), "{} missing", metric);
        for label in ["pipeline1", "plugin1"] {
            assert!(per_test[label].contains_key(*metric));
            assert!(table.get(metric, label).unwrap().is_finite());
        }
    }
}

#[test]
fn test_classifier_benchmark() {
    let registry = chronoml::plugin_loader().unwrap();
    let mut tests = test_cases(&registry, "classification.nn_classifier");
    let data = SineDataLoader::default().load().unwrap();

    let (table, per_test) =
        benchmark_models(TaskType::Classification, &mut tests, &data, &BenchmarkConfig::new(2, 0)).unwrap();
    assert_complete(&table, &per_test, &classifier_supported_metrics());
    assert_eq!(per_test["plugin1"]["accuracy"].folds.len(), 2);
    for label in ["pipeline1", "plugin1"] {
        let summary = &per_test[label]["accuracy"];
        let mean = summary.folds.iter().sum::<f64>() / summary.folds.len() as f64;
        assert_relative_eq!(table.get("accuracy", label).unwrap(), mean, epsilon = 1e-12);
        assert_relative_eq!(table.std("accuracy", label).unwrap(), summary.std, epsilon = 1e-12);
    }
}

#[test]
fn test_regressor_benchmark() {
    let registry = chronoml::plugin_loader().unwrap();
    let mut tests = test_cases(&registry, "regression.nn_regressor");
    let data = GoogleStocksDataLoader::default().load().unwrap();

    let (table, per_test) =
        benchmark_models(TaskType::Regression, &mut tests, &data, &BenchmarkConfig::new(2, 0)).unwrap();
    assert_complete(&table, &per_test, &regression_supported_metrics());
}

#[test]
fn test_time_to_event_benchmark() {
    let registry = chronoml::plugin_loader().unwrap();
    let mut tests = test_cases(&registry, "time_to_event.dynamic_deephit");
    let data = PBCDataLoader::default().load().unwrap();
    let horizons = event0_time_percentiles(&data, &[0.25, 0.5, 0.75]).unwrap();

    let config = BenchmarkConfig::new(2, 0).with_horizons(horizons);
    let (table, per_test) = benchmark_models(TaskType::TimeToEvent, &mut tests, &data, &config).unwrap();
    assert_complete(&table, &per_test, &time_to_event_supported_metrics());
    for label in ["pipeline1", "plugin1"] {
        let c_index = table.get("c_index", label).unwrap();
        assert!((0.0..=1.0).contains(&c_index));
    }
}

#[test]
fn test_benchmark_is_reproducible() {
    let registry = chronoml::plugin_loader().unwrap();
    let data = SineDataLoader::default().load().unwrap();
    let config = BenchmarkConfig::new(2, 3);
    let run = |parallel: bool| {
        let mut tests = test_cases(&registry, "classification.nn_classifier");
        benchmark_models(TaskType::Classification, &mut tests, &data, &config.clone().with_parallel(parallel))
            .unwrap()
    };
    let first = run(false);
    assert_eq!(first, run(false));
    assert_eq!(first, run(true));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    #[test]
    fn prop_benchmark_is_reproducible_for_any_seed(seed in any::<u64>()) {
        let registry = chronoml::plugin_loader().unwrap();
        let data = GoogleStocksDataLoader::default().load().unwrap();
        let config = BenchmarkConfig::new(2, seed);
        let run = |parallel: bool| {
            let model = registry
                .get_estimator("regression.nn_regressor", &args! { "n_iter" => 2, "random_state" => seed })
                .unwrap();
            let mut tests = vec![TestCase::new("nn", model)];
            benchmark_models(TaskType::Regression, &mut tests, &data, &config.clone().with_parallel(parallel))
                .unwrap()
        };
        let first = run(false);
        prop_assert_eq!(&first, &run(true));
    }
}

#[test]
fn test_wrong_model_for_task_fails_with_context() {
    let registry = chronoml::plugin_loader().unwrap();
    let data = SineDataLoader::default().load().unwrap();
    // a regressor has no predict_proba
    let model = registry.get_estimator("regression.nn_regressor", &args! { "n_iter" => 2 }).unwrap();
    let mut tests = vec![TestCase::new("regressor", model)];
    let err = benchmark_models(TaskType::Classification, &mut tests, &data, &BenchmarkConfig::new(2, 0))
        .unwrap_err();
    match err {
        ChronoError::PluginExecution { label, fold, source } => {
            assert_eq!(label, "regressor");
            assert_eq!(fold, 0);
            assert!(matches!(*source, ChronoError::Unsupported { operation: "predict_proba", .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_duplicate_labels_rejected() {
    let registry = chronoml::plugin_loader().unwrap();
    let data = SineDataLoader::default().load().unwrap();
    let mut tests: Vec<TestCase> = (0..2)
        .map(|_| {
            let model = registry.get_estimator("classification.nn_classifier", &Args::new()).unwrap();
            TestCase::new("same", model)
        })
        .collect();
    let err = benchmark_models(TaskType::Classification, &mut tests, &data, &BenchmarkConfig::new(2, 0))
        .unwrap_err();
    assert!(matches!(err, ChronoError::Config(_)));
}

#[test]
fn test_plan_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("regression.toml");
    std::fs::write(
        &path,
        r#"
task = "regression"

[config]
n_splits = 2
random_state = 0

[[tests]]
label = "pipeline1"
steps = ["preprocessing.imputation.ffill", "regression.nn_regressor"]

[tests.args.nn_regressor]
n_iter = 10

[[tests]]
label = "plugin1"
steps = ["regression.nn_regressor"]

[tests.args."regression.nn_regressor"]
n_iter = 10
"#,
    )
    .unwrap();

    let registry = chronoml::plugin_loader().unwrap();
    let plan = BenchmarkPlan::from_path(&path).unwrap();
    let mut tests = plan.build_tests(&registry).unwrap();
    assert_eq!(tests[1].model.args()["n_iter"], 10);

    let data = GoogleStocksDataLoader::default().load().unwrap();
    let (table, per_test) = benchmark_models(plan.task, &mut tests, &data, &plan.config).unwrap();
    assert_complete(&table, &per_test, &regression_supported_metrics());

    let csv_path = dir.path().join("scores.csv");
    table.to_csv(&csv_path).unwrap();
    let csv = std::fs::read_to_string(csv_path).unwrap();
    assert!(csv.starts_with("metric,pipeline1,plugin1\nmse,"));
}

#[test]
fn test_plan_with_unknown_step_argument() {
    let plan = BenchmarkPlan::from_toml_str(
        r#"
task = "classification"

[[tests]]
label = "p"
steps = ["preprocessing.imputation.ffill", "classification.nn_classifier"]

[tests.args.xgboost]
n_iter = 10
"#,
    )
    .unwrap();
    let registry = chronoml::plugin_loader().unwrap();
    let err = plan.build_tests(&registry).unwrap_err();
    assert!(matches!(err, ChronoError::StepNotFound { step, .. } if step == "xgboost"));
}
