use chronoml::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_sampled_hyperparameters_build_every_plugin() {
    let registry = chronoml::plugin_loader().unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    for id in registry.list() {
        let space = registry.hyperparameter_space(&id).unwrap();
        for _ in 0..100 {
            let args = registry.sample_hyperparameters(&id, &mut rng).unwrap();
            for p in &space {
                assert!(p.contains(&args[p.name()]), "{}: {} = {}", id, p.name(), args[p.name()]);
            }
            let plugin = registry
                .get(&id, &args)
                .unwrap_or_else(|e| panic!("{} rejected {:?}: {}", id, args, e));
            assert_eq!(plugin.fullname(), id);
        }
    }
}

#[test]
fn test_pipeline_space_is_prefixed_by_step() {
    let registry = chronoml::plugin_loader().unwrap();
    let pipeline = Pipeline::new(
        &registry,
        &["preprocessing.imputation.ffill", "time_to_event.dynamic_deephit"],
    )
    .unwrap();
    assert_eq!(pipeline.name(), "ffill->dynamic_deephit");
    let names: Vec<String> = pipeline.hyperparameter_space().iter().map(|p| p.name().to_string()).collect();
    assert!(names.contains(&"dynamic_deephit.n_durations".to_string()));

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let args = pipeline.sample_hyperparameters(&mut rng);
        assert!(pipeline.configure(&args).is_ok());
    }
}

#[test]
fn test_pipeline_imputes_before_estimator() {
    let registry = chronoml::plugin_loader().unwrap();
    let data = PBCDataLoader::default().load().unwrap();
    assert!(data.time_series().iter().any(|s| s.values().has_nan()));

    let mut model = Pipeline::new(
        &registry,
        &["preprocessing.imputation.ffill", "time_to_event.dynamic_deephit"],
    )
    .unwrap()
    .configure(&StepArgs::from([("dynamic_deephit".to_string(), args! { "n_iter" => 5 })]))
    .unwrap();
    model.fit(&data).unwrap();
    let risk = model.predict_risk(&data, &[1.0, 2.0]).unwrap();
    assert_eq!(risk.shape(), &[data.len(), 2]);
    assert!(!risk.has_nan());
}
