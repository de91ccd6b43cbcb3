use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::Dataset;
use rand::Rng;
use std::collections::BTreeMap;

use crate::params::{sample_space, Args, Params};
use crate::plugin::{ensure_fitted, Category, Estimator, Plugin, Transformer};
use crate::registry::{PluginEntry, PluginKind, PluginRegistry};

/// Per-step arguments, keyed by step name or full identifier.
pub type StepArgs = BTreeMap<String, Args>;

/// Structural definition of a pipeline: an ordered list of registered
/// transformer identifiers followed by one estimator identifier.
///
/// A definition is immutable; [`Pipeline::configure`] produces an
/// independent [`PipelineModel`] each time it is called.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<PluginEntry>,
}

impl Pipeline {
    pub fn new<S: AsRef<str>>(registry: &PluginRegistry, steps: &[S]) -> Result<Self> {
        let Some((last, init)) = steps.split_last() else {
            return Err(ChronoError::invalid_input("pipeline needs at least one step"));
        };
        let mut entries = Vec::with_capacity(steps.len());
        for id in init {
            let entry = registry.entry(id.as_ref())?;
            if entry.kind() != PluginKind::Transformer {
                return Err(ChronoError::invalid_input(format!(
                    "pipeline step {} must be a transformer",
                    entry.id()
                )));
            }
            entries.push(entry.clone());
        }
        let entry = registry.entry(last.as_ref())?;
        if entry.kind() != PluginKind::Estimator {
            return Err(ChronoError::invalid_input(format!(
                "last pipeline step {} must be an estimator",
                entry.id()
            )));
        }
        entries.push(entry.clone());
        Ok(Pipeline { steps: entries })
    }

    /// Short step names joined by `"->"`.
    pub fn name(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join("->")
    }

    /// Category of the final estimator.
    pub fn category(&self) -> Category {
        self.estimator_entry().category()
    }

    /// Full identifiers of the steps, in order.
    pub fn steps(&self) -> Vec<String> {
        self.steps.iter().map(PluginEntry::id).collect()
    }

    fn estimator_entry(&self) -> &PluginEntry {
        // `new` guarantees at least one step
        &self.steps[self.steps.len() - 1]
    }

    /// Every step's space with parameters renamed `"<step>.<param>"`.
    pub fn hyperparameter_space(&self) -> Vec<Params> {
        self.steps
            .iter()
            .flat_map(|s| {
                s.hyperparameter_space()
                    .into_iter()
                    .map(move |p| p.renamed(format!("{}.{}", s.name(), p.name())))
            })
            .collect()
    }

    /// One random configuration per step, keyed by step name.
    pub fn sample_hyperparameters<R: Rng + ?Sized>(&self, rng: &mut R) -> StepArgs {
        self.steps
            .iter()
            .map(|s| (s.name().to_string(), sample_space(&s.hyperparameter_space(), rng)))
            .collect()
    }

    /// Instantiate every step. Steps without arguments use their defaults.
    pub fn configure(&self, args: &StepArgs) -> Result<PipelineModel> {
        for key in args.keys() {
            if !self.steps.iter().any(|s| s.name() == key || s.id() == *key) {
                return Err(ChronoError::StepNotFound {
                    step: key.clone(),
                    available: self.steps.iter().map(|s| s.name().to_string()).collect(),
                });
            }
        }
        let step_args = |entry: &PluginEntry| -> Args {
            args.get(entry.name())
                .or_else(|| args.get(&entry.id()))
                .cloned()
                .unwrap_or_default()
        };

        let (last, init) = self
            .steps
            .split_last()
            .ok_or_else(|| ChronoError::invalid_input("pipeline needs at least one step"))?;
        let transformers = init
            .iter()
            .map(|e| e.build(&step_args(e))?.into_transformer())
            .collect::<Result<Vec<_>>>()?;
        let estimator = last.build(&step_args(last))?.into_estimator()?;

        Ok(PipelineModel {
            name: self.name(),
            transformers,
            estimator,
            fitted: false,
        })
    }
}

/// Configured pipeline: runs its transformers in order, then the estimator.
pub struct PipelineModel {
    name: String,
    transformers: Vec<Box<dyn Transformer>>,
    estimator: Box<dyn Estimator>,
    fitted: bool,
}

impl PipelineModel {
    /// Pass `data` through the fitted transformers.
    pub fn transform(&self, data: &Dataset) -> Result<Dataset> {
        ensure_fitted(self)?;
        let mut current = data.clone();
        for t in &self.transformers {
            current = t.transform(&current)?;
        }
        Ok(current)
    }

    pub fn estimator(&self) -> &dyn Estimator {
        self.estimator.as_ref()
    }
}

impl Plugin for PipelineModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.estimator.category()
    }

    fn hyperparameter_space(&self) -> Vec<Params> {
        let transformer_spaces = self
            .transformers
            .iter()
            .map(|t| (t.name().to_string(), t.hyperparameter_space()));
        let estimator_space = std::iter::once((
            self.estimator.name().to_string(),
            self.estimator.hyperparameter_space(),
        ));
        transformer_spaces
            .chain(estimator_space)
            .flat_map(|(step, space)| {
                space
                    .into_iter()
                    .map(move |p| p.renamed(format!("{}.{}", step, p.name())))
            })
            .collect()
    }

    /// Flattened step arguments named `"<step>.<param>"`.
    fn args(&self) -> Args {
        let transformer_args = self.transformers.iter().map(|t| (t.name().to_string(), t.args()));
        let estimator_args = std::iter::once((self.estimator.name().to_string(), self.estimator.args()));
        transformer_args
            .chain(estimator_args)
            .flat_map(|(step, args)| {
                args.into_iter()
                    .map(move |(k, v)| (format!("{}.{}", step, k), v))
            })
            .collect()
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = false;
        let mut current = data.clone();
        for t in &mut self.transformers {
            current = t.fit_transform(&current)?;
        }
        self.estimator.fit(&current)?;
        self.fitted = true;
        Ok(())
    }
}

impl Estimator for PipelineModel {
    fn predict(&self, data: &Dataset) -> Result<Tensor> {
        self.estimator.predict(&self.transform(data)?)
    }

    fn predict_proba(&self, data: &Dataset) -> Result<Tensor> {
        self.estimator.predict_proba(&self.transform(data)?)
    }

    fn predict_risk(&self, data: &Dataset, horizons: &[f64]) -> Result<Tensor> {
        self.estimator.predict_risk(&self.transform(data)?, horizons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{parse_args, to_args};
    use crate::plugin::PluginSpec;
    use crate::registry::tests::ConstantRegressor;
    use chronoml_data::{Targets, TimeSeries};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(deny_unknown_fields, default)]
    struct FillParams {
        value: f64,
    }

    /// Replaces NaN with a constant.
    struct ConstantFill {
        params: FillParams,
        fitted: bool,
    }

    impl Plugin for ConstantFill {
        fn name(&self) -> &str {
            Self::NAME
        }
        fn category(&self) -> Category {
            Self::CATEGORY
        }
        fn hyperparameter_space(&self) -> Vec<Params> {
            <Self as PluginSpec>::hyperparameter_space()
        }
        fn args(&self) -> Args {
            to_args(&self.params)
        }
        fn is_fitted(&self) -> bool {
            self.fitted
        }
        fn fit(&mut self, _data: &Dataset) -> Result<()> {
            self.fitted = true;
            Ok(())
        }
    }

    impl Transformer for ConstantFill {
        fn transform(&self, data: &Dataset) -> Result<Dataset> {
            ensure_fitted(self)?;
            let value = self.params.value;
            let series = data
                .time_series()
                .iter()
                .map(|s| s.with_values(s.values().apply(|v| if v.is_nan() { value } else { v })))
                .collect::<Result<Vec<_>>>()?;
            data.with_time_series(series)
        }
    }

    impl PluginSpec for ConstantFill {
        const NAME: &'static str = "constant_fill";
        const CATEGORY: Category = Category::Imputation;
        fn hyperparameter_space() -> Vec<Params> {
            vec![Params::float("value", 0.0, 1.0)]
        }
        fn from_args(args: &Args) -> Result<Self> {
            Ok(ConstantFill {
                params: parse_args(Self::NAME, args)?,
                fitted: false,
            })
        }
    }

    fn registry() -> PluginRegistry {
        let mut r = PluginRegistry::new();
        r.register_transformer::<ConstantFill>().unwrap();
        r.register_estimator::<ConstantRegressor>().unwrap();
        r
    }

    fn dataset() -> Dataset {
        let series = (0..3)
            .map(|i| {
                TimeSeries::new(vec![0.0, 1.0], Tensor::new(vec![f64::NAN, i as f64], vec![2, 1]).unwrap())
                    .unwrap()
            })
            .collect();
        Dataset::new(series)
            .unwrap()
            .with_targets(Targets::Static(Tensor::column(&[0.0, 1.0, 2.0])))
            .unwrap()
    }

    #[test]
    fn test_pipeline_structure() {
        let r = registry();
        let p = Pipeline::new(&r, &["preprocessing.imputation.constant_fill", "regression.constant"]).unwrap();
        assert_eq!(p.name(), "constant_fill->constant");
        assert_eq!(p.category(), Category::Regression);
        let names: Vec<String> = p.hyperparameter_space().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["constant_fill.value", "constant.value"]);
    }

    #[test]
    fn test_pipeline_validates_steps() {
        let r = registry();
        assert!(matches!(
            Pipeline::new(&r, &["preprocessing.imputation.missing", "regression.constant"]),
            Err(ChronoError::UnknownPlugin(_))
        ));
        // estimator before the end
        assert!(Pipeline::new(&r, &["regression.constant", "regression.constant"]).is_err());
        // transformer at the end
        assert!(Pipeline::new(&r, &["preprocessing.imputation.constant_fill"]).is_err());
        assert!(Pipeline::new::<&str>(&r, &[]).is_err());
    }

    #[test]
    fn test_configure_fit_predict() {
        let r = registry();
        let p = Pipeline::new(&r, &["preprocessing.imputation.constant_fill", "regression.constant"]).unwrap();
        let mut args = StepArgs::new();
        args.insert("constant".into(), crate::args! { "value" => 0.25 });
        args.insert("preprocessing.imputation.constant_fill".into(), crate::args! { "value" => 1.0 });
        let mut model = p.configure(&args).unwrap();
        assert_eq!(model.name(), "constant_fill->constant");
        assert_eq!(model.args()["constant.value"], 0.25);

        let data = dataset();
        assert!(matches!(model.predict(&data), Err(ChronoError::NotFitted(_))));
        model.fit(&data).unwrap();
        let transformed = model.transform(&data).unwrap();
        assert!(transformed.time_series().iter().all(|s| !s.values().has_nan()));
        let pred = model.predict(&data).unwrap();
        assert_eq!(pred.shape(), &[3, 1]);
        assert!(pred.data().iter().all(|&v| v == 0.25));
        assert!(matches!(model.predict_proba(&data), Err(ChronoError::Unsupported { .. })));
    }

    #[test]
    fn test_configure_unknown_step() {
        let r = registry();
        let p = Pipeline::new(&r, &["preprocessing.imputation.constant_fill", "regression.constant"]).unwrap();
        let mut args = StepArgs::new();
        args.insert("xgb".into(), Args::new());
        let err = p.configure(&args).err().unwrap();
        assert!(matches!(err, ChronoError::StepNotFound { step, .. } if step == "xgb"));
    }

    #[test]
    fn test_sampled_configurations_build() {
        let r = registry();
        let p = Pipeline::new(&r, &["preprocessing.imputation.constant_fill", "regression.constant"]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let args = p.sample_hyperparameters(&mut rng);
            assert!(p.configure(&args).is_ok());
        }
    }
}
