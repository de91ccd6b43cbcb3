use chronoml_core::{ChronoError, Result, TaskType};
use chronoml_plugins::{Estimator, Pipeline, PluginRegistry, StepArgs};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::harness::TestCase;

fn parse_toml<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    toml::from_str(s).map_err(|e| ChronoError::config(e.to_string()))
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    parse_toml(&text)
}

// ─── Run configuration ──────────────────────────────────────────────────────

/// Cross-validation settings of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchmarkConfig {
    /// Number of folds, at least 2.
    pub n_splits: usize,
    /// Seed of the fold partition.
    pub random_state: u64,
    /// Evaluation horizons; required for time-to-event runs.
    pub horizons: Vec<f64>,
    /// Evaluate test cases on the rayon thread pool.
    pub parallel: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            n_splits: 3,
            random_state: 0,
            horizons: Vec::new(),
            parallel: false,
        }
    }
}

impl BenchmarkConfig {
    pub fn new(n_splits: usize, random_state: u64) -> Self {
        BenchmarkConfig {
            n_splits,
            random_state,
            ..Default::default()
        }
    }

    pub fn with_horizons(mut self, horizons: Vec<f64>) -> Self {
        self.horizons = horizons;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        parse_toml(s)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_toml(path.as_ref())
    }
}

// ─── Declarative plans ──────────────────────────────────────────────────────

/// One test case of a plan: a single registered estimator or a pipeline of
/// transformers ending in an estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCaseSpec {
    pub label: String,
    /// Full plugin identifiers, e.g. `"preprocessing.imputation.ffill"`.
    pub steps: Vec<String>,
    /// Arguments per step, keyed by short name or full identifier.
    #[serde(default)]
    pub args: StepArgs,
}

impl TestCaseSpec {
    /// Instantiate the test case from `registry`.
    pub fn build(&self, registry: &PluginRegistry) -> Result<TestCase> {
        let model: Box<dyn Estimator> = match self.steps.as_slice() {
            // a lone estimator is used as is, not wrapped in a pipeline
            [single] => {
                let entry = registry.entry(single)?;
                if let Some(key) = self.args.keys().find(|k| *k != entry.name() && **k != entry.id()) {
                    return Err(ChronoError::StepNotFound {
                        step: key.clone(),
                        available: vec![entry.name().to_string()],
                    });
                }
                let args = self
                    .args
                    .get(entry.name())
                    .or_else(|| self.args.get(single.as_str()))
                    .cloned()
                    .unwrap_or_default();
                registry.get_estimator(single, &args)?
            }
            _ => Box::new(Pipeline::new(registry, &self.steps)?.configure(&self.args)?),
        };
        Ok(TestCase::new(self.label.clone(), model))
    }
}

/// A complete benchmark description: task, settings and test cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkPlan {
    pub task: TaskType,
    #[serde(default)]
    pub config: BenchmarkConfig,
    pub tests: Vec<TestCaseSpec>,
}

impl BenchmarkPlan {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        parse_toml(s)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_toml(path.as_ref())
    }

    /// Instantiate every test case, in plan order.
    pub fn build_tests(&self, registry: &PluginRegistry) -> Result<Vec<TestCase>> {
        self.tests.iter().map(|t| t.build(registry)).collect()
    }
}
