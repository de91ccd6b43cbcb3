//! # chronoml
//!
//! Plugin-based machine learning for irregular, gappy time series, with a
//! cross-validated benchmarking harness.
//!
//! ## Modules
//!
//! - **core**: tensor, error type and task types
//! - **data**: time series, datasets and targets
//! - **datasets**: seeded built-in loaders (sine, stock prices, PBC cohort)
//! - **metrics**: classification, regression and survival metrics
//! - **nn**: dense networks, Adam, ODE solver and interpolated control paths
//! - **plugins**: plugin contract, hyperparameter spaces, registry, pipelines
//! - **preprocessing**: imputation and scaling plugins
//! - **models**: classification, regression and time-to-event plugins
//! - **benchmarks**: fold splitting, `benchmark_models` and score tables
//!
//! ```no_run
//! use chronoml::prelude::*;
//!
//! let registry = chronoml::plugin_loader()?;
//! let data = SineDataLoader::default().load()?;
//! let model = registry.get_estimator("classification.nn_classifier", &args! { "n_iter" => 10 })?;
//! let mut tests = vec![TestCase::new("nn", model)];
//! let (table, _) = benchmark_models(TaskType::Classification, &mut tests, &data, &BenchmarkConfig::new(2, 0))?;
//! println!("{}", table);
//! # Ok::<(), chronoml::core::ChronoError>(())
//! ```

/// Tensor, error type and task types.
pub use chronoml_core as core;

/// Time series and datasets.
pub use chronoml_data as data;

/// Built-in dataset loaders.
pub use chronoml_datasets as datasets;

/// Evaluation metrics.
pub use chronoml_metrics as metrics;

/// Neural network building blocks.
pub use chronoml_nn as nn;

/// Plugin contract, registry and pipelines.
pub use chronoml_plugins as plugins;

/// Preprocessing plugins.
pub use chronoml_preprocessing as preprocessing;

/// Model plugins.
pub use chronoml_models as models;

/// Benchmarking harness.
pub use chronoml_benchmarks as benchmarks;

pub use chronoml_plugins::args;

use chronoml_core::Result;
use chronoml_plugins::PluginRegistry;

/// A registry holding every built-in plugin.
pub fn plugin_loader() -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    chronoml_preprocessing::register(&mut registry)?;
    chronoml_models::register(&mut registry)?;
    Ok(registry)
}

/// Commonly used types.
pub mod prelude {
    pub use chronoml_benchmarks::{benchmark_models, BenchmarkConfig, BenchmarkPlan, ScoreTable, TestCase};
    pub use chronoml_core::{ChronoError, Result, TaskType, Tensor};
    pub use chronoml_data::{Dataset, EventTargets, Targets, TimeSeries};
    pub use chronoml_datasets::{
        event0_time_percentiles, DataLoader, GoogleStocksDataLoader, PBCDataLoader, SineDataLoader,
    };
    pub use chronoml_plugins::{
        args, Args, Category, Estimator, Params, Pipeline, Plugin, PluginRegistry, PluginSpec, StepArgs,
        Transformer,
    };
}
