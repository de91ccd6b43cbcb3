//! Cross-validated benchmarking of time-series estimators.
//!
//! [`benchmark_models`] splits a dataset into seeded folds, fits every test
//! case on each training split, scores the held-out split with the fixed
//! metric set of the task and aggregates the results into a [`ScoreTable`].

pub mod config;
pub mod harness;
pub mod report;
pub mod split;

pub use config::{BenchmarkConfig, BenchmarkPlan, TestCaseSpec};
pub use harness::{benchmark_models, TestCase};
pub use report::{CaseScores, MetricSummary, PerTestScores, ScoreTable};
pub use split::{kfold, stratified_kfold, Fold};
