//! Plugin contract, hyperparameter spaces, the plugin registry and
//! pipelines built from registered plugins.

pub mod params;
pub mod pipeline;
pub mod plugin;
pub mod registry;

pub use params::{parse_args, sample_space, to_args, Args, Params};
pub use pipeline::{Pipeline, PipelineModel, StepArgs};
pub use plugin::{
    ensure_fitted, split_identifier, AnyPlugin, Category, Estimator, Plugin, PluginSpec, Transformer,
};
pub use registry::{PluginEntry, PluginKind, PluginRegistry};

#[doc(hidden)]
pub use serde_json;
