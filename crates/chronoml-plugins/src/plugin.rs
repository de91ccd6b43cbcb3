use chronoml_core::{ChronoError, Result, TaskType, Tensor};
use chronoml_data::Dataset;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::params::{sample_space, Args, Params};

/// Plugin family; the first part of a plugin identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "preprocessing.imputation")]
    Imputation,
    #[serde(rename = "preprocessing.scaling")]
    Scaling,
    #[serde(rename = "classification")]
    Classification,
    #[serde(rename = "regression")]
    Regression,
    #[serde(rename = "time_to_event")]
    TimeToEvent,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::Imputation,
        Self::Scaling,
        Self::Classification,
        Self::Regression,
        Self::TimeToEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imputation => "preprocessing.imputation",
            Self::Scaling => "preprocessing.scaling",
            Self::Classification => "classification",
            Self::Regression => "regression",
            Self::TimeToEvent => "time_to_event",
        }
    }

    /// Task solved by estimators of this category; `None` for preprocessing.
    pub fn task(&self) -> Option<TaskType> {
        match self {
            Self::Imputation | Self::Scaling => None,
            Self::Classification => Some(TaskType::Classification),
            Self::Regression => Some(TaskType::Regression),
            Self::TimeToEvent => Some(TaskType::TimeToEvent),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ChronoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ChronoError::invalid_input(format!("unknown plugin category {:?}", s)))
    }
}

/// Split `"category.name"` into its parts.
pub fn split_identifier(id: &str) -> Result<(Category, &str)> {
    let (category, name) = id
        .rsplit_once('.')
        .ok_or_else(|| ChronoError::UnknownPlugin(id.to_string()))?;
    let category = category
        .parse()
        .map_err(|_| ChronoError::UnknownPlugin(id.to_string()))?;
    Ok((category, name))
}

// ─── Instance contract ──────────────────────────────────────────────────────

/// Behaviour shared by every configured plugin instance.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn category(&self) -> Category;

    /// `"<category>.<name>"`.
    fn fullname(&self) -> String {
        format!("{}.{}", self.category(), self.name())
    }

    /// Tunable hyperparameters; independent of fitted state.
    fn hyperparameter_space(&self) -> Vec<Params>;

    /// Current configuration.
    fn args(&self) -> Args;

    fn is_fitted(&self) -> bool;

    /// Train on `data`, discarding any previous fit.
    fn fit(&mut self, data: &Dataset) -> Result<()>;
}

/// Plugin that maps a dataset to a new dataset (imputation, scaling).
pub trait Transformer: Plugin {
    fn transform(&self, data: &Dataset) -> Result<Dataset>;

    fn fit_transform(&mut self, data: &Dataset) -> Result<Dataset> {
        self.fit(data)?;
        self.transform(data)
    }
}

/// Plugin that predicts targets.
pub trait Estimator: Plugin {
    /// One row per time series of `data`.
    fn predict(&self, data: &Dataset) -> Result<Tensor>;

    /// Class probabilities `[n_samples, n_classes]`.
    fn predict_proba(&self, _data: &Dataset) -> Result<Tensor> {
        Err(ChronoError::unsupported(self.fullname(), "predict_proba"))
    }

    /// Cumulative incidence `[n_samples, horizons.len()]`.
    fn predict_risk(&self, _data: &Dataset, _horizons: &[f64]) -> Result<Tensor> {
        Err(ChronoError::unsupported(self.fullname(), "predict_risk"))
    }
}

// ─── Type-level contract ────────────────────────────────────────────────────

/// Static description of a plugin type, used by the registry.
pub trait PluginSpec: Sized {
    const NAME: &'static str;
    const CATEGORY: Category;

    fn hyperparameter_space() -> Vec<Params>;

    /// Build an unfitted instance; unknown or ill-typed keys are rejected.
    fn from_args(args: &Args) -> Result<Self>;

    /// Registry identifier, `"<category>.<name>"`.
    fn identifier() -> String {
        format!("{}.{}", Self::CATEGORY, Self::NAME)
    }

    /// A random configuration drawn from [`PluginSpec::hyperparameter_space`].
    fn sample_hyperparameters<R: Rng + ?Sized>(rng: &mut R) -> Args {
        sample_space(&Self::hyperparameter_space(), rng)
    }
}

/// Instance returned by registry lookups.
pub enum AnyPlugin {
    Transformer(Box<dyn Transformer>),
    Estimator(Box<dyn Estimator>),
}

impl AnyPlugin {
    pub fn name(&self) -> &str {
        match self {
            AnyPlugin::Transformer(t) => t.name(),
            AnyPlugin::Estimator(e) => e.name(),
        }
    }

    pub fn fullname(&self) -> String {
        match self {
            AnyPlugin::Transformer(t) => t.fullname(),
            AnyPlugin::Estimator(e) => e.fullname(),
        }
    }

    pub fn hyperparameter_space(&self) -> Vec<Params> {
        match self {
            AnyPlugin::Transformer(t) => t.hyperparameter_space(),
            AnyPlugin::Estimator(e) => e.hyperparameter_space(),
        }
    }

    pub fn into_estimator(self) -> Result<Box<dyn Estimator>> {
        match self {
            AnyPlugin::Estimator(e) => Ok(e),
            AnyPlugin::Transformer(t) => Err(ChronoError::invalid_input(format!(
                "{} is a transformer, not an estimator",
                t.fullname()
            ))),
        }
    }

    pub fn into_transformer(self) -> Result<Box<dyn Transformer>> {
        match self {
            AnyPlugin::Transformer(t) => Ok(t),
            AnyPlugin::Estimator(e) => Err(ChronoError::invalid_input(format!(
                "{} is an estimator, not a transformer",
                e.fullname()
            ))),
        }
    }
}

impl fmt::Debug for AnyPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyPlugin::Transformer(t) => write!(f, "Transformer({})", t.fullname()),
            AnyPlugin::Estimator(e) => write!(f, "Estimator({})", e.fullname()),
        }
    }
}

/// Fail with `NotFitted` unless `plugin` has been fitted.
pub fn ensure_fitted<P: Plugin + ?Sized>(plugin: &P) -> Result<()> {
    if plugin.is_fitted() {
        Ok(())
    } else {
        Err(ChronoError::NotFitted(plugin.fullname()))
    }
}

/// Implements the descriptive methods of [`Plugin`] for a [`PluginSpec`]
/// type that stores its configuration in `params` and its trained state in
/// `fitted: Option<_>`.
#[macro_export]
macro_rules! plugin_identity {
    () => {
        fn name(&self) -> &str {
            <Self as $crate::PluginSpec>::NAME
        }

        fn category(&self) -> $crate::Category {
            <Self as $crate::PluginSpec>::CATEGORY
        }

        fn hyperparameter_space(&self) -> ::std::vec::Vec<$crate::Params> {
            <Self as $crate::PluginSpec>::hyperparameter_space()
        }

        fn args(&self) -> $crate::Args {
            $crate::to_args(&self.params)
        }

        fn is_fitted(&self) -> bool {
            self.fitted.is_some()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_identifier() {
        let (c, n) = split_identifier("preprocessing.imputation.ffill").unwrap();
        assert_eq!(c, Category::Imputation);
        assert_eq!(n, "ffill");
        let (c, n) = split_identifier("time_to_event.dynamic_deephit").unwrap();
        assert_eq!(c, Category::TimeToEvent);
        assert_eq!(n, "dynamic_deephit");
        assert!(split_identifier("ffill").is_err());
        assert!(split_identifier("clustering.kmeans").is_err());
    }

    #[test]
    fn test_category_task() {
        assert_eq!(Category::Regression.task(), Some(TaskType::Regression));
        assert_eq!(Category::Scaling.task(), None);
    }
}
