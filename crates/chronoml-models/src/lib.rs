//! Estimator plugins for classification, regression and time-to-event
//! analysis on irregular time series.

pub mod dynamic_deephit;
pub mod features;
pub mod neural_net;
pub mod ode_regressor;
pub mod training;

pub use dynamic_deephit::{DeepHitParams, DynamicDeepHit};
pub use features::{summary_features, Standardizer, SummaryEncoder};
pub use neural_net::{NeuralNetClassifier, NeuralNetParams, NeuralNetRegressor};
pub use ode_regressor::{OdeParams, OdeRegressor};

use chronoml_core::Result;
use chronoml_plugins::PluginRegistry;

/// Register every model plugin.
pub fn register(registry: &mut PluginRegistry) -> Result<()> {
    registry.register_estimator::<NeuralNetClassifier>()?;
    registry.register_estimator::<NeuralNetRegressor>()?;
    registry.register_estimator::<OdeRegressor>()?;
    registry.register_estimator::<DynamicDeepHit>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoml_plugins::{args, Category};

    #[test]
    fn test_register_all() {
        let mut registry = PluginRegistry::new();
        register(&mut registry).unwrap();
        assert_eq!(registry.list_category(Category::Classification), vec!["nn_classifier"]);
        assert_eq!(
            registry.list_category(Category::Regression),
            vec!["nn_regressor", "ode_regressor"]
        );
        assert_eq!(registry.list_category(Category::TimeToEvent), vec!["dynamic_deephit"]);

        let model = registry
            .get_estimator("regression.ode_regressor", &args! { "n_iter" => 10 })
            .unwrap();
        assert_eq!(model.fullname(), "regression.ode_regressor");
        assert_eq!(model.args()["n_iter"], 10);
    }
}
