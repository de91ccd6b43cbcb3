//! Evaluation metrics and the fixed metric set reported for each task type.

pub mod classification;
pub mod regression;
pub mod scoring;
pub mod survival;

pub use scoring::{
    ClassificationOutcome, ClassifierMetric, RegressionMetric, SurvivalOutcome, TimeToEventMetric,
};

use chronoml_core::TaskType;

/// Metric names reported for classification, in report order.
pub fn classifier_supported_metrics() -> Vec<&'static str> {
    ClassifierMetric::ALL.iter().map(|m| m.name()).collect()
}

/// Metric names reported for regression, in report order.
pub fn regression_supported_metrics() -> Vec<&'static str> {
    RegressionMetric::ALL.iter().map(|m| m.name()).collect()
}

/// Metric names reported for time-to-event analysis, in report order.
pub fn time_to_event_supported_metrics() -> Vec<&'static str> {
    TimeToEventMetric::ALL.iter().map(|m| m.name()).collect()
}

pub fn supported_metrics(task: TaskType) -> Vec<&'static str> {
    match task {
        TaskType::Classification => classifier_supported_metrics(),
        TaskType::Regression => regression_supported_metrics(),
        TaskType::TimeToEvent => time_to_event_supported_metrics(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_metric_sets() {
        assert_eq!(classifier_supported_metrics().len(), 15);
        assert_eq!(regression_supported_metrics(), vec!["mse", "mae", "r2"]);
        assert_eq!(time_to_event_supported_metrics(), vec!["c_index", "brier_score"]);
        assert_eq!(supported_metrics(TaskType::Classification)[0], "aucroc");
        assert!(supported_metrics(TaskType::Classification).contains(&"kappa_quadratic"));
    }
}
