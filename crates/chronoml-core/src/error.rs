use thiserror::Error;

/// Error type shared by every chronoml crate.
#[derive(Debug, Error)]
pub enum ChronoError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Conflicting registration for plugin {0}")]
    Registration(String),

    #[error("Pipeline has no step named {step:?} (steps: {available:?})")]
    StepNotFound {
        step: String,
        available: Vec<String>,
    },

    #[error("Plugin {0} must be fitted before predict")]
    NotFitted(String),

    #[error("Cannot fit {plugin}: {reason}")]
    Fit { plugin: String, reason: String },

    #[error("Invalid hyperparameters for {plugin}: {reason}")]
    InvalidParameters { plugin: String, reason: String },

    #[error("Plugin {plugin} does not support {operation}")]
    Unsupported {
        plugin: String,
        operation: &'static str,
    },

    #[error("Test case {label:?} failed on fold {fold}: {source}")]
    PluginExecution {
        label: String,
        fold: usize,
        #[source]
        source: Box<ChronoError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ChronoError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn fit(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fit {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_parameters(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(plugin: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            plugin: plugin.into(),
            operation,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a fit/predict failure with the benchmark coordinates it happened at.
    pub fn plugin_execution(label: impl Into<String>, fold: usize, source: ChronoError) -> Self {
        Self::PluginExecution {
            label: label.into(),
            fold,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChronoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_execution_message() {
        let err = ChronoError::plugin_execution("plugin1", 1, ChronoError::NotFitted("ffill".into()));
        let msg = err.to_string();
        assert!(msg.contains("plugin1"));
        assert!(msg.contains("fold 1"));
        assert!(msg.contains("ffill"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_step_not_found_lists_steps() {
        let err = ChronoError::StepNotFound {
            step: "xgb".into(),
            available: vec!["ffill".into(), "nn_classifier".into()],
        };
        assert!(err.to_string().contains("nn_classifier"));
    }
}
