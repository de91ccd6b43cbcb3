use chronoml_core::{ChronoError, Result, TaskType, Tensor};
use serde::{Deserialize, Serialize};

use crate::series::TimeSeries;

/// Event time and indicator for each subject of a time-to-event dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEventTargets")]
pub struct EventTargets {
    times: Vec<f64>,
    events: Vec<bool>,
}

#[derive(Deserialize)]
struct RawEventTargets {
    times: Vec<f64>,
    events: Vec<bool>,
}

impl TryFrom<RawEventTargets> for EventTargets {
    type Error = ChronoError;

    fn try_from(raw: RawEventTargets) -> Result<Self> {
        EventTargets::new(raw.times, raw.events)
    }
}

impl EventTargets {
    pub fn new(times: Vec<f64>, events: Vec<bool>) -> Result<Self> {
        if times.len() != events.len() {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![times.len()],
                got: vec![events.len()],
            });
        }
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(ChronoError::invalid_input(
                "event times must be finite and non-negative",
            ));
        }
        Ok(EventTargets { times, events })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn events(&self) -> &[bool] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    fn subset(&self, indices: &[usize]) -> Self {
        EventTargets {
            times: indices.iter().map(|&i| self.times[i]).collect(),
            events: indices.iter().map(|&i| self.events[i]).collect(),
        }
    }
}

/// Supervised targets attached to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Targets {
    /// One row per subject: class labels (single column) or regression targets.
    Static(Tensor),
    /// Censored event times.
    Events(EventTargets),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Static(t) => t.nrows(),
            Targets::Events(e) => e.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether these targets can supervise the given task.
    pub fn supports(&self, task: TaskType) -> bool {
        matches!(
            (self, task),
            (Targets::Static(_), TaskType::Classification)
                | (Targets::Static(_), TaskType::Regression)
                | (Targets::Events(_), TaskType::TimeToEvent)
        )
    }

    fn subset(&self, indices: &[usize]) -> Result<Self> {
        Ok(match self {
            Targets::Static(t) => Targets::Static(t.select_rows(indices)?),
            Targets::Events(e) => Targets::Events(e.subset(indices)),
        })
    }
}

/// A collection of per-subject time series with optional static covariates
/// and targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    time_series: Vec<TimeSeries>,
    static_features: Option<Tensor>,
    targets: Option<Targets>,
}

#[derive(Deserialize)]
struct RawDataset {
    time_series: Vec<TimeSeries>,
    #[serde(default)]
    static_features: Option<Tensor>,
    #[serde(default)]
    targets: Option<Targets>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = ChronoError;

    fn try_from(raw: RawDataset) -> Result<Self> {
        let mut data = Dataset::new(raw.time_series)?;
        if let Some(static_features) = raw.static_features {
            data = data.with_static(static_features)?;
        }
        if let Some(targets) = raw.targets {
            data = data.with_targets(targets)?;
        }
        Ok(data)
    }
}

impl Dataset {
    /// Build an unsupervised dataset. All series must share a feature count.
    pub fn new(time_series: Vec<TimeSeries>) -> Result<Self> {
        if let Some(first) = time_series.first() {
            let n_features = first.n_features();
            if let Some(bad) = time_series.iter().find(|s| s.n_features() != n_features) {
                return Err(ChronoError::ShapeMismatch {
                    expected: vec![n_features],
                    got: vec![bad.n_features()],
                });
            }
        }
        Ok(Dataset {
            time_series,
            static_features: None,
            targets: None,
        })
    }

    /// Attach static covariates, one row per subject.
    pub fn with_static(mut self, static_features: Tensor) -> Result<Self> {
        self.check_rows("static features", static_features.nrows())?;
        self.static_features = Some(static_features);
        Ok(self)
    }

    pub fn with_targets(mut self, targets: Targets) -> Result<Self> {
        self.check_rows("targets", targets.len())?;
        self.targets = Some(targets);
        Ok(self)
    }

    fn check_rows(&self, what: &str, rows: usize) -> Result<()> {
        if rows != self.len() {
            return Err(ChronoError::invalid_input(format!(
                "{} have {} rows but the dataset has {} time series",
                what,
                rows,
                self.len()
            )));
        }
        Ok(())
    }

    pub fn time_series(&self) -> &[TimeSeries] {
        &self.time_series
    }

    pub fn static_features(&self) -> Option<&Tensor> {
        self.static_features.as_ref()
    }

    pub fn targets(&self) -> Option<&Targets> {
        self.targets.as_ref()
    }

    pub fn static_targets(&self) -> Option<&Tensor> {
        match &self.targets {
            Some(Targets::Static(t)) => Some(t),
            _ => None,
        }
    }

    pub fn event_targets(&self) -> Option<&EventTargets> {
        match &self.targets {
            Some(Targets::Events(e)) => Some(e),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.time_series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_series.is_empty()
    }

    /// Number of temporal features (0 for an empty dataset).
    pub fn n_features(&self) -> usize {
        self.time_series.first().map_or(0, TimeSeries::n_features)
    }

    pub fn n_static_features(&self) -> usize {
        self.static_features.as_ref().map_or(0, Tensor::ncols)
    }

    /// Whether the dataset carries targets usable for `task`.
    pub fn supports(&self, task: TaskType) -> bool {
        self.targets.as_ref().is_some_and(|t| t.supports(task))
    }

    /// Rows in the given order. Indices may repeat.
    pub fn subset(&self, indices: &[usize]) -> Result<Dataset> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(ChronoError::invalid_input(format!(
                "subset index {} out of bounds for {} samples",
                bad,
                self.len()
            )));
        }
        Ok(Dataset {
            time_series: indices.iter().map(|&i| self.time_series[i].clone()).collect(),
            static_features: self
                .static_features
                .as_ref()
                .map(|s| s.select_rows(indices))
                .transpose()?,
            targets: self.targets.as_ref().map(|t| t.subset(indices)).transpose()?,
        })
    }

    /// Replace the time series, keeping static features and targets.
    pub fn with_time_series(&self, time_series: Vec<TimeSeries>) -> Result<Dataset> {
        if time_series.len() != self.len() {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![self.len()],
                got: vec![time_series.len()],
            });
        }
        let mut out = Dataset::new(time_series)?;
        out.static_features = self.static_features.clone();
        out.targets = self.targets.clone();
        Ok(out)
    }

    /// Replace the static covariates, keeping series and targets.
    pub fn with_static_features(&self, static_features: Option<Tensor>) -> Result<Dataset> {
        let mut out = self.clone();
        if let Some(s) = &static_features {
            out.check_rows("static features", s.nrows())?;
        }
        out.static_features = static_features;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> TimeSeries {
        let times = (0..values.len()).map(|t| t as f64).collect();
        TimeSeries::new(times, Tensor::column(values)).unwrap()
    }

    fn toy() -> Dataset {
        Dataset::new(vec![series(&[1.0, 2.0]), series(&[3.0]), series(&[4.0, 5.0, 6.0])])
            .unwrap()
            .with_static(Tensor::from_rows(&[vec![0.0], vec![1.0], vec![2.0]]).unwrap())
            .unwrap()
            .with_targets(Targets::Static(Tensor::column(&[0.0, 1.0, 0.0])))
            .unwrap()
    }

    #[test]
    fn test_lengths_must_agree() {
        let data = Dataset::new(vec![series(&[1.0])]).unwrap();
        assert!(data
            .clone()
            .with_targets(Targets::Static(Tensor::column(&[0.0, 1.0])))
            .is_err());
        assert!(data.with_static(Tensor::zeros(2, 1)).is_err());
    }

    #[test]
    fn test_feature_count_must_agree() {
        let wide = TimeSeries::new(vec![0.0], Tensor::zeros(1, 2)).unwrap();
        assert!(Dataset::new(vec![series(&[1.0]), wide]).is_err());
    }

    #[test]
    fn test_subset_keeps_everything_aligned() {
        let data = toy();
        let sub = data.subset(&[2, 0]).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.time_series()[0].len(), 3);
        assert_eq!(sub.static_features().unwrap().data(), &[2.0, 0.0]);
        assert_eq!(sub.static_targets().unwrap().data(), &[0.0, 0.0]);
        assert!(data.subset(&[3]).is_err());
    }

    #[test]
    fn test_task_support() {
        let data = toy();
        assert!(data.supports(TaskType::Classification));
        assert!(data.supports(TaskType::Regression));
        assert!(!data.supports(TaskType::TimeToEvent));

        let events = EventTargets::new(vec![1.0, 2.0, 3.0], vec![true, false, true]).unwrap();
        let survival = data.clone().with_targets(Targets::Events(events)).unwrap();
        assert!(survival.supports(TaskType::TimeToEvent));
        assert!(survival.static_targets().is_none());
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let data = toy();
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(serde_json::from_str::<Dataset>(&json).unwrap(), data);

        let empty_series = r#"{"time_series":[{"times":[],"values":{"data":[],"shape":[0,1]}}]}"#;
        assert!(serde_json::from_str::<Dataset>(empty_series).is_err());

        let short_targets = r#"{
            "time_series":[{"times":[0.0],"values":{"data":[1.0],"shape":[1,1]}}],
            "targets":{"Events":{"times":[1.0,2.0],"events":[true,false]}}
        }"#;
        assert!(serde_json::from_str::<Dataset>(short_targets).is_err());

        let mismatched = r#"{"times":[1.0],"events":[true,false]}"#;
        assert!(serde_json::from_str::<EventTargets>(mismatched).is_err());
    }

    #[test]
    fn test_event_targets_validation() {
        assert!(EventTargets::new(vec![1.0], vec![true, false]).is_err());
        assert!(EventTargets::new(vec![-1.0], vec![true]).is_err());
    }
}
