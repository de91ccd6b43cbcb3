use chronoml_core::{ChronoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Mean and population standard deviation of one metric across folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
    /// Per-fold values in fold order.
    pub folds: Vec<f64>,
}

impl MetricSummary {
    pub fn from_folds(folds: Vec<f64>) -> Self {
        let n = folds.len().max(1) as f64;
        let mean = folds.iter().sum::<f64>() / n;
        let var = folds.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        MetricSummary {
            mean,
            std: var.sqrt(),
            folds,
        }
    }
}

/// Metric name to summary for one test case.
pub type CaseScores = BTreeMap<String, MetricSummary>;

/// Test-case label to its scores.
pub type PerTestScores = BTreeMap<String, CaseScores>;

/// Aggregate benchmark table: one row per metric (task order), one column
/// per test case (input order), cells hold the mean over folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    index: Vec<String>,
    columns: Vec<String>,
    means: Vec<Vec<f64>>,
    stds: Vec<Vec<f64>>,
}

impl ScoreTable {
    /// Assemble the table from per-test scores. Every label must carry every
    /// metric.
    pub fn from_scores(metrics: &[&str], labels: &[String], scores: &PerTestScores) -> Result<Self> {
        let mut means = Vec::with_capacity(metrics.len());
        let mut stds = Vec::with_capacity(metrics.len());
        for &metric in metrics {
            let mut mean_row = Vec::with_capacity(labels.len());
            let mut std_row = Vec::with_capacity(labels.len());
            for label in labels {
                let summary = scores
                    .get(label)
                    .and_then(|case| case.get(metric))
                    .ok_or_else(|| {
                        ChronoError::invalid_input(format!("no {} score for test case {:?}", metric, label))
                    })?;
                mean_row.push(summary.mean);
                std_row.push(summary.std);
            }
            means.push(mean_row);
            stds.push(std_row);
        }
        Ok(ScoreTable {
            index: metrics.iter().map(|m| m.to_string()).collect(),
            columns: labels.to_vec(),
            means,
            stds,
        })
    }

    /// Metric names.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Test-case labels.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn position(&self, metric: &str, label: &str) -> Option<(usize, usize)> {
        let row = self.index.iter().position(|m| m == metric)?;
        let col = self.columns.iter().position(|l| l == label)?;
        Some((row, col))
    }

    /// Mean of `metric` for test case `label`.
    pub fn get(&self, metric: &str, label: &str) -> Option<f64> {
        self.position(metric, label).map(|(r, c)| self.means[r][c])
    }

    pub fn std(&self, metric: &str, label: &str) -> Option<f64> {
        self.position(metric, label).map(|(r, c)| self.stds[r][c])
    }

    pub fn contains(&self, metric: &str, label: &str) -> bool {
        self.position(metric, label).is_some()
    }

    /// Write `metric,<label>...` rows of means as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let header = std::iter::once("metric").chain(self.columns.iter().map(String::as_str));
        wtr.write_record(header).map_err(csv_error)?;
        for (metric, row) in self.index.iter().zip(&self.means) {
            let mut record = vec![metric.clone()];
            record.extend(row.iter().map(|v| v.to_string()));
            wtr.write_record(&record).map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn csv_error(err: csv::Error) -> ChronoError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => ChronoError::Io(io),
        other => ChronoError::invalid_input(format!("csv: {:?}", other)),
    }
}

impl fmt::Display for ScoreTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metric_width = self.index.iter().map(String::len).max().unwrap_or(0).max(6);
        let widths: Vec<usize> = self.columns.iter().map(|c| c.len().max(16)).collect();

        write!(f, "{:<metric_width$}", "metric")?;
        for (label, w) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>w$}", label, w = w)?;
        }
        writeln!(f)?;
        for (r, metric) in self.index.iter().enumerate() {
            write!(f, "{:<metric_width$}", metric)?;
            for (c, w) in widths.iter().enumerate() {
                let cell = format!("{:.4} +/- {:.4}", self.means[r][c], self.stds[r][c]);
                write!(f, "  {:>w$}", cell, w = w)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scores() -> PerTestScores {
        let mut a = CaseScores::new();
        a.insert("mse".into(), MetricSummary::from_folds(vec![1.0, 3.0]));
        a.insert("mae".into(), MetricSummary::from_folds(vec![0.5, 0.5]));
        let mut b = CaseScores::new();
        b.insert("mse".into(), MetricSummary::from_folds(vec![2.0, 2.0]));
        b.insert("mae".into(), MetricSummary::from_folds(vec![1.0, 2.0]));
        PerTestScores::from([("a".to_string(), a), ("b".to_string(), b)])
    }

    #[test]
    fn test_summary_population_std() {
        let s = MetricSummary::from_folds(vec![1.0, 3.0]);
        assert_abs_diff_eq!(s.mean, 2.0);
        assert_abs_diff_eq!(s.std, 1.0);
    }

    #[test]
    fn test_table_layout() {
        let labels = vec!["b".to_string(), "a".to_string()];
        let table = ScoreTable::from_scores(&["mse", "mae"], &labels, &scores()).unwrap();
        assert_eq!(table.index(), &["mse", "mae"]);
        assert_eq!(table.columns(), &["b", "a"]);
        assert_eq!(table.get("mse", "a"), Some(2.0));
        assert_eq!(table.std("mae", "b"), Some(0.5));
        assert_eq!(table.get("r2", "a"), None);
        assert!(table.to_string().contains("2.0000 +/- 1.0000"));
    }

    #[test]
    fn test_missing_metric_rejected() {
        let labels = vec!["a".to_string()];
        assert!(ScoreTable::from_scores(&["r2"], &labels, &scores()).is_err());
    }

    #[test]
    fn test_csv_export() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let table = ScoreTable::from_scores(&["mse"], &labels, &scores()).unwrap();
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "metric,a,b\nmse,2,2\n");
    }
}
