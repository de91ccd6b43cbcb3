use chronoml_core::{ChronoError, Result, Tensor};
use serde::{Deserialize, Serialize};

use crate::classification::{self, Average, KappaWeights};
use crate::regression;
use crate::survival::{self, KaplanMeier};

// ─── Classification ─────────────────────────────────────────────────────────

/// Metrics reported for classification benchmarks, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMetric {
    Aucroc,
    Aucprc,
    Accuracy,
    F1ScoreMicro,
    F1ScoreMacro,
    F1ScoreWeighted,
    Kappa,
    KappaQuadratic,
    PrecisionMicro,
    PrecisionMacro,
    PrecisionWeighted,
    RecallMicro,
    RecallMacro,
    RecallWeighted,
    Mcc,
}

/// Held-out labels and predictions of one fold.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationOutcome<'a> {
    pub y_true: &'a [usize],
    pub y_pred: &'a [usize],
    /// `[n_samples, n_classes]` class probabilities.
    pub proba: &'a Tensor,
    pub n_classes: usize,
}

impl ClassifierMetric {
    pub const ALL: [ClassifierMetric; 15] = [
        Self::Aucroc,
        Self::Aucprc,
        Self::Accuracy,
        Self::F1ScoreMicro,
        Self::F1ScoreMacro,
        Self::F1ScoreWeighted,
        Self::Kappa,
        Self::KappaQuadratic,
        Self::PrecisionMicro,
        Self::PrecisionMacro,
        Self::PrecisionWeighted,
        Self::RecallMicro,
        Self::RecallMacro,
        Self::RecallWeighted,
        Self::Mcc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Aucroc => "aucroc",
            Self::Aucprc => "aucprc",
            Self::Accuracy => "accuracy",
            Self::F1ScoreMicro => "f1_score_micro",
            Self::F1ScoreMacro => "f1_score_macro",
            Self::F1ScoreWeighted => "f1_score_weighted",
            Self::Kappa => "kappa",
            Self::KappaQuadratic => "kappa_quadratic",
            Self::PrecisionMicro => "precision_micro",
            Self::PrecisionMacro => "precision_macro",
            Self::PrecisionWeighted => "precision_weighted",
            Self::RecallMicro => "recall_micro",
            Self::RecallMacro => "recall_macro",
            Self::RecallWeighted => "recall_weighted",
            Self::Mcc => "mcc",
        }
    }

    pub fn score(&self, outcome: &ClassificationOutcome<'_>) -> Result<f64> {
        let ClassificationOutcome {
            y_true,
            y_pred,
            proba,
            n_classes,
        } = *outcome;
        if y_true.len() != y_pred.len() || y_true.len() != proba.nrows() {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![y_true.len()],
                got: vec![y_pred.len(), proba.nrows()],
            });
        }
        let value = match self {
            Self::Aucroc => classification::roc_auc(y_true, proba),
            Self::Aucprc => classification::pr_auc(y_true, proba),
            Self::Accuracy => classification::accuracy(y_true, y_pred),
            Self::F1ScoreMicro => classification::f1_score(y_true, y_pred, n_classes, Average::Micro),
            Self::F1ScoreMacro => classification::f1_score(y_true, y_pred, n_classes, Average::Macro),
            Self::F1ScoreWeighted => {
                classification::f1_score(y_true, y_pred, n_classes, Average::Weighted)
            }
            Self::Kappa => {
                classification::cohen_kappa(y_true, y_pred, n_classes, KappaWeights::Unweighted)
            }
            Self::KappaQuadratic => {
                classification::cohen_kappa(y_true, y_pred, n_classes, KappaWeights::Quadratic)
            }
            Self::PrecisionMicro => classification::precision(y_true, y_pred, n_classes, Average::Micro),
            Self::PrecisionMacro => classification::precision(y_true, y_pred, n_classes, Average::Macro),
            Self::PrecisionWeighted => {
                classification::precision(y_true, y_pred, n_classes, Average::Weighted)
            }
            Self::RecallMicro => classification::recall(y_true, y_pred, n_classes, Average::Micro),
            Self::RecallMacro => classification::recall(y_true, y_pred, n_classes, Average::Macro),
            Self::RecallWeighted => classification::recall(y_true, y_pred, n_classes, Average::Weighted),
            Self::Mcc => classification::mcc(y_true, y_pred, n_classes),
        };
        Ok(value)
    }
}

// ─── Regression ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionMetric {
    Mse,
    Mae,
    R2,
}

impl RegressionMetric {
    pub const ALL: [RegressionMetric; 3] = [Self::Mse, Self::Mae, Self::R2];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mse => "mse",
            Self::Mae => "mae",
            Self::R2 => "r2",
        }
    }

    pub fn score(&self, y_true: &Tensor, y_pred: &Tensor) -> Result<f64> {
        match self {
            Self::Mse => regression::mse(y_true, y_pred),
            Self::Mae => regression::mae(y_true, y_pred),
            Self::R2 => regression::r2_score(y_true, y_pred),
        }
    }
}

// ─── Time to event ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeToEventMetric {
    CIndex,
    BrierScore,
}

/// Held-out survival outcomes of one fold together with the training
/// outcomes used to estimate the censoring distribution.
#[derive(Debug, Clone, Copy)]
pub struct SurvivalOutcome<'a> {
    pub train_times: &'a [f64],
    pub train_events: &'a [bool],
    pub test_times: &'a [f64],
    pub test_events: &'a [bool],
    /// `[n_test, n_horizons]` cumulative incidence at each horizon.
    pub risk: &'a Tensor,
    pub horizons: &'a [f64],
}

impl TimeToEventMetric {
    pub const ALL: [TimeToEventMetric; 2] = [Self::CIndex, Self::BrierScore];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CIndex => "c_index",
            Self::BrierScore => "brier_score",
        }
    }

    /// Metric value averaged over every horizon of the outcome.
    pub fn score(&self, outcome: &SurvivalOutcome<'_>) -> Result<f64> {
        let censoring = survival::censoring_distribution(outcome.train_times, outcome.train_events)?;
        self.score_with(&censoring, outcome)
    }

    pub fn score_with(&self, censoring: &KaplanMeier, outcome: &SurvivalOutcome<'_>) -> Result<f64> {
        let n_horizons = outcome.horizons.len();
        if n_horizons == 0 {
            return Err(ChronoError::invalid_input("time-to-event scoring needs horizons"));
        }
        if outcome.risk.nrows() != outcome.test_times.len() || outcome.risk.ncols() != n_horizons {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![outcome.test_times.len(), n_horizons],
                got: outcome.risk.shape().to_vec(),
            });
        }

        let mut total = 0.0;
        for (h, &horizon) in outcome.horizons.iter().enumerate() {
            let risk = outcome.risk.column_values(h)?;
            total += match self {
                Self::CIndex => survival::concordance_index_ipcw(
                    censoring,
                    outcome.test_times,
                    outcome.test_events,
                    &risk,
                    horizon,
                )?,
                Self::BrierScore => {
                    let surv: Vec<f64> = risk.iter().map(|r| 1.0 - r).collect();
                    survival::brier_score(
                        censoring,
                        outcome.test_times,
                        outcome.test_events,
                        &surv,
                        horizon,
                    )?
                }
            };
        }
        Ok(total / n_horizons as f64)
    }
}
