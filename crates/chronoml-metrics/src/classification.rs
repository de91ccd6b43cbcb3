use chronoml_core::Tensor;

/// How per-class scores are combined into one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    /// Global counts of true/false positives.
    Micro,
    /// Unweighted mean over the classes present in either labels or predictions.
    Macro,
    /// Mean weighted by each class's support in the true labels.
    Weighted,
}

/// Disagreement weights for Cohen's kappa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KappaWeights {
    Unweighted,
    Linear,
    Quadratic,
}

/// Fraction of correct predictions.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// `matrix[true][pred]` counts. Labels outside `n_classes` are ignored.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

/// Per-class `(true positives, false positives, false negatives, support)`.
fn class_counts(cm: &[Vec<usize>]) -> Vec<(f64, f64, f64, f64)> {
    let n = cm.len();
    (0..n)
        .map(|c| {
            let tp = cm[c][c] as f64;
            let predicted: usize = cm.iter().map(|row| row[c]).sum();
            let support: usize = cm[c].iter().sum();
            (tp, predicted as f64 - tp, support as f64 - tp, support as f64)
        })
        .collect()
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn averaged<F>(y_true: &[usize], y_pred: &[usize], n_classes: usize, average: Average, score: F) -> f64
where
    F: Fn(f64, f64, f64) -> f64,
{
    let cm = confusion_matrix(y_true, y_pred, n_classes);
    let counts = class_counts(&cm);
    match average {
        Average::Micro => {
            let (tp, fp, fn_) = counts
                .iter()
                .fold((0.0, 0.0, 0.0), |acc, c| (acc.0 + c.0, acc.1 + c.1, acc.2 + c.2));
            score(tp, fp, fn_)
        }
        Average::Macro => {
            let present: Vec<_> = counts
                .iter()
                .filter(|(tp, fp, fn_, _)| tp + fp + fn_ > 0.0)
                .collect();
            if present.is_empty() {
                return 0.0;
            }
            present.iter().map(|(tp, fp, fn_, _)| score(*tp, *fp, *fn_)).sum::<f64>()
                / present.len() as f64
        }
        Average::Weighted => {
            let total: f64 = counts.iter().map(|c| c.3).sum();
            if total == 0.0 {
                return 0.0;
            }
            counts
                .iter()
                .map(|(tp, fp, fn_, support)| score(*tp, *fp, *fn_) * support)
                .sum::<f64>()
                / total
        }
    }
}

pub fn precision(y_true: &[usize], y_pred: &[usize], n_classes: usize, average: Average) -> f64 {
    averaged(y_true, y_pred, n_classes, average, |tp, fp, _| ratio(tp, tp + fp))
}

pub fn recall(y_true: &[usize], y_pred: &[usize], n_classes: usize, average: Average) -> f64 {
    averaged(y_true, y_pred, n_classes, average, |tp, _, fn_| ratio(tp, tp + fn_))
}

pub fn f1_score(y_true: &[usize], y_pred: &[usize], n_classes: usize, average: Average) -> f64 {
    averaged(y_true, y_pred, n_classes, average, |tp, fp, fn_| {
        ratio(2.0 * tp, 2.0 * tp + fp + fn_)
    })
}

/// Cohen's kappa: agreement corrected for chance, optionally weighting
/// disagreements by class distance.
///
/// κ = 1 - Σ w·O / Σ w·E
pub fn cohen_kappa(y_true: &[usize], y_pred: &[usize], n_classes: usize, weights: KappaWeights) -> f64 {
    let cm = confusion_matrix(y_true, y_pred, n_classes);
    let n: f64 = cm.iter().flatten().sum::<usize>() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let row_sums: Vec<f64> = cm.iter().map(|r| r.iter().sum::<usize>() as f64).collect();
    let col_sums: Vec<f64> = (0..n_classes)
        .map(|c| cm.iter().map(|r| r[c]).sum::<usize>() as f64)
        .collect();

    let mut observed = 0.0;
    let mut expected = 0.0;
    for i in 0..n_classes {
        for j in 0..n_classes {
            let w = match weights {
                KappaWeights::Unweighted => {
                    if i == j {
                        0.0
                    } else {
                        1.0
                    }
                }
                KappaWeights::Linear => (i as f64 - j as f64).abs(),
                KappaWeights::Quadratic => (i as f64 - j as f64).powi(2),
            };
            observed += w * cm[i][j] as f64 / n;
            expected += w * row_sums[i] * col_sums[j] / (n * n);
        }
    }

    if expected.abs() < 1e-12 {
        // perfect agreement on a single class
        return if observed.abs() < 1e-12 { 1.0 } else { 0.0 };
    }
    1.0 - observed / expected
}

/// Matthews correlation coefficient, multiclass form.
///
/// MCC = (c·s - Σ pₖtₖ) / √((s² - Σ pₖ²)(s² - Σ tₖ²))
pub fn mcc(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> f64 {
    let cm = confusion_matrix(y_true, y_pred, n_classes);
    let s: f64 = cm.iter().flatten().sum::<usize>() as f64;
    let c: f64 = (0..n_classes).map(|k| cm[k][k] as f64).sum();
    let t: Vec<f64> = cm.iter().map(|r| r.iter().sum::<usize>() as f64).collect();
    let p: Vec<f64> = (0..n_classes)
        .map(|k| cm.iter().map(|r| r[k]).sum::<usize>() as f64)
        .collect();

    let pt: f64 = p.iter().zip(&t).map(|(a, b)| a * b).sum();
    let pp: f64 = p.iter().map(|a| a * a).sum();
    let tt: f64 = t.iter().map(|a| a * a).sum();

    let denom = ((s * s - pp) * (s * s - tt)).sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    (c * s - pt) / denom
}

/// Score/label pairs sorted by descending score, grouped into tie blocks of
/// `(positives, negatives)`.
fn tie_blocks(positive: &[bool], scores: &[f64]) -> Vec<(f64, f64)> {
    let mut pairs: Vec<(f64, bool)> = scores.iter().copied().zip(positive.iter().copied()).collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut blocks: Vec<(f64, f64)> = Vec::new();
    let mut prev: Option<f64> = None;
    for (score, label) in pairs {
        if prev != Some(score) {
            blocks.push((0.0, 0.0));
            prev = Some(score);
        }
        if let Some(block) = blocks.last_mut() {
            if label {
                block.0 += 1.0;
            } else {
                block.1 += 1.0;
            }
        }
    }
    blocks
}

/// Area under the ROC curve for one positive class (trapezoidal rule over
/// distinct thresholds). Returns 0.5 when only one class is present.
pub fn binary_roc_auc(positive: &[bool], scores: &[f64]) -> f64 {
    let total_pos = positive.iter().filter(|&&p| p).count() as f64;
    let total_neg = positive.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return 0.5;
    }

    let mut auc = 0.0;
    let (mut tp, mut fp) = (0.0, 0.0);
    for (pos, neg) in tie_blocks(positive, scores) {
        let prev_tpr = tp / total_pos;
        let prev_fpr = fp / total_neg;
        tp += pos;
        fp += neg;
        auc += (fp / total_neg - prev_fpr) * (tp / total_pos + prev_tpr) / 2.0;
    }
    auc
}

/// Average precision: Σ (Rₙ - Rₙ₋₁)·Pₙ over distinct thresholds.
pub fn binary_average_precision(positive: &[bool], scores: &[f64]) -> f64 {
    let total_pos = positive.iter().filter(|&&p| p).count() as f64;
    if total_pos == 0.0 {
        return 0.0;
    }

    let mut ap = 0.0;
    let (mut tp, mut seen) = (0.0, 0.0);
    for (pos, neg) in tie_blocks(positive, scores) {
        tp += pos;
        seen += pos + neg;
        ap += (pos / total_pos) * (tp / seen);
    }
    ap
}

/// One-vs-rest macro average of a binary ranking metric. Binary problems
/// score the positive class only.
fn one_vs_rest<F>(y_true: &[usize], proba: &Tensor, metric: F) -> f64
where
    F: Fn(&[bool], &[f64]) -> f64,
{
    let n_classes = proba.ncols();
    let column = |c: usize| -> Vec<f64> { proba.rows().map(|r| r[c]).collect() };

    if n_classes == 2 {
        let positive: Vec<bool> = y_true.iter().map(|&t| t == 1).collect();
        return metric(&positive, &column(1));
    }

    let scores: Vec<f64> = (0..n_classes)
        .filter_map(|c| {
            let positive: Vec<bool> = y_true.iter().map(|&t| t == c).collect();
            let has_both = positive.iter().any(|&p| p) && positive.iter().any(|&p| !p);
            has_both.then(|| metric(&positive, &column(c)))
        })
        .collect();
    if scores.is_empty() {
        return 0.5;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// ROC-AUC from class probabilities `[n_samples, n_classes]`.
pub fn roc_auc(y_true: &[usize], proba: &Tensor) -> f64 {
    one_vs_rest(y_true, proba, binary_roc_auc)
}

/// Area under the precision-recall curve (average precision).
pub fn pr_auc(y_true: &[usize], proba: &Tensor) -> f64 {
    one_vs_rest(y_true, proba, binary_average_precision)
}
