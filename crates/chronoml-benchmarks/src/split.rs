use chronoml_core::{ChronoError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::warn;

/// Train/test indices of one cross-validation fold, both sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn check_splits(n_samples: usize, n_splits: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(ChronoError::config(format!(
            "n_splits must be at least 2, got {}",
            n_splits
        )));
    }
    if n_splits > n_samples {
        return Err(ChronoError::config(format!(
            "n_splits = {} exceeds the number of samples ({})",
            n_splits, n_samples
        )));
    }
    Ok(())
}

/// Turn a per-sample fold assignment into `n_splits` folds.
fn folds_from_assignment(assignment: &[usize], n_splits: usize) -> Vec<Fold> {
    (0..n_splits)
        .map(|k| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..assignment.len()).partition(|&i| assignment[i] == k);
            Fold { train, test }
        })
        .collect()
}

/// Shuffled k-fold: a seeded permutation dealt round-robin into folds.
pub fn kfold(n_samples: usize, n_splits: usize, random_state: u64) -> Result<Vec<Fold>> {
    check_splits(n_samples, n_splits)?;
    let mut order: Vec<usize> = (0..n_samples).collect();
    order.shuffle(&mut StdRng::seed_from_u64(random_state));

    let mut assignment = vec![0; n_samples];
    for (pos, &i) in order.iter().enumerate() {
        assignment[i] = pos % n_splits;
    }
    Ok(folds_from_assignment(&assignment, n_splits))
}

/// Stratified k-fold on discrete `labels`.
///
/// Each class is shuffled, the classes are laid end to end and the result
/// is dealt round-robin, so every fold receives each class in proportion
/// and fold sizes differ by at most one.
pub fn stratified_kfold(labels: &[usize], n_splits: usize, random_state: u64) -> Result<Vec<Fold>> {
    check_splits(labels.len(), n_splits)?;
    let mut rng = StdRng::seed_from_u64(random_state);

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut order = Vec::with_capacity(labels.len());
    for (label, mut members) in by_class {
        if members.len() < n_splits {
            warn!(
                class = label,
                members = members.len(),
                n_splits,
                "class has fewer members than folds; some folds will not contain it"
            );
        }
        members.shuffle(&mut rng);
        order.extend(members);
    }

    let mut assignment = vec![0; labels.len()];
    for (pos, &i) in order.iter().enumerate() {
        assignment[i] = pos % n_splits;
    }
    Ok(folds_from_assignment(&assignment, n_splits))
}
