use std::collections::BTreeMap;

use rare_core::errors::ErrorInfo;
use rare_core::{RareError, RngHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::walker::{Population, Walker, WalkerId};

/// Counters describing one resampling pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResampleReport {
    /// Number of split operations performed.
    pub splits: usize,
    /// Number of pairwise merges performed.
    pub merges: usize,
    /// Bins left below target because no walker could be split further.
    pub starved_bins: Vec<usize>,
}

/// Bin-by-bin split/merge resampler.
///
/// Every occupied bin is driven towards `target` walkers. Underfull bins
/// split their heaviest walker in two; overfull bins merge pairs drawn with
/// probability proportional to inverse weight, and the survivor of a pair
/// `(i, j)` is kept with probability `w_i / (w_i + w_j)`. Total weight is
/// conserved per bin up to floating-point rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitMerger {
    target: usize,
    min_weight: f64,
}

impl SplitMerger {
    /// Creates a resampler for `target` walkers per occupied bin.
    ///
    /// A walker is only split when each half keeps at least `min_weight`.
    pub fn new(target: usize, min_weight: f64) -> Result<Self, RareError> {
        if target == 0 {
            return Err(RareError::Config(ErrorInfo::new(
                "zero-target",
                "walkers per bin must be at least one",
            )));
        }
        if !min_weight.is_finite() || min_weight < 0.0 {
            return Err(RareError::Config(
                ErrorInfo::new("invalid-min-weight", "minimum weight must be finite and >= 0")
                    .with_context("min_weight", min_weight.to_string()),
            ));
        }
        Ok(Self { target, min_weight })
    }

    /// Target walker count per occupied bin.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Split floor.
    pub fn min_weight(&self) -> f64 {
        self.min_weight
    }

    /// Resamples every occupied bin. All walkers must be binned.
    ///
    /// The returned population is ordered by bin index, walkers keeping their
    /// relative order inside a bin and split offspring following their parent.
    pub fn resample<S: Clone>(
        &self,
        population: Population<S>,
        rng: &mut RngHandle,
    ) -> Result<(Population<S>, ResampleReport), RareError> {
        let (walkers, mut next_id) = population.into_parts();
        let mut bins: BTreeMap<usize, Vec<Walker<S>>> = BTreeMap::new();
        for walker in walkers {
            let weight = walker.weight();
            if !weight.is_finite() || weight < 0.0 {
                return Err(RareError::Resample(
                    ErrorInfo::new("invalid-weight", "walker weight must be finite and >= 0")
                        .with_context("walker", walker.id().to_string())
                        .with_context("weight", weight.to_string()),
                ));
            }
            let Some(bin) = walker.bin() else {
                return Err(RareError::Resample(
                    ErrorInfo::new("unbinned-walker", "walker must be binned before resampling")
                        .with_context("walker", walker.id().to_string()),
                ));
            };
            bins.entry(bin).or_default().push(walker);
        }

        let mut report = ResampleReport::default();
        let mut resampled = Vec::with_capacity(bins.len() * self.target);
        for (bin, mut members) in bins {
            while members.len() < self.target {
                let heaviest = heaviest_index(&members);
                if members[heaviest].weight() / 2.0 < self.min_weight {
                    break;
                }
                let child = members[heaviest].split_off(WalkerId::from_raw(next_id));
                next_id += 1;
                members.insert(heaviest + 1, child);
                report.splits += 1;
            }
            if members.len() < self.target {
                warn!(
                    bin,
                    walkers = members.len(),
                    target = self.target,
                    "bin below target, no walker can be split above the weight floor"
                );
                report.starved_bins.push(bin);
            }

            while members.len() > self.target {
                merge_pair(&mut members, rng);
                report.merges += 1;
            }
            resampled.extend(members);
        }

        debug!(
            walkers = resampled.len(),
            splits = report.splits,
            merges = report.merges,
            "population resampled"
        );
        Ok((Population::from_parts(resampled, next_id), report))
    }
}

fn heaviest_index<S>(members: &[Walker<S>]) -> usize {
    let mut best = 0;
    for (index, walker) in members.iter().enumerate().skip(1) {
        if walker.weight() > members[best].weight() {
            best = index;
        }
    }
    best
}

/// Draws an index with probability proportional to `1 / w`, skipping `exclude`.
///
/// Zero-weight walkers carry no probability and are absorbed first.
fn pick_light<S>(members: &[Walker<S>], exclude: Option<usize>, rng: &mut RngHandle) -> usize {
    let candidates: Vec<usize> = (0..members.len())
        .filter(|index| Some(*index) != exclude)
        .collect();
    let weightless: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|index| members[*index].weight() == 0.0)
        .collect();
    if !weightless.is_empty() {
        return weightless[rng.index(weightless.len())];
    }

    let inverse: Vec<f64> = candidates
        .iter()
        .map(|index| 1.0 / members[*index].weight())
        .collect();
    let pick = rng
        .pick_weighted(&inverse)
        .unwrap_or(candidates.len() - 1);
    candidates[pick]
}

fn merge_pair<S>(members: &mut Vec<Walker<S>>, rng: &mut RngHandle) {
    let first = pick_light(members, None, rng);
    let second = pick_light(members, Some(first), rng);
    let (w_first, w_second) = (members[first].weight(), members[second].weight());
    let pair_weight = w_first + w_second;
    let keep_first = if pair_weight > 0.0 {
        rng.uniform() < w_first / pair_weight
    } else {
        rng.uniform() < 0.5
    };
    let (survivor, loser) = if keep_first {
        (first, second)
    } else {
        (second, first)
    };
    let absorbed = members.remove(loser);
    let survivor = if loser < survivor {
        survivor - 1
    } else {
        survivor
    };
    members[survivor].absorb(absorbed);
}
