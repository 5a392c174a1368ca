use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::walker::{Population, WalkerId};

/// Side of the target a walker must reach to be absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Absorbed once the coordinate reaches or exceeds the target.
    #[default]
    Forward,
    /// Absorbed once the coordinate falls to or below the target.
    Retrograde,
}

/// An absorbing boundary in progress-coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    /// Target coordinate value.
    pub target: f64,
    /// Crossing direction.
    #[serde(default)]
    pub direction: Direction,
}

impl Boundary {
    /// Boundary absorbing walkers at or beyond `target`.
    pub fn forward(target: f64) -> Self {
        Self {
            target,
            direction: Direction::Forward,
        }
    }

    /// Boundary absorbing walkers at or below `target`.
    pub fn retrograde(target: f64) -> Self {
        Self {
            target,
            direction: Direction::Retrograde,
        }
    }

    /// True when `progress` lies in the absorbing region.
    pub fn crossed(&self, progress: f64) -> bool {
        match self.direction {
            Direction::Forward => progress >= self.target,
            Direction::Retrograde => progress <= self.target,
        }
    }
}

/// Outcome of one recycling pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecycleReport {
    /// Weight recycled at each boundary during this call only.
    pub flux: Vec<f64>,
    /// Walkers reset to the seed state.
    pub recycled: Vec<WalkerId>,
}

impl RecycleReport {
    /// Flux summed over all boundaries.
    pub fn total_flux(&self) -> f64 {
        self.flux.iter().sum()
    }
}

/// Resets walkers that reached an absorbing boundary to the seed state.
///
/// The recycler holds no accumulated flux; every call reports the flux of
/// that call and the caller threads the running totals through a
/// [`FluxLedger`].
#[derive(Debug, Clone)]
pub struct Recycler<S> {
    seed_state: S,
    boundaries: Vec<Boundary>,
}

impl<S: Clone> Recycler<S> {
    /// Creates a recycler for zero or more boundaries.
    pub fn new(seed_state: S, boundaries: Vec<Boundary>) -> Result<Self, RareError> {
        if let Some(position) = boundaries.iter().position(|b| !b.target.is_finite()) {
            return Err(RareError::Recycle(
                ErrorInfo::new("non-finite-target", "boundary target must be finite")
                    .with_context("boundary", position.to_string()),
            ));
        }
        Ok(Self {
            seed_state,
            boundaries,
        })
    }

    /// Configured boundaries in evaluation order.
    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    /// State recycled walkers restart from.
    pub fn seed_state(&self) -> &S {
        &self.seed_state
    }

    /// Index of the first boundary crossed at `progress`.
    pub fn crossed_boundary(&self, progress: f64) -> Option<usize> {
        self.boundaries
            .iter()
            .position(|boundary| boundary.crossed(progress))
    }

    /// Walkers currently eligible for recycling, with the boundary they crossed.
    pub fn crossings(&self, population: &Population<S>) -> Vec<(WalkerId, usize)> {
        population
            .iter()
            .filter(|walker| !walker.is_recycled())
            .filter_map(|walker| {
                walker
                    .progress()
                    .and_then(|pc| self.crossed_boundary(pc))
                    .map(|boundary| (walker.id(), boundary))
            })
            .collect()
    }

    /// Recycles every eligible walker that crossed a boundary.
    ///
    /// Walkers already recycled since their last step are skipped, so a
    /// second pass in the same cycle never counts them again. Recycled walkers
    /// lose their progress coordinate and bin and must be re-evaluated.
    pub fn recycle(
        &self,
        mut population: Population<S>,
    ) -> Result<(Population<S>, RecycleReport), RareError> {
        let mut report = RecycleReport {
            flux: vec![0.0; self.boundaries.len()],
            recycled: Vec::new(),
        };
        if self.boundaries.is_empty() {
            return Ok((population, report));
        }
        for walker in population.walkers_mut() {
            if walker.is_recycled() {
                continue;
            }
            if walker.weight() < 0.0 || !walker.weight().is_finite() {
                return Err(RareError::Recycle(
                    ErrorInfo::new("invalid-weight", "walker weight must be finite and >= 0")
                        .with_context("walker", walker.id().to_string()),
                ));
            }
            let Some(progress) = walker.progress() else {
                return Err(RareError::Recycle(
                    ErrorInfo::new("missing-progress", "walker has no progress coordinate")
                        .with_context("walker", walker.id().to_string()),
                ));
            };
            if let Some(boundary) = self.crossed_boundary(progress) {
                report.flux[boundary] += walker.weight();
                report.recycled.push(walker.id());
                walker.recycle_to(self.seed_state.clone());
            }
        }
        if !report.recycled.is_empty() {
            debug!(
                recycled = report.recycled.len(),
                flux = report.total_flux(),
                "walkers recycled"
            );
        }
        Ok((population, report))
    }
}

/// Running flux totals, owned by the controller and stored in checkpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FluxLedger {
    cumulative: Vec<f64>,
    cycles: usize,
}

impl FluxLedger {
    /// Empty ledger for `boundaries` boundaries.
    pub fn new(boundaries: usize) -> Self {
        Self {
            cumulative: vec![0.0; boundaries],
            cycles: 0,
        }
    }

    /// Adds the flux of one cycle.
    pub fn record(&mut self, report: &RecycleReport) -> Result<(), RareError> {
        if report.flux.len() != self.cumulative.len() {
            return Err(RareError::Recycle(
                ErrorInfo::new("ledger-mismatch", "report and ledger boundary counts differ")
                    .with_context("ledger", self.cumulative.len().to_string())
                    .with_context("report", report.flux.len().to_string()),
            ));
        }
        for (total, flux) in self.cumulative.iter_mut().zip(&report.flux) {
            *total += flux;
        }
        self.cycles += 1;
        Ok(())
    }

    /// Cumulative flux per boundary.
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Cumulative flux summed over boundaries.
    pub fn total(&self) -> f64 {
        self.cumulative.iter().sum()
    }

    /// Number of cycles recorded since construction or the last reset.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Mean flux per cycle and boundary, a rate estimate in units of 1/cycle.
    pub fn mean_flux(&self) -> Vec<f64> {
        if self.cycles == 0 {
            return vec![0.0; self.cumulative.len()];
        }
        self.cumulative
            .iter()
            .map(|total| total / self.cycles as f64)
            .collect()
    }

    /// Clears the totals.
    pub fn reset(&mut self) {
        self.cumulative.iter_mut().for_each(|total| *total = 0.0);
        self.cycles = 0;
    }
}
