use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use tracing::debug;

use crate::walker::Population;

/// Assigns walkers to contiguous 1-D bins delimited by ordered edges.
///
/// Bin `i` covers `edges[i] <= x < edges[i + 1]`. Coordinates outside the
/// edges are clamped into the first or last bin, never dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Binner {
    edges: Vec<f64>,
}

impl Binner {
    /// Validates the edges (at least two, finite, strictly increasing).
    pub fn new(edges: Vec<f64>) -> Result<Self, RareError> {
        if edges.len() < 2 {
            return Err(RareError::Binning(
                ErrorInfo::new("too-few-edges", "at least two bin edges are required")
                    .with_context("edges", edges.len().to_string()),
            ));
        }
        if let Some(position) = edges.iter().position(|edge| !edge.is_finite()) {
            return Err(RareError::Binning(
                ErrorInfo::new("non-finite-edge", "bin edges must be finite")
                    .with_context("index", position.to_string()),
            ));
        }
        if let Some(position) = edges.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(RareError::Binning(
                ErrorInfo::new("unordered-edges", "bin edges must be strictly increasing")
                    .with_context("index", (position + 1).to_string()),
            ));
        }
        Ok(Self { edges })
    }

    /// Configured edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins (`edges.len() - 1`).
    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Bin index for coordinate `x`.
    pub fn bin_index(&self, x: f64) -> Result<usize, RareError> {
        if x.is_nan() {
            return Err(RareError::Binning(ErrorInfo::new(
                "nan-coordinate",
                "cannot bin a NaN progress coordinate",
            )));
        }
        let at_or_below = self.edges.partition_point(|edge| *edge <= x);
        Ok(at_or_below.saturating_sub(1).min(self.num_bins() - 1))
    }

    /// Sets the bin of every walker. Weights and order are untouched.
    pub fn assign<S>(&self, mut population: Population<S>) -> Result<Population<S>, RareError> {
        for walker in population.walkers_mut() {
            let Some(progress) = walker.progress() else {
                return Err(RareError::Binning(
                    ErrorInfo::new("missing-progress", "walker has no progress coordinate")
                        .with_context("walker", walker.id().to_string()),
                ));
            };
            let bin = self.bin_index(progress)?;
            walker.set_bin(bin);
        }
        debug!(
            walkers = population.len(),
            occupied = population.occupancy().len(),
            "walkers binned"
        );
        Ok(population)
    }
}
