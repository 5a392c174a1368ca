use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bound collecting what the ensemble needs from a physical state handle.
pub trait WalkerState:
    Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned
{
}

impl<T> WalkerState for T where
    T: Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned
{
}

/// Identifier of a walker, unique within a population's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalkerId(u64);

impl WalkerId {
    /// Creates an identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WalkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// A weighted simulation replica.
///
/// Fields are read-only from the outside. The progress coordinate and bin are
/// caches: replacing the state clears both, and setting a new coordinate
/// clears the bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Walker<S> {
    id: WalkerId,
    #[serde(default)]
    parent: Option<WalkerId>,
    state: S,
    weight: f64,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    bin: Option<usize>,
    #[serde(default)]
    recycled: bool,
}

impl<S> Walker<S> {
    /// Creates a walker without cached coordinate or bin.
    pub fn new(id: WalkerId, state: S, weight: f64) -> Self {
        Self {
            id,
            parent: None,
            state,
            weight,
            progress: None,
            bin: None,
            recycled: false,
        }
    }

    /// Identifier of the walker.
    pub fn id(&self) -> WalkerId {
        self.id
    }

    /// Walker this one was split from, if any.
    pub fn parent(&self) -> Option<WalkerId> {
        self.parent
    }

    /// Physical state handle.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Statistical weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Cached progress coordinate.
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// Cached bin index.
    pub fn bin(&self) -> Option<usize> {
        self.bin
    }

    /// True when the walker was reset to the seed state and not stepped since.
    pub fn is_recycled(&self) -> bool {
        self.recycled
    }

    /// Caches a freshly evaluated progress coordinate, invalidating the bin.
    pub fn set_progress(&mut self, value: f64) {
        self.progress = Some(value);
        self.bin = None;
    }

    pub(crate) fn set_bin(&mut self, bin: usize) {
        self.bin = Some(bin);
    }

    /// Replaces the state with the result of a simulation step.
    pub fn advance_to(&mut self, state: S) {
        self.state = state;
        self.progress = None;
        self.bin = None;
        self.recycled = false;
    }

    /// Resets the walker to `seed`, keeping its weight and dropping lineage.
    pub(crate) fn recycle_to(&mut self, seed: S) {
        self.state = seed;
        self.parent = None;
        self.progress = None;
        self.bin = None;
        self.recycled = true;
    }

    /// Adds the weight of an absorbed walker.
    pub(crate) fn absorb(&mut self, other: Walker<S>) {
        self.weight += other.weight;
    }
}

impl<S: Clone> Walker<S> {
    /// Halves the weight and returns an exact copy carrying the other half.
    pub(crate) fn split_off(&mut self, child_id: WalkerId) -> Walker<S> {
        self.weight /= 2.0;
        Walker {
            id: child_id,
            parent: Some(self.id),
            state: self.state.clone(),
            weight: self.weight,
            progress: self.progress,
            bin: self.bin,
            recycled: self.recycled,
        }
    }
}

/// Walker count and total weight of one bin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BinStats {
    /// Number of walkers assigned to the bin.
    pub walkers: usize,
    /// Sum of their weights.
    pub weight: f64,
}

/// The full ordered collection of walkers at a given cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population<S> {
    walkers: Vec<Walker<S>>,
    next_id: u64,
}

impl<S> Default for Population<S> {
    fn default() -> Self {
        Self {
            walkers: Vec::new(),
            next_id: 0,
        }
    }
}

impl<S> Population<S> {
    /// Creates an empty population.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a population from existing walkers; fresh ids start past the largest one.
    pub fn from_walkers(walkers: Vec<Walker<S>>) -> Self {
        let next_id = walkers
            .iter()
            .map(|walker| walker.id.as_raw() + 1)
            .max()
            .unwrap_or(0);
        Self { walkers, next_id }
    }

    /// Adds a walker with a fresh identifier and returns that identifier.
    pub fn spawn(&mut self, state: S, weight: f64) -> WalkerId {
        let id = self.fresh_id();
        self.walkers.push(Walker::new(id, state, weight));
        id
    }

    pub(crate) fn fresh_id(&mut self) -> WalkerId {
        let id = WalkerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Number of walkers.
    pub fn len(&self) -> usize {
        self.walkers.len()
    }

    /// True when the population holds no walkers.
    pub fn is_empty(&self) -> bool {
        self.walkers.is_empty()
    }

    /// Walkers in population order.
    pub fn walkers(&self) -> &[Walker<S>] {
        &self.walkers
    }

    /// Mutable access for evaluation stages.
    pub fn walkers_mut(&mut self) -> &mut [Walker<S>] {
        &mut self.walkers
    }

    /// Iterates over the walkers.
    pub fn iter(&self) -> std::slice::Iter<'_, Walker<S>> {
        self.walkers.iter()
    }

    /// Looks up a walker by id.
    pub fn get(&self, id: WalkerId) -> Option<&Walker<S>> {
        self.walkers.iter().find(|walker| walker.id == id)
    }

    /// Sum of weights in population order.
    pub fn total_weight(&self) -> f64 {
        self.walkers.iter().map(|walker| walker.weight).sum()
    }

    /// Occupied bins with their walker count and weight.
    pub fn occupancy(&self) -> BTreeMap<usize, BinStats> {
        let mut bins = BTreeMap::<usize, BinStats>::new();
        for walker in &self.walkers {
            if let Some(bin) = walker.bin {
                let entry = bins.entry(bin).or_default();
                entry.walkers += 1;
                entry.weight += walker.weight;
            }
        }
        bins
    }

    /// Checks that every weight is finite and non-negative.
    pub fn check_weights(&self) -> Result<(), RareError> {
        for walker in &self.walkers {
            if !walker.weight.is_finite() || walker.weight < 0.0 {
                return Err(RareError::Population(
                    ErrorInfo::new("invalid-weight", "walker weight must be finite and >= 0")
                        .with_context("walker", walker.id.to_string())
                        .with_context("weight", walker.weight.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Checks weights and that they sum to one within `tolerance`.
    pub fn validate_normalised(&self, tolerance: f64) -> Result<(), RareError> {
        if self.is_empty() {
            return Err(RareError::Population(ErrorInfo::new(
                "empty-population",
                "population holds no walkers",
            )));
        }
        self.check_weights()?;
        let total = self.total_weight();
        if (total - 1.0).abs() > tolerance {
            return Err(RareError::Population(
                ErrorInfo::new("weight-normalisation", "walker weights do not sum to one")
                    .with_context("total", total.to_string())
                    .with_context("tolerance", tolerance.to_string()),
            ));
        }
        Ok(())
    }

    /// Checks that ids are unique and that the id counter is past all of them.
    pub fn check_ids(&self) -> Result<(), RareError> {
        let mut seen = std::collections::BTreeSet::new();
        for walker in &self.walkers {
            if !seen.insert(walker.id) {
                return Err(RareError::Population(
                    ErrorInfo::new("duplicate-walker-id", "walker id appears more than once")
                        .with_context("walker", walker.id.to_string()),
                ));
            }
        }
        if let Some(max) = seen.last() {
            if self.next_id <= max.as_raw() {
                return Err(RareError::Population(
                    ErrorInfo::new("stale-id-counter", "next id does not exceed every walker id")
                        .with_context("next_id", self.next_id.to_string())
                        .with_context("max_id", max.as_raw().to_string()),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<Walker<S>>, u64) {
        (self.walkers, self.next_id)
    }

    pub(crate) fn from_parts(walkers: Vec<Walker<S>>, next_id: u64) -> Self {
        Self { walkers, next_id }
    }
}

impl<S: Clone> Population<S> {
    /// `count` walkers at `state`, each with weight `1 / count`.
    pub fn uniform(state: S, count: usize) -> Self {
        let mut population = Self::new();
        if count == 0 {
            return population;
        }
        let weight = 1.0 / count as f64;
        for _ in 0..count {
            population.spawn(state.clone(), weight);
        }
        population
    }
}

impl<'a, S> IntoIterator for &'a Population<S> {
    type Item = &'a Walker<S>;
    type IntoIter = std::slice::Iter<'a, Walker<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.walkers.iter()
    }
}
