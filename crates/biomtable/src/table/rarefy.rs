//! Rarefaction and subsampling without replacement.
//!
//! An element's counts across its counterparts form a population of
//! `total` individuals laid out in counterpart-axis order, one contiguous
//! block per counterpart. Selection sampling picks `target` positions in a
//! single pass and each position is mapped back to its block by binary search
//! over the cumulative block starts.

use std::collections::HashSet;

use tracing::debug;

use super::Table;
use crate::axis::AxisKind;
use crate::error::{BiomError, Result};

/// Draw `sample_size` distinct positions from `0..population` in increasing
/// order, consuming one uniform draw per scanned position.
///
/// Position `t` is taken with probability `(n - m) / (N - t)` where `m` have
/// been taken so far, so every subset of size `n` is equally likely. The scan
/// stops once `n` are taken. A `sample_size` above `population` is clamped.
pub fn selection_sample(sample_size: u64, population: u64, rng: &mut fastrand::Rng) -> Vec<u64> {
    let sample_size = sample_size.min(population);
    let mut selected = Vec::with_capacity(sample_size as usize);
    let mut t = 0;
    while (selected.len() as u64) < sample_size {
        let remaining = (population - t) as f64;
        let needed = (sample_size - selected.len() as u64) as f64;
        if remaining * rng.f64() < needed {
            selected.push(t);
        }
        t += 1;
    }
    selected
}

/// One element's population: `(counterpart id, count)` blocks in
/// counterpart-axis order.
struct Population {
    id: String,
    blocks: Vec<(String, u64)>,
    total: u64,
}

impl Population {
    /// Per-block frequencies of `target` individuals drawn without
    /// replacement.
    fn draw(&self, target: u64, rng: &mut fastrand::Rng) -> Vec<u64> {
        let mut starts = Vec::with_capacity(self.blocks.len());
        let mut cumulative = 0;
        for (_, count) in &self.blocks {
            starts.push(cumulative);
            cumulative += count;
        }

        let mut frequencies = vec![0; self.blocks.len()];
        for position in selection_sample(target, self.total, rng) {
            let block = starts.partition_point(|&start| start <= position) - 1;
            frequencies[block] += 1;
        }
        frequencies
    }
}

/// A cell value as a count: a non-negative integer representable in `u64`.
fn as_count(value: f64) -> Option<u64> {
    (value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64).then(|| value as u64)
}

impl Table {
    /// Subsample every element of `kind` to exactly `target` individuals
    /// drawn without replacement from its counts.
    ///
    /// Elements whose total is below `target` are dropped. Cell values must be
    /// non-negative integers. Fails with [`BiomError::InsufficientData`],
    /// before any cell changes, when no element reaches `target`.
    pub fn rarefy(&mut self, target: u64, kind: AxisKind, rng: &mut fastrand::Rng) -> Result<()> {
        let populations = self.populations(kind)?;

        let (survivors, short): (Vec<Population>, Vec<Population>) =
            populations.into_iter().partition(|p| p.total >= target);
        for population in &short {
            debug!(axis = %kind, id = %population.id, total = population.total, target, "dropped below depth");
        }
        if survivors.is_empty() {
            return Err(BiomError::InsufficientData(format!(
                "no {} has a total of at least {}",
                kind, target
            )));
        }

        for population in &survivors {
            let frequencies = population.draw(target, rng);
            for ((counterpart, _), frequency) in population.blocks.iter().zip(frequencies) {
                let (observation, sample) = match kind {
                    AxisKind::Observation => (population.id.as_str(), counterpart.as_str()),
                    AxisKind::Sample => (counterpart.as_str(), population.id.as_str()),
                };
                self.matrix.set(observation, sample, frequency as f64);
            }
        }

        let keep: HashSet<String> = survivors.into_iter().map(|p| p.id).collect();
        debug!(axis = %kind, kept = keep.len(), dropped = short.len(), target, "rarefied");
        self.filter(&keep, kind)
    }

    /// Rarefy samples to `target` reads each.
    pub fn rarefy_samples(&mut self, target: u64, rng: &mut fastrand::Rng) -> Result<()> {
        self.rarefy(target, AxisKind::Sample, rng)
    }

    /// Subsample observations to `target` counts each.
    pub fn subsample_observations(&mut self, target: u64, rng: &mut fastrand::Rng) -> Result<()> {
        self.rarefy(target, AxisKind::Observation, rng)
    }

    /// Whether every sample has the same total. Vacuously true for tables
    /// with fewer than two samples.
    pub fn check_rarefied(&self) -> bool {
        let mut totals = self
            .samples
            .ids()
            .map(|id| self.matrix.marginal_sum(AxisKind::Sample, id));
        match totals.next() {
            Some(first) => totals.all(|total| total == first),
            None => true,
        }
    }

    /// Populations of every element of `kind`, in axis order.
    fn populations(&self, kind: AxisKind) -> Result<Vec<Population>> {
        let axis = self.axis(kind);
        let counterpart = self.axis(kind.counterpart());

        let mut blocks: Vec<Vec<(usize, String, u64)>> = vec![Vec::new(); axis.size()];
        for (observation, sample, value) in self.matrix.iter() {
            let count = as_count(value).ok_or_else(|| {
                BiomError::InvalidArgument(format!(
                    "cannot rarefy {} at ({}, {}): not a non-negative integer count",
                    value, observation, sample
                ))
            })?;
            let (element, other) = match kind {
                AxisKind::Observation => (observation, sample),
                AxisKind::Sample => (sample, observation),
            };
            let (Some(slot), Some(position)) = (axis.index_of(element), counterpart.index_of(other))
            else {
                continue;
            };
            blocks[slot].push((position, other.to_string(), count));
        }

        let mut populations = Vec::with_capacity(axis.size());
        for (id, mut element_blocks) in axis.ids().zip(blocks) {
            element_blocks.sort_unstable_by_key(|&(position, _, _)| position);
            let mut total: u64 = 0;
            let mut blocks = Vec::with_capacity(element_blocks.len());
            for (_, other, count) in element_blocks {
                total = total.checked_add(count).ok_or_else(|| {
                    BiomError::InvalidArgument(format!("total of {} '{}' overflows a u64 count", kind, id))
                })?;
                blocks.push((other, count));
            }
            populations.push(Population {
                id: id.to_string(),
                blocks,
                total,
            });
        }
        Ok(populations)
    }
}
