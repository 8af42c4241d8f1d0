//! Derived statistics over a table.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Table;
use crate::axis::AxisKind;

/// Distribution of a set of totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl SummaryStats {
    fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let median = if n % 2 == 0 {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        } else {
            values[n / 2]
        };
        Some(Self {
            min: values[0],
            max: values[n - 1],
            mean: values.iter().sum::<f64>() / n as f64,
            median,
        })
    }
}

/// Overview of a table's shape and per-sample totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub observations: usize,
    pub samples: usize,
    pub nnz: usize,
    /// Fraction of cells that are non-zero.
    pub density: f64,
    pub total: f64,
    /// `None` for a table without samples.
    pub sample_totals: Option<SummaryStats>,
    pub rarefied: bool,
}

impl Table {
    /// Total of one observation or sample.
    pub fn marginal_sum(&self, kind: AxisKind, id: &str) -> f64 {
        self.matrix.marginal_sum(kind, id)
    }

    /// Totals of every element of `kind`, in axis order.
    pub fn sums(&self, kind: AxisKind) -> IndexMap<String, f64> {
        self.axis(kind)
            .ids()
            .map(|id| (id.to_string(), self.matrix.marginal_sum(kind, id)))
            .collect()
    }

    /// Mean of an element's values over the whole counterpart axis, zeros
    /// included. NaN when the counterpart axis is empty.
    pub fn mean(&self, kind: AxisKind, id: &str) -> f64 {
        let size = self.axis(kind.counterpart()).size();
        self.matrix.marginal_sum(kind, id) / size as f64
    }

    pub fn means(&self, kind: AxisKind) -> IndexMap<String, f64> {
        let size = self.axis(kind.counterpart()).size() as f64;
        self.sums(kind)
            .into_iter()
            .map(|(id, sum)| (id, sum / size))
            .collect()
    }

    /// Number of non-zero values of one element.
    pub fn nonzero_count(&self, kind: AxisKind, id: &str) -> usize {
        self.matrix.nonzero_count_along(kind, id)
    }

    /// Non-zero counts of every element of `kind`, in axis order.
    pub fn nonzero_counts(&self, kind: AxisKind) -> IndexMap<String, usize> {
        let mut counts: IndexMap<String, usize> =
            self.axis(kind).ids().map(|id| (id.to_string(), 0)).collect();
        for (observation, sample, _) in self.matrix.iter() {
            let id = match kind {
                AxisKind::Observation => observation,
                AxisKind::Sample => sample,
            };
            if let Some(count) = counts.get_mut(id) {
                *count += 1;
            }
        }
        counts
    }

    /// Observed richness: non-zero observations per sample.
    pub fn richness(&self) -> IndexMap<String, usize> {
        self.nonzero_counts(AxisKind::Sample)
    }

    /// Shannon entropy `-Σ v ln v` of each sample over its positive values.
    /// Meaningful on relative abundances, i.e. after [`Table::normalize`].
    pub fn shannon(&self) -> IndexMap<String, f64> {
        let mut entropy: IndexMap<String, f64> =
            self.samples.ids().map(|id| (id.to_string(), 0.0)).collect();
        for (_, sample, value) in self.matrix.iter() {
            if value > 0.0 {
                if let Some(h) = entropy.get_mut(sample) {
                    *h -= value * value.ln();
                }
            }
        }
        entropy
    }

    /// Full row or column of `id` in counterpart order, zeros included.
    pub fn item(&self, kind: AxisKind, id: &str) -> IndexMap<String, f64> {
        self.axis(kind.counterpart())
            .ids()
            .map(|other| {
                let value = match kind {
                    AxisKind::Observation => self.matrix.get(id, other),
                    AxisKind::Sample => self.matrix.get(other, id),
                };
                (other.to_string(), value)
            })
            .collect()
    }

    pub fn summary(&self) -> TableSummary {
        let (observations, samples) = self.shape();
        let cells = observations * samples;
        let totals: Vec<f64> = self.sums(AxisKind::Sample).into_values().collect();
        TableSummary {
            observations,
            samples,
            nnz: self.nnz,
            density: if cells == 0 {
                0.0
            } else {
                self.nnz as f64 / cells as f64
            },
            total: totals.iter().sum(),
            sample_totals: SummaryStats::from_values(totals),
            rarefied: self.check_rarefied(),
        }
    }
}
