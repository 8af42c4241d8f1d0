//! The table engine: two axes and a sparse matrix kept in step.
//!
//! Every row id stored in the matrix is an observation on the observation
//! axis and every column id is a sample on the sample axis. Operations that
//! shrink an axis check for an empty result first, then shrink the matrix,
//! then the axis, so a failed call leaves the table as it was.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use biomtable::{AxisKind, CsrMatrix, DecodedTable, Table};
//!
//! let decoded = DecodedTable {
//!     observation_ids: vec!["OTU_1".into(), "OTU_2".into()],
//!     sample_ids: vec!["S1".into(), "S2".into()],
//!     matrix: CsrMatrix::from_dense(&[vec![3.0, 0.0], vec![1.0, 4.0]]),
//!     ..Default::default()
//! };
//! let mut table = Table::from_decoded(decoded).unwrap();
//! assert_eq!(table.nnz(), 3);
//!
//! let keep: HashSet<String> = ["S2".to_string()].into();
//! table.filter(&keep, AxisKind::Sample).unwrap();
//! assert_eq!(table.shape(), (2, 1));
//! assert_eq!(table.value("OTU_2", "S2"), 4.0);
//! ```

mod rarefy;
mod stats;

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::axis::{Axis, AxisKind, Lineage, MetadataMap};
use crate::error::{BiomError, Result};
use crate::input::{DecodedTable, TableAttributes, TableDecoder};
use crate::matrix::SparseMatrix;
use crate::taxonomy::{self, TAXONOMY_KEY};

pub use rarefy::selection_sample;
pub use stats::{SummaryStats, TableSummary};

/// A sparse observation-by-sample table with per-axis metadata.
#[derive(Debug, Clone)]
pub struct Table {
    observations: Axis,
    samples: Axis,
    matrix: SparseMatrix,
    nnz: usize,
    attributes: Option<TableAttributes>,
}

impl Table {
    /// Assemble a table from its parts.
    ///
    /// Fails with [`BiomError::InvalidArgument`] if an axis has the wrong kind
    /// or the matrix references an id missing from its axis.
    pub fn new(observations: Axis, samples: Axis, matrix: SparseMatrix) -> Result<Self> {
        if observations.kind() != AxisKind::Observation || samples.kind() != AxisKind::Sample {
            return Err(BiomError::InvalidArgument(
                "expected an observation axis and a sample axis".to_string(),
            ));
        }
        for (row, column, _) in matrix.iter() {
            if !observations.contains(row) {
                return Err(BiomError::InvalidArgument(format!(
                    "matrix row '{}' is not an observation",
                    row
                )));
            }
            if !samples.contains(column) {
                return Err(BiomError::InvalidArgument(format!(
                    "matrix column '{}' is not a sample",
                    column
                )));
            }
        }
        Ok(Self::from_parts(observations, samples, matrix, None))
    }

    fn from_parts(
        observations: Axis,
        samples: Axis,
        matrix: SparseMatrix,
        attributes: Option<TableAttributes>,
    ) -> Self {
        let nnz = matrix.nonzero_count();
        Self {
            observations,
            samples,
            matrix,
            nnz,
            attributes,
        }
    }

    /// Build a table from decoder output.
    ///
    /// Taxonomy is decoded into clade metadata before the remaining metadata
    /// columns are applied; an observation column named `taxonomy` is left to
    /// the taxonomy decoder.
    pub fn from_decoded(decoded: DecodedTable) -> Result<Self> {
        decoded.validate()?;
        let DecodedTable {
            observation_ids,
            sample_ids,
            matrix,
            attributes,
            observation_metadata,
            sample_metadata,
            taxonomy: raw_taxonomy,
        } = decoded;

        let mut observations = Axis::new(AxisKind::Observation, observation_ids)?;
        let mut samples = Axis::new(AxisKind::Sample, sample_ids)?;

        match raw_taxonomy {
            Some(raw) => {
                for (position, metadata) in taxonomy::decode_taxonomy(&raw).into_iter().enumerate() {
                    let id = observations.elements()[position].id().to_string();
                    for (key, value) in &metadata {
                        observations.set_metadata(&id, key, value);
                    }
                }
            }
            None => warn!("taxonomy metadata not found"),
        }

        for column in sample_metadata.iter() {
            apply_metadata_column(&mut samples, column);
        }
        for column in observation_metadata.iter().filter(|c| c.name != TAXONOMY_KEY) {
            apply_metadata_column(&mut observations, column);
        }

        let entries = matrix.entries().map(|(row, column, value)| {
            (
                observations.elements()[row].id(),
                samples.elements()[column].id(),
                value,
            )
        });
        let matrix = SparseMatrix::from_entries(entries);

        let table = Self::from_parts(observations, samples, matrix, Some(attributes));
        debug!(
            observations = table.observations.size(),
            samples = table.samples.size(),
            nnz = table.nnz,
            "decoded table"
        );
        Ok(table)
    }

    /// Decode and assemble a table.
    pub fn load(decoder: &mut impl TableDecoder) -> Result<Self> {
        Self::from_decoded(decoder.decode()?)
    }

    pub fn observations(&self) -> &Axis {
        &self.observations
    }

    pub fn samples(&self) -> &Axis {
        &self.samples
    }

    /// The axis of the given kind.
    pub fn axis(&self, kind: AxisKind) -> &Axis {
        match kind {
            AxisKind::Observation => &self.observations,
            AxisKind::Sample => &self.samples,
        }
    }

    fn axis_mut(&mut self, kind: AxisKind) -> &mut Axis {
        match kind {
            AxisKind::Observation => &mut self.observations,
            AxisKind::Sample => &mut self.samples,
        }
    }

    pub fn matrix(&self) -> &SparseMatrix {
        &self.matrix
    }

    /// Descriptive attributes from the source file; `None` once the table has
    /// been structurally changed.
    pub fn attributes(&self) -> Option<&TableAttributes> {
        self.attributes.as_ref()
    }

    /// Number of stored non-zero cells.
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// `(observations, samples)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.observations.size(), self.samples.size())
    }

    /// Value for an observation and sample; 0 when absent.
    pub fn value(&self, observation: &str, sample: &str) -> f64 {
        self.matrix.get(observation, sample)
    }

    /// Value by positions, or `None` if a position is out of range.
    pub fn value_at(&self, row: usize, column: usize) -> Option<f64> {
        let observation = self.observations.id_at(row)?;
        let sample = self.samples.id_at(column)?;
        Some(self.matrix.get(observation, sample))
    }

    /// Set a single cell. Both ids must exist.
    pub fn set_value(&mut self, observation: &str, sample: &str, value: f64) -> Result<()> {
        if !self.observations.contains(observation) {
            return Err(BiomError::InvalidArgument(format!(
                "unknown observation '{}'",
                observation
            )));
        }
        if !self.samples.contains(sample) {
            return Err(BiomError::InvalidArgument(format!("unknown sample '{}'", sample)));
        }
        let was_present = self.matrix.presence(observation, sample);
        self.matrix.set(observation, sample, value);
        match (was_present, value != 0.0) {
            (false, true) => self.nnz += 1,
            (true, false) => self.nnz -= 1,
            _ => {}
        }
        Ok(())
    }

    /// Store a metadata value on an axis element.
    pub fn set_metadata(&mut self, kind: AxisKind, id: &str, key: &str, value: &str) {
        self.axis_mut(kind).set_metadata(id, key, value);
    }

    /// Store every value of a metadata mapping on an axis.
    pub fn add_metadata(&mut self, kind: AxisKind, metadata: &MetadataMap) {
        self.axis_mut(kind).add_metadata(metadata);
    }

    /// Drop all metadata on an axis.
    pub fn remove_all_metadata(&mut self, kind: AxisKind) {
        self.axis_mut(kind).remove_all_metadata();
    }

    /// Keep only the elements of `kind` whose ids are in `keep`.
    pub fn filter(&mut self, keep: &HashSet<String>, kind: AxisKind) -> Result<()> {
        if !self.axis(kind).retains_any(keep) {
            return Err(BiomError::EmptySelection { axis: kind });
        }
        let before = self.axis(kind).size();

        match kind {
            AxisKind::Observation => self.matrix.filter_rows(keep),
            AxisKind::Sample => self.matrix.filter_columns(keep),
        }
        self.axis_mut(kind).filter(keep)?;

        self.attributes = None;
        self.nnz = self.matrix.nonzero_count();
        debug!(axis = %kind, before, after = self.axis(kind).size(), "filtered");
        Ok(())
    }

    /// Drop elements lacking any of `keys`.
    pub fn filter_by_missing_metadata<S: AsRef<str>>(&mut self, keys: &[S], kind: AxisKind) -> Result<()> {
        let keep: HashSet<String> = self
            .axis(kind)
            .elements()
            .iter()
            .filter(|element| keys.iter().all(|key| element.has_metadata(key.as_ref())))
            .map(|element| element.id().to_string())
            .collect();
        if keep.is_empty() {
            debug!(axis = %kind, "no elements with required metadata");
            return Err(BiomError::EmptySelection { axis: kind });
        }
        self.filter(&keep, kind)
    }

    /// Keep observations present (non-zero) in at least `min_count` samples.
    pub fn prevalence_filter(&mut self, min_count: usize) -> Result<()> {
        let keep: HashSet<String> = self
            .nonzero_counts(AxisKind::Observation)
            .into_iter()
            .filter(|&(_, count)| count >= min_count)
            .map(|(id, _)| id)
            .collect();
        if keep.is_empty() {
            return Err(BiomError::InsufficientData(format!(
                "no observations occur in at least {} samples",
                min_count
            )));
        }
        self.filter(&keep, AxisKind::Observation)
    }

    /// Keep a uniformly random subset of `n` elements with non-zero totals.
    pub fn random_subset(&mut self, n: usize, kind: AxisKind, rng: &mut fastrand::Rng) -> Result<()> {
        let size = self.axis(kind).size();
        if n > size {
            return Err(BiomError::InvalidArgument(format!(
                "cannot take {} {}s from an axis of {}",
                n, kind, size
            )));
        }

        let mut candidates: Vec<String> = self
            .axis(kind)
            .ids()
            .filter(|id| self.matrix.marginal_sum(kind, id) != 0.0)
            .map(str::to_string)
            .collect();
        if candidates.len() < n {
            return Err(BiomError::InsufficientData(format!(
                "only {} {}s have non-zero totals, {} requested",
                candidates.len(),
                kind,
                n
            )));
        }

        rng.shuffle(&mut candidates);
        candidates.truncate(n);
        let keep: HashSet<String> = candidates.into_iter().collect();
        self.filter(&keep, kind)
    }

    /// Axis and matrix after collapsing `kind` by `key`, or `None` when no
    /// element carries the key.
    fn collapse_parts(&self, key: &str, kind: AxisKind) -> Option<(Axis, SparseMatrix)> {
        if !self.axis(kind).has_metadata_field(key) {
            return None;
        }
        let mut axis = self.axis(kind).collapse(key);
        let Some(Lineage::Collapse(lineage)) = axis.take_lineage() else {
            return None;
        };
        let matrix = match kind {
            AxisKind::Observation => self.matrix.collapse(Some(&lineage), None),
            AxisKind::Sample => self.matrix.collapse(None, Some(&lineage)),
        };
        debug!(axis = %kind, key, groups = axis.size(), "collapsed");
        Some((axis, matrix))
    }

    /// A new table with the elements of `kind` summed by their value of
    /// `key`. Returns an unchanged copy when no element carries the key.
    pub fn collapsed(&self, key: &str, kind: AxisKind) -> Table {
        match self.collapse_parts(key, kind) {
            Some((axis, matrix)) => match kind {
                AxisKind::Observation => Self::from_parts(axis, self.samples.clone(), matrix, None),
                AxisKind::Sample => Self::from_parts(self.observations.clone(), axis, matrix, None),
            },
            None => self.clone(),
        }
    }

    /// In-place form of [`Table::collapsed`].
    pub fn collapse(&mut self, key: &str, kind: AxisKind) {
        if let Some((axis, matrix)) = self.collapse_parts(key, kind) {
            *self.axis_mut(kind) = axis;
            self.matrix = matrix;
            self.nnz = self.matrix.nonzero_count();
            self.attributes = None;
        }
    }

    /// Bootstrap replicate: samples drawn with replacement using `seed`.
    pub fn resample_with_replacement(&self, seed: u64) -> Table {
        let mut samples = self.samples.resample_with_replacement(seed);
        let matrix = match samples.take_lineage() {
            Some(Lineage::Resample(lineage)) => self.matrix.resample_columns(&lineage),
            _ => SparseMatrix::new(),
        };
        Self::from_parts(self.observations.clone(), samples, matrix, None)
    }

    /// Convert each sample to relative abundance. Samples summing to zero are
    /// left as they are.
    pub fn normalize(&mut self) {
        let totals = self.sums(AxisKind::Sample);
        self.matrix.map_values(|_, sample, value| match totals.get(sample) {
            Some(&total) if total != 0.0 => value / total,
            _ => value,
        });
        self.nnz = self.matrix.nonzero_count();
    }

    /// Replace every non-zero value with 1.
    pub fn presence_absence(&mut self) {
        self.matrix.map_values(|_, _, _| 1.0);
        self.nnz = self.matrix.nonzero_count();
    }

    /// Whether both tables hold the same observation ids, sample ids and
    /// values. Order and metadata are ignored.
    pub fn same_data(&self, other: &Table) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        if !self.observations.ids().all(|id| other.observations.contains(id))
            || !self.samples.ids().all(|id| other.samples.contains(id))
        {
            return false;
        }
        self.observations.ids().all(|observation| {
            self.samples
                .ids()
                .all(|sample| self.value(observation, sample) == other.value(observation, sample))
        })
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.same_data(other)
    }
}

fn apply_metadata_column(axis: &mut Axis, column: &crate::input::MetadataColumn) {
    for position in 0..axis.size() {
        let id = axis.elements()[position].id().to_string();
        for (key, value) in column.entries_at(position) {
            axis.set_metadata(&id, &key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{CsrMatrix, MetadataColumn};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn keep(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn small_table() -> Table {
        let decoded = DecodedTable {
            observation_ids: strings(&["o1", "o2", "o3"]),
            sample_ids: strings(&["s1", "s2"]),
            matrix: CsrMatrix::from_dense(&[vec![1.0, 0.0], vec![2.0, 3.0], vec![0.0, 4.0]]),
            attributes: TableAttributes {
                id: Some("small".to_string()),
                ..Default::default()
            },
            observation_metadata: vec![MetadataColumn::scalar("group", strings(&["a", "a", "b"]))],
            sample_metadata: vec![MetadataColumn::scalar("site", strings(&["gut", "NA"]))],
            taxonomy: None,
        };
        Table::from_decoded(decoded).unwrap()
    }

    #[test]
    fn test_from_decoded() {
        let table = small_table();
        assert_eq!(table.shape(), (3, 2));
        assert_eq!(table.nnz(), 4);
        assert_eq!(table.value("o2", "s2"), 3.0);
        assert_eq!(table.value_at(2, 1), Some(4.0));
        assert_eq!(table.value_at(3, 0), None);
        assert_eq!(table.attributes().unwrap().id.as_deref(), Some("small"));
        assert_eq!(table.samples().metadata("s1", "site"), Some("gut"));
        assert_eq!(table.samples().metadata("s2", "site"), None);
    }

    #[test]
    fn test_new_rejects_unknown_ids() {
        let observations = Axis::new(AxisKind::Observation, ["o1"]).unwrap();
        let samples = Axis::new(AxisKind::Sample, ["s1"]).unwrap();
        let matrix = SparseMatrix::from_entries([("o1", "s9", 1.0)]);
        assert!(Table::new(observations, samples, matrix).is_err());
    }

    #[test]
    fn test_set_value_tracks_nnz() {
        let mut table = small_table();
        table.set_value("o1", "s2", 5.0).unwrap();
        assert_eq!(table.nnz(), 5);
        table.set_value("o1", "s2", 0.0).unwrap();
        table.set_value("o1", "s1", 0.0).unwrap();
        assert_eq!(table.nnz(), 3);
        assert_eq!(table.nnz(), table.matrix().nonzero_count());
        assert!(table.set_value("nope", "s1", 1.0).is_err());
    }

    #[test]
    fn test_failed_filter_leaves_table_intact() {
        let mut table = small_table();
        let result = table.filter(&keep(&["zzz"]), AxisKind::Sample);
        assert!(matches!(result, Err(BiomError::EmptySelection { .. })));
        assert_eq!(table.shape(), (3, 2));
        assert_eq!(table.nnz(), 4);
        assert!(table.attributes().is_some());
    }

    #[test]
    fn test_filter_clears_attributes() {
        let mut table = small_table();
        table.filter(&keep(&["o2", "o3"]), AxisKind::Observation).unwrap();
        assert!(table.attributes().is_none());
        assert_eq!(table.nnz(), 3);
    }

    #[test]
    fn test_collapse_missing_key_is_noop() {
        let table = small_table();
        let collapsed = table.collapsed("nope", AxisKind::Observation);
        assert_eq!(collapsed, table);
        assert!(collapsed.attributes().is_some());
    }

    #[test]
    fn test_collapse_in_place_matches_pure() {
        let table = small_table();
        let pure = table.collapsed("group", AxisKind::Observation);

        let mut in_place = table.clone();
        in_place.collapse("group", AxisKind::Observation);

        assert_eq!(pure, in_place);
        assert_eq!(in_place.shape(), (2, 2));
        assert_eq!(in_place.value("a", "s1"), 3.0);
        assert_eq!(in_place.value("a", "s2"), 3.0);
        assert_eq!(in_place.value("b", "s2"), 4.0);
        assert!(in_place.observations().collapse_lineage().is_none());
    }

    #[test]
    fn test_collapse_samples() {
        let mut table = small_table();
        table.collapse("site", AxisKind::Sample);
        // s2 has no site and drops out with its column.
        assert_eq!(table.shape(), (3, 1));
        assert_eq!(table.value("o2", "gut"), 2.0);
        assert_eq!(table.nnz(), 2);
    }

    #[test]
    fn test_resample_columns_follow_sources() {
        let table = small_table();
        let resampled = table.resample_with_replacement(42);
        assert_eq!(resampled.shape(), table.shape());

        let lineage: Vec<(String, String)> = resampled
            .samples()
            .ids()
            .map(|id| (id.to_string(), id.rsplit_once('.').unwrap().0.to_string()))
            .collect();
        for (new, old) in lineage {
            for observation in table.observations().ids() {
                assert_eq!(resampled.value(observation, &new), table.value(observation, &old));
            }
        }
        assert!(resampled.samples().resample_lineage().is_none());
    }

    #[test]
    fn test_presence_absence() {
        let mut table = small_table();
        table.presence_absence();
        assert_eq!(table.value("o3", "s2"), 1.0);
        assert_eq!(table.value("o3", "s1"), 0.0);
        assert_eq!(table.nnz(), 4);
    }

    #[test]
    fn test_normalize_skips_empty_columns() {
        let decoded = DecodedTable {
            observation_ids: strings(&["o1", "o2"]),
            sample_ids: strings(&["s1", "s2"]),
            matrix: CsrMatrix::from_dense(&[vec![1.0, 0.0], vec![3.0, 0.0]]),
            ..Default::default()
        };
        let mut table = Table::from_decoded(decoded).unwrap();
        table.normalize();
        assert_eq!(table.value("o1", "s1"), 0.25);
        assert_eq!(table.value("o2", "s1"), 0.75);
        assert_eq!(table.marginal_sum(AxisKind::Sample, "s2"), 0.0);
    }

    #[test]
    fn test_filter_by_missing_metadata() {
        let mut table = small_table();
        table.filter_by_missing_metadata(&["site"], AxisKind::Sample).unwrap();
        assert_eq!(table.samples().ids().collect::<Vec<_>>(), vec!["s1"]);

        let mut table = small_table();
        let result = table.filter_by_missing_metadata(&["depth"], AxisKind::Sample);
        assert!(matches!(result, Err(BiomError::EmptySelection { .. })));
        assert_eq!(table.shape(), (3, 2));
    }

    #[test]
    fn test_prevalence_filter() {
        let mut table = small_table();
        table.prevalence_filter(2).unwrap();
        assert_eq!(table.observations().ids().collect::<Vec<_>>(), vec!["o2"]);

        let result = table.prevalence_filter(3);
        assert!(matches!(result, Err(BiomError::InsufficientData(_))));
    }

    #[test]
    fn test_random_subset_ignores_cleared_sample() {
        let decoded = DecodedTable {
            observation_ids: strings(&["o1", "o2"]),
            sample_ids: strings(&["s1", "s2"]),
            matrix: CsrMatrix::from_dense(&[vec![1.0, 0.0], vec![0.0, 0.0]]),
            ..Default::default()
        };
        let mut table = Table::from_decoded(decoded).unwrap();
        assert_eq!(table.marginal_sum(AxisKind::Sample, "s2"), 0.0);

        table.set_value("o1", "s2", 0.1).unwrap();
        table.set_value("o2", "s2", 0.2).unwrap();
        table.set_value("o1", "s2", 0.0).unwrap();
        table.set_value("o2", "s2", 0.0).unwrap();
        assert_eq!(table.marginal_sum(AxisKind::Sample, "s2"), 0.0);
        assert_eq!(table.marginal_sum(AxisKind::Observation, "o2"), 0.0);

        let mut rng = fastrand::Rng::with_seed(4);
        let result = table.random_subset(2, AxisKind::Sample, &mut rng);
        assert!(matches!(result, Err(BiomError::InsufficientData(_))));
        assert_eq!(table.shape(), (2, 2));
    }

    #[test]
    fn test_random_subset() {
        let mut rng = fastrand::Rng::with_seed(9);
        let mut table = small_table();
        assert!(matches!(
            table.random_subset(4, AxisKind::Observation, &mut rng),
            Err(BiomError::InvalidArgument(_))
        ));

        table.random_subset(2, AxisKind::Observation, &mut rng).unwrap();
        assert_eq!(table.shape(), (2, 2));
        assert_eq!(table.nnz(), table.matrix().nonzero_count());
    }
}
