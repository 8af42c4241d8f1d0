//! Option-driven table construction.
//!
//! [`LoadOptions`] names the operations to apply after a table is decoded.
//! They always run in the same order regardless of how the options were
//! built:
//!
//! 1. collapse observations to a taxonomic rank
//! 2. replace sample metadata
//! 3. replace observation metadata
//! 4. keep listed samples
//! 5. rarefy samples
//! 6. require a rarefied table
//! 7. keep listed observations
//! 8. drop observations missing required metadata
//! 9. drop samples missing required metadata
//! 10. random sample subset
//! 11. normalize
//! 12. prevalence filter
//! 13. random observation subset
//! 14. presence/absence
//!
//! # Example
//!
//! ```
//! use biomtable::{CsrMatrix, DecodedTable, LoadOptions, Table};
//!
//! let mut decoded = DecodedTable {
//!     observation_ids: vec!["OTU_1".into(), "OTU_2".into()],
//!     sample_ids: vec!["S1".into(), "S2".into()],
//!     matrix: CsrMatrix::from_dense(&[vec![3.0, 0.0], vec![1.0, 4.0]]),
//!     ..Default::default()
//! };
//! let options = LoadOptions::from_json(r#"{"normalize": true, "seed": 7}"#).unwrap();
//! let mut rng = options.rng();
//! let table = Table::load_with_options(&mut decoded, &options, &mut rng).unwrap();
//! assert_eq!(table.value("OTU_1", "S1"), 0.75);
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::axis::AxisKind;
use crate::error::{BiomError, Result};
use crate::input::{read_id_list, read_metadata_file, TableDecoder};
use crate::table::Table;
use crate::taxonomy::{TaxonRank, TAXONOMY_KEY};

/// A metadata file and the keys to take from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSource {
    pub path: PathBuf,
    pub keys: Vec<String>,
}

impl MetadataSource {
    pub fn new(path: impl Into<PathBuf>, keys: &[&str]) -> Self {
        Self {
            path: path.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Ids given inline or as a file with one id per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdSource {
    Ids(HashSet<String>),
    File(PathBuf),
}

impl IdSource {
    pub fn resolve(&self) -> Result<HashSet<String>> {
        match self {
            IdSource::Ids(ids) => Ok(ids.clone()),
            IdSource::File(path) => read_id_list(path),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for IdSource {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        IdSource::Ids(iter.into_iter().map(Into::into).collect())
    }
}

/// Operations to apply while loading a table. The default applies nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Rank to collapse observations to; `otu` keeps them as they are.
    pub taxon_rank: Option<TaxonRank>,
    pub sample_metadata: Option<MetadataSource>,
    pub observation_metadata: Option<MetadataSource>,
    pub samples_to_keep: Option<IdSource>,
    /// Depth to rarefy every sample to.
    pub rarefaction_total: Option<u64>,
    /// Fail with [`BiomError::NotRarefied`] unless sample totals agree.
    pub check_rarefied: bool,
    pub observations_to_keep: Option<IdSource>,
    pub required_observation_metadata: Vec<String>,
    pub required_sample_metadata: Vec<String>,
    pub random_sample_subset: Option<usize>,
    pub normalize: bool,
    /// Minimum number of samples an observation must occur in.
    pub prevalence_minimum: Option<usize>,
    pub random_observation_subset: Option<usize>,
    pub presence_absence: bool,
    /// Seed for [`LoadOptions::rng`]; unseeded when absent.
    pub seed: Option<u64>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Random source for the pipeline: seeded from `seed` when set.
    pub fn rng(&self) -> fastrand::Rng {
        match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }

    pub fn with_taxon_rank(mut self, rank: TaxonRank) -> Self {
        self.taxon_rank = Some(rank);
        self
    }

    pub fn with_sample_metadata(mut self, source: MetadataSource) -> Self {
        self.sample_metadata = Some(source);
        self
    }

    pub fn with_observation_metadata(mut self, source: MetadataSource) -> Self {
        self.observation_metadata = Some(source);
        self
    }

    pub fn with_samples_to_keep(mut self, ids: IdSource) -> Self {
        self.samples_to_keep = Some(ids);
        self
    }

    pub fn with_rarefaction_total(mut self, total: u64) -> Self {
        self.rarefaction_total = Some(total);
        self
    }

    pub fn with_check_rarefied(mut self, check: bool) -> Self {
        self.check_rarefied = check;
        self
    }

    pub fn with_observations_to_keep(mut self, ids: IdSource) -> Self {
        self.observations_to_keep = Some(ids);
        self
    }

    pub fn with_required_observation_metadata(mut self, keys: &[&str]) -> Self {
        self.required_observation_metadata = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_required_sample_metadata(mut self, keys: &[&str]) -> Self {
        self.required_sample_metadata = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_random_sample_subset(mut self, n: usize) -> Self {
        self.random_sample_subset = Some(n);
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_prevalence_minimum(mut self, min_count: usize) -> Self {
        self.prevalence_minimum = Some(min_count);
        self
    }

    pub fn with_random_observation_subset(mut self, n: usize) -> Self {
        self.random_observation_subset = Some(n);
        self
    }

    pub fn with_presence_absence(mut self, presence_absence: bool) -> Self {
        self.presence_absence = presence_absence;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Table {
    /// Decode a table and run the option pipeline over it.
    pub fn load_with_options(
        decoder: &mut impl TableDecoder,
        options: &LoadOptions,
        rng: &mut fastrand::Rng,
    ) -> Result<Self> {
        let mut table = Self::load(decoder)?;
        table.apply_options(options, rng)?;
        Ok(table)
    }

    /// Apply every configured operation in pipeline order. Stops at the
    /// first failing step.
    pub fn apply_options(&mut self, options: &LoadOptions, rng: &mut fastrand::Rng) -> Result<()> {
        if let Some(TaxonRank::Clade(clade)) = options.taxon_rank {
            if self.observations().has_metadata_field(TAXONOMY_KEY) {
                info!(rank = %clade, "collapsing observations");
                self.collapse(clade.name(), AxisKind::Observation);
            }
        }

        if let Some(source) = &options.sample_metadata {
            info!(path = %source.path.display(), "loading sample metadata");
            let metadata = read_metadata_file(&source.path, source.keys.as_slice())?;
            self.remove_all_metadata(AxisKind::Sample);
            self.add_metadata(AxisKind::Sample, &metadata);
        }

        if let Some(source) = &options.observation_metadata {
            info!(path = %source.path.display(), "loading observation metadata");
            let metadata = read_metadata_file(&source.path, source.keys.as_slice())?;
            self.remove_all_metadata(AxisKind::Observation);
            self.add_metadata(AxisKind::Observation, &metadata);
        }

        if let Some(ids) = &options.samples_to_keep {
            let keep = ids.resolve()?;
            info!(count = keep.len(), "filtering samples");
            self.filter(&keep, AxisKind::Sample)?;
        }

        if let Some(total) = options.rarefaction_total {
            info!(total, "rarefying samples");
            self.rarefy_samples(total, rng)?;
        }

        if options.check_rarefied {
            info!("checking rarefaction");
            if !self.check_rarefied() {
                return Err(BiomError::NotRarefied);
            }
        }

        if let Some(ids) = &options.observations_to_keep {
            let keep = ids.resolve()?;
            info!(count = keep.len(), "filtering observations");
            self.filter(&keep, AxisKind::Observation)?;
        }

        if !options.required_observation_metadata.is_empty() {
            info!(keys = ?options.required_observation_metadata, "removing observations with missing metadata");
            self.filter_by_missing_metadata(
                options.required_observation_metadata.as_slice(),
                AxisKind::Observation,
            )?;
        }

        if !options.required_sample_metadata.is_empty() {
            info!(keys = ?options.required_sample_metadata, "removing samples with missing metadata");
            self.filter_by_missing_metadata(options.required_sample_metadata.as_slice(), AxisKind::Sample)?;
        }

        if let Some(n) = options.random_sample_subset {
            info!(n, "taking random sample subset");
            self.random_subset(n, AxisKind::Sample, rng)?;
        }

        if options.normalize {
            info!("normalizing");
            self.normalize();
        }

        if let Some(min_count) = options.prevalence_minimum {
            info!(min_count, "filtering by prevalence");
            self.prevalence_filter(min_count)?;
        }

        if let Some(n) = options.random_observation_subset {
            info!(n, "taking random observation subset");
            self.random_subset(n, AxisKind::Observation, rng)?;
        }

        if options.presence_absence {
            info!("converting to presence/absence");
            self.presence_absence();
        }

        Ok(())
    }
}
