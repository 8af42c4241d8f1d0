//! Ordered, uniquely identified axis elements with metadata.
//!
//! An [`Axis`] backs either the observations (rows) or the samples (columns)
//! of a table. Elements live in a vector indexed by position; ids resolve to
//! positions through an explicit index map.

mod element;

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{BiomError, Result};

pub use element::{Element, MISSING_VALUE};

/// Mapping from element id to metadata key/value pairs.
pub type MetadataMap = IndexMap<String, IndexMap<String, String>>;

/// Which side of the table an axis describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    /// Rows.
    Observation,
    /// Columns.
    Sample,
}

impl AxisKind {
    /// The axis on the other side of the matrix.
    pub fn counterpart(self) -> Self {
        match self {
            AxisKind::Observation => AxisKind::Sample,
            AxisKind::Sample => AxisKind::Observation,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AxisKind::Observation => "observation",
            AxisKind::Sample => "sample",
        }
    }
}

impl fmt::Display for AxisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provenance left behind by a structural transform, consumed by the
/// matrix-side half of the same operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lineage {
    /// Old id to the id of the group it was collapsed into.
    Collapse(HashMap<String, String>),
    /// New id to the source id it was drawn from, in draw order.
    Resample(IndexMap<String, String>),
}

/// An ordered collection of elements with unique ids.
#[derive(Debug, Clone)]
pub struct Axis {
    kind: AxisKind,
    elements: Vec<Element>,
    index: HashMap<String, usize>,
    metadata_keys: IndexSet<String>,
    lineage: Option<Lineage>,
}

impl Axis {
    /// Create an axis from ids in their canonical order.
    ///
    /// Fails with [`BiomError::InvalidArgument`] on a duplicate id.
    pub fn new<I, S>(kind: AxisKind, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut elements = Vec::new();
        let mut index = HashMap::new();
        for id in ids {
            let id = id.into();
            if index.contains_key(&id) {
                return Err(BiomError::InvalidArgument(format!(
                    "duplicate {} id '{}'",
                    kind, id
                )));
            }
            index.insert(id.clone(), elements.len());
            elements.push(Element::new(id));
        }
        Ok(Self {
            kind,
            elements,
            index,
            metadata_keys: IndexSet::new(),
            lineage: None,
        })
    }

    /// Assemble an axis from elements whose ids are already known to be unique.
    fn from_parts(
        kind: AxisKind,
        elements: Vec<Element>,
        metadata_keys: IndexSet<String>,
        lineage: Option<Lineage>,
    ) -> Self {
        let index = elements
            .iter()
            .enumerate()
            .map(|(position, element)| (element.id().to_string(), position))
            .collect();
        Self {
            kind,
            elements,
            index,
            metadata_keys,
            lineage,
        }
    }

    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Ids in canonical order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(Element::id)
    }

    /// Ids as an unordered set.
    pub fn id_set(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    pub fn id_at(&self, position: usize) -> Option<&str> {
        self.elements.get(position).map(Element::id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Element by id.
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.index.get(id).map(|&position| &self.elements[position])
    }

    /// Element by position.
    pub fn get_at(&self, position: usize) -> Option<&Element> {
        self.elements.get(position)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Metadata keys stored on any element, in first-seen order.
    pub fn metadata_keys(&self) -> &IndexSet<String> {
        &self.metadata_keys
    }

    pub fn has_metadata_field(&self, key: &str) -> bool {
        self.metadata_keys.contains(key)
    }

    /// Metadata value for an element, if both exist.
    pub fn metadata(&self, id: &str, key: &str) -> Option<&str> {
        self.get(id).and_then(|element| element.metadata(key))
    }

    /// Store a metadata value on an element.
    ///
    /// Unknown ids are ignored, and empty or missing values are not stored.
    pub fn set_metadata(&mut self, id: &str, key: &str, value: &str) {
        let Some(&position) = self.index.get(id) else {
            return;
        };
        if self.elements[position].insert_metadata(key, value) && !self.metadata_keys.contains(key) {
            self.metadata_keys.insert(key.to_string());
        }
    }

    /// Store every value of a metadata mapping.
    pub fn add_metadata(&mut self, metadata: &MetadataMap) {
        for (id, values) in metadata {
            for (key, value) in values {
                self.set_metadata(id, key, value);
            }
        }
    }

    /// Drop all metadata, including the record of known keys.
    pub fn remove_all_metadata(&mut self) {
        for element in &mut self.elements {
            element.clear_metadata();
        }
        self.metadata_keys.clear();
    }

    /// Whether at least one current id is in `keep`.
    pub fn retains_any(&self, keep: &HashSet<String>) -> bool {
        self.elements.iter().any(|element| keep.contains(element.id()))
    }

    /// Keep only the elements whose ids are in `keep`, preserving order.
    ///
    /// The axis is left untouched when nothing would survive.
    pub fn filter(&mut self, keep: &HashSet<String>) -> Result<()> {
        let elements: Vec<Element> = self
            .elements
            .iter()
            .filter(|element| keep.contains(element.id()))
            .cloned()
            .collect();
        if elements.is_empty() {
            return Err(BiomError::EmptySelection { axis: self.kind });
        }

        let metadata_keys = std::mem::take(&mut self.metadata_keys);
        *self = Self::from_parts(self.kind, elements, metadata_keys, None);
        Ok(())
    }

    /// Group elements by their value of `key`.
    ///
    /// The returned axis has one element per distinct value (first-seen
    /// order) and carries a collapse lineage from every grouped original id to
    /// its group. Elements without the key take no part in the result.
    pub fn collapse(&self, key: &str) -> Axis {
        let mut groups: Vec<Element> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut lineage = HashMap::with_capacity(self.elements.len());

        for element in &self.elements {
            let Some(group) = element.metadata(key) else {
                continue;
            };
            if seen.insert(group) {
                let mut collapsed = Element::new(group);
                collapsed.insert_metadata(key, group);
                groups.push(collapsed);
            }
            lineage.insert(element.id().to_string(), group.to_string());
        }

        let mut metadata_keys = IndexSet::new();
        metadata_keys.insert(key.to_string());
        Self::from_parts(self.kind, groups, metadata_keys, Some(Lineage::Collapse(lineage)))
    }

    /// Draw `size()` elements uniformly with replacement.
    ///
    /// The k-th draw of id `X` becomes `X.k`, with `X`'s metadata. The same
    /// seed always yields the same axis.
    pub fn resample_with_replacement(&self, seed: u64) -> Axis {
        let mut rng = fastrand::Rng::with_seed(seed);
        let size = self.elements.len();
        let mut draws: HashMap<&str, usize> = HashMap::new();
        let mut elements = Vec::with_capacity(size);
        let mut lineage = IndexMap::with_capacity(size);

        for _ in 0..size {
            let source = &self.elements[rng.usize(0..size)];
            let count = draws.entry(source.id()).or_insert(0);
            *count += 1;
            let id = format!("{}.{}", source.id(), count);
            lineage.insert(id.clone(), source.id().to_string());
            elements.push(source.with_id(id));
        }

        Self::from_parts(
            self.kind,
            elements,
            self.metadata_keys.clone(),
            Some(Lineage::Resample(lineage)),
        )
    }

    pub fn collapse_lineage(&self) -> Option<&HashMap<String, String>> {
        match &self.lineage {
            Some(Lineage::Collapse(map)) => Some(map),
            _ => None,
        }
    }

    pub fn resample_lineage(&self) -> Option<&IndexMap<String, String>> {
        match &self.lineage {
            Some(Lineage::Resample(map)) => Some(map),
            _ => None,
        }
    }

    /// Remove and return the pending lineage.
    pub fn take_lineage(&mut self) -> Option<Lineage> {
        self.lineage.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_axis() -> Axis {
        let mut axis = Axis::new(AxisKind::Sample, ["S1", "S2", "S3", "S4"]).unwrap();
        axis.set_metadata("S1", "site", "gut");
        axis.set_metadata("S2", "site", "skin");
        axis.set_metadata("S3", "site", "gut");
        axis
    }

    fn keep(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Axis::new(AxisKind::Observation, ["a", "b", "a"]);
        assert!(matches!(result, Err(BiomError::InvalidArgument(_))));
    }

    #[test]
    fn test_index_is_contiguous() {
        let axis = sample_axis();
        for (position, id) in axis.ids().enumerate() {
            assert_eq!(axis.index_of(id), Some(position));
            assert_eq!(axis.id_at(position), Some(id));
        }
        assert_eq!(axis.size(), 4);
    }

    #[test]
    fn test_set_metadata_registers_keys() {
        let mut axis = sample_axis();
        axis.set_metadata("S4", "depth", "");
        axis.set_metadata("S4", "depth", MISSING_VALUE);
        assert!(!axis.has_metadata_field("depth"));

        axis.set_metadata("unknown", "depth", "10");
        assert!(!axis.has_metadata_field("depth"));

        axis.set_metadata("S4", "depth", "10");
        assert!(axis.has_metadata_field("depth"));
        assert_eq!(axis.metadata("S4", "depth"), Some("10"));
    }

    #[test]
    fn test_filter_preserves_order() {
        let mut axis = sample_axis();
        axis.filter(&keep(&["S4", "S1", "missing"])).unwrap();

        assert_eq!(axis.ids().collect::<Vec<_>>(), vec!["S1", "S4"]);
        assert_eq!(axis.index_of("S4"), Some(1));
        assert!(!axis.contains("S2"));
    }

    #[test]
    fn test_filter_empty_leaves_axis_untouched() {
        let mut axis = sample_axis();
        let result = axis.filter(&keep(&["nope"]));
        assert!(matches!(
            result,
            Err(BiomError::EmptySelection {
                axis: AxisKind::Sample
            })
        ));
        assert_eq!(axis.size(), 4);

        assert!(axis.filter(&HashSet::new()).is_err());
        assert_eq!(axis.size(), 4);
    }

    #[test]
    fn test_collapse_groups_first_seen() {
        let axis = sample_axis();
        let collapsed = axis.collapse("site");

        assert_eq!(collapsed.ids().collect::<Vec<_>>(), vec!["gut", "skin"]);
        assert_eq!(collapsed.metadata_keys().len(), 1);
        assert!(collapsed.has_metadata_field("site"));

        let lineage = collapsed.collapse_lineage().unwrap();
        assert_eq!(lineage.get("S1").map(String::as_str), Some("gut"));
        assert_eq!(lineage.get("S3").map(String::as_str), Some("gut"));
        assert_eq!(lineage.get("S2").map(String::as_str), Some("skin"));
        assert!(!lineage.contains_key("S4"));
    }

    #[test]
    fn test_filter_clears_lineage() {
        let mut collapsed = sample_axis().collapse("site");
        collapsed.filter(&keep(&["gut"])).unwrap();
        assert!(collapsed.collapse_lineage().is_none());
    }

    #[test]
    fn test_resample_is_reproducible() {
        let axis = sample_axis();
        let first = axis.resample_with_replacement(1234);
        let second = axis.resample_with_replacement(1234);

        assert_eq!(first.size(), axis.size());
        assert_eq!(
            first.ids().collect::<Vec<_>>(),
            second.ids().collect::<Vec<_>>()
        );

        let lineage = first.resample_lineage().unwrap();
        for element in first.elements() {
            let source = &lineage[element.id()];
            assert!(element.id().starts_with(&format!("{}.", source)));
            assert_eq!(
                element.all_metadata(),
                axis.get(source).unwrap().all_metadata()
            );
        }
    }

    #[test]
    fn test_resample_suffixes_count_per_source() {
        let axis = Axis::new(AxisKind::Sample, ["only"]).unwrap();
        let resampled = axis.resample_with_replacement(7);
        assert_eq!(resampled.ids().collect::<Vec<_>>(), vec!["only.1"]);
    }

    #[test]
    fn test_remove_all_metadata() {
        let mut axis = sample_axis();
        axis.remove_all_metadata();
        assert!(axis.metadata_keys().is_empty());
        assert!(axis.metadata("S1", "site").is_none());
    }
}
