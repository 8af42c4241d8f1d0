//! Decoding of per-observation taxonomy strings into clade metadata.
//!
//! Raw taxonomy arrives as one string per level (`"k__Bacteria"`,
//! `"p__Firmicutes"`, ...). Each observation is mapped onto seven canonical
//! clades by alias prefix, with bare aliases standing in for levels that are
//! absent, empty or unclassified.
//!
//! # Example
//!
//! ```
//! use biomtable::taxonomy::decode_taxonomy;
//!
//! let raw = vec![vec!["k__Bacteria".to_string(), "p__Firmicutes".to_string()]];
//! let decoded = decode_taxonomy(&raw);
//!
//! assert_eq!(decoded[0]["kingdom"], "k__Bacteria");
//! assert_eq!(decoded[0]["phylum"], "k__Bacteria;p__Firmicutes");
//! assert_eq!(decoded[0]["class"], "unclassified");
//! assert_eq!(decoded[0]["taxonomy"], "k__Bacteria;p__Firmicutes;c__;o__;f__;g__;s__");
//! ```

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::BiomError;

/// Metadata key holding the composite taxonomy string.
pub const TAXONOMY_KEY: &str = "taxonomy";

/// Value stored for a clade that was not assigned.
pub const UNCLASSIFIED: &str = "unclassified";

const ALIAS_LEN: usize = 3;

/// The seven canonical taxonomic levels, most general first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clade {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Clade {
    /// All clades in canonical order.
    pub const ALL: [Clade; 7] = [
        Clade::Kingdom,
        Clade::Phylum,
        Clade::Class,
        Clade::Order,
        Clade::Family,
        Clade::Genus,
        Clade::Species,
    ];

    /// Metadata key for this clade.
    pub fn name(self) -> &'static str {
        match self {
            Clade::Kingdom => "kingdom",
            Clade::Phylum => "phylum",
            Clade::Class => "class",
            Clade::Order => "order",
            Clade::Family => "family",
            Clade::Genus => "genus",
            Clade::Species => "species",
        }
    }

    /// Three-character prefix used in taxonomy strings.
    pub fn alias(self) -> &'static str {
        match self {
            Clade::Kingdom => "k__",
            Clade::Phylum => "p__",
            Clade::Class => "c__",
            Clade::Order => "o__",
            Clade::Family => "f__",
            Clade::Genus => "g__",
            Clade::Species => "s__",
        }
    }

    /// Clade whose alias is `prefix`.
    pub fn from_alias(prefix: &str) -> Option<Clade> {
        Clade::ALL.into_iter().find(|clade| clade.alias() == prefix)
    }

    fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Clade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Clade {
    type Err = BiomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Clade::ALL
            .into_iter()
            .find(|clade| clade.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BiomError::InvalidArgument(format!("unknown clade '{}'", s)))
    }
}

/// Taxonomic resolution for collapsing a table: a clade, or `otu` to keep
/// the leaf-level observations as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TaxonRank {
    Otu,
    Clade(Clade),
}

impl FromStr for TaxonRank {
    type Err = BiomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("otu") {
            Ok(TaxonRank::Otu)
        } else {
            s.parse().map(TaxonRank::Clade)
        }
    }
}

impl TryFrom<String> for TaxonRank {
    type Error = BiomError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaxonRank> for String {
    fn from(rank: TaxonRank) -> Self {
        rank.to_string()
    }
}

impl fmt::Display for TaxonRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonRank::Otu => f.write_str("otu"),
            TaxonRank::Clade(clade) => clade.fmt(f),
        }
    }
}

/// Slot assignment for one observation's levels. Later levels mapping to an
/// already assigned clade replace it.
fn assign_slots<S: AsRef<str>>(levels: &[S]) -> [Option<&str>; 7] {
    let mut slots = [None; 7];
    for level in levels {
        let level = level.as_ref();
        if level.len() <= ALIAS_LEN || level.eq_ignore_ascii_case(UNCLASSIFIED) {
            continue;
        }
        let Some(clade) = level.get(..ALIAS_LEN).and_then(Clade::from_alias) else {
            continue;
        };
        slots[clade.position()] = Some(level);
    }
    slots
}

/// Decode the levels of a single observation into clade metadata.
///
/// Each clade key holds the lineage up to and including that clade, or
/// [`UNCLASSIFIED`] when the clade was not assigned. [`TAXONOMY_KEY`] holds
/// the full composite.
pub fn decode_levels<S: AsRef<str>>(levels: &[S]) -> IndexMap<String, String> {
    let slots = assign_slots(levels);
    let mut metadata = IndexMap::with_capacity(Clade::ALL.len() + 1);
    let mut lineage = String::new();

    for clade in Clade::ALL {
        if clade.position() > 0 {
            lineage.push(';');
        }
        match slots[clade.position()] {
            Some(value) => {
                lineage.push_str(value);
                metadata.insert(clade.name().to_string(), lineage.clone());
            }
            None => {
                lineage.push_str(clade.alias());
                metadata.insert(clade.name().to_string(), UNCLASSIFIED.to_string());
            }
        }
    }

    metadata.insert(TAXONOMY_KEY.to_string(), lineage);
    metadata
}

/// Decode a raw taxonomy array, one entry per observation.
pub fn decode_taxonomy<S: AsRef<str>>(raw: &[Vec<S>]) -> Vec<IndexMap<String, String>> {
    raw.iter().map(|levels| decode_levels(levels)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lineage() {
        let decoded = decode_levels(&[
            "k__Bacteria",
            "p__Firmicutes",
            "c__Clostridia",
            "o__Halanaerobiales",
            "f__Halanaerobiaceae",
            "g__Halanaerobium",
            "s__saccharolyticum",
        ]);

        assert_eq!(decoded["kingdom"], "k__Bacteria");
        assert_eq!(decoded["class"], "k__Bacteria;p__Firmicutes;c__Clostridia");
        assert_eq!(
            decoded[TAXONOMY_KEY],
            "k__Bacteria;p__Firmicutes;c__Clostridia;o__Halanaerobiales;\
             f__Halanaerobiaceae;g__Halanaerobium;s__saccharolyticum"
        );
        assert_eq!(decoded[TAXONOMY_KEY], decoded["species"]);
    }

    #[test]
    fn test_bare_and_unclassified_levels() {
        let decoded = decode_levels(&["k__Archaea", "p__", "", "Unclassified", "s__"]);

        assert_eq!(decoded["kingdom"], "k__Archaea");
        assert_eq!(decoded["phylum"], UNCLASSIFIED);
        assert_eq!(decoded["species"], UNCLASSIFIED);
        assert_eq!(decoded[TAXONOMY_KEY], "k__Archaea;p__;c__;o__;f__;g__;s__");
    }

    #[test]
    fn test_out_of_order_and_last_writer_wins() {
        let decoded = decode_levels(&["g__Escherichia", "k__Bacteria", "g__Shigella"]);

        assert_eq!(decoded["kingdom"], "k__Bacteria");
        assert_eq!(decoded["genus"], "k__Bacteria;p__;c__;o__;f__;g__Shigella");
    }

    #[test]
    fn test_unknown_prefix_ignored() {
        let decoded = decode_levels(&["x__Mystery", "Bacteria"]);
        assert_eq!(decoded["kingdom"], UNCLASSIFIED);
        assert_eq!(decoded[TAXONOMY_KEY], "k__;p__;c__;o__;f__;g__;s__");
    }

    #[test]
    fn test_non_ascii_prefix_does_not_panic() {
        let decoded = decode_levels(&["ék__Bacteria"]);
        assert_eq!(decoded["kingdom"], UNCLASSIFIED);
    }

    #[test]
    fn test_rank_parsing() {
        assert_eq!("otu".parse::<TaxonRank>().unwrap(), TaxonRank::Otu);
        assert_eq!(
            "Genus".parse::<TaxonRank>().unwrap(),
            TaxonRank::Clade(Clade::Genus)
        );
        assert!("strain".parse::<TaxonRank>().is_err());

        let rank: TaxonRank = serde_json::from_str("\"phylum\"").unwrap();
        assert_eq!(rank, TaxonRank::Clade(Clade::Phylum));
        assert_eq!(serde_json::to_string(&rank).unwrap(), "\"phylum\"");
    }
}
