//! biomtable: in-memory engine for sparse BIOM observation tables.
//!
//! A table pairs two axes (observations as rows, samples as columns) with a
//! sparse matrix of non-negative counts. Axes carry per-element metadata and
//! the matrix keeps row and column totals cached between structural changes.
//!
//! # Core Operations
//!
//! - **Filtering** by id set, missing metadata or prevalence
//! - **Collapsing** an axis by a metadata value, e.g. a taxonomic rank
//! - **Rarefaction** to an even depth by selection sampling
//! - **Resampling** samples with replacement for bootstrap replicates
//!
//! # Example
//!
//! ```
//! use biomtable::{AxisKind, CsrMatrix, DecodedTable, Table};
//!
//! let decoded = DecodedTable {
//!     observation_ids: vec!["OTU_1".into(), "OTU_2".into(), "OTU_3".into()],
//!     sample_ids: vec!["S1".into(), "S2".into()],
//!     matrix: CsrMatrix::from_dense(&[vec![5.0, 1.0], vec![0.0, 3.0], vec![2.0, 2.0]]),
//!     taxonomy: Some(vec![
//!         vec!["k__Bacteria".into()],
//!         vec!["k__Archaea".into()],
//!         vec!["k__Bacteria".into()],
//!     ]),
//!     ..Default::default()
//! };
//! let table = Table::from_decoded(decoded).unwrap();
//!
//! let kingdoms = table.collapsed("kingdom", AxisKind::Observation);
//! assert_eq!(kingdoms.shape(), (2, 2));
//! assert_eq!(kingdoms.value("k__Bacteria", "S1"), 7.0);
//! ```

pub mod axis;
pub mod error;
pub mod input;
pub mod matrix;
pub mod options;
pub mod render;
pub mod table;
pub mod taxonomy;

pub use axis::{Axis, AxisKind, Element, Lineage, MetadataMap};
pub use error::{BiomError, Result};
pub use input::{
    read_id_list, read_metadata_file, CsrMatrix, DecodedTable, MetadataColumn, MetadataValues,
    TableAttributes, TableDecoder,
};
pub use matrix::SparseMatrix;
pub use options::{IdSource, LoadOptions, MetadataSource};
pub use render::{render_metadata, render_table};
pub use table::{selection_sample, SummaryStats, Table, TableSummary};
pub use taxonomy::{decode_taxonomy, Clade, TaxonRank};
