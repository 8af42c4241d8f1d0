//! Interface to the binary-format decode collaborator.
//!
//! A decoder hands over raw axis ids, an observation-major CSR matrix,
//! top-level attributes and per-axis metadata. Nothing here reads the binary
//! container itself; it only describes and validates what a decoder yields.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{BiomError, Result};

/// Compressed sparse row arrays, rows = observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    /// Row pointers; row `i` spans `indptr[i]..indptr[i + 1]`.
    pub indptr: Vec<usize>,
    /// Column index of each stored value.
    pub indices: Vec<usize>,
    /// Stored values.
    pub data: Vec<f64>,
}

impl CsrMatrix {
    /// Build CSR arrays from dense rows, skipping zeros.
    pub fn from_dense(rows: &[Vec<f64>]) -> Self {
        let mut csr = Self {
            indptr: vec![0],
            ..Default::default()
        };
        for row in rows {
            for (column, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    csr.indices.push(column);
                    csr.data.push(value);
                }
            }
            csr.indptr.push(csr.indices.len());
        }
        csr
    }

    /// Check the arrays against the axis sizes.
    pub fn validate(&self, rows: usize, columns: usize) -> Result<()> {
        if self.indptr.len() != rows + 1 {
            return Err(BiomError::Decode(format!(
                "indptr has {} entries, expected {}",
                self.indptr.len(),
                rows + 1
            )));
        }
        if self.indices.len() != self.data.len() {
            return Err(BiomError::Decode(format!(
                "{} column indices but {} values",
                self.indices.len(),
                self.data.len()
            )));
        }
        if self.indptr[0] != 0 || self.indptr[rows] != self.indices.len() {
            return Err(BiomError::Decode(
                "indptr must start at 0 and end at the number of stored values".to_string(),
            ));
        }
        if self.indptr.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(BiomError::Decode("indptr is not non-decreasing".to_string()));
        }
        if let Some(&column) = self.indices.iter().find(|&&column| column >= columns) {
            return Err(BiomError::Decode(format!(
                "column index {} out of range for {} samples",
                column, columns
            )));
        }
        if self.data.iter().any(|value| !value.is_finite()) {
            return Err(BiomError::Decode("matrix contains non-finite values".to_string()));
        }
        Ok(())
    }

    /// Iterate `(row, column, value)` triples.
    ///
    /// Positions outside `indices` or `data` are skipped, so arrays that fail
    /// [`CsrMatrix::validate`] yield a truncated sequence rather than a panic.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.indptr.windows(2).enumerate().flat_map(move |(row, span)| {
            (span[0]..span[1]).map_while(move |k| {
                Some((row, *self.indices.get(k)?, *self.data.get(k)?))
            })
        })
    }
}

/// Values of one metadata variable, one entry per axis element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValues {
    /// One value per element, stored under the column name.
    Scalar(Vec<String>),
    /// Several values per element, stored as `name.0`, `name.1`, ...
    Vector(Vec<Vec<String>>),
}

/// A named per-axis metadata variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataColumn {
    pub name: String,
    pub values: MetadataValues,
}

impl MetadataColumn {
    pub fn scalar(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values: MetadataValues::Scalar(values),
        }
    }

    pub fn vector(name: impl Into<String>, values: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            values: MetadataValues::Vector(values),
        }
    }

    /// Number of elements covered.
    pub fn len(&self) -> usize {
        match &self.values {
            MetadataValues::Scalar(values) => values.len(),
            MetadataValues::Vector(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(key, value)` pairs for the element at `position`.
    pub fn entries_at(&self, position: usize) -> Vec<(String, &str)> {
        match &self.values {
            MetadataValues::Scalar(values) => values
                .get(position)
                .map(|value| vec![(self.name.clone(), value.as_str())])
                .unwrap_or_default(),
            MetadataValues::Vector(values) => values
                .get(position)
                .map(|row| {
                    row.iter()
                        .enumerate()
                        .map(|(j, value)| (format!("{}.{}", self.name, j), value.as_str()))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Top-level descriptive attributes of a decoded table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableAttributes {
    /// Identifier of the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Table type, e.g. "OTU table".
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_url: Option<String>,
    /// Major and minor format version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format_version: Vec<u32>,
    /// Package and revision that built the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
    /// ISO 8601 creation date as written by the producer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    /// Non-zero count recorded in the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nnz: Option<usize>,
}

impl TableAttributes {
    /// Parse the creation date. Accepts RFC 3339 and offset-free ISO 8601
    /// timestamps (the latter are what most producers write).
    pub fn creation_timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self.creation_date.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|date| date.naive_utc())
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    }
}

/// Everything a decoder extracts from a table file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedTable {
    pub observation_ids: Vec<String>,
    pub sample_ids: Vec<String>,
    pub matrix: CsrMatrix,
    #[serde(default)]
    pub attributes: TableAttributes,
    #[serde(default)]
    pub observation_metadata: Vec<MetadataColumn>,
    #[serde(default)]
    pub sample_metadata: Vec<MetadataColumn>,
    /// Raw per-observation taxonomy levels, when the file has them.
    #[serde(default)]
    pub taxonomy: Option<Vec<Vec<String>>>,
}

impl DecodedTable {
    /// Check internal consistency before the table is assembled.
    pub fn validate(&self) -> Result<()> {
        check_unique("observation", &self.observation_ids)?;
        check_unique("sample", &self.sample_ids)?;
        self.matrix
            .validate(self.observation_ids.len(), self.sample_ids.len())?;

        for column in &self.observation_metadata {
            check_length("observation", column, self.observation_ids.len())?;
        }
        for column in &self.sample_metadata {
            check_length("sample", column, self.sample_ids.len())?;
        }
        if let Some(taxonomy) = &self.taxonomy {
            if taxonomy.len() != self.observation_ids.len() {
                return Err(BiomError::Decode(format!(
                    "taxonomy has {} entries for {} observations",
                    taxonomy.len(),
                    self.observation_ids.len()
                )));
            }
        }
        Ok(())
    }
}

fn check_unique(axis: &str, ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(BiomError::Decode(format!("duplicate {} id '{}'", axis, id)));
        }
    }
    Ok(())
}

fn check_length(axis: &str, column: &MetadataColumn, expected: usize) -> Result<()> {
    if column.len() != expected {
        return Err(BiomError::Decode(format!(
            "{} metadata '{}' has {} entries for {} elements",
            axis,
            column.name,
            column.len(),
            expected
        )));
    }
    Ok(())
}

/// Source of decoded tables.
///
/// Implementations wrap a file handle (or anything else) and surface decode
/// failures as errors rather than partial data.
pub trait TableDecoder {
    fn decode(&mut self) -> Result<DecodedTable>;
}

impl TableDecoder for DecodedTable {
    fn decode(&mut self) -> Result<DecodedTable> {
        Ok(self.clone())
    }
}
