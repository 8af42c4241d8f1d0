//! Id-keyed sparse matrix with cached marginal sums.

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::axis::AxisKind;

/// Row and column totals, always built and dropped together.
///
/// `column_cells` counts the stored cells of each column so a total is
/// dropped, not left at a rounding residue, once its last cell is removed.
#[derive(Debug, Clone, Default)]
struct MarginalSums {
    rows: HashMap<String, f64>,
    columns: HashMap<String, f64>,
    column_cells: HashMap<String, usize>,
}

impl MarginalSums {
    fn build(cells: &HashMap<String, HashMap<String, f64>>) -> Self {
        let mut sums = Self {
            rows: HashMap::with_capacity(cells.len()),
            ..Default::default()
        };
        for (row, columns) in cells {
            for (column, &value) in columns {
                *sums.rows.entry(row.clone()).or_insert(0.0) += value;
                *sums.columns.entry(column.clone()).or_insert(0.0) += value;
                *sums.column_cells.entry(column.clone()).or_insert(0) += 1;
            }
        }
        sums
    }

    fn adjust(map: &mut HashMap<String, f64>, id: &str, delta: f64) {
        let total = map.get(id).copied().unwrap_or(0.0) + delta;
        if total == 0.0 {
            map.remove(id);
        } else {
            map.insert(id.to_string(), total);
        }
    }

    /// Move the totals of one written cell. `row_emptied` is whether the
    /// write removed the row's last cell.
    fn record(&mut self, row: &str, column: &str, previous: f64, value: f64, row_emptied: bool) {
        let delta = value - previous;
        if row_emptied {
            self.rows.remove(row);
        } else {
            Self::adjust(&mut self.rows, row, delta);
        }

        match (previous != 0.0, value != 0.0) {
            (false, true) => *self.column_cells.entry(column.to_string()).or_insert(0) += 1,
            (true, false) => {
                let remaining = self.column_cells.get_mut(column).map(|count| {
                    *count -= 1;
                    *count
                });
                if remaining.unwrap_or(0) == 0 {
                    self.column_cells.remove(column);
                    self.columns.remove(column);
                    return;
                }
            }
            _ => {}
        }
        Self::adjust(&mut self.columns, column, delta);
    }
}

/// Sparse matrix of observation (row) by sample (column) values.
///
/// Only non-zero cells are stored and a row bucket never stays empty.
#[derive(Debug, Clone, Default)]
pub struct SparseMatrix {
    cells: HashMap<String, HashMap<String, f64>>,
    sums: OnceCell<MarginalSums>,
}

impl SparseMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matrix from `(row, column, value)` entries. Zero values are
    /// skipped and later entries overwrite earlier ones.
    pub fn from_entries<I, R, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (R, C, f64)>,
        R: Into<String>,
        C: Into<String>,
    {
        let mut cells: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for (row, column, value) in entries {
            if value != 0.0 {
                cells.entry(row.into()).or_default().insert(column.into(), value);
            }
        }
        Self {
            cells,
            sums: OnceCell::new(),
        }
    }

    /// Value at a cell; 0 when absent.
    pub fn get(&self, row: &str, column: &str) -> f64 {
        self.cells
            .get(row)
            .and_then(|columns| columns.get(column))
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether a cell holds a non-zero value.
    pub fn presence(&self, row: &str, column: &str) -> bool {
        self.cells
            .get(row)
            .is_some_and(|columns| columns.contains_key(column))
    }

    /// Set a cell. A zero removes the cell (and its row bucket if emptied).
    ///
    /// Cached sums, when present, are moved by the exact difference between
    /// the new and previous value. A row or column left without stored cells
    /// loses its cached total.
    pub fn set(&mut self, row: &str, column: &str, value: f64) {
        let previous = self.get(row, column);

        if value == 0.0 {
            if let Some(columns) = self.cells.get_mut(row) {
                columns.remove(column);
                if columns.is_empty() {
                    self.cells.remove(row);
                }
            }
        } else {
            self.cells
                .entry(row.to_string())
                .or_default()
                .insert(column.to_string(), value);
        }

        if let Some(sums) = self.sums.get_mut() {
            let row_emptied = !self.cells.contains_key(row);
            sums.record(row, column, previous, value, row_emptied);
        }
    }

    /// Total of a row or column; 0 for ids without stored cells.
    pub fn marginal_sum(&self, kind: AxisKind, id: &str) -> f64 {
        let sums = self.sums.get_or_init(|| MarginalSums::build(&self.cells));
        let map = match kind {
            AxisKind::Observation => &sums.rows,
            AxisKind::Sample => &sums.columns,
        };
        map.get(id).copied().unwrap_or(0.0)
    }

    /// Number of stored (non-zero) cells.
    pub fn nonzero_count(&self) -> usize {
        self.cells.values().map(HashMap::len).sum()
    }

    /// Number of stored cells in one row or column.
    pub fn nonzero_count_along(&self, kind: AxisKind, id: &str) -> usize {
        match kind {
            AxisKind::Observation => self.cells.get(id).map_or(0, HashMap::len),
            AxisKind::Sample => self
                .cells
                .values()
                .filter(|columns| columns.contains_key(id))
                .count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Stored cells of a row.
    pub fn row(&self, id: &str) -> Option<&HashMap<String, f64>> {
        self.cells.get(id)
    }

    /// Iterate over all stored cells in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.cells.iter().flat_map(|(row, columns)| {
            columns
                .iter()
                .map(move |(column, &value)| (row.as_str(), column.as_str(), value))
        })
    }

    /// Drop every row not in `keep`.
    pub fn filter_rows(&mut self, keep: &HashSet<String>) {
        self.cells.retain(|row, _| keep.contains(row));
        self.sums.take();
    }

    /// Drop every column not in `keep`.
    pub fn filter_columns(&mut self, keep: &HashSet<String>) {
        self.cells.retain(|_, columns| {
            columns.retain(|column, _| keep.contains(column));
            !columns.is_empty()
        });
        self.sums.take();
    }

    /// Rewrite every stored value through `f`; cells mapped to zero are
    /// removed.
    pub fn map_values<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &str, f64) -> f64,
    {
        self.cells.retain(|row, columns| {
            columns.retain(|column, value| {
                *value = f(row, column, *value);
                *value != 0.0
            });
            !columns.is_empty()
        });
        self.sums.take();
    }

    /// Remap rows and columns and sum values landing on the same cell.
    ///
    /// `None` leaves that side unchanged. Cells whose id has no entry in a
    /// supplied map are dropped.
    pub fn collapse(
        &self,
        row_map: Option<&HashMap<String, String>>,
        column_map: Option<&HashMap<String, String>>,
    ) -> SparseMatrix {
        let mut cells: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for (row, column, value) in self.iter() {
            let new_row = match row_map {
                Some(map) => match map.get(row) {
                    Some(new_row) => new_row.as_str(),
                    None => continue,
                },
                None => row,
            };
            let new_column = match column_map {
                Some(map) => match map.get(column) {
                    Some(new_column) => new_column.as_str(),
                    None => continue,
                },
                None => column,
            };
            *cells
                .entry(new_row.to_string())
                .or_default()
                .entry(new_column.to_string())
                .or_insert(0.0) += value;
        }

        cells.retain(|_, columns| {
            columns.retain(|_, value| *value != 0.0);
            !columns.is_empty()
        });
        SparseMatrix {
            cells,
            sums: OnceCell::new(),
        }
    }

    /// New matrix where column `new` holds the values of column
    /// `new_to_old[new]`. Rows are unchanged.
    pub fn resample_columns(&self, new_to_old: &IndexMap<String, String>) -> SparseMatrix {
        let mut targets: HashMap<&str, Vec<&str>> = HashMap::new();
        for (new, old) in new_to_old {
            targets.entry(old.as_str()).or_default().push(new.as_str());
        }

        let mut cells: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for (row, column, value) in self.iter() {
            let Some(news) = targets.get(column) else {
                continue;
            };
            let bucket = cells.entry(row.to_string()).or_default();
            for new in news {
                bucket.insert(new.to_string(), value);
            }
        }
        SparseMatrix {
            cells,
            sums: OnceCell::new(),
        }
    }
}
