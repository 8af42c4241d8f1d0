//! Plain-text metadata and id-list readers.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use indexmap::IndexMap;

use crate::axis::MetadataMap;
use crate::error::{BiomError, Result};

/// Column holding element ids in a metadata file.
const ID_COLUMN: &str = "id";

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| BiomError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a tab-separated metadata file, keeping only `keys`.
///
/// Lines starting with `#` are skipped, the first remaining line is the
/// header and must contain an `id` column. Header names match `keys`
/// case-insensitively; values are stored under the key as requested.
pub fn read_metadata_file<S: AsRef<str>>(path: impl AsRef<Path>, keys: &[S]) -> Result<MetadataMap> {
    let file = open(path.as_ref())?;
    parse_metadata(file, keys)
}

/// Parse tab-separated metadata from any reader. See [`read_metadata_file`].
pub fn parse_metadata<R: Read, S: AsRef<str>>(reader: R, keys: &[S]) -> Result<MetadataMap> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect();

    let id_column = *columns
        .get(ID_COLUMN)
        .ok_or_else(|| BiomError::MissingMetadata(format!("'{}' column", ID_COLUMN)))?;

    let wanted: Vec<(&str, usize)> = keys
        .iter()
        .filter_map(|key| {
            let key = key.as_ref();
            columns.get(&key.to_lowercase()).map(|&i| (key, i))
        })
        .collect();

    let mut metadata = MetadataMap::new();
    for record in reader.records() {
        let record = record?;
        let Some(id) = record.get(id_column) else {
            continue;
        };
        let values: IndexMap<String, String> = wanted
            .iter()
            .filter_map(|&(key, i)| record.get(i).map(|value| (key.to_string(), value.to_string())))
            .collect();
        metadata.insert(id.to_string(), values);
    }

    Ok(metadata)
}

/// Read a list of ids, one per line. Blank lines are ignored.
pub fn read_id_list(path: impl AsRef<Path>) -> Result<HashSet<String>> {
    let path = path.as_ref();
    let reader = BufReader::new(open(path)?);
    let mut ids = HashSet::new();
    for line in reader.lines() {
        let line = line.map_err(|e| BiomError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let id = line.trim_end();
        if !id.is_empty() {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}
