//! CSV rendering of tables and axis metadata.

use crate::axis::Axis;
use crate::error::{BiomError, Result};
use crate::table::Table;

/// First line of a rendered table.
pub const TABLE_BANNER: &str = "# Constructed from biom file";

/// Header cell above the observation ids.
pub const OBSERVATION_HEADER: &str = "#OTU ID";

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| BiomError::Render(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BiomError::Render(e.to_string()))
}

/// Render the table as CSV: a banner line, a header of sample ids, then one
/// row per observation in axis order.
pub fn render_table(table: &Table) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record([TABLE_BANNER])?;

    let header = std::iter::once(OBSERVATION_HEADER).chain(table.samples().ids());
    writer.write_record(header)?;

    for observation in table.observations().ids() {
        let values = table
            .samples()
            .ids()
            .map(|sample| table.value(observation, sample).to_string());
        writer.write_record(std::iter::once(observation.to_string()).chain(values))?;
    }
    finish(writer)
}

/// Render an axis's metadata as CSV, one row per element. Absent values are
/// left empty.
pub fn render_metadata(axis: &Axis) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let keys = axis.metadata_keys();

    writer.write_record(std::iter::once(axis.kind().name()).chain(keys.iter().map(String::as_str)))?;
    for element in axis.elements() {
        let values = keys.iter().map(|key| element.metadata(key).unwrap_or(""));
        writer.write_record(std::iter::once(element.id()).chain(values))?;
    }
    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisKind;
    use crate::input::{CsrMatrix, DecodedTable, MetadataColumn};

    fn table() -> Table {
        let decoded = DecodedTable {
            observation_ids: vec!["o1".into(), "o2".into()],
            sample_ids: vec!["s1".into(), "s2".into()],
            matrix: CsrMatrix::from_dense(&[vec![1.0, 0.0], vec![2.5, 3.0]]),
            sample_metadata: vec![
                MetadataColumn::scalar("site", vec!["gut".into(), "skin, arm".into()]),
                MetadataColumn::scalar("depth", vec!["NA".into(), "10".into()]),
            ],
            ..Default::default()
        };
        Table::from_decoded(decoded).unwrap()
    }

    #[test]
    fn test_render_table() {
        let rendered = render_table(&table()).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], TABLE_BANNER);
        assert_eq!(lines[1], "#OTU ID,s1,s2");
        assert_eq!(lines[2], "o1,1,0");
        assert_eq!(lines[3], "o2,2.5,3");
    }

    #[test]
    fn test_render_metadata() {
        let table = table();
        let rendered = render_metadata(table.axis(AxisKind::Sample)).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "sample,site,depth");
        assert_eq!(lines[1], "s1,gut,");
        assert_eq!(lines[2], "s2,\"skin, arm\",10");
    }
}
