//! Table input: the decode collaborator interface and plain-text loaders.

mod decode;
mod parser;

pub use decode::{
    CsrMatrix, DecodedTable, MetadataColumn, MetadataValues, TableAttributes, TableDecoder,
};
pub use parser::{parse_metadata, read_id_list, read_metadata_file};
