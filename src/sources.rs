//! CSV-backed row sources.
//!
//! Files are `;`-separated with a header row. A source is read to the end
//! before any row is handed on, so a read failure never leaves a half-applied
//! batch behind.

use crate::errors::SourceError;
use crate::rows::{AttributeRow, EdgeRow};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const DELIMITER: u8 = b';';

pub fn read_rows<T: DeserializeOwned, R: Read>(
    reader: R,
    origin: &Path,
) -> Result<Vec<T>, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    csv_reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|source| SourceError::Csv {
            path: origin.to_path_buf(),
            source,
        })
}

fn open(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_edge_rows(path: &Path) -> Result<Vec<EdgeRow>, SourceError> {
    read_rows(open(path)?, path)
}

pub fn read_attribute_rows(path: &Path) -> Result<Vec<AttributeRow>, SourceError> {
    read_rows(open(path)?, path)
}
