//! Error types shared across the fusion pipeline.

use crate::attributes::{AttributeKind, ValueType};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttributeError {
    #[error("{kind} expects a {expected_type} value in {expected_range}, found {found}")]
    Validation {
        kind: AttributeKind,
        expected_type: ValueType,
        expected_range: &'static str,
        found: String,
    },
    #[error("unsupported attribute kind '{0}'")]
    UnsupportedKind(String),
    #[error("unknown value type tag '{0}'")]
    UnknownValueType(String),
    #[error("unknown direction tag '{0}'")]
    UnknownDirection(String),
    #[error("could not read '{text}' as a {value_type} value")]
    UnparsableValue { text: String, value_type: ValueType },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FragmentError {
    #[error("measure_from {from} is greater than measure_to {to} on '{parent_id}'")]
    InvertedMeasures { parent_id: String, from: f64, to: f64 },
    #[error("non-finite measure on '{parent_id}'")]
    NonFiniteMeasure { parent_id: String },
    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("malformed line geometry '{text}': {reason}")]
    Malformed { text: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("fragment {measure_from}..{measure_to} overlaps geometry already held by link '{link_id}'")]
    OverlapRejected {
        link_id: String,
        measure_from: f64,
        measure_to: f64,
    },
    #[error("fragment belongs to link '{found}', not '{link_id}'")]
    ForeignFragment { link_id: String, found: String },
}

/// Which of the overlay cases needed the cut that could not be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCase {
    AttributeInsideEdge,
    EdgeTailOverlapsAttributeHead,
    AttributeTailOverlapsEdgeHead,
}

impl std::fmt::Display for SplitCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SplitCase::AttributeInsideEdge => "attribute inside edge",
            SplitCase::EdgeTailOverlapsAttributeHead => "edge tail overlaps attribute head",
            SplitCase::AttributeTailOverlapsEdgeHead => "attribute tail overlaps edge head",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("({case}) could not cut fragment {edge} by attribute {attribute} at tolerance {tolerance}")]
pub struct SplitFailure {
    pub link_id: String,
    pub case: SplitCase,
    /// `parent;from;to;from_node;to_node` of the edge fragment that could not be cut.
    pub edge: String,
    /// `parent;from;to` of the attribute fragment.
    pub attribute: String,
    pub tolerance: f64,
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error reading '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("could not parse config '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config '{path}': {reason}")]
    InvalidConfig { path: PathBuf, reason: &'static str },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("could not write '{path}': {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write row: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
