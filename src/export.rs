use crate::attributes::AttributeKind;
use crate::errors::SinkError;
use crate::geometry_ops;
use crate::link::Link;
use crate::node::Node;
use crate::sources::DELIMITER;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const NODE_HEADER: [&str; 3] = ["REFNODE_OID", "EXTENDED", "GEOM"];

pub const EDGE_HEADER: [&str; 7] = [
    "REFLINK_OID",
    "MEASURE_FROM",
    "MEASURE_TO",
    "REFNODE_OID_FROM",
    "REFNODE_OID_TO",
    "GEOM",
    "GEOMETRIC_LENGTH",
];

pub fn create_sink(path: &Path) -> Result<BufWriter<File>, SinkError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| SinkError::Unavailable {
            path: path.to_path_buf(),
            source,
        })
}

fn table_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(writer)
}

/// `id;t|f;point` per node, in the order given.
pub fn write_node_table<'a, W: Write>(
    writer: W,
    nodes: impl IntoIterator<Item = &'a Node>,
) -> Result<(), SinkError> {
    let mut out = table_writer(writer);
    out.write_record(NODE_HEADER)?;

    for node in nodes {
        let synthetic = if node.is_synthetic() { "t" } else { "f" };
        let point = geometry_ops::point_to_wkt(node.point())?;
        out.write_record([node.id(), synthetic, point.as_str()])?;
    }

    out.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// One row per edge fragment, followed by one column per entry of `kinds`.
/// Absent attributes are written as empty fields.
pub fn write_edge_table<'a, W: Write>(
    writer: W,
    links: impl IntoIterator<Item = &'a Link>,
    kinds: &[AttributeKind],
) -> Result<(), SinkError> {
    let mut out = table_writer(writer);

    let mut header: Vec<String> = EDGE_HEADER.iter().map(|h| h.to_string()).collect();
    header.extend(kinds.iter().map(|k| k.column()));
    out.write_record(&header)?;

    for link in links {
        for part in link.fragments() {
            let f = &part.fragment;
            let geometry = match f.geometry() {
                Some(g) => geometry_ops::line_to_wkt(g)?,
                None => String::new(),
            };

            let mut record = vec![
                f.parent_id().to_string(),
                f.measure_from().to_string(),
                f.measure_to().to_string(),
                part.from_node.clone(),
                part.to_node.clone(),
                geometry,
                f.length().to_string(),
            ];
            record.extend(kinds.iter().map(|kind| {
                f.attribute(*kind)
                    .map(|a| a.value().to_string())
                    .unwrap_or_default()
            }));
            out.write_record(&record)?;
        }
    }

    out.flush().map_err(csv::Error::from)?;
    Ok(())
}
