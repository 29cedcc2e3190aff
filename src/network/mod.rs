//! The fused road network: links, nodes and the passes that run over them.

mod attribute_pipeline;
mod cleaning;

#[cfg(test)]
mod test_ingestion;
#[cfg(test)]
mod test_pipeline;

use crate::attributes::AttributeKind;
use crate::config::FusionConfig;
use crate::diagnostics::{DiagnosticKind, DiagnosticLog};
use crate::errors::SinkError;
use crate::export;
use crate::fragment::{EdgeFragment, Fragment};
use crate::geometry_ops;
use crate::link::Link;
use crate::node::Node;
use crate::node_ids::NodeIdAllocator;
use crate::rows::EdgeRow;
use ahash::AHashMap;
use std::path::Path;
use tracing::{debug, info};

pub struct Network {
    links: AHashMap<String, Link>,
    nodes: AHashMap<String, Node>,
    ids: NodeIdAllocator,
    config: FusionConfig,
    log: DiagnosticLog,
}

impl Network {
    pub fn new(config: FusionConfig, log: DiagnosticLog) -> Self {
        Self {
            links: AHashMap::new(),
            nodes: AHashMap::new(),
            ids: NodeIdAllocator::default(),
            config,
            log,
        }
    }

    /// Builds links and nodes from edge rows. Rows that cannot be used are
    /// recorded in the diagnostic log and skipped.
    pub fn ingest_edge_rows(&mut self, rows: impl IntoIterator<Item = EdgeRow>) {
        let mut accepted = 0usize;
        let mut seen = 0usize;
        for row in rows {
            seen += 1;
            if self.ingest_edge_row(row) {
                accepted += 1;
            }
        }
        info!(
            "Ingested {} of {} edge rows into {} links and {} nodes",
            accepted,
            seen,
            self.links.len(),
            self.nodes.len()
        );
    }

    fn ingest_edge_row(&mut self, row: EdgeRow) -> bool {
        let line = match row.line() {
            Ok(line) => line,
            Err(e) => {
                self.log
                    .record(DiagnosticKind::MalformedGeometry, &row.parent_id, e.to_string());
                return false;
            }
        };
        let (Some(start), Some(end)) = (
            geometry_ops::start_point(&line),
            geometry_ops::end_point(&line),
        ) else {
            self.log.record(
                DiagnosticKind::MalformedGeometry,
                &row.parent_id,
                "line without endpoints",
            );
            return false;
        };

        let fragment = match Fragment::new(
            row.parent_id.clone(),
            Some(line),
            row.measure_from,
            row.measure_to,
            [],
        ) {
            Ok(fragment) => fragment,
            Err(e) => {
                self.log
                    .record(DiagnosticKind::RowSkipped, &row.parent_id, e.to_string());
                return false;
            }
        };
        let edge = EdgeFragment::new(fragment, row.from_node_id.clone(), row.to_node_id.clone());

        match self.links.get_mut(&row.parent_id) {
            Some(link) => {
                if let Err(e) = link.add(edge, self.config.match_tolerance) {
                    self.log
                        .record(DiagnosticKind::OverlapRejected, &row.parent_id, e.to_string());
                    return false;
                }
            }
            None => {
                self.links.insert(row.parent_id.clone(), Link::new(edge));
            }
        }

        self.nodes
            .entry(row.from_node_id.clone())
            .or_insert_with(|| Node::new(row.from_node_id, start, false));
        self.nodes
            .entry(row.to_node_id.clone())
            .or_insert_with(|| Node::new(row.to_node_id, end, false));
        true
    }

    fn register_nodes(&mut self, nodes: Vec<Node>) {
        for node in nodes {
            debug!("New boundary node {}", node.id());
            self.nodes.entry(node.id().to_string()).or_insert(node);
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.log
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticLog {
        &mut self.log
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.links.get(id)
    }

    /// Link ids in ascending order.
    pub fn link_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.links.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Edge fragments over all links.
    pub fn fragment_count(&self) -> usize {
        self.links.values().map(Link::fragment_count).sum()
    }

    /// Writes the node table sorted by id. A sink that cannot be opened or
    /// written is logged and the write is skipped.
    pub fn write_node_table(&mut self, path: &Path) -> bool {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_unstable_by(|a, b| a.id().cmp(b.id()));

        let result = export::create_sink(path).and_then(|sink| export::write_node_table(sink, nodes));
        self.finish_write(path, result)
    }

    /// Writes the edge table sorted by link id, with one column per `kinds` entry.
    pub fn write_edge_table(&mut self, path: &Path, kinds: &[AttributeKind]) -> bool {
        let mut links: Vec<&Link> = self.links.values().collect();
        links.sort_unstable_by(|a, b| a.id().cmp(b.id()));

        let result =
            export::create_sink(path).and_then(|sink| export::write_edge_table(sink, links, kinds));
        self.finish_write(path, result)
    }

    fn finish_write(&mut self, path: &Path, result: Result<(), SinkError>) -> bool {
        match result {
            Ok(()) => {
                info!("Wrote {}", path.display());
                true
            }
            Err(e) => {
                self.log.record(
                    DiagnosticKind::SinkUnavailable,
                    path.display().to_string(),
                    e.to_string(),
                );
                false
            }
        }
    }
}
