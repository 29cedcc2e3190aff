use crate::attributes::AttributeKind;
use crate::config::FusionConfig;
use crate::diagnostics::DiagnosticLog;
use crate::network::Network;
use crate::rows::EdgeRow;

fn edge(parent: &str, from: f64, to: f64, nodes: (&str, &str), wkt: &str) -> EdgeRow {
    EdgeRow {
        parent_id: parent.into(),
        measure_from: from,
        measure_to: to,
        from_node_id: nodes.0.into(),
        to_node_id: nodes.1.into(),
        geometry: wkt.into(),
        length: None,
    }
}

fn network() -> Network {
    Network::new(FusionConfig::default(), DiagnosticLog::new())
}

#[test]
fn test_nodes_are_shared_between_rows() {
    let mut network = network();
    network.ingest_edge_rows([
        edge("L1", 0.0, 0.5, ("N1", "N2"), "LINESTRING(0 0, 5 0)"),
        edge("L1", 0.5, 1.0, ("N2", "N3"), "LINESTRING(5 0, 10 0)"),
        edge("L2", 0.0, 1.0, ("N3", "N4"), "LINESTRING(10 0, 10 10)"),
    ]);

    assert_eq!(network.link_ids(), vec!["L1", "L2"]);
    assert_eq!(network.node_count(), 4);
    assert_eq!(network.fragment_count(), 3);
    assert_eq!(network.link("L1").map(|l| l.fragment_count()), Some(2));
    assert!(network.diagnostics().is_empty());
    assert_eq!(network.links().count(), 2);
    assert!(network.nodes().all(|n| !n.is_synthetic()));
    assert_eq!(network.config().srid, 3006);

    let n3 = network.node("N3").unwrap();
    assert!(!n3.is_synthetic());
    assert_eq!(n3.point().x, 10.0);
}

#[test]
fn test_overlapping_row_is_rejected() {
    let mut network = network();
    network.ingest_edge_rows([
        edge("L1", 0.0, 1.0, ("N1", "N2"), "LINESTRING(0 0, 10 0)"),
        edge("L1", 0.2, 0.6, ("N5", "N6"), "LINESTRING(2 0, 6 0)"),
    ]);

    assert_eq!(network.fragment_count(), 1);
    assert_eq!(network.diagnostics().count("overlap_rejected"), 1);
    // nodes of the rejected row never make it into the network
    assert!(network.node("N5").is_none());
    assert_eq!(network.node_count(), 2);
}

#[test]
fn test_bad_rows_are_skipped_with_a_diagnostic() {
    let mut network = network();
    network.ingest_edge_rows([
        edge("L1", 0.0, 1.0, ("N1", "N2"), "LINESTRING(0 0"),
        edge("L2", 0.0, 1.0, ("N1", "N2"), "POINT(1 1)"),
        edge("L3", 0.8, 0.2, ("N1", "N2"), "LINESTRING(0 0, 1 1)"),
        edge("L4", 0.0, 1.0, ("N1", "N2"), "LINESTRING(0 0, 1 1)"),
    ]);

    let log = network.diagnostics();
    assert_eq!(log.count("malformed_geometry"), 2);
    assert_eq!(log.count("row_skipped"), 1);
    assert_eq!(network.link_ids(), vec!["L4"]);
    assert_eq!(log.entries()[2].subject, "L3");
}

#[test]
fn test_tables_are_written_sorted() {
    let mut network = network();
    network.ingest_edge_rows([
        edge("L2", 0.0, 1.0, ("N3", "N4"), "LINESTRING(10 0, 10 10)"),
        edge("L1", 0.0, 1.0, ("N1", "N3"), "LINESTRING(0 0, 10 0)"),
    ]);

    let dir = tempfile::tempdir().unwrap();
    let nodes_path = dir.path().join("nodes.csv");
    let edges_path = dir.path().join("edges.csv");
    assert!(network.write_node_table(&nodes_path));
    assert!(network.write_edge_table(&edges_path, &[AttributeKind::SpeedLimit]));

    let nodes = std::fs::read_to_string(&nodes_path).unwrap();
    let ids: Vec<&str> = nodes
        .lines()
        .skip(1)
        .filter_map(|l| l.split(';').next())
        .collect();
    assert_eq!(ids, vec!["N1", "N3", "N4"]);

    let edges = std::fs::read_to_string(&edges_path).unwrap();
    let lines: Vec<&str> = edges.lines().collect();
    assert!(lines[0].ends_with("GEOMETRIC_LENGTH;SPEED_LIMIT"));
    assert!(lines[1].starts_with("L1;"));
    assert!(lines[2].starts_with("L2;"));
}

#[test]
fn test_unavailable_sink_is_logged() {
    let mut network = network();
    network.ingest_edge_rows([edge("L1", 0.0, 1.0, ("N1", "N2"), "LINESTRING(0 0, 10 0)")]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("nodes.csv");
    assert!(!network.write_node_table(&path));
    assert_eq!(network.diagnostics().count("sink_unavailable"), 1);
}
