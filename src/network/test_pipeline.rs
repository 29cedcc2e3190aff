use crate::attributes::{AttributeKind, AttributeValue, DirectionCategory};
use crate::config::FusionConfig;
use crate::diagnostics::{DiagnosticKind, DiagnosticLog};
use crate::fragment::EdgeFragment;
use crate::network::Network;
use crate::rows::{AttributeRow, EdgeRow};

fn network_with(config: FusionConfig) -> Network {
    let mut network = Network::new(config, DiagnosticLog::new());
    network.ingest_edge_rows([EdgeRow {
        parent_id: "L1".into(),
        measure_from: 0.0,
        measure_to: 1.0,
        from_node_id: "N1".into(),
        to_node_id: "N2".into(),
        geometry: "LINESTRING(0 0, 10 0)".into(),
        length: None,
    }]);
    network
}

fn row(from: f64, to: f64, wkt: &str, value: &str, value_type: &str, direction: &str) -> AttributeRow {
    AttributeRow {
        parent_id: "L1".into(),
        measure_from: from,
        measure_to: to,
        geometry: wkt.into(),
        value: value.into(),
        value_type: value_type.into(),
        direction: direction.into(),
    }
}

fn speed(from: f64, to: f64, wkt: &str, value: &str, direction: &str) -> AttributeRow {
    row(from, to, wkt, value, "real", direction)
}

fn sorted_fragments(network: &Network) -> Vec<EdgeFragment> {
    let mut fragments = network.link("L1").unwrap().fragments().to_vec();
    fragments.sort_by(|a, b| {
        a.fragment
            .measure_from()
            .total_cmp(&b.fragment.measure_from())
    });
    fragments
}

#[test]
fn test_overlay_then_clean_restores_single_fragment() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [speed(0.2, 0.6, "LINESTRING(2 0, 6 0)", "50", "1")],
    );

    assert_eq!(network.fragment_count(), 3);
    assert_eq!(network.node_count(), 4);
    assert!(network.node("L1:1").unwrap().is_synthetic());
    assert!(network.node("L1:2").is_some());

    let middle = &sorted_fragments(&network)[1];
    assert_eq!(middle.from_node, "L1:1");
    assert_eq!(middle.to_node, "L1:2");
    assert_eq!(
        middle.fragment.attribute(AttributeKind::SpeedLimit).map(|a| a.value()),
        Some(&AttributeValue::Real(50.0))
    );

    // Both synthetic nodes are pass-through after alignment, so the speed is
    // carried over the whole link and the fragments merge back together.
    network.clean();
    assert_eq!(network.fragment_count(), 1);
    assert_eq!(network.node_count(), 2);
    assert!(network.node("L1:1").is_none());

    let merged = &sorted_fragments(&network)[0];
    assert_eq!(merged.from_node, "N1");
    assert_eq!(merged.to_node, "N2");
    assert_eq!(merged.fragment.measure_from(), 0.0);
    assert_eq!(merged.fragment.measure_to(), 1.0);
    assert_eq!(merged.fragment.length(), 10.0);
    assert!(network.diagnostics().is_empty());
}

#[test]
fn test_forbidden_direction_keeps_its_fragment() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::ForbiddenDriverDirection,
        [row(0.2, 0.6, "LINESTRING(2 0, 6 0)", "true", "boolean", "1")],
    );
    network.clean();

    assert_eq!(network.fragment_count(), 3);
    assert_eq!(network.node_count(), 4);

    let flipped = network
        .link("L1")
        .unwrap()
        .fragments()
        .iter()
        .find(|f| f.fragment.attribute(AttributeKind::ForbiddenDriverDirection).is_some())
        .unwrap();
    assert_eq!(flipped.from_node, "L1:2");
    assert_eq!(flipped.to_node, "L1:1");
    assert!((flipped.fragment.measure_from() - 0.4).abs() < 1e-12);
    assert!((flipped.fragment.measure_to() - 0.8).abs() < 1e-12);
    assert_eq!(
        flipped
            .fragment
            .attribute(AttributeKind::ForbiddenDriverDirection)
            .map(|a| a.direction),
        Some(DirectionCategory::Against)
    );

    // the flipped fragment feeds neither synthetic node from both sides
    let n1 = network.node("L1:1").unwrap();
    assert_eq!((n1.incoming_count(), n1.outgoing_count()), (1, 0));
}

#[test]
fn test_align_is_idempotent() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::ForbiddenDriverDirection,
        [row(0.2, 0.6, "LINESTRING(2 0, 6 0)", "true", "boolean", "1")],
    );
    network.align();
    let once = network.link("L1").unwrap().clone();
    network.align();
    assert_eq!(network.link("L1").unwrap(), &once);
}

#[test]
fn test_rows_for_unknown_links_are_ignored() {
    let mut network = network_with(FusionConfig::default());
    let mut stray = speed(0.0, 1.0, "LINESTRING(0 0, 1 0)", "50", "");
    stray.parent_id = "L9".into();
    network.add_attribute_rows(AttributeKind::SpeedLimit, [stray]);

    assert_eq!(network.fragment_count(), 1);
    assert!(network.diagnostics().is_empty());
}

#[test]
fn test_failed_split_is_retried_at_a_wider_tolerance() {
    let config = FusionConfig {
        tolerance: 0.05,
        allow_slack: false,
        match_tolerance: 0.1,
        ..FusionConfig::default()
    };
    let mut network = network_with(config);
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [speed(0.2, 0.6, "LINESTRING(2 0.052, 6 0.052)", "70", "")],
    );

    let log = network.diagnostics();
    assert_eq!(log.count("split_failed"), 1);
    assert_eq!(log.count("retry_succeeded"), 1);
    assert_eq!(log.count("retry_abandoned"), 0);
    assert_eq!(log.entries()[0].kind, DiagnosticKind::SplitFailed { tolerance: 0.05 });
    match log.entries()[1].kind {
        DiagnosticKind::RetrySucceeded { tolerance } => assert!((tolerance - 0.055).abs() < 1e-9),
        ref other => panic!("unexpected {other:?}"),
    }

    assert_eq!(network.fragment_count(), 3);
    // the failed attempt did not consume any ids
    assert!(network.node("L1:1").is_some());
    assert!(network.node("L1:2").is_some());
    assert!(network.node("L1:3").is_none());
}

#[test]
fn test_retry_gives_up_past_the_ceiling() {
    let config = FusionConfig {
        tolerance: 0.05,
        allow_slack: false,
        match_tolerance: 0.2,
        ..FusionConfig::default()
    };
    let mut network = network_with(config);
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [speed(0.2, 0.6, "LINESTRING(2 0.5, 6 0.5)", "70", "")],
    );

    let log = network.diagnostics();
    assert_eq!(log.count("split_failed"), 1);
    assert_eq!(log.count("retry_succeeded"), 0);
    assert_eq!(log.count("retry_abandoned"), 1);
    assert_eq!(network.fragment_count(), 1);
    assert_eq!(network.node_count(), 2);
}

#[test]
fn test_opposite_directions_widen_to_both() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [
            speed(0.2, 0.6, "LINESTRING(2 0, 6 0)", "50", "1"),
            speed(0.2, 0.6, "LINESTRING(2 0, 6 0)", "50", "2"),
        ],
    );

    assert_eq!(network.diagnostics().count("duplicate_observation"), 0);
    assert_eq!(network.fragment_count(), 3);

    let middle = &sorted_fragments(&network)[1];
    assert_eq!(
        middle
            .fragment
            .attribute(AttributeKind::SpeedLimit)
            .map(|a| a.direction),
        Some(DirectionCategory::WithAndAgainst)
    );
}

#[test]
fn test_exact_duplicates_are_dropped() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [
            speed(0.2, 0.6, "LINESTRING(2 0, 6 0)", "50", "1"),
            speed(0.2, 0.6, "LINESTRING(2 0, 6 0.01)", "50", "1"),
        ],
    );

    assert_eq!(network.diagnostics().count("duplicate_observation"), 1);
    assert_eq!(network.fragment_count(), 3);
    assert_eq!(network.node_count(), 4);
}

#[test]
fn test_unsorted_measures_are_flagged_but_applied() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [
            speed(0.6, 1.0, "LINESTRING(6 0, 10 0)", "50", ""),
            speed(0.0, 0.2, "LINESTRING(0 0, 2 0)", "50", ""),
        ],
    );

    assert_eq!(network.diagnostics().count("unsorted_input"), 1);
    assert_eq!(network.fragment_count(), 3);

    let fragments = sorted_fragments(&network);
    let tagged: Vec<bool> = fragments
        .iter()
        .map(|f| f.fragment.attribute(AttributeKind::SpeedLimit).is_some())
        .collect();
    assert_eq!(tagged, vec![true, false, true]);
}

#[test]
fn test_reappearing_parent_is_flagged() {
    let mut network = network_with(FusionConfig::default());
    let mut other = speed(0.0, 1.0, "LINESTRING(0 5, 1 5)", "30", "");
    other.parent_id = "L2".into();
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [
            speed(0.0, 0.2, "LINESTRING(0 0, 2 0)", "50", ""),
            other,
            speed(0.6, 1.0, "LINESTRING(6 0, 10 0)", "50", ""),
        ],
    );

    assert_eq!(network.diagnostics().count("unsorted_input"), 1);
    assert_eq!(network.fragment_count(), 3);
}

#[test]
fn test_rows_without_geometry_bridge_their_neighbours() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [
            speed(0.0, 0.2, "LINESTRING(0 0, 2 0)", "50", ""),
            speed(0.2, 0.6, "POINT EMPTY", "70", ""),
            speed(0.6, 1.0, "LINESTRING(6 0, 10 0)", "50", ""),
        ],
    );

    assert!(network.diagnostics().is_empty());
    let values: Vec<Option<AttributeValue>> = sorted_fragments(&network)
        .iter()
        .map(|f| {
            f.fragment
                .attribute(AttributeKind::SpeedLimit)
                .map(|a| a.value().clone())
        })
        .collect();
    assert_eq!(
        values,
        vec![
            Some(AttributeValue::Real(50.0)),
            Some(AttributeValue::Real(70.0)),
            Some(AttributeValue::Real(50.0)),
        ]
    );
}

#[test]
fn test_row_without_neighbours_is_unresolved() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [speed(0.2, 0.6, "", "70", "")],
    );

    assert_eq!(network.diagnostics().count("geometry_unresolved"), 1);
    assert_eq!(network.fragment_count(), 1);
}

#[test]
fn test_invalid_values_skip_the_row() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::FunctionalRoadClass,
        [
            row(0.2, 0.6, "LINESTRING(2 0, 6 0)", "12", "integer", ""),
            row(0.6, 0.2, "LINESTRING(2 0, 6 0)", "3", "integer", ""),
            row(0.2, 0.6, "LINESTRING(2 0", "3", "integer", ""),
        ],
    );

    let log = network.diagnostics();
    assert_eq!(log.count("row_skipped"), 2);
    assert_eq!(log.count("malformed_geometry"), 1);
    assert_eq!(network.fragment_count(), 1);
}

#[test]
fn test_zero_tolerance_gives_up_instead_of_escalating() {
    let config = FusionConfig {
        tolerance: 0.0,
        allow_slack: false,
        match_tolerance: 0.1,
        ..FusionConfig::default()
    };
    let mut network = network_with(config);
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [speed(0.2, 0.6, "LINESTRING(2 0, 6 0)", "50", "")],
    );

    let log = network.diagnostics();
    assert_eq!(log.count("split_failed"), 1);
    assert_eq!(log.count("retry_succeeded"), 0);
    assert_eq!(log.count("retry_abandoned"), 1);
    assert_eq!(network.fragment_count(), 1);
}

#[test]
fn test_nan_ceiling_gives_up_instead_of_escalating() {
    let config = FusionConfig {
        tolerance: 0.05,
        tolerance_max: f64::NAN,
        allow_slack: false,
        match_tolerance: 0.1,
        ..FusionConfig::default()
    };
    let mut network = network_with(config);
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [speed(0.2, 0.6, "LINESTRING(2 0.052, 6 0.052)", "50", "")],
    );

    assert_eq!(network.diagnostics().count("retry_abandoned"), 1);
    assert_eq!(network.fragment_count(), 1);
}

#[test]
fn test_escalation_after_slack_starts_past_the_slack_tolerance() {
    let config = FusionConfig {
        tolerance: 0.005,
        allow_slack: true,
        match_tolerance: 0.1,
        ..FusionConfig::default()
    };
    let mut network = network_with(config);
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [speed(0.2, 0.6, "LINESTRING(2 0.052, 6 0.052)", "70", "")],
    );

    let log = network.diagnostics();
    assert_eq!(log.count("split_failed"), 1);
    assert_eq!(log.count("retry_succeeded"), 1);
    match log.entries()[1].kind {
        // 0.005 * 10 * 1.1: the first step beyond what the slack retry tried
        DiagnosticKind::RetrySucceeded { tolerance } => assert!((tolerance - 0.055).abs() < 1e-9),
        ref other => panic!("unexpected {other:?}"),
    }
    assert_eq!(network.fragment_count(), 3);
}

#[test]
fn test_node_shared_with_another_link_survives_clean() {
    let mut network = network_with(FusionConfig::default());
    network.add_attribute_rows(
        AttributeKind::SpeedLimit,
        [speed(0.2, 1.0, "LINESTRING(2 0, 10 0)", "50", "1")],
    );
    assert_eq!(network.fragment_count(), 2);
    assert!(network.node("L1:1").is_some());

    network.ingest_edge_rows([EdgeRow {
        parent_id: "L2".into(),
        measure_from: 0.0,
        measure_to: 1.0,
        from_node_id: "L1:1".into(),
        to_node_id: "N3".into(),
        geometry: "LINESTRING(2 0, 2 5)".into(),
        length: None,
    }]);
    network.clean();

    // L1:1 has one way in and two ways out, so L1 stays split there even
    // though both halves end up with the same speed.
    let l1 = network.link("L1").unwrap();
    assert_eq!(l1.fragment_count(), 2);
    assert!(l1.to_node_ids().contains(&"L1:1"));

    let shared = network.node("L1:1").unwrap();
    assert_eq!((shared.incoming_count(), shared.outgoing_count()), (1, 2));
    assert_eq!(network.node_count(), 4);

    let fragments = sorted_fragments(&network);
    assert!(
        fragments
            .iter()
            .all(|f| f.fragment.attribute(AttributeKind::SpeedLimit).is_some())
    );
}
