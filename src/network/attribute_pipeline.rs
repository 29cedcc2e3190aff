use super::Network;
use crate::attributes::AttributeKind;
use crate::consolidator::{consolidate, consolidate_without_geometry};
use crate::diagnostics::DiagnosticKind;
use crate::fragment::{AttributeFragment, Fragment};
use crate::geometry_ops::SLACK_FACTOR;
use crate::link::Tolerances;
use crate::rows::AttributeRow;
use ahash::AHashSet;
use itertools::Itertools;
use tracing::{debug, info};

impl Network {
    /// Folds one batch of `kind` observations into the network.
    ///
    /// Rows are expected sorted by parent id, then by `measure_from`. The batch
    /// is not re-sorted; an out-of-order row is recorded as `UnsortedInput`
    /// and processed where it stands. Rows for unknown parents are ignored.
    pub fn add_attribute_rows(
        &mut self,
        kind: AttributeKind,
        rows: impl IntoIterator<Item = AttributeRow>,
    ) {
        let mut closed: AHashSet<String> = AHashSet::new();
        let groups = rows.into_iter().chunk_by(|row| row.parent_id.clone());

        for (parent_id, group) in &groups {
            if !closed.insert(parent_id.clone()) {
                self.log.record(
                    DiagnosticKind::UnsortedInput,
                    &parent_id,
                    "parent id reappears after its group was closed",
                );
            }
            if !self.links.contains_key(&parent_id) {
                debug!("Ignoring {} rows for unknown link {}", kind, parent_id);
                continue;
            }

            let fragments = self.build_group(kind, &parent_id, group);
            for fragment in &fragments {
                self.overlay_with_retry(fragment);
            }
        }

        info!(
            "Applied {} batch; network now holds {} fragments and {} nodes",
            kind,
            self.fragment_count(),
            self.nodes.len()
        );
    }

    /// Turns one parent's rows into a consolidated, sorted fragment list.
    fn build_group(
        &mut self,
        kind: AttributeKind,
        parent_id: &str,
        rows: impl Iterator<Item = AttributeRow>,
    ) -> Vec<AttributeFragment> {
        let mut fragments: Vec<AttributeFragment> = Vec::new();
        let mut without_geometry: Vec<AttributeFragment> = Vec::new();
        let mut last_from = f64::NEG_INFINITY;

        for row in rows {
            if row.measure_from < last_from {
                self.log.record(
                    DiagnosticKind::UnsortedInput,
                    parent_id,
                    format!("measure_from {} follows {}", row.measure_from, last_from),
                );
            }
            last_from = last_from.max(row.measure_from);

            let attribute = match row.attribute(kind) {
                Ok(attribute) => attribute,
                Err(e) => {
                    self.log
                        .record(DiagnosticKind::RowSkipped, parent_id, e.to_string());
                    continue;
                }
            };
            let geometry = match row.line() {
                Ok(geometry) => geometry,
                Err(e) => {
                    self.log
                        .record(DiagnosticKind::MalformedGeometry, parent_id, e.to_string());
                    continue;
                }
            };
            let has_geometry = geometry.is_some();
            let fragment = match Fragment::new(
                parent_id,
                geometry,
                row.measure_from,
                row.measure_to,
                [attribute],
            ) {
                Ok(fragment) => AttributeFragment(fragment),
                Err(e) => {
                    self.log
                        .record(DiagnosticKind::RowSkipped, parent_id, e.to_string());
                    continue;
                }
            };

            if has_geometry {
                self.reconcile(&mut fragments, fragment);
            } else {
                without_geometry.push(fragment);
            }
        }

        for pending in without_geometry {
            if let Err(dropped) = consolidate_without_geometry(&mut fragments, pending) {
                self.log.record(
                    DiagnosticKind::GeometryUnresolved,
                    parent_id,
                    format!(
                        "no neighbours to borrow geometry from for {}",
                        dropped.0.identity()
                    ),
                );
            }
        }

        fragments
    }

    /// Adds `incoming` to the group, unless the group already holds the same
    /// observation. A copy that only disagrees on direction widens the held
    /// attribute to with-and-against; an exact copy is dropped.
    fn reconcile(&mut self, fragments: &mut Vec<AttributeFragment>, incoming: AttributeFragment) {
        let tolerance = self.config.duplicate_geometry_tolerance;
        let mut matched = false;
        let mut widened = false;

        for existing in fragments.iter_mut() {
            if !existing.same_observation(&incoming, tolerance) {
                continue;
            }
            matched = true;

            for (kind, theirs) in incoming.0.attributes() {
                let conflicting = existing.0.attribute(*kind).is_some_and(|mine| {
                    mine.is_directional()
                        && theirs.is_directional()
                        && mine.direction != theirs.direction
                });
                if conflicting {
                    existing.0.widen_direction(*kind);
                    widened = true;
                }
            }
        }

        if !matched {
            consolidate(fragments, incoming);
        } else if !widened {
            self.log.record(
                DiagnosticKind::DuplicateObservation,
                incoming.0.parent_id(),
                format!("dropped repeated observation {}", incoming.0.identity()),
            );
        }
    }

    fn nominal_tolerances(&self) -> Tolerances {
        Tolerances {
            split: self.config.tolerance,
            allow_slack: self.config.allow_slack,
            matching: self.config.match_tolerance,
        }
    }

    fn overlay_with_retry(&mut self, attribute: &AttributeFragment) {
        let nominal = self.nominal_tolerances();
        let Some(link) = self.links.get_mut(attribute.0.parent_id()) else {
            return;
        };

        match link.overlay(attribute, nominal, &mut self.ids) {
            Ok(nodes) => self.register_nodes(nodes),
            Err(failure) => {
                self.log.record(
                    DiagnosticKind::SplitFailed {
                        tolerance: failure.tolerance,
                    },
                    attribute.0.parent_id(),
                    failure.to_string(),
                );
                let first = self.first_retry_tolerance();
                self.retry_overlay(attribute, first);
            }
        }
    }

    /// The nominal attempt with slack has already tried `tolerance * 10`, so
    /// escalation starts one step beyond it.
    fn first_retry_tolerance(&self) -> f64 {
        let reached = if self.config.allow_slack {
            self.config.tolerance * SLACK_FACTOR
        } else {
            self.config.tolerance
        };
        reached * self.config.retry_multiplier
    }

    /// Escalates the tolerance by `retry_multiplier` until the overlay
    /// succeeds or the tolerance passes `tolerance_max`, then gives up.
    ///
    /// A tolerance that is not a positive finite number, or a step that does
    /// not grow it, ends the escalation at once.
    fn retry_overlay(&mut self, attribute: &AttributeFragment, first: f64) {
        let parent_id = attribute.0.parent_id();
        let multiplier = self.config.retry_multiplier;
        let ceiling = self.config.tolerance_max;
        let mut tolerance = first;

        while tolerance.is_normal() && tolerance > 0.0 && tolerance <= ceiling {
            let tol = Tolerances {
                split: tolerance,
                allow_slack: false,
                matching: self.config.match_tolerance,
            };
            let Some(link) = self.links.get_mut(parent_id) else {
                return;
            };

            match link.overlay(attribute, tol, &mut self.ids) {
                Ok(nodes) => {
                    self.log.record(
                        DiagnosticKind::RetrySucceeded { tolerance },
                        parent_id,
                        format!("applied {}", attribute.0.identity()),
                    );
                    self.register_nodes(nodes);
                    return;
                }
                Err(failure) => debug!("{}", failure),
            }

            let next = tolerance * multiplier;
            if !(next > tolerance) {
                break;
            }
            tolerance = next;
        }

        self.abandon_overlay(attribute);
    }

    /// Applies what can be applied at the nominal tolerance and leaves the
    /// fragments that still cannot be cut as they are.
    fn abandon_overlay(&mut self, attribute: &AttributeFragment) {
        let nominal = self.nominal_tolerances();
        let parent_id = attribute.0.parent_id();
        let Some(link) = self.links.get_mut(parent_id) else {
            return;
        };

        let (nodes, failures) = link.overlay_skipping_failures(attribute, nominal, &mut self.ids);
        self.log.record(
            DiagnosticKind::RetryAbandoned {
                ceiling: self.config.tolerance_max,
            },
            parent_id,
            format!(
                "{} left uncut on {} fragment(s)",
                attribute.0.identity(),
                failures.len()
            ),
        );
        self.register_nodes(nodes);
    }
}
