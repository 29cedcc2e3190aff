use crate::attributes::AttributeKind;
use crate::consolidator::{consolidate, sort_by_measure};
use crate::errors::{LinkError, SplitCase, SplitFailure};
use crate::fragment::{AttributeFragment, EdgeFragment, Fragment};
use crate::geometry_ops;
use crate::node::Node;
use crate::node_ids::NodeIdAllocator;
use ahash::AHashMap;
use geo::{Coord, LineString};

/// Tolerances for one overlay attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Used when cutting fragments and when comparing endpoints.
    pub split: f64,
    pub allow_slack: bool,
    /// Used by the containment and overlap predicates.
    pub matching: f64,
}

/// How an edge fragment relates to an attribute fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Contained,
    AttributeInside,
    TailInAttribute,
    AttributeTailInHead,
    Disjoint,
}

fn classify(edge: &Fragment, attribute: &Fragment, tol: Tolerances) -> Relation {
    if edge.is_within(attribute, tol.matching) || edge.endpoints_match(attribute, tol.split) {
        Relation::Contained
    } else if attribute.is_completely_within(edge, tol.matching) {
        Relation::AttributeInside
    } else if edge.ends_within(attribute, tol.matching) && attribute.start() != edge.end() {
        Relation::TailInAttribute
    } else if attribute.ends_within(edge, tol.matching) && attribute.end() != edge.start() {
        Relation::AttributeTailInHead
    } else {
        Relation::Disjoint
    }
}

#[derive(Default)]
struct Overlaid {
    fragments: Vec<EdgeFragment>,
    nodes: Vec<Node>,
    failures: Vec<SplitFailure>,
}

/// All edge fragments sharing one parent id.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    id: String,
    fragments: Vec<EdgeFragment>,
}

impl Link {
    pub fn new(first: EdgeFragment) -> Self {
        Self {
            id: first.fragment.parent_id().to_string(),
            fragments: vec![first],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fragments(&self) -> &[EdgeFragment] {
        &self.fragments
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Adds a fragment unless it overlaps one already on the link.
    pub fn add(&mut self, fragment: EdgeFragment, tolerance: f64) -> Result<(), LinkError> {
        if fragment.fragment.parent_id() != self.id {
            return Err(LinkError::ForeignFragment {
                link_id: self.id.clone(),
                found: fragment.fragment.parent_id().to_string(),
            });
        }
        if self
            .fragments
            .iter()
            .any(|old| old.fragment.has_common_geometry(&fragment.fragment, tolerance))
        {
            return Err(LinkError::OverlapRejected {
                link_id: self.id.clone(),
                measure_from: fragment.fragment.measure_from(),
                measure_to: fragment.fragment.measure_to(),
            });
        }
        self.fragments.push(fragment);
        Ok(())
    }

    /// Cuts and tags the link's fragments with `attribute`.
    ///
    /// Either every required cut succeeds and the result is committed, or the
    /// first failure is returned and neither the link nor `ids` change.
    /// New fragments are placed directly after the fragment they were cut from.
    pub fn overlay(
        &mut self,
        attribute: &AttributeFragment,
        tol: Tolerances,
        ids: &mut NodeIdAllocator,
    ) -> Result<Vec<Node>, SplitFailure> {
        let mut scratch = ids.clone();
        let mut out = self.overlay_fragments(&attribute.0, tol, &mut scratch);

        if !out.failures.is_empty() {
            return Err(out.failures.swap_remove(0));
        }

        self.fragments = out.fragments;
        *ids = scratch;
        Ok(out.nodes)
    }

    /// Like [`Link::overlay`], but fragments that cannot be cut are left as
    /// they are while the rest of the overlay is applied.
    pub fn overlay_skipping_failures(
        &mut self,
        attribute: &AttributeFragment,
        tol: Tolerances,
        ids: &mut NodeIdAllocator,
    ) -> (Vec<Node>, Vec<SplitFailure>) {
        let out = self.overlay_fragments(&attribute.0, tol, ids);
        self.fragments = out.fragments;
        (out.nodes, out.failures)
    }

    fn overlay_fragments(
        &self,
        attribute: &Fragment,
        tol: Tolerances,
        ids: &mut NodeIdAllocator,
    ) -> Overlaid {
        let mut out = Overlaid {
            fragments: Vec::with_capacity(self.fragments.len() + 2),
            ..Default::default()
        };

        for edge in &self.fragments {
            let relation = classify(&edge.fragment, attribute, tol);
            let result = match relation {
                Relation::Contained => {
                    let mut tagged = edge.clone();
                    tagged.fragment.merge_attributes(attribute);
                    out.fragments.push(tagged);
                    continue;
                }
                Relation::Disjoint => {
                    out.fragments.push(edge.clone());
                    continue;
                }
                Relation::AttributeInside => {
                    self.split_inside(edge, attribute, tol, ids, &mut out)
                }
                Relation::TailInAttribute => {
                    self.split_tail(edge, attribute, tol, ids, &mut out)
                }
                Relation::AttributeTailInHead => {
                    self.split_head(edge, attribute, tol, ids, &mut out)
                }
            };

            if let Err(case) = result {
                out.failures.push(SplitFailure {
                    link_id: self.id.clone(),
                    case,
                    edge: edge.identity(),
                    attribute: attribute.identity(),
                    tolerance: tol.split,
                });
                out.fragments.push(edge.clone());
            }
        }

        out
    }

    fn cut(edge: &EdgeFragment, points: &[Coord], tol: Tolerances) -> Option<Vec<LineString>> {
        let geometry = edge.fragment.geometry()?;
        geometry_ops::split_by(geometry, points, tol.split, tol.allow_slack)
    }

    /// The attribute sits strictly inside `edge`: first, middle and last part.
    fn split_inside(
        &self,
        edge: &EdgeFragment,
        attribute: &Fragment,
        tol: Tolerances,
        ids: &mut NodeIdAllocator,
        out: &mut Overlaid,
    ) -> Result<(), SplitCase> {
        let case = SplitCase::AttributeInsideEdge;
        let (Some(start), Some(end)) = (attribute.start(), attribute.end()) else {
            return Err(case);
        };
        let mut parts = Self::cut(edge, &[start, end], tol).ok_or(case)?.into_iter();
        let (Some(g_first), Some(g_middle), Some(g_last)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(case);
        };

        let n1 = ids.allocate(attribute.parent_id());
        let n2 = ids.allocate(attribute.parent_id());

        let mut middle = edge.clone();
        middle.fragment.set_geometry(g_middle);
        middle.fragment.set_measure_from(attribute.measure_from());
        middle.fragment.set_measure_to(attribute.measure_to());
        middle.fragment.merge_attributes(attribute);
        middle.from_node = n1.clone();
        middle.to_node = n2.clone();

        let mut last = edge.clone();
        last.fragment.set_geometry(g_last);
        last.fragment.set_measure_from(attribute.measure_to());
        last.from_node = n2.clone();

        let mut first = edge.clone();
        first.fragment.set_geometry(g_first);
        first.fragment.set_measure_to(attribute.measure_from());
        first.to_node = n1.clone();

        out.fragments.extend([first, middle, last]);
        out.nodes.push(Node::new(n1, start, true));
        out.nodes.push(Node::new(n2, end, true));
        Ok(())
    }

    /// The end of `edge` runs into the attribute: the tail part takes the attribute.
    fn split_tail(
        &self,
        edge: &EdgeFragment,
        attribute: &Fragment,
        tol: Tolerances,
        ids: &mut NodeIdAllocator,
        out: &mut Overlaid,
    ) -> Result<(), SplitCase> {
        let case = SplitCase::EdgeTailOverlapsAttributeHead;
        let Some(start) = attribute.start() else {
            return Err(case);
        };
        let mut parts = Self::cut(edge, &[start], tol).ok_or(case)?.into_iter();
        let (Some(g_head), Some(g_tail)) = (parts.next(), parts.next()) else {
            return Err(case);
        };

        let n1 = ids.allocate(attribute.parent_id());

        let mut tail = edge.clone();
        tail.fragment.set_geometry(g_tail);
        tail.fragment.set_measure_from(attribute.measure_from());
        tail.fragment.merge_attributes(attribute);
        tail.from_node = n1.clone();

        let mut head = edge.clone();
        head.fragment.set_geometry(g_head);
        head.fragment.set_measure_to(attribute.measure_from());
        head.to_node = n1.clone();

        out.fragments.extend([head, tail]);
        out.nodes.push(Node::new(n1, start, true));
        Ok(())
    }

    /// The end of the attribute falls inside `edge`: the head part takes the
    /// attribute and is placed after the remaining tail.
    fn split_head(
        &self,
        edge: &EdgeFragment,
        attribute: &Fragment,
        tol: Tolerances,
        ids: &mut NodeIdAllocator,
        out: &mut Overlaid,
    ) -> Result<(), SplitCase> {
        let case = SplitCase::AttributeTailOverlapsEdgeHead;
        let Some(end) = attribute.end() else {
            return Err(case);
        };
        let mut parts = Self::cut(edge, &[end], tol).ok_or(case)?.into_iter();
        let (Some(g_head), Some(g_tail)) = (parts.next(), parts.next()) else {
            return Err(case);
        };

        let n2 = ids.allocate(attribute.parent_id());

        let mut head = edge.clone();
        head.fragment.set_geometry(g_head);
        head.fragment.set_measure_to(attribute.measure_to());
        head.fragment.merge_attributes(attribute);
        head.to_node = n2.clone();

        let mut tail = edge.clone();
        tail.fragment.set_geometry(g_tail);
        tail.fragment.set_measure_from(attribute.measure_to());
        tail.from_node = n2.clone();

        out.fragments.extend([tail, head]);
        out.nodes.push(Node::new(n2, end, true));
        Ok(())
    }

    /// Turns every misaligned fragment around and sorts by measure.
    pub fn align(&mut self) {
        for fragment in &mut self.fragments {
            fragment.align();
        }
        sort_by_measure(&mut self.fragments);
    }

    /// Copies attributes a fragment lacks from its neighbour in measure order.
    ///
    /// Forbidden driver direction never travels. Other directional attributes
    /// only cross a shared node that has traffic both in and out.
    pub fn fill_missing_attributes(&mut self, nodes: &AHashMap<String, Node>) {
        sort_by_measure(&mut self.fragments);
        let n = self.fragments.len();
        if n < 2 {
            return;
        }

        for i in 0..n - 1 {
            let (head, tail) = self.fragments.split_at_mut(i + 1);
            fill_from(&mut head[i], &tail[0], nodes);
        }
        let (head, tail) = self.fragments.split_at_mut(n - 1);
        fill_from(&mut tail[0], &head[n - 2], nodes);
    }

    /// Fills missing attributes, then merges fragments across pass-through
    /// nodes. Returns the ids of the nodes merged away.
    pub fn clean(&mut self, nodes: &AHashMap<String, Node>) -> Vec<String> {
        let mut removed = Vec::new();
        self.fill_missing_attributes(nodes);

        let mut dirty = std::mem::take(&mut self.fragments).into_iter();
        let Some(first) = dirty.next() else {
            return removed;
        };
        let mut clean = vec![first];

        for part in dirty {
            let pass_through = nodes
                .get(&part.from_node)
                .is_some_and(Node::is_pass_through);

            if pass_through {
                let before = clean.len();
                let boundary = part.from_node.clone();
                consolidate(&mut clean, part);
                if clean.len() == before {
                    removed.push(boundary);
                }
            } else {
                clean.push(part);
            }
        }

        self.fragments = clean;
        removed
    }

    pub fn from_node_ids(&self) -> Vec<&str> {
        self.fragments.iter().map(|f| f.from_node.as_str()).collect()
    }

    pub fn to_node_ids(&self) -> Vec<&str> {
        self.fragments.iter().map(|f| f.to_node.as_str()).collect()
    }

    /// From-node of the fragment with the smallest `measure_from`.
    pub fn start_node_id(&self) -> Option<&str> {
        self.fragments
            .iter()
            .min_by(|a, b| {
                a.fragment
                    .measure_from()
                    .total_cmp(&b.fragment.measure_from())
            })
            .map(|f| f.from_node.as_str())
    }

    /// To-node of the fragment with the largest `measure_to`.
    pub fn end_node_id(&self) -> Option<&str> {
        self.fragments
            .iter()
            .max_by(|a, b| a.fragment.measure_to().total_cmp(&b.fragment.measure_to()))
            .map(|f| f.to_node.as_str())
    }
}

fn fill_from(target: &mut EdgeFragment, source: &EdgeFragment, nodes: &AHashMap<String, Node>) {
    let connected = target
        .shared_node(source)
        .and_then(|id| nodes.get(id))
        .is_some_and(|n| n.incoming_count() >= 1 && n.outgoing_count() >= 1);

    for (kind, attribute) in source.fragment.attributes() {
        if *kind == AttributeKind::ForbiddenDriverDirection
            || target.fragment.attribute(*kind).is_some()
        {
            continue;
        }
        if attribute.is_directional() && !connected {
            continue;
        }
        target.fragment.set_attribute(attribute.clone());
    }
}
