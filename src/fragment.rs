//! Linear-referenced slices of a parent entity.
//!
//! [`Fragment`] carries what edge slices and attribute observations have in
//! common. [`EdgeFragment`] adds the two node ids, [`AttributeFragment`] is a
//! bare observation waiting to be overlaid.

use crate::attributes::{Attribute, AttributeKind, DirectionCategory};
use crate::errors::FragmentError;
use crate::geometry_ops;
use geo::{Coord, EuclideanDistance, LineString, Point};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    parent_id: String,
    geometry: Option<LineString>,
    measure_from: f64,
    measure_to: f64,
    length: f64,
    attributes: BTreeMap<AttributeKind, Attribute>,
}

impl Fragment {
    /// Fails on `measure_from > measure_to`, on non-finite measures and on any
    /// attribute that does not validate. Equal measures are accepted.
    pub fn new(
        parent_id: impl Into<String>,
        geometry: Option<LineString>,
        measure_from: f64,
        measure_to: f64,
        attributes: impl IntoIterator<Item = Attribute>,
    ) -> Result<Self, FragmentError> {
        let parent_id = parent_id.into();

        if !measure_from.is_finite() || !measure_to.is_finite() {
            return Err(FragmentError::NonFiniteMeasure { parent_id });
        }
        if measure_from > measure_to {
            return Err(FragmentError::InvertedMeasures {
                parent_id,
                from: measure_from,
                to: measure_to,
            });
        }

        let mut table = BTreeMap::new();
        for attribute in attributes {
            attribute.validate()?;
            table.insert(attribute.kind(), attribute);
        }

        Ok(Self {
            length: geometry_ops::length(geometry.as_ref()),
            parent_id,
            geometry,
            measure_from,
            measure_to,
            attributes: table,
        })
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn geometry(&self) -> Option<&LineString> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: LineString) {
        self.length = geometry_ops::length(Some(&geometry));
        self.geometry = Some(geometry);
    }

    pub fn measure_from(&self) -> f64 {
        self.measure_from
    }

    pub fn measure_to(&self) -> f64 {
        self.measure_to
    }

    pub fn set_measure_from(&mut self, measure: f64) {
        self.measure_from = measure;
    }

    pub fn set_measure_to(&mut self, measure: f64) {
        self.measure_to = measure;
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn attributes(&self) -> &BTreeMap<AttributeKind, Attribute> {
        &self.attributes
    }

    pub fn attribute(&self, kind: AttributeKind) -> Option<&Attribute> {
        self.attributes.get(&kind)
    }

    pub(crate) fn attributes_mut(&mut self) -> impl Iterator<Item = &mut Attribute> {
        self.attributes.values_mut()
    }

    pub fn set_attribute(&mut self, attribute: Attribute) {
        self.attributes.insert(attribute.kind(), attribute);
    }

    /// Copies every attribute of `other` into this table, overwriting.
    pub fn merge_attributes(&mut self, other: &Fragment) {
        for attribute in other.attributes.values() {
            self.set_attribute(attribute.clone());
        }
    }

    /// Widens the direction of `kind` to with-and-against, if present.
    pub fn widen_direction(&mut self, kind: AttributeKind) {
        if let Some(attribute) = self.attributes.get_mut(&kind) {
            attribute.direction = DirectionCategory::WithAndAgainst;
        }
    }

    pub fn start(&self) -> Option<Coord> {
        self.geometry.as_ref().and_then(geometry_ops::start_point)
    }

    pub fn end(&self) -> Option<Coord> {
        self.geometry.as_ref().and_then(geometry_ops::end_point)
    }

    /// Extends this fragment backwards over `prev`, which ends where this one starts.
    pub(crate) fn extend_backward(&mut self, prev: &Fragment) {
        if let (Some(p), Some(s)) = (prev.geometry.as_ref(), self.geometry.as_ref()) {
            let joined = geometry_ops::append(p, s, false);
            self.set_geometry(joined);
        }
        self.measure_from = prev.measure_from;
    }

    /// Extends this fragment forwards over `next`, which starts where this one ends.
    pub(crate) fn extend_forward(&mut self, next: &Fragment) {
        if let (Some(s), Some(n)) = (self.geometry.as_ref(), next.geometry.as_ref()) {
            let joined = geometry_ops::append(s, n, false);
            self.set_geometry(joined);
        }
        self.measure_to = next.measure_to;
    }

    /// Reverses the geometry and complements the measures on a 0..1 scale.
    pub(crate) fn flip(&mut self) {
        if let Some(g) = self.geometry.as_ref() {
            let reversed = geometry_ops::reverse(g);
            self.set_geometry(reversed);
        }
        let (from, to) = (self.measure_from, self.measure_to);
        self.measure_from = 1.0 - to;
        self.measure_to = 1.0 - from;
    }

    // --- Geometric predicates ---

    pub fn starts_within(&self, other: &Fragment, tolerance: f64) -> bool {
        match (self.start(), other.geometry.as_ref()) {
            (Some(p), Some(g)) => geometry_ops::spans_point(g, p, tolerance, true),
            _ => false,
        }
    }

    pub fn ends_within(&self, other: &Fragment, tolerance: f64) -> bool {
        match (self.end(), other.geometry.as_ref()) {
            (Some(p), Some(g)) => geometry_ops::spans_point(g, p, tolerance, true),
            _ => false,
        }
    }

    /// Both endpoints lie on `other`.
    pub fn is_within(&self, other: &Fragment, tolerance: f64) -> bool {
        self.starts_within(other, tolerance) && self.ends_within(other, tolerance)
    }

    /// Within `other` and sharing neither endpoint with it exactly.
    pub fn is_completely_within(&self, other: &Fragment, tolerance: f64) -> bool {
        self.is_within(other, tolerance)
            && self.start() != other.start()
            && self.end() != other.end()
    }

    /// Both endpoints equal `other`'s or lie closer than `tolerance` to them.
    pub fn endpoints_match(&self, other: &Fragment, tolerance: f64) -> bool {
        let close = |a: Option<Coord>, b: Option<Coord>| match (a, b) {
            (Some(a), Some(b)) => a == b || Point::from(a).euclidean_distance(&Point::from(b)) < tolerance,
            _ => false,
        };
        close(self.start(), other.start()) && close(self.end(), other.end())
    }

    /// Whether the two geometries overlap anywhere beyond a shared endpoint.
    pub fn has_common_geometry(&self, other: &Fragment, tolerance: f64) -> bool {
        if self.geometry.is_none() || other.geometry.is_none() {
            return false;
        }
        if self.start() == other.end() || other.start() == self.end() {
            return false;
        }

        self.geometry == other.geometry
            || self.starts_within(other, tolerance)
            || other.starts_within(self, tolerance)
            || self.ends_within(other, tolerance)
            || other.ends_within(self, tolerance)
            || self.start() == other.start()
            || self.end() == other.end()
    }

    /// `parent;from;to`, used to name fragments in diagnostics.
    pub fn identity(&self) -> String {
        format!("{};{};{}", self.parent_id, self.measure_from, self.measure_to)
    }
}

/// Behaviour shared by everything the consolidator can merge.
pub trait Part {
    fn fragment(&self) -> &Fragment;

    fn fragment_mut(&mut self) -> &mut Fragment;

    fn property_equal(&self, other: &Self) -> bool {
        self.fragment().parent_id == other.fragment().parent_id
            && self.fragment().attributes == other.fragment().attributes
    }

    /// Takes over `prev`, which ends where `self` starts.
    fn absorb_predecessor(&mut self, prev: &Self);

    /// Takes over `next`, which starts where `self` ends.
    fn absorb_successor(&mut self, next: &Self);
}

/// One observation from an attribute source, not yet merged into the network.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeFragment(pub Fragment);

impl AttributeFragment {
    /// Same parent, geometry within `geometry_tolerance`, identical measures and
    /// identical values. Directions are not compared.
    pub fn same_observation(&self, other: &AttributeFragment, geometry_tolerance: f64) -> bool {
        let (a, b) = (&self.0, &other.0);
        let geometry_matches = match (a.geometry(), b.geometry()) {
            (Some(x), Some(y)) => geometry_ops::equals_within(x, y, geometry_tolerance),
            (None, None) => true,
            _ => false,
        };

        a.parent_id == b.parent_id
            && geometry_matches
            && a.measure_from == b.measure_from
            && a.measure_to == b.measure_to
            && a.attributes.len() == b.attributes.len()
            && a
                .attributes
                .iter()
                .all(|(kind, attr)| b.attribute(*kind).is_some_and(|o| o.same_value(attr)))
    }
}

impl Part for AttributeFragment {
    fn fragment(&self) -> &Fragment {
        &self.0
    }

    fn fragment_mut(&mut self) -> &mut Fragment {
        &mut self.0
    }

    fn absorb_predecessor(&mut self, prev: &Self) {
        self.0.extend_backward(&prev.0);
    }

    fn absorb_successor(&mut self, next: &Self) {
        self.0.extend_forward(&next.0);
    }
}

/// A maximal non-overlapping slice of one network edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFragment {
    pub fragment: Fragment,
    pub from_node: String,
    pub to_node: String,
}

impl EdgeFragment {
    pub fn new(fragment: Fragment, from_node: impl Into<String>, to_node: impl Into<String>) -> Self {
        Self {
            fragment,
            from_node: from_node.into(),
            to_node: to_node.into(),
        }
    }

    /// Aligned unless travel is only allowed against the stored geometry.
    pub fn is_aligned(&self) -> bool {
        !self.fragment.attributes.values().any(|a| match a.kind() {
            AttributeKind::ForbiddenDriverDirection => a.direction == DirectionCategory::With,
            _ => a.direction == DirectionCategory::Against,
        })
    }

    /// Turns a misaligned fragment around so travel runs with the geometry.
    /// Returns whether anything changed.
    pub fn align(&mut self) -> bool {
        if self.is_aligned() {
            return false;
        }

        self.fragment.flip();
        std::mem::swap(&mut self.from_node, &mut self.to_node);

        for attribute in self.fragment.attributes_mut() {
            if !attribute.is_directional() {
                continue;
            }
            attribute.direction = match attribute.kind() {
                AttributeKind::ForbiddenDriverDirection => DirectionCategory::Against,
                _ => DirectionCategory::With,
            };
        }
        true
    }

    /// Node id shared with `other` at a seam, if the two fragments touch.
    pub fn shared_node<'a>(&'a self, other: &EdgeFragment) -> Option<&'a str> {
        if self.from_node == other.to_node {
            Some(&self.from_node)
        } else if self.to_node == other.from_node {
            Some(&self.to_node)
        } else {
            None
        }
    }

    /// `parent;from;to;from_node;to_node`
    pub fn identity(&self) -> String {
        format!(
            "{};{};{}",
            self.fragment.identity(),
            self.from_node,
            self.to_node
        )
    }
}

impl Part for EdgeFragment {
    fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    fn fragment_mut(&mut self) -> &mut Fragment {
        &mut self.fragment
    }

    fn absorb_predecessor(&mut self, prev: &Self) {
        self.fragment.extend_backward(&prev.fragment);
        self.from_node = prev.from_node.clone();
    }

    fn absorb_successor(&mut self, next: &Self) {
        self.fragment.extend_forward(&next.fragment);
        self.to_node = next.to_node.clone();
    }
}
